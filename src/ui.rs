use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, Gauge, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// Render a duration in seconds as H:MM:SS.
pub fn format_duration(secs: u64) -> String {
  format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let show_gauge = app.download.is_some();
  let mut constraints =
    vec![Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)];
  if show_gauge {
    constraints.push(Constraint::Length(1));
  }
  constraints.push(Constraint::Length(3));
  constraints.push(Constraint::Length(1));
  let areas = Layout::vertical(constraints).split(frame.area());

  render_header(frame, theme, areas[0]);
  render_main(frame, app, areas[1]);
  render_status(frame, app, areas[2]);
  if show_gauge {
    render_download_gauge(frame, app, areas[3]);
  }
  let input_area = areas[areas.len() - 2];
  let footer_area = areas[areas.len() - 1];
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ mvt ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if !app.search_results.is_empty() {
    let [list_area, detail_area] =
      Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(area);
    render_results(frame, app, list_area);
    render_details(frame, app, detail_area);
  } else {
    render_welcome(frame, app.theme(), area);
  }
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  mvt — Mediathek search", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search the broadcast archives. Play or save streams.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Wildcards:", Style::default().fg(theme.fg))),
    Line::from(Span::styled("!sender   +title   #topic   *description", Style::default().fg(theme.muted))),
    Line::from(Span::styled("<N / >N   shorter / longer than N minutes", Style::default().fg(theme.muted))),
    Line::from(""),
    Line::from(Span::styled("Example: !ZDF +Wilsberg >70", Style::default().fg(theme.muted))),
    Line::from(""),
    Line::from(Span::styled("Type a query below and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .search_results
    .iter()
    .enumerate()
    .map(|(i, entry)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      // Right-side metadata: "category  duration", either part optional.
      let duration_str = if entry.duration_secs > 0 { format_duration(entry.duration_secs) } else { String::new() };
      let right = match (!entry.category.is_empty(), !duration_str.is_empty()) {
        (true, true) => format!("{}  {}", entry.category, duration_str),
        (true, false) => entry.category.clone(),
        (false, true) => duration_str.clone(),
        (false, false) => String::new(),
      };

      let line = if right.is_empty() {
        let title = truncate_str(&entry.title, inner_w);
        Line::from(Span::styled(title, Style::default().fg(fg)))
      } else {
        // Reserve space for right side + 2-char gap
        let right_w = right.chars().count();
        let title_max = inner_w.saturating_sub(right_w + 2);
        let title = truncate_str(&entry.title, title_max);
        let title_w = title.chars().count();
        let gap = inner_w.saturating_sub(title_w + right_w);

        let padding: String = " ".repeat(gap);
        Line::from(vec![
          Span::styled(title, Style::default().fg(fg)),
          Span::raw(padding),
          Span::styled(right, Style::default().fg(theme.muted)),
        ])
      };

      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = format!(" Results — {} ", app.search_results.len());
  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();

  let title = if app.player.is_playing() { " Now Playing " } else { " Details " };
  let block = Block::bordered()
    .title(Span::styled(title, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  // While playing, describe the playing item; otherwise the selection.
  let shown = if app.player.is_playing() { app.player.current.as_ref() } else { app.selected_item() };

  if let Some(item) = shown {
    let inner_w = area.width.saturating_sub(4) as usize;

    let mut lines = vec![
      Line::from(""),
      Line::from(Span::styled(
        truncate_str(&item.title, inner_w),
        Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
      )),
      Line::from(""),
    ];
    if item.duration_secs > 0 {
      lines.push(Line::from(vec![
        Span::styled("Duration  ", Style::default().fg(theme.muted)),
        Span::styled(format_duration(item.duration_secs), Style::default().fg(theme.fg)),
      ]));
    }
    if !item.category.is_empty() {
      let label = "Channel   ";
      let value_w = inner_w.saturating_sub(label.len());
      lines.push(Line::from(vec![
        Span::styled(label, Style::default().fg(theme.muted)),
        Span::styled(truncate_str(&item.category, value_w), Style::default().fg(theme.fg)),
      ]));
    }
    lines.push(Line::from(""));
    if !item.description.is_empty() {
      lines.push(Line::from(Span::styled(item.description.clone(), Style::default().fg(theme.fg))));
      lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
      truncate_str(&item.url, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )));

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(paragraph, area);
  } else {
    frame.render_widget(block, area);
  }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(msg) = &app.info_message {
    (format!(" ℹ  {}", msg), Style::default().fg(theme.info))
  } else {
    match app.player.last_status() {
      Some(status) => (format!(" ♪ {}", status), Style::default().fg(theme.status)),
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_download_gauge(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(ref dl) = app.download else { return };

  let percent = dl.percent.unwrap_or(0);
  let label = format!("Download {}% — {}", percent, dl.dest.display());
  let gauge = Gauge::default()
    .ratio(f64::from(percent) / 100.0)
    .label(Span::styled(label, Style::default().fg(theme.fg)))
    .gauge_style(Style::default().fg(theme.accent).bg(theme.stripe_bg));
  frame.render_widget(gauge, area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let saving = app.mode == AppMode::SavePath;
  let focused = matches!(app.mode, AppMode::Input | AppMode::SavePath);

  let title = if saving { " Save as " } else { " Search Mediathek " };
  let border_color = if focused { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let (text, cursor, scroll) = if saving {
    (&app.save_input, app.save_cursor, &mut app.save_scroll)
  } else {
    (&app.input, app.cursor_position, &mut app.input_scroll)
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(text, cursor);

  if cursor_col < *scroll {
    *scroll = cursor_col;
  } else if cursor_col >= *scroll + inner_w {
    *scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let window_start = *scroll;
  let visible: String = text
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= window_start)
    .take_while(|(start, _, _)| *start < window_start + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - window_start) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_results = !app.search_results.is_empty();
  let is_playing = app.player.is_playing();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Search"), ("^t", "Theme")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      if has_results {
        k.push(("↓", "Results"));
        k.push(("Esc", "Results"));
      } else {
        k.push(("Esc", "Quit"));
      }
      k
    }
    AppMode::Results => {
      let mut k = vec![("Enter", "Play"), ("d", "Download"), ("y", "Copy URL"), ("j/k", "Navigate")];
      if is_playing {
        let pause_label = if app.player.paused { "Resume" } else { "Pause" };
        k.push(("Space", pause_label));
        k.push(("^s", "Stop"));
      }
      k.push(("Esc", "Back"));
      k
    }
    AppMode::SavePath => vec![("Enter", "Download"), ("Esc", "Cancel")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duration_formats_as_h_mm_ss() {
    assert_eq!(format_duration(0), "0:00:00");
    assert_eq!(format_duration(61), "0:01:01");
    assert_eq!(format_duration(5400), "1:30:00");
    assert_eq!(format_duration(3661), "1:01:01");
  }

  #[test]
  fn truncation_appends_ellipsis() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("a very long title", 7), "a very…");
  }
}
