use ratatui::style::Color;

/// A named UI color theme.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub info: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

/// Cycled with Ctrl+T; the chosen name is persisted in the prefs file.
pub const THEMES: &[Theme] = &[
  Theme {
    name: "midnight",
    bg: Color::Rgb(16, 20, 28),
    fg: Color::Rgb(205, 214, 224),
    muted: Color::Rgb(110, 122, 138),
    accent: Color::Rgb(122, 162, 247),
    border: Color::Rgb(52, 62, 80),
    highlight_fg: Color::Rgb(16, 20, 28),
    highlight_bg: Color::Rgb(122, 162, 247),
    stripe_bg: Color::Rgb(22, 27, 37),
    status: Color::Rgb(158, 206, 106),
    error: Color::Rgb(247, 118, 142),
    info: Color::Rgb(125, 207, 255),
    key_fg: Color::Rgb(16, 20, 28),
    key_bg: Color::Rgb(110, 122, 138),
  },
  // Light palette after the old desktop client this grew out of:
  // steel-blue selection on a pale grey ground.
  Theme {
    name: "steel",
    bg: Color::Rgb(233, 233, 233),
    fg: Color::Rgb(46, 52, 54),
    muted: Color::Rgb(91, 91, 91),
    accent: Color::Rgb(26, 115, 232),
    border: Color::Rgb(176, 196, 222),
    highlight_fg: Color::Rgb(46, 52, 54),
    highlight_bg: Color::Rgb(176, 196, 222),
    stripe_bg: Color::Rgb(221, 221, 221),
    status: Color::Rgb(31, 60, 93),
    error: Color::Rgb(164, 0, 0),
    info: Color::Rgb(32, 74, 135),
    key_fg: Color::Rgb(233, 233, 233),
    key_bg: Color::Rgb(85, 87, 83),
  },
  Theme {
    name: "ember",
    bg: Color::Rgb(24, 18, 16),
    fg: Color::Rgb(224, 210, 200),
    muted: Color::Rgb(138, 120, 110),
    accent: Color::Rgb(255, 158, 100),
    border: Color::Rgb(80, 60, 52),
    highlight_fg: Color::Rgb(24, 18, 16),
    highlight_bg: Color::Rgb(255, 158, 100),
    stripe_bg: Color::Rgb(32, 24, 21),
    status: Color::Rgb(214, 188, 110),
    error: Color::Rgb(255, 106, 106),
    info: Color::Rgb(255, 200, 150),
    key_fg: Color::Rgb(24, 18, 16),
    key_bg: Color::Rgb(138, 120, 110),
  },
];
