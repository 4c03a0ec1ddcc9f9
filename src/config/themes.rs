use ratatui::style::Color;

use super::ThemeName;

/// Colours the terminal client draws with.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub error: Color,
    pub warning: Color,
    pub selection_fg: Color,
    pub selection_bg: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemeName) -> Self {
        match theme {
            ThemeName::Dark => Self {
                accent: Color::Cyan,
                text: Color::White,
                muted: Color::Gray,
                error: Color::LightRed,
                warning: Color::Yellow,
                selection_fg: Color::Black,
                selection_bg: Color::Cyan,
            },
            ThemeName::Light => Self {
                accent: Color::Blue,
                text: Color::Black,
                muted: Color::DarkGray,
                error: Color::Red,
                warning: Color::Magenta,
                selection_fg: Color::White,
                selection_bg: Color::Blue,
            },
            ThemeName::HighContrast => Self {
                accent: Color::Yellow,
                text: Color::White,
                muted: Color::White,
                error: Color::LightRed,
                warning: Color::LightYellow,
                selection_fg: Color::Black,
                selection_bg: Color::Yellow,
            },
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::for_theme(ThemeName::default())
    }
}
