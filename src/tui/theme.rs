#![forbid(unsafe_code)]

use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub surface: Color,
    pub primary: Color,
    pub text: Color,
    pub text_secondary: Color,
    pub border: Color,
    pub error: Color,
}

pub const LIGHT: Palette = Palette {
    background: Color::Rgb(0xF9, 0xFA, 0xFB),
    surface: Color::Rgb(0xFF, 0xFF, 0xFF),
    primary: Color::Rgb(0x63, 0x66, 0xF1),
    text: Color::Rgb(0x1F, 0x29, 0x37),
    text_secondary: Color::Rgb(0x6B, 0x72, 0x80),
    border: Color::Rgb(0xE5, 0xE7, 0xEB),
    error: Color::Rgb(0xEF, 0x44, 0x44),
};

pub const DARK: Palette = Palette {
    background: Color::Rgb(0x11, 0x18, 0x27),
    surface: Color::Rgb(0x1F, 0x29, 0x37),
    primary: Color::Rgb(0x81, 0x8C, 0xF8),
    text: Color::Rgb(0xF9, 0xFA, 0xFB),
    text_secondary: Color::Rgb(0x9C, 0xA3, 0xAF),
    border: Color::Rgb(0x37, 0x41, 0x51),
    error: Color::Rgb(0xF8, 0x71, 0x71),
};

pub const COMPLETE_ACTION: Color = Color::Rgb(0x10, 0xB9, 0x81);
pub const UNDO_ACTION: Color = Color::Rgb(0xF5, 0x9E, 0x0B);
pub const DELETE_ACTION: Color = Color::Rgb(0xEF, 0x44, 0x44);
pub const ACTION_TEXT: Color = Color::Rgb(0xFF, 0xFF, 0xFF);

/// Light/dark selection. Owned by the app loop (the only writer) and passed
/// by value to everything that draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Theme {
    dark: bool,
}

impl Theme {
    #[must_use]
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }

    #[must_use]
    pub fn is_dark(self) -> bool {
        self.dark
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        Self { dark: !self.dark }
    }

    #[must_use]
    pub fn palette(self) -> &'static Palette {
        if self.dark { &DARK } else { &LIGHT }
    }

    /// Label of the button that switches to the other theme.
    #[must_use]
    pub fn toggle_label(self) -> &'static str {
        if self.dark { "☀️ Light" } else { "🌙 Dark" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_swaps_palette_and_label() {
        let light = Theme::default();
        assert!(!light.is_dark());
        assert_eq!(light.palette(), &LIGHT);
        assert_eq!(light.toggle_label(), "🌙 Dark");

        let dark = light.toggled();
        assert_eq!(dark.palette(), &DARK);
        assert_eq!(dark.toggle_label(), "☀️ Light");
        assert_eq!(dark.toggled(), light);
    }
}
