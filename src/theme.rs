//! Colour resolution: usage tiers, the theme registry and text colours.
//!
//! Everything here is a table lookup. Adding a theme is one row in
//! [`THEMES`]; nothing at the call site branches on a theme name.

use owo_colors::{AnsiColors, DynColors, Style, XtermColors};

use crate::config::{TextColor, ThemeName};
use crate::usage::whole_percent;

/// Usage band of a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Low,
    Mid,
    High,
}

/// `< 50` low, `50..80` mid, `>= 80` high, judged on the displayed whole percent.
pub fn tier_for(pct: f64) -> Tier {
    let pct = whole_percent(pct);
    if pct >= 80.0 {
        Tier::High
    } else if pct >= 50.0 {
        Tier::Mid
    } else {
        Tier::Low
    }
}

/// A single foreground colour from the 16-colour or 256-colour palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swatch {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightWhite,
    /// The terminal's own foreground (SGR 39)
    Terminal,
    Xterm(u8),
}

impl Swatch {
    pub fn dyn_color(self) -> DynColors {
        let ansi = match self {
            Swatch::Red => AnsiColors::Red,
            Swatch::Green => AnsiColors::Green,
            Swatch::Yellow => AnsiColors::Yellow,
            Swatch::Blue => AnsiColors::Blue,
            Swatch::Magenta => AnsiColors::Magenta,
            Swatch::Cyan => AnsiColors::Cyan,
            Swatch::White => AnsiColors::White,
            Swatch::BrightRed => AnsiColors::BrightRed,
            Swatch::BrightGreen => AnsiColors::BrightGreen,
            Swatch::BrightYellow => AnsiColors::BrightYellow,
            Swatch::BrightWhite => AnsiColors::BrightWhite,
            Swatch::Terminal => AnsiColors::Default,
            Swatch::Xterm(n) => return DynColors::Xterm(XtermColors::from(n)),
        };
        DynColors::Ansi(ansi)
    }
}

/// How one glyph is painted. Kept separate from [`Style`] so runs of equal
/// ink can be compared and merged before any escape is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    /// No escape sequence at all
    Bare,
    Swatch(Swatch),
    /// Faint, optionally tinted
    Dim(Option<Swatch>),
    Rgb(u8, u8, u8),
}

impl Ink {
    pub fn style(self) -> Option<Style> {
        match self {
            Ink::Bare => None,
            Ink::Swatch(s) => Some(Style::new().color(s.dyn_color())),
            Ink::Dim(Some(s)) => Some(Style::new().color(s.dyn_color()).dimmed()),
            Ink::Dim(None) => Some(Style::new().dimmed()),
            Ink::Rgb(r, g, b) => Some(Style::new().truecolor(r, g, b)),
        }
    }
}

pub struct Theme {
    pub name: ThemeName,
    pub low: Swatch,
    pub mid: Swatch,
    pub high: Swatch,
    /// What `text_color = auto` means under this theme
    pub text: TextColor,
    /// Colours are generated per glyph; the triple is only a preview
    pub animated: bool,
}

impl Theme {
    pub fn swatch(&self, tier: Tier) -> Swatch {
        match tier {
            Tier::Low => self.low,
            Tier::Mid => self.mid,
            Tier::High => self.high,
        }
    }

    pub fn bar_swatch(&self, pct: f64) -> Swatch {
        self.swatch(tier_for(pct))
    }
}

const fn row(name: ThemeName, low: Swatch, mid: Swatch, high: Swatch, text: TextColor) -> Theme {
    Theme {
        name,
        low,
        mid,
        high,
        text,
        animated: false,
    }
}

pub static THEMES: [Theme; 10] = [
    row(ThemeName::Default, Swatch::Green, Swatch::Yellow, Swatch::Red, TextColor::White),
    row(ThemeName::Ocean, Swatch::Cyan, Swatch::Blue, Swatch::Magenta, TextColor::White),
    row(ThemeName::Sunset, Swatch::Yellow, Swatch::Xterm(208), Swatch::Red, TextColor::White),
    row(ThemeName::Mono, Swatch::White, Swatch::White, Swatch::BrightWhite, TextColor::Dim),
    row(
        ThemeName::Neon,
        Swatch::BrightGreen,
        Swatch::BrightYellow,
        Swatch::BrightRed,
        TextColor::White,
    ),
    row(ThemeName::Pride, Swatch::Xterm(135), Swatch::Xterm(49), Swatch::Xterm(199), TextColor::White),
    row(ThemeName::Frost, Swatch::Xterm(159), Swatch::Xterm(75), Swatch::BrightWhite, TextColor::White),
    row(ThemeName::Ember, Swatch::Xterm(220), Swatch::Xterm(202), Swatch::BrightRed, TextColor::White),
    row(ThemeName::Candy, Swatch::Xterm(213), Swatch::Xterm(141), Swatch::Xterm(51), TextColor::White),
    Theme {
        name: ThemeName::Rainbow,
        low: Swatch::BrightGreen,
        mid: Swatch::BrightYellow,
        high: Swatch::Magenta,
        text: TextColor::Plain,
        animated: true,
    },
];

pub fn theme(name: ThemeName) -> &'static Theme {
    THEMES.iter().find(|t| t.name == name).unwrap_or(&THEMES[0])
}

/// Resolve `auto` through the theme table; other choices pass through.
pub fn resolve_text_color(choice: TextColor, theme: ThemeName) -> TextColor {
    match choice {
        TextColor::Auto => self::theme(theme).text,
        other => other,
    }
}

/// Ink for labels, percentages and other non-bar text.
pub fn text_ink(choice: TextColor, theme: ThemeName) -> Ink {
    match resolve_text_color(choice, theme) {
        // `auto` resolved to itself only if a table row said so; treat as white
        TextColor::Auto | TextColor::White => Ink::Swatch(Swatch::White),
        TextColor::BrightWhite => Ink::Swatch(Swatch::BrightWhite),
        TextColor::Cyan => Ink::Swatch(Swatch::Cyan),
        TextColor::Blue => Ink::Swatch(Swatch::Blue),
        TextColor::Green => Ink::Swatch(Swatch::Green),
        TextColor::Yellow => Ink::Swatch(Swatch::Yellow),
        TextColor::Magenta => Ink::Swatch(Swatch::Magenta),
        TextColor::Red => Ink::Swatch(Swatch::Red),
        TextColor::Orange => Ink::Swatch(Swatch::Xterm(208)),
        TextColor::Violet => Ink::Swatch(Swatch::Xterm(135)),
        TextColor::Pink => Ink::Swatch(Swatch::Xterm(199)),
        TextColor::Dim => Ink::Dim(Some(Swatch::White)),
        TextColor::Terminal => Ink::Swatch(Swatch::Terminal),
        TextColor::Plain => Ink::Bare,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;
    use owo_colors::OwoColorize;

    #[test]
    fn test_tier_boundaries_switch_exactly_once() {
        let mut previous = tier_for(0.0);
        let mut switches = Vec::new();
        for p in 0..=100 {
            let tier = tier_for(p as f64);
            if tier != previous {
                switches.push(p);
                previous = tier;
            }
        }
        assert_eq!(switches, vec![50, 80]);
        assert_eq!(tier_for(49.0), Tier::Low);
        assert_eq!(tier_for(50.0), Tier::Mid);
        assert_eq!(tier_for(79.0), Tier::Mid);
        assert_eq!(tier_for(80.0), Tier::High);
        assert_eq!(tier_for(100.0), Tier::High);
        assert_eq!(tier_for(79.5), Tier::High);
        assert_eq!(tier_for(49.5), Tier::Mid);
        assert_eq!(tier_for(49.4), Tier::Low);
    }

    #[test]
    fn test_every_theme_has_one_row() {
        for name in ThemeName::value_variants() {
            assert_eq!(THEMES.iter().filter(|t| t.name == *name).count(), 1, "{name:?}");
        }
    }

    #[test]
    fn test_default_theme_colours() {
        let t = theme(ThemeName::Default);
        assert_eq!(t.bar_swatch(12.0), Swatch::Green);
        assert_eq!(t.bar_swatch(65.0), Swatch::Yellow);
        assert_eq!(t.bar_swatch(95.0), Swatch::Red);
    }

    #[test]
    fn test_auto_text_colour_follows_table() {
        assert_eq!(resolve_text_color(TextColor::Auto, ThemeName::Mono), TextColor::Dim);
        assert_eq!(resolve_text_color(TextColor::Auto, ThemeName::Rainbow), TextColor::Plain);
        assert_eq!(resolve_text_color(TextColor::Auto, ThemeName::Ocean), TextColor::White);
        assert_eq!(resolve_text_color(TextColor::Cyan, ThemeName::Mono), TextColor::Cyan);
        assert_eq!(text_ink(TextColor::Auto, ThemeName::Rainbow), Ink::Bare);
    }

    #[test]
    fn test_ink_escapes() {
        let green = Ink::Swatch(Swatch::Green).style().unwrap();
        assert_eq!("x".style(green).to_string(), "\x1b[32mx\x1b[0m");
        let orange = Ink::Swatch(Swatch::Xterm(208)).style().unwrap();
        assert!("x".style(orange).to_string().starts_with("\x1b[38;5;208m"));
        assert!(Ink::Bare.style().is_none());
    }
}
