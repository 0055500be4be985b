use crate::config::{BarSize, BarStyle};
use crate::usage::clamp_percent;

/// `(filled, empty)` glyph pair of a style
pub fn glyphs(style: BarStyle) -> (char, char) {
    match style {
        BarStyle::Classic => ('━', '─'),
        BarStyle::Block => ('█', '░'),
        BarStyle::Shade => ('▓', '░'),
        BarStyle::Dot => ('●', '○'),
        BarStyle::Square => ('■', '□'),
        BarStyle::Ascii => ('#', '-'),
    }
}

pub fn width(size: BarSize) -> usize {
    match size {
        BarSize::Small => 4,
        BarSize::Medium => 8,
        BarSize::Large => 12,
    }
}

/// `round(pct / 100 * width)`, never more than `width`.
pub fn filled_cells(pct: f64, width: usize) -> usize {
    let filled = (clamp_percent(pct) / 100.0 * width as f64).round() as usize;
    filled.min(width)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    pub filled: usize,
    pub empty: usize,
    pub fill: char,
    pub track: char,
}

impl Bar {
    pub fn new(pct: f64, size: BarSize, style: BarStyle) -> Self {
        let width = width(size);
        let filled = filled_cells(pct, width);
        let (fill, track) = glyphs(style);
        Bar {
            filled,
            empty: width - filled,
            fill,
            track,
        }
    }

    pub fn filled_text(&self) -> String {
        std::iter::repeat_n(self.fill, self.filled).collect()
    }

    pub fn empty_text(&self) -> String {
        std::iter::repeat_n(self.track, self.empty).collect()
    }

    pub fn plain(&self) -> String {
        self.filled_text() + &self.empty_text()
    }
}
