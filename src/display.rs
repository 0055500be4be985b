//! Line composition. Parts are built as spans of plain text tagged with what
//! they mean (label, bar fill, separator, ...). Width fitting works on those
//! spans, and colour is applied per glyph only at the very end, so truncation
//! never cuts through an escape sequence and animation never has to parse one.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::fmt::Write as _;

use crate::animation::Frame;
use crate::bar::Bar;
use crate::config::{Config, ExtraDisplay, Layout, Part, ThemeName};
use crate::models::{SessionContext, Updates, UsageSnapshot};
use crate::theme::{self, Ink, Swatch, Tier, text_ink, tier_for};
use crate::usage::{format_countdown, whole_percent};
use crate::utils::{FALLBACK_WIDTH, format_amount};

pub const SEPARATOR: &str = " | ";
pub const UNAVAILABLE_NOTICE: &str = "Usage unavailable";

/// What a run of text is, which decides how it gets coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
    Text,
    Separator,
    Fill(Tier),
    Track,
    Notice,
    Update,
}

impl Paint {
    fn is_bar(self) -> bool {
        matches!(self, Paint::Fill(_) | Paint::Track)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Span {
    text: String,
    paint: Paint,
}

impl Span {
    fn text(text: impl Into<String>) -> Self {
        Span {
            text: text.into(),
            paint: Paint::Text,
        }
    }
}

/// Positions on the line, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Session,
    Weekly,
    Extra,
    Context,
    Model,
    Plan,
    Update,
}

/// Dropped front to back when the line is too wide. Session is never
/// dropped, only clipped.
const DROP_ORDER: [Slot; 6] = [
    Slot::Update,
    Slot::Model,
    Slot::Plan,
    Slot::Context,
    Slot::Extra,
    Slot::Weekly,
];

#[derive(Debug)]
struct Segment {
    slot: Slot,
    spans: Vec<Span>,
}

impl Segment {
    fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Columns available
    pub width: usize,
    /// Emit escape sequences at all
    pub color: bool,
    pub updates: Updates,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: FALLBACK_WIDTH,
            color: true,
            updates: Updates::default(),
        }
    }
}

fn label(layout: Layout, full: &'static str) -> Option<&'static str> {
    match layout {
        Layout::Standard | Layout::PercentFirst => Some(full),
        Layout::Compact => full.get(..1),
        Layout::Minimal => None,
    }
}

fn percent_text(pct: f64) -> String {
    format!("{:.0}%", whole_percent(pct))
}

struct Composer<'a> {
    config: &'a Config,
    now: DateTime<Utc>,
}

impl Composer<'_> {
    fn visible(&self, part: Part) -> bool {
        self.config.show.is_visible(part)
    }

    /// Label, bar and value arranged for the active layout, e.g.
    /// `Weekly ━━━━──── 50%` or `Weekly 50% ━━━━────`.
    fn meter(&self, full_label: &'static str, pct: f64, value: String, tail: Option<String>) -> Vec<Span> {
        let bar = Bar::new(pct, self.config.bar_size, self.config.bar_style);
        let mut bar_spans = Vec::with_capacity(2);
        if bar.filled > 0 {
            bar_spans.push(Span {
                text: bar.filled_text(),
                paint: Paint::Fill(tier_for(pct)),
            });
        }
        if bar.empty > 0 {
            bar_spans.push(Span {
                text: bar.empty_text(),
                paint: Paint::Track,
            });
        }

        let layout = self.config.layout;
        let mut spans = Vec::new();
        if let Some(l) = label(layout, full_label) {
            spans.push(Span::text(format!("{l} ")));
        }
        if layout == Layout::PercentFirst {
            spans.push(Span::text(format!("{value} ")));
            spans.extend(bar_spans);
        } else {
            spans.extend(bar_spans);
            spans.push(Span::text(format!(" {value}")));
        }
        if let Some(tail) = tail {
            spans.push(Span::text(format!(" {tail}")));
        }
        spans
    }

    fn session(&self, snapshot: Option<&UsageSnapshot>) -> Option<Vec<Span>> {
        if !self.visible(Part::Session) {
            return None;
        }
        let Some(snapshot) = snapshot else {
            return Some(vec![Span {
                text: UNAVAILABLE_NOTICE.to_string(),
                paint: Paint::Notice,
            }]);
        };
        let pct = snapshot.session_percent?;
        let countdown = snapshot
            .session_resets_at
            .filter(|_| self.visible(Part::Timer))
            .map(|at| format_countdown(at, self.now));
        Some(self.meter("Session", pct, percent_text(pct), countdown))
    }

    fn weekly(&self, snapshot: Option<&UsageSnapshot>) -> Option<Vec<Span>> {
        if !self.visible(Part::Weekly) {
            return None;
        }
        let pct = snapshot?.weekly_percent?;
        Some(self.meter("Weekly", pct, percent_text(pct), None))
    }

    fn extra(&self, snapshot: Option<&UsageSnapshot>) -> Option<Vec<Span>> {
        let snapshot = snapshot?;
        let mode = self.config.extra_display;
        if mode == ExtraDisplay::Never {
            return None;
        }
        match &snapshot.extra {
            Some(extra) if extra.has_credits() => {
                let cur = &self.config.currency;
                let amounts = format!(
                    "{cur}{}/{cur}{}",
                    format_amount(extra.used.unwrap_or(0.0)),
                    format_amount(extra.limit.unwrap_or(0.0)),
                );
                Some(self.meter("Extra", extra.percent(), amounts, None))
            }
            _ if mode == ExtraDisplay::Always => Some(self.meter("Extra", 0.0, "none".to_string(), None)),
            _ => None,
        }
    }

    fn context(&self, ctx: &SessionContext) -> Option<Vec<Span>> {
        if !self.visible(Part::Context) {
            return None;
        }
        let pct = ctx.context_percent?;
        Some(self.meter("Context", pct, percent_text(pct), None))
    }

    fn word(&self, part: Part, value: Option<&String>) -> Option<Vec<Span>> {
        if !self.visible(part) {
            return None;
        }
        Some(vec![Span::text(value?.clone())])
    }

    fn update(&self, updates: &Updates) -> Option<Vec<Span>> {
        if !self.visible(Part::Update) {
            return None;
        }
        let mut notes = Vec::new();
        if updates.tool_available() {
            notes.push("↑ Update".to_string());
        }
        if let Some(host) = updates.host.as_ref().filter(|h| h.update_available) {
            notes.push(format!("↑ Claude {}", host.latest_version));
        }
        if notes.is_empty() {
            return None;
        }
        Some(vec![Span {
            text: notes.join(" "),
            paint: Paint::Update,
        }])
    }

    fn segments(&self, snapshot: Option<&UsageSnapshot>, ctx: &SessionContext, updates: &Updates) -> Vec<Segment> {
        [
            (Slot::Session, self.session(snapshot)),
            (Slot::Weekly, self.weekly(snapshot)),
            (Slot::Extra, self.extra(snapshot)),
            (Slot::Context, self.context(ctx)),
            (Slot::Model, self.word(Part::Model, ctx.model.as_ref())),
            (Slot::Plan, self.word(Part::Plan, ctx.plan.as_ref())),
            (Slot::Update, self.update(updates)),
        ]
        .into_iter()
        .filter_map(|(slot, spans)| spans.map(|spans| Segment { slot, spans }))
        .collect()
    }
}

fn line_width(segments: &[Segment]) -> usize {
    let parts: usize = segments.iter().map(Segment::width).sum();
    parts + SEPARATOR.chars().count() * segments.len().saturating_sub(1)
}

/// Drop whole parts in [`DROP_ORDER`] until the line fits.
fn fit(mut segments: Vec<Segment>, max_width: usize) -> Vec<Segment> {
    for slot in DROP_ORDER {
        if line_width(&segments) <= max_width {
            break;
        }
        let before = segments.len();
        segments.retain(|s| s.slot != slot);
        if segments.len() != before {
            tracing::debug!(?slot, max_width, "dropped part to fit width");
        }
    }
    segments
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    paint: Paint,
}

/// Join parts with separators and hard-clip to `max_width` glyphs.
fn cells(segments: &[Segment], max_width: usize) -> Vec<Cell> {
    let mut out = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.extend(SEPARATOR.chars().map(|ch| Cell {
                ch,
                paint: Paint::Separator,
            }));
        }
        for span in &segment.spans {
            out.extend(span.text.chars().map(|ch| Cell { ch, paint: span.paint }));
        }
    }
    out.truncate(max_width);
    out
}

/// Colour decisions that hold for the whole line.
struct Palette {
    rainbow: bool,
    rainbow_bars: bool,
    bars: &'static theme::Theme,
    text: Ink,
    frame: Frame,
}

impl Palette {
    fn new(config: &Config, now: DateTime<Utc>, visible: usize) -> Self {
        let active = theme::theme(config.theme);
        // Rainbow bars that are not themselves rainbow keep the usage colours
        let bars = if active.animated {
            theme::theme(ThemeName::Default)
        } else {
            active
        };
        Palette {
            rainbow: active.animated,
            rainbow_bars: config.rainbow_bars,
            bars,
            text: text_ink(config.text_color, config.theme),
            frame: Frame::at(config.animate.then_some(now), visible),
        }
    }

    fn ink(&self, paint: Paint, index: usize) -> Ink {
        if paint == Paint::Update {
            return Ink::Swatch(Swatch::BrightYellow);
        }
        if self.rainbow && (!paint.is_bar() || self.rainbow_bars) {
            let (r, g, b) = self.frame.rainbow(index);
            return Ink::Rgb(r, g, b);
        }
        match paint {
            Paint::Fill(tier) => Ink::Swatch(self.bars.swatch(tier)),
            Paint::Track => Ink::Dim(None),
            // Text shimmer never touches bars, so usage colours stay readable
            _ => match self.frame.shimmer_level(index) {
                Some(level) => Ink::Rgb(level, level, level),
                None if matches!(paint, Paint::Separator | Paint::Notice) => Ink::Dim(None),
                None => self.text,
            },
        }
    }
}

fn paint(cells: &[Cell], palette: &Palette) -> String {
    let mut out = String::new();
    let mut run = String::new();
    let mut run_ink: Option<Ink> = None;

    let flush = |out: &mut String, run: &mut String, ink: Option<Ink>| {
        if run.is_empty() {
            return;
        }
        match ink.and_then(Ink::style) {
            Some(style) => {
                let _ = write!(out, "{}", run.style(style));
            }
            None => out.push_str(run),
        }
        run.clear();
    };

    for (index, cell) in cells.iter().enumerate() {
        let ink = palette.ink(cell.paint, index);
        if run_ink != Some(ink) {
            flush(&mut out, &mut run, run_ink);
            run_ink = Some(ink);
        }
        run.push(cell.ch);
    }
    flush(&mut out, &mut run, run_ink);
    out
}

/// Render the status line. Pure apart from logging: identical arguments give
/// identical output.
pub fn render_line(
    snapshot: Option<&UsageSnapshot>,
    ctx: &SessionContext,
    config: &Config,
    now: DateTime<Utc>,
    opts: &RenderOptions,
) -> String {
    let composer = Composer { config, now };
    let segments = fit(composer.segments(snapshot, ctx, &opts.updates), opts.width);
    let cells = cells(&segments, opts.width);
    if !opts.color {
        return cells.iter().map(|c| c.ch).collect();
    }
    let palette = Palette::new(config, now, cells.len());
    paint(&cells, &palette)
}
