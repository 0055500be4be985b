//! Stateless animation. Every colour is a function of the wall clock and a
//! glyph's position, so separate invocations line up into a continuous
//! animation without any stored frame counter.
//!
//! Phases are taken from integer milliseconds, which makes each effect exactly
//! periodic: the frame at `t` equals the frame at `t + period`.

use chrono::{DateTime, Utc};

/// One full turn of the hue wheel
pub const HUE_PERIOD_MS: i64 = 4_000;
/// Shimmer cycle; the glint runs during its last [`GLINT_MS`]
pub const SHIMMER_CYCLE_MS: i64 = 2_500;
pub const GLINT_MS: i64 = 700;
/// Half-width of the shimmer highlight, in glyphs
pub const HIGHLIGHT_WIDTH: f64 = 20.0;

const HUE_STEP: f64 = 0.025;
const SATURATION: f64 = 0.92;
const VALUE: f64 = 0.95;

/// HSV (all in `0..=1`) to 8-bit RGB.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let byte = |x: f64| (x * 255.0) as u8;
    if s == 0.0 {
        let c = byte(v);
        return (c, c, c);
    }
    let h6 = h * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = byte(v * (1.0 - s));
    let q = byte(v * (1.0 - s * f));
    let t = byte(v * (1.0 - s * (1.0 - f)));
    let vi = byte(v);
    match (sector as i64).rem_euclid(6) {
        0 => (vi, t, p),
        1 => (q, vi, p),
        2 => (p, vi, t),
        3 => (p, q, vi),
        4 => (t, p, vi),
        _ => (vi, p, q),
    }
}

fn phase_ms(now: DateTime<Utc>, period_ms: i64) -> i64 {
    now.timestamp_millis().rem_euclid(period_ms)
}

/// The colours of one rendered line at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    drift: f64,
    /// Highlight centre in glyph positions while the glint is running
    glint_center: Option<f64>,
}

impl Frame {
    /// Frame for a line of `visible` glyphs. `None` for `now` gives the static
    /// frame: hue drift frozen at zero and no shimmer.
    pub fn at(now: Option<DateTime<Utc>>, visible: usize) -> Self {
        let Some(now) = now else {
            return Frame::still();
        };
        let drift = phase_ms(now, HUE_PERIOD_MS) as f64 / HUE_PERIOD_MS as f64;
        let phase = phase_ms(now, SHIMMER_CYCLE_MS);
        let glint_start = SHIMMER_CYCLE_MS - GLINT_MS;
        let glint_center = (phase >= glint_start && visible > 0).then(|| {
            let sweep = (phase - glint_start) as f64 / GLINT_MS as f64;
            sweep * (visible as f64 + HIGHLIGHT_WIDTH * 2.0) - HIGHLIGHT_WIDTH
        });
        Frame { drift, glint_center }
    }

    pub fn still() -> Self {
        Frame {
            drift: 0.0,
            glint_center: None,
        }
    }

    pub fn glint_active(&self) -> bool {
        self.glint_center.is_some()
    }

    pub fn hue(&self, index: usize) -> f64 {
        (index as f64 * HUE_STEP + self.drift).rem_euclid(1.0)
    }

    /// Highlight strength at `index`, `0..=1` with quadratic falloff; `None`
    /// outside the highlight band.
    pub fn shimmer(&self, index: usize) -> Option<f64> {
        let center = self.glint_center?;
        let dist = (index as f64 - center).abs();
        if dist >= HIGHLIGHT_WIDTH {
            return None;
        }
        let blend = 1.0 - dist / HIGHLIGHT_WIDTH;
        Some(blend * blend)
    }

    /// Grey level of the white glint for plain-coloured text.
    pub fn shimmer_level(&self, index: usize) -> Option<u8> {
        self.shimmer(index).map(highlight_level)
    }

    /// Rainbow colour of the glyph at `index`, brightened by the glint.
    pub fn rainbow(&self, index: usize) -> (u8, u8, u8) {
        let (r, g, b) = hsv_to_rgb(self.hue(index), SATURATION, VALUE);
        match self.shimmer(index) {
            Some(blend) => {
                let target = highlight_level(blend);
                (mix(r, target, blend), mix(g, target, blend), mix(b, target, blend))
            }
            None => (r, g, b),
        }
    }
}

fn highlight_level(blend: f64) -> u8 {
    (210.0 + blend * 45.0) as u8
}

fn mix(from: u8, to: u8, blend: f64) -> u8 {
    let from = from as f64;
    (from + (to as f64 - from) * blend) as u8
}
