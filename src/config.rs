//! Layered configuration: built-in defaults, then the persisted
//! `config.json`, then one-shot CLI mutations applied through [`apply`].
//!
//! Loading never fails. A missing or corrupt file yields defaults, an unknown
//! choice degrades to that field's default, and keys this version does not
//! understand are carried through to the next save untouched.

use anyhow::Context;
use clap::ValueEnum;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::QuotaError;
use crate::utils::{config_dir, parse_switch, write_atomic};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 60;

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    #[default]
    Default,
    Ocean,
    Sunset,
    Mono,
    Neon,
    Pride,
    Frost,
    Ember,
    Candy,
    /// Animated pseudo-theme; colours are generated, not looked up
    Rainbow,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextColor {
    /// Follow the active theme's recommended colour
    #[default]
    Auto,
    White,
    BrightWhite,
    Cyan,
    Blue,
    Green,
    Yellow,
    Magenta,
    Red,
    Orange,
    Violet,
    Pink,
    Dim,
    /// The terminal's own foreground colour
    #[value(name = "default")]
    #[serde(rename = "default")]
    Terminal,
    /// No colour codes at all around text
    #[value(name = "none")]
    #[serde(rename = "none")]
    Plain,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BarSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BarStyle {
    #[default]
    Classic,
    Block,
    Shade,
    Dot,
    Square,
    Ascii,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// `Session ━━── 42% 3h 05m`
    #[default]
    Standard,
    /// `S ━━── 42% 3h 05m`
    Compact,
    /// `━━── 42%`
    Minimal,
    /// `Session 42% ━━──`
    PercentFirst,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtraDisplay {
    /// Shown only while extra credits are enabled with a positive limit
    #[default]
    Auto,
    Always,
    Never,
}

/// Toggleable parts of the line, in canonical order. The extra-credit part is
/// governed by [`ExtraDisplay`] instead.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Part {
    Session,
    Weekly,
    Timer,
    Context,
    Model,
    Plan,
    Update,
}

impl Part {
    pub const ALL: [Part; 7] = [
        Part::Session,
        Part::Weekly,
        Part::Timer,
        Part::Context,
        Part::Model,
        Part::Plan,
        Part::Update,
    ];

    pub fn default_visible(self) -> bool {
        !matches!(self, Part::Model)
    }

    pub fn key(self) -> String {
        choice_name(self)
    }
}

/// Kebab-case name of a choice, as written in the config file and on the CLI.
pub fn choice_name<E: ValueEnum>(value: E) -> String {
    value
        .to_possible_value()
        .map(|p| p.get_name().to_string())
        .unwrap_or_default()
}

pub fn choice_names<E: ValueEnum>() -> Vec<String> {
    E::value_variants()
        .iter()
        .filter_map(|v| v.to_possible_value())
        .map(|p| p.get_name().to_string())
        .collect()
}

/// Parse a choice case-insensitively, accepting `_` for `-`.
pub fn parse_choice<E: ValueEnum>(field: &'static str, raw: &str) -> Result<E, QuotaError> {
    let normalized = raw.trim().replace('_', "-");
    <E as ValueEnum>::from_str(&normalized, true).map_err(|_| QuotaError::UnknownEnumValue {
        field,
        value: raw.trim().to_string(),
        expected: choice_names::<E>().join(", "),
    })
}

fn lenient_choice<E: ValueEnum + Copy>(field: &'static str, value: &Value, fallback: E) -> E {
    let parsed = match value.as_str() {
        Some(s) => parse_choice::<E>(field, s),
        None => Err(QuotaError::UnknownEnumValue {
            field,
            value: value.to_string(),
            expected: choice_names::<E>().join(", "),
        }),
    };
    parsed.unwrap_or_else(|e| {
        tracing::warn!(error = %e, fallback = %choice_name(fallback), "using default");
        fallback
    })
}

fn lenient_bool(field: &'static str, value: &Value, fallback: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => parse_switch(s).unwrap_or_else(|| {
            tracing::warn!(field, value = %s, "not an on/off value, using default");
            fallback
        }),
        other => {
            tracing::warn!(field, value = %other, "expected a boolean, using default");
            fallback
        }
    }
}

/// Per-part on/off switches. Keys this version does not know are kept
/// verbatim so a newer tool's settings survive a round-trip through this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Visibility {
    parts: BTreeMap<Part, bool>,
    unknown: Map<String, Value>,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility {
            parts: Part::ALL.iter().map(|p| (*p, p.default_visible())).collect(),
            unknown: Map::new(),
        }
    }
}

impl Visibility {
    /// Only the listed parts are visible.
    pub fn only(parts: &[Part]) -> Self {
        Visibility {
            parts: Part::ALL.iter().map(|p| (*p, parts.contains(p))).collect(),
            unknown: Map::new(),
        }
    }

    pub fn is_visible(&self, part: Part) -> bool {
        self.parts
            .get(&part)
            .copied()
            .unwrap_or_else(|| part.default_visible())
    }

    pub fn set(&mut self, part: Part, visible: bool) {
        self.parts.insert(part, visible);
    }

    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }

    fn from_value(value: Value) -> Self {
        let mut vis = Visibility::default();
        let Value::Object(map) = value else {
            tracing::warn!("visibility map is not an object, using defaults");
            return vis;
        };
        for (key, val) in map {
            match (parse_choice::<Part>("part", &key), val) {
                (Ok(part), val) => vis.set(part, lenient_bool("show", &val, part.default_visible())),
                (Err(_), other) => {
                    vis.unknown.insert(key, other);
                }
            }
        }
        vis
    }
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.parts.len() + self.unknown.len()))?;
        for (part, on) in &self.parts {
            map.serialize_entry(&part.key(), on)?;
        }
        for (key, val) in &self.unknown {
            map.serialize_entry(key, val)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub theme: ThemeName,
    pub text_color: TextColor,
    pub bar_size: BarSize,
    pub bar_style: BarStyle,
    pub layout: Layout,
    pub animate: bool,
    /// Rainbow theme only: colour the bars too, not just the text
    pub rainbow_bars: bool,
    pub currency: String,
    pub extra_display: ExtraDisplay,
    pub cache_ttl_seconds: i64,
    pub show: Visibility,
    /// Top-level keys this version does not understand
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            theme: ThemeName::default(),
            text_color: TextColor::default(),
            bar_size: BarSize::default(),
            bar_style: BarStyle::default(),
            layout: Layout::default(),
            animate: true,
            rainbow_bars: true,
            currency: "$".to_string(),
            extra_display: ExtraDisplay::default(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            show: Visibility::default(),
            unknown: Map::new(),
        }
    }
}

impl Config {
    /// Overlay a parsed document on the defaults, field by field.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let mut c = Config::default();
        if let Some(v) = map.remove("theme") {
            c.theme = lenient_choice("theme", &v, c.theme);
        }
        if let Some(v) = map.remove("text_color") {
            c.text_color = lenient_choice("text color", &v, c.text_color);
        }
        if let Some(v) = map.remove("bar_size") {
            c.bar_size = lenient_choice("bar size", &v, c.bar_size);
        }
        if let Some(v) = map.remove("bar_style") {
            c.bar_style = lenient_choice("bar style", &v, c.bar_style);
        }
        if let Some(v) = map.remove("layout") {
            c.layout = lenient_choice("layout", &v, c.layout);
        }
        if let Some(v) = map.remove("extra_display") {
            c.extra_display = lenient_choice("extra display", &v, c.extra_display);
        }
        if let Some(v) = map.remove("animate") {
            c.animate = lenient_bool("animate", &v, c.animate);
        }
        if let Some(v) = map.remove("rainbow_bars") {
            c.rainbow_bars = lenient_bool("rainbow_bars", &v, c.rainbow_bars);
        }
        if let Some(v) = map.remove("currency") {
            match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(sym) => c.currency = sym.to_string(),
                None => tracing::warn!(value = %v, "invalid currency symbol, using default"),
            }
        }
        if let Some(v) = map.remove("cache_ttl_seconds") {
            match v.as_i64().filter(|n| *n >= 0) {
                Some(ttl) => c.cache_ttl_seconds = ttl,
                None => tracing::warn!(value = %v, "invalid cache TTL, using default"),
            }
        }
        if let Some(v) = map.remove("show") {
            c.show = Visibility::from_value(v);
        }
        c.unknown = map;
        c
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Config::from_map(map))
    }
}

/// One CLI-settable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Theme,
    TextColor,
    BarSize,
    BarStyle,
    Layout,
    Animate,
    RainbowBars,
    Currency,
    ExtraDisplay,
    CacheTtl,
    /// Comma-separated parts to turn on
    Show,
    /// Comma-separated parts to turn off
    Hide,
}

impl Setting {
    pub fn flag(self) -> &'static str {
        match self {
            Setting::Theme => "--theme",
            Setting::TextColor => "--text-color",
            Setting::BarSize => "--bar-size",
            Setting::BarStyle => "--bar-style",
            Setting::Layout => "--layout",
            Setting::Animate => "--animate",
            Setting::RainbowBars => "--rainbow-bars",
            Setting::Currency => "--currency",
            Setting::ExtraDisplay => "--extra",
            Setting::CacheTtl => "--cache-ttl",
            Setting::Show => "--show",
            Setting::Hide => "--hide",
        }
    }
}

fn switch_value(field: &'static str, value: &str) -> Result<bool, QuotaError> {
    parse_switch(value).ok_or_else(|| QuotaError::UnknownEnumValue {
        field,
        value: value.trim().to_string(),
        expected: "on, off".to_string(),
    })
}

fn apply_parts(config: &mut Config, list: &str, visible: bool) -> Result<(), QuotaError> {
    let mut changes = Vec::new();
    for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if raw.eq_ignore_ascii_case("extra") {
            changes.push(None);
            continue;
        }
        let part = parse_choice::<Part>("part", raw).map_err(|e| match e {
            QuotaError::UnknownEnumValue { field, value, expected } => QuotaError::UnknownEnumValue {
                field,
                value,
                expected: format!("{expected}, extra"),
            },
            other => other,
        })?;
        changes.push(Some(part));
    }
    if changes.is_empty() {
        return Err(QuotaError::UnknownEnumValue {
            field: "part",
            value: list.to_string(),
            expected: format!("{}, extra", choice_names::<Part>().join(", ")),
        });
    }
    for change in changes {
        match change {
            Some(part) => config.show.set(part, visible),
            None => {
                config.extra_display = if visible {
                    ExtraDisplay::Always
                } else {
                    ExtraDisplay::Never
                }
            }
        }
    }
    Ok(())
}

/// Return a copy of `config` with one setting changed. Invalid input is an
/// error and leaves the caller's config as it was.
pub fn apply(setting: Setting, value: &str, config: &Config) -> Result<Config, QuotaError> {
    let mut next = config.clone();
    match setting {
        Setting::Theme => next.theme = parse_choice("theme", value)?,
        Setting::TextColor => next.text_color = parse_choice("text color", value)?,
        Setting::BarSize => next.bar_size = parse_choice("bar size", value)?,
        Setting::BarStyle => next.bar_style = parse_choice("bar style", value)?,
        Setting::Layout => next.layout = parse_choice("layout", value)?,
        Setting::ExtraDisplay => next.extra_display = parse_choice("extra display", value)?,
        Setting::Animate => next.animate = switch_value("animate", value)?,
        Setting::RainbowBars => next.rainbow_bars = switch_value("rainbow bars", value)?,
        Setting::Currency => {
            let sym = value.trim();
            if sym.is_empty() {
                return Err(QuotaError::UnknownEnumValue {
                    field: "currency",
                    value: value.to_string(),
                    expected: "a non-empty symbol such as $, £, €".to_string(),
                });
            }
            next.currency = sym.to_string();
        }
        Setting::CacheTtl => {
            next.cache_ttl_seconds = value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| QuotaError::UnknownEnumValue {
                    field: "cache TTL",
                    value: value.trim().to_string(),
                    expected: "a whole number of seconds".to_string(),
                })?;
        }
        Setting::Show => apply_parts(&mut next, value, true)?,
        Setting::Hide => apply_parts(&mut next, value, false)?,
    }
    Ok(next)
}

/// The persisted config document
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn open_default() -> Self {
        ConfigStore::new(config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails; see the module docs for how problems degrade.
    pub fn load(&self) -> Config {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Config::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "config unreadable, using defaults");
                return Config::default();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Config::from_map(map),
            Ok(_) => {
                let err = QuotaError::MalformedConfigFile("top level is not an object".into());
                tracing::warn!(error = %err, "using defaults");
                Config::default()
            }
            Err(e) => {
                let err = QuotaError::MalformedConfigFile(e.to_string());
                tracing::warn!(error = %err, "using defaults");
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> anyhow::Result<()> {
        let mut json = serde_json::to_string_pretty(config).context("serialize config")?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("save config to {}", self.path.display()))
    }
}
