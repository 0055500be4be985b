use clap::ValueEnum;
use claude_quotaline::config::{
    BarSize, BarStyle, Config, ConfigStore, ExtraDisplay, Layout, Part, Setting, TextColor,
    ThemeName, Visibility, apply, choice_name,
};
use std::fs;
use tempfile::TempDir;

/// Every choice of every enum field survives save then load.
#[test]
fn test_every_choice_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));

    let mut configs = Vec::new();
    for theme in ThemeName::value_variants() {
        configs.push(Config { theme: *theme, ..Config::default() });
    }
    for text_color in TextColor::value_variants() {
        configs.push(Config { text_color: *text_color, ..Config::default() });
    }
    for bar_size in BarSize::value_variants() {
        for bar_style in BarStyle::value_variants() {
            configs.push(Config { bar_size: *bar_size, bar_style: *bar_style, ..Config::default() });
        }
    }
    for layout in Layout::value_variants() {
        for extra_display in ExtraDisplay::value_variants() {
            configs.push(Config { layout: *layout, extra_display: *extra_display, ..Config::default() });
        }
    }
    for part in Part::ALL {
        configs.push(Config { show: Visibility::only(&[part]), ..Config::default() });
    }
    configs.push(Config {
        animate: false,
        rainbow_bars: false,
        currency: "€".to_string(),
        cache_ttl_seconds: 0,
        ..Config::default()
    });

    for config in configs {
        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }
}

#[test]
fn test_saved_document_is_hand_editable() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    let config = apply(Setting::Layout, "percent-first", &Config::default()).unwrap();
    store.save(&config).unwrap();

    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"layout\": \"percent-first\""));
    assert!(raw.contains("\"text_color\": \"auto\""));
    assert!(raw.ends_with('\n'));
}

/// A failed mutation in a sequence leaves the stored document as it was.
#[test]
fn test_rejected_value_does_not_touch_the_file() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    let original = apply(Setting::Theme, "candy", &Config::default()).unwrap();
    store.save(&original).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    let loaded = store.load();
    let result = apply(Setting::Theme, "ocean", &loaded)
        .and_then(|c| apply(Setting::BarStyle, "wavy", &c));
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    assert_eq!(choice_name(store.load().theme), "candy");
}
