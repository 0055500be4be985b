use crate::config::Setting;

/// Usage-quota status line for Claude Code.
///
/// With no flags, reads the host's JSON on stdin and prints one line. Setting
/// flags update the saved config and exit without rendering.
#[derive(clap::Parser, Debug, Default)]
#[command(name = "claude-quotaline", version)]
pub struct Args {
    /// Colour theme: default|ocean|sunset|mono|neon|pride|frost|ember|candy|rainbow
    #[arg(long, value_name = "NAME")]
    pub theme: Option<String>,

    /// Colour of labels and percentages (auto follows the theme)
    #[arg(long, value_name = "COLOR")]
    pub text_color: Option<String>,

    /// Bar width: small|medium|large
    #[arg(long, value_name = "SIZE")]
    pub bar_size: Option<String>,

    /// Bar glyphs: classic|block|shade|dot|square|ascii
    #[arg(long, value_name = "STYLE")]
    pub bar_style: Option<String>,

    /// Arrangement: standard|compact|minimal|percent-first
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<String>,

    /// Animated shimmer and hue drift: on|off
    #[arg(long, value_name = "on|off")]
    pub animate: Option<String>,

    /// Rainbow theme only; also colour the bars: on|off
    #[arg(long, value_name = "on|off")]
    pub rainbow_bars: Option<String>,

    /// Symbol in front of extra-credit amounts
    #[arg(long, value_name = "SYMBOL")]
    pub currency: Option<String>,

    /// Extra-credit part: auto|always|never
    #[arg(long, value_name = "MODE")]
    pub extra: Option<String>,

    /// Seconds a fetched usage snapshot stays fresh
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<String>,

    /// Turn parts on, comma-separated: session,weekly,timer,context,model,plan,update,extra
    #[arg(long, value_name = "PARTS")]
    pub show: Option<String>,

    /// Turn parts off, comma-separated
    #[arg(long, value_name = "PARTS")]
    pub hide: Option<String>,

    /// Print the current configuration
    #[arg(long)]
    pub config: bool,

    /// Preview every theme
    #[arg(long)]
    pub themes: bool,

    /// Check both release feeds now and report
    #[arg(long)]
    pub check_updates: bool,

    /// Override the detected terminal width
    #[arg(long, value_name = "COLS")]
    pub width: Option<usize>,

    /// Log diagnostics to stderr
    #[arg(long, env = "CLAUDE_QUOTALINE_DEBUG")]
    pub debug: bool,
}

impl Args {
    pub fn parse() -> Self {
        <Args as clap::Parser>::parse()
    }

    /// Setting flags in the order they are applied.
    pub fn mutations(&self) -> Vec<(Setting, &str)> {
        [
            (Setting::Theme, &self.theme),
            (Setting::TextColor, &self.text_color),
            (Setting::BarSize, &self.bar_size),
            (Setting::BarStyle, &self.bar_style),
            (Setting::Layout, &self.layout),
            (Setting::Animate, &self.animate),
            (Setting::RainbowBars, &self.rainbow_bars),
            (Setting::Currency, &self.currency),
            (Setting::ExtraDisplay, &self.extra),
            (Setting::CacheTtl, &self.cache_ttl),
            (Setting::Show, &self.show),
            (Setting::Hide, &self.hide),
        ]
        .into_iter()
        .filter_map(|(setting, value)| value.as_deref().map(|v| (setting, v)))
        .collect()
    }
}
