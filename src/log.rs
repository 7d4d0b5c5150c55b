use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    String::from("info")
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl LogSettings {
    fn filter(&self) -> Result<EnvFilter> {
        let level = tracing::Level::from_str(self.level.as_str())
            .with_context(|| format!("invalid log level {:?}", self.level))?;

        Ok(EnvFilter::default()
            .add_directive(LevelFilter::from_level(level).into())
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("tower=warn".parse()?))
    }
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    let fmt_layer = fmt::layer();

    tracing_subscriber::registry()
        .with(settings.filter()?)
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(())
}
