use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

use crate::{
    alertmanager_webhook_receiver::AlertReceiverSettings, auth::AuthSettings, error::AlertError,
    log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings,
};

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// flat environment variables and the settings key they override
const LEGACY_VARIABLES: [(&str, &str); 6] = [
    ("EMAIL_URL", "mailer.url"),
    ("EMAIL_API_KEY", "mailer.api_key"),
    ("EMAIL_FROM", "mailer.sender_email"),
    ("EMAIL_TO", "mailer.recipients"),
    ("API_USERNAME", "auth.username"),
    ("API_PASSWORD", "auth.password"),
];

/// keys without a sensible default
const REQUIRED_KEYS: [(&str, &str); 3] = [
    ("mailer.url", "EMAIL_URL"),
    ("mailer.api_key", "EMAIL_API_KEY"),
    ("mailer.sender_email", "EMAIL_FROM"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub alert_webhook_receiver: AlertReceiverSettings,
    #[serde(default)]
    pub telemetry_endpoint: TelemetryEndpointSettings,
    pub mailer: MailerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    /// custom email template replacing the built-in one
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default)]
    pub log: LogSettings,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
/// mail provider settings
pub struct MailerSettings {
    /// send endpoint of the mail provider
    pub url: Url,
    /// sent in the `api-key` header
    pub api_key: String,
    pub sender_email: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    /// comma separated recipient addresses
    #[serde(default)]
    pub recipients: String,
    /// put in brackets in front of every subject
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_sender_name() -> String {
    String::from("Alertas SigNoz")
}

fn default_subject_prefix() -> String {
    String::from("SigNoz")
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

pub(crate) fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

pub(crate) fn socket_addr(bind_address: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(bind_address, port)
}

fn command() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .args([
            Arg::new("config")
                .help("path of config file")
                .takes_value(true)
                .short('c')
                .long("config")
                .default_value(DEFAULT_CONFIG_PATH),
            Arg::new("level")
                .help("log level")
                .possible_values(["error", "warn", "info", "debug", "trace"])
                .ignore_case(true)
                .takes_value(true)
                .long("log"),
        ])
}

impl Settings {
    /// Loads settings from command line, config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(command().get_matches(), std::env::vars())
    }

    fn load_from(opts: ArgMatches, env: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let config_path = opts.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);

        let builder = Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("ALERTMAIL").prefix_separator("__").separator("__"),
            );

        Self::build(builder, env.into_iter().collect(), opts.value_of("level"))
    }

    /// Applies legacy environment variables and the command line log level on
    /// top of `builder`, then deserializes and validates the result.
    fn build(
        mut builder: ConfigBuilder<DefaultState>,
        env: HashMap<String, String>,
        level: Option<&str>,
    ) -> Result<Self> {
        for (variable, key) in LEGACY_VARIABLES {
            if let Some(value) = env.get(variable) {
                builder = builder.set_override(key, value.as_str())?;
            }
        }

        if let Some(level) = level {
            builder = builder.set_override("log.level", level)?;
        }

        let conf = builder.build().context("can't load config")?;

        for (key, variable) in REQUIRED_KEYS {
            match conf.get_string(key) {
                Ok(value) if !value.trim().is_empty() => {}
                _ => {
                    return Err(AlertError::Configuration(format!(
                        "`{key}` must be set (config file or {variable})"
                    ))
                    .into())
                }
            }
        }

        let settings: Settings = conf.try_deserialize().context("can't load config")?;
        settings.auth.validate()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use config::{File, FileFormat};

    use super::*;

    fn build(yaml: &str, env: &[(&str, &str)]) -> Result<Settings> {
        let builder = Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml));
        let env = env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();

        Settings::build(builder, env, None)
    }

    const EMPTY: &str = "{}";

    const MINIMAL: &str = "
mailer:
  url: https://api.brevo.com/v3/smtp/email
  api_key: key
  sender_email: alerts@example.com
";

    #[test]
    fn defaults() {
        let settings = build(MINIMAL, &[]).unwrap();

        assert_eq!(settings.mailer.url.as_str(), "https://api.brevo.com/v3/smtp/email");
        assert_eq!(settings.mailer.sender_name, "Alertas SigNoz");
        assert_eq!(settings.mailer.subject_prefix, "SigNoz");
        assert_eq!(settings.mailer.recipients, "");
        assert_eq!(settings.mailer.timeout, Duration::from_secs(10));
        assert_eq!(settings.alert_webhook_receiver.to_socket_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(settings.telemetry_endpoint.to_socket_addr().to_string(), "0.0.0.0:9100");
        assert!(settings.auth.credentials().is_none());
        assert!(settings.template.is_none());
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn legacy_environment_overrides_file() {
        let settings = build(
            MINIMAL,
            &[
                ("EMAIL_URL", "http://localhost:1234/send"),
                ("EMAIL_API_KEY", "env-key"),
                ("EMAIL_FROM", "env@example.com"),
                ("EMAIL_TO", "a@example.com,b@example.com"),
                ("API_USERNAME", "signoz"),
                ("API_PASSWORD", "hunter2"),
                ("UNRELATED", "x"),
            ],
        )
        .unwrap();

        assert_eq!(settings.mailer.url.as_str(), "http://localhost:1234/send");
        assert_eq!(settings.mailer.api_key, "env-key");
        assert_eq!(settings.mailer.sender_email, "env@example.com");
        assert_eq!(settings.mailer.recipients, "a@example.com,b@example.com");

        let credentials = settings.auth.credentials().unwrap();
        assert_eq!(credentials.username, "signoz");
        assert_eq!(credentials.password, "hunter2");
    }

    #[test]
    fn environment_only() {
        let settings = build(
            EMPTY,
            &[
                ("EMAIL_URL", "http://localhost:1234/send"),
                ("EMAIL_API_KEY", "env-key"),
                ("EMAIL_FROM", "env@example.com"),
            ],
        )
        .unwrap();

        assert_eq!(settings.mailer.api_key, "env-key");
    }

    #[test]
    fn file_values() {
        let settings = build(
            "
alert_webhook_receiver:
  bind_address: 127.0.0.1
  port: 8080
mailer:
  url: https://mail.example.com/send
  api_key: key
  sender_email: alerts@example.com
  recipients: ops@example.com
  subject_prefix: Prod
  timeout: 2.5
template: /etc/alertmail/alert.html
log:
  level: debug
",
            &[],
        )
        .unwrap();

        assert_eq!(settings.alert_webhook_receiver.to_socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(settings.mailer.subject_prefix, "Prod");
        assert_eq!(settings.mailer.timeout, Duration::from_millis(2500));
        assert_eq!(settings.template, Some(PathBuf::from("/etc/alertmail/alert.html")));
        assert_eq!(settings.log.level, "debug");
    }

    #[test]
    fn timeouts_keep_fractions() {
        for (raw, expected) in [("0.25", Duration::from_millis(250)), ("30", Duration::from_secs(30))] {
            let settings = build(&format!("{MINIMAL}  timeout: {raw}\n"), &[]).unwrap();
            assert_eq!(settings.mailer.timeout, expected, "{raw}");
        }
    }

    #[test]
    fn missing_required_values() {
        let err = build(EMPTY, &[]).unwrap_err();
        assert!(format!("{err:#}").contains("mailer.url"), "{err:#}");

        let err = build(EMPTY, &[("EMAIL_URL", "http://x"), ("EMAIL_FROM", "a@b")]).unwrap_err();
        assert!(format!("{err:#}").contains("EMAIL_API_KEY"), "{err:#}");

        let err =
            build(EMPTY, &[("EMAIL_URL", "http://x"), ("EMAIL_API_KEY", " "), ("EMAIL_FROM", "a@b")])
                .unwrap_err();
        assert!(format!("{err:#}").contains("mailer.api_key"), "{err:#}");
    }

    #[test]
    fn invalid_url() {
        assert!(build(EMPTY, &[("EMAIL_URL", "not a url"), ("EMAIL_API_KEY", "k"), ("EMAIL_FROM", "a@b")])
            .is_err());
    }

    #[test]
    fn half_configured_auth() {
        let err = build(MINIMAL, &[("API_USERNAME", "signoz")]).unwrap_err();
        assert!(format!("{err:#}").contains("auth.password"), "{err:#}");
    }

    #[test]
    fn command_line() {
        let opts = command().get_matches_from(["alertmail", "-c", "/nonexistent/alertmail.yaml", "--log", "DEBUG"]);
        assert_eq!(opts.value_of("config"), Some("/nonexistent/alertmail.yaml"));

        let settings = Settings::load_from(
            opts,
            [
                ("EMAIL_URL".to_string(), "http://localhost/send".to_string()),
                ("EMAIL_API_KEY".to_string(), "k".to_string()),
                ("EMAIL_FROM".to_string(), "a@example.com".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(settings.log.level.to_lowercase(), "debug");
    }
}
