//! Renders normalized alerts into html emails via tera templates.
//!
//! The built-in template is compiled into the binary, a custom template can be
//! configured with the `template` setting. Every interpolated value is html
//! escaped unless the template explicitly marks it `safe`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tera::Tera;

use crate::normalizer::{AlertStatus, NormalizedAlert};

/// name the email template is registered under, the suffix enables autoescaping
const TEMPLATE_NAME: &str = "alert.html";

/// template used if no custom template is configured
const DEFAULT_TEMPLATE: &str = include_str!("../templates/alert.html");

/// colors used to emphasize severities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    /// main color of header and cards
    pub color: &'static str,
    /// light background for the header box
    pub background: &'static str,
}

impl Theme {
    pub const CRITICAL: Self = Self { color: "#d32f2f", background: "#fdecea" };
    pub const WARNING: Self = Self { color: "#f57c00", background: "#fff4e5" };
    pub const INFO: Self = Self { color: "#1976d2", background: "#e8f1fb" };
    pub const RESOLVED: Self = Self { color: "#388e3c", background: "#edf7ed" };

    /// unknown severities are shown like `info`
    pub fn for_severity(severity: &str) -> Self {
        match severity {
            "critical" | "error" => Self::CRITICAL,
            "warning" => Self::WARNING,
            "resolved" => Self::RESOLVED,
            _ => Self::INFO,
        }
    }
}

#[derive(Debug, Serialize)]
struct MetadataEntry<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct ItemContext<'a> {
    time: &'a str,
    link: &'a str,
    metadata: Vec<MetadataEntry<'a>>,
}

/// everything a template can refer to
#[derive(Debug, Serialize)]
struct EmailContext<'a> {
    status: &'a AlertStatus,
    resolved: bool,
    severity: &'a str,
    theme: Theme,
    incident_name: &'a str,
    description: &'a str,
    host: Option<&'a str>,
    subject: &'a str,
    items: Vec<ItemContext<'a>>,
}

impl<'a> EmailContext<'a> {
    fn new(alert: &'a NormalizedAlert) -> Self {
        let items = alert
            .items
            .iter()
            .map(|item| ItemContext {
                time: &item.time,
                link: &item.link,
                metadata: item
                    .metadata
                    .iter()
                    .map(|(key, value)| MetadataEntry { key, value })
                    .collect(),
            })
            .collect();

        Self {
            status: &alert.status,
            resolved: alert.status == AlertStatus::Resolved,
            severity: &alert.severity,
            theme: Theme::for_severity(&alert.severity),
            incident_name: &alert.incident_name,
            description: &alert.description,
            host: alert.host.as_deref(),
            subject: &alert.subject,
            items,
        }
    }
}

/// Alert renderer
#[derive(Debug)]
pub struct AlertRenderer {
    tera: Tera,
}

impl AlertRenderer {
    /// Return new renderer
    ///
    /// # Arguments
    ///
    /// * `template` - optional path of a template replacing the built-in one
    pub fn new(template: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.set_escape_fn(escape_html);

        match template {
            Some(path) => tera
                .add_template_file(path, Some(TEMPLATE_NAME))
                .with_context(|| format!("could not load email template {}", path.display()))?,
            None => tera
                .add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)
                .context("could not load built-in email template")?,
        }

        Ok(Self { tera })
    }

    /// Renders `alert` into a self-contained html document.
    pub fn render(&self, alert: &NormalizedAlert) -> Result<String, tera::Error> {
        let context = tera::Context::from_serialize(EmailContext::new(alert))?;

        self.tera.render(TEMPLATE_NAME, &context)
    }
}

/// Escapes html special characters. Unlike tera's default escaping `/` is kept
/// as is, so dates and urls stay readable in the source of the email.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
