//! Turns an incoming [WebhookPayload] into the data shown in the email.
//!
//! Batch level fields (status, severity, incident name, description, host) come
//! from the common labels and annotations, each alert of the batch becomes one
//! [AlertEntry] with its start time, link and filtered labels.

use std::{collections::HashSet, fmt};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use url::Url;

use crate::{
	alert::{AlertItem, Labels, WebhookPayload},
	error::AlertError,
	timestamp::format_timestamp,
};

/// labels that carry no information for the people reading the email
static BLACKLISTED_LABELS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
	HashSet::from([
		"alertname",
		"ruleId",
		"uid",
		"monitor",
		"groupKey",
		"fingerprint",
		"threshold.name",
	])
});

pub const DEFAULT_INCIDENT_NAME: &str = "Alerta do Sistema";
pub const DEFAULT_SEVERITY: &str = "info";
pub const RESOLVED_SEVERITY: &str = "resolved";
pub const DEFAULT_DESCRIPTION: &str = "Sem descrição disponível.";
pub const DEFAULT_LINK: &str = "#";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
	Firing,
	Resolved,
	/// anything else, uppercased
	Other(String),
}

impl AlertStatus {
	pub fn parse(status: Option<&str>) -> Self {
		match status.map(str::to_uppercase) {
			None => Self::Firing,
			Some(status) => match status.as_str() {
				"FIRING" => Self::Firing,
				"RESOLVED" => Self::Resolved,
				_ => Self::Other(status),
			},
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			Self::Firing => "FIRING",
			Self::Resolved => "RESOLVED",
			Self::Other(other) => other.as_str(),
		}
	}

	/// bounded label value for metrics, every unknown status shares `OTHER`
	pub fn metric_label(&self) -> &'static str {
		match self {
			Self::Firing => "FIRING",
			Self::Resolved => "RESOLVED",
			Self::Other(_) => "OTHER",
		}
	}
}

impl fmt::Display for AlertStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for AlertStatus {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

#[derive(Debug, Clone, Serialize)]
/// one alert of the batch, ready for display
pub struct AlertEntry {
	/// formatted start time
	pub time: String,
	/// display key -> label value, in the order the labels were received
	pub metadata: IndexMap<String, String>,
	/// link back to the monitoring platform
	pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedAlert {
	pub status: AlertStatus,
	pub severity: String,
	pub incident_name: String,
	pub description: String,
	pub host: Option<String>,
	pub subject: String,
	pub items: Vec<AlertEntry>,
}

impl NormalizedAlert {
	/// Extracts the display data from `payload`.
	///
	/// Returns [AlertError::EmptyPayload] if the batch contains no alerts.
	///
	/// # Arguments
	///
	/// * `payload` - the received alert group
	///
	/// * `subject_prefix` - tag put in brackets in front of the email subject
	pub fn from_payload(payload: &WebhookPayload, subject_prefix: &str) -> Result<Self, AlertError> {
		if payload.alerts.is_empty() {
			return Err(AlertError::EmptyPayload);
		}

		let labels = &payload.common_labels;
		let annotations = &payload.common_annotations;

		let status = AlertStatus::parse(payload.status.as_deref());

		let incident_name = first_non_empty(labels, &["alertname"])
			.unwrap_or(DEFAULT_INCIDENT_NAME)
			.to_string();

		let severity = if status == AlertStatus::Resolved {
			RESOLVED_SEVERITY.to_string()
		} else {
			first_non_empty(labels, &["severity"]).unwrap_or(DEFAULT_SEVERITY).to_lowercase()
		};

		let description = first_non_empty(annotations, &["description", "summary"])
			.unwrap_or(DEFAULT_DESCRIPTION)
			.to_string();

		let host = first_non_empty(labels, &["Host", "host", "host.name"]).map(str::to_string);

		let subject = format!(
			"[{subject_prefix}] - {}: {incident_name}",
			host.as_deref().unwrap_or(&severity)
		);

		let items = payload
			.alerts
			.iter()
			.map(|alert| AlertEntry::new(alert, payload.external_url.as_deref()))
			.collect();

		Ok(Self { status, severity, incident_name, description, host, subject, items })
	}
}

impl AlertEntry {
	fn new(alert: &AlertItem, external_url: Option<&str>) -> Self {
		let metadata = alert
			.labels
			.iter()
			.filter(|(key, value)| !value.is_empty() && !BLACKLISTED_LABELS.contains(key.as_str()))
			.map(|(key, value)| (format_key(key), value.clone()))
			.collect();

		let link = [alert.generator_url.as_deref(), external_url]
			.into_iter()
			.flatten()
			.find(|url| is_web_link(url))
			.unwrap_or(DEFAULT_LINK)
			.to_string();

		Self { time: format_timestamp(alert.starts_at.as_deref()), metadata, link }
	}
}

/// only absolute http(s) urls end up in the email's links
fn is_web_link(url: &str) -> bool {
	Url::parse(url).map_or(false, |url| matches!(url.scheme(), "http" | "https"))
}

/// first value of `keys` that is present and not empty
fn first_non_empty<'a>(labels: &'a Labels, keys: &[&str]) -> Option<&'a str> {
	keys.iter()
		.filter_map(|key| labels.get(*key))
		.map(String::as_str)
		.find(|value| !value.is_empty())
}

/// Turns a label key into a human readable title.
///
/// `threshold/raw_value` becomes `Raw Value`: everything up to the last `/` is
/// dropped, `_` and `.` become spaces and every word is capitalized.
pub fn format_key(key: &str) -> String {
	let key = key.rsplit('/').next().unwrap_or(key);
	let spaced = key.replace(&['_', '.'][..], " ");

	let mut title = String::with_capacity(spaced.len());
	let mut in_word = false;
	for c in spaced.trim().chars() {
		if c.is_alphabetic() {
			if in_word {
				title.extend(c.to_lowercase());
			} else {
				title.extend(c.to_uppercase());
			}
			in_word = true;
		} else {
			title.push(c);
			in_word = false;
		}
	}

	title
}
