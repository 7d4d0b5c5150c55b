//! data structures for deserializing incoming alert groups
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// labels or annotations in the order they were received
pub type Labels = IndexMap<String, String>;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// alert group posted to the webhook receiver
pub struct WebhookPayload {
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default, deserialize_with = "nullable")]
	pub alerts: Vec<AlertItem>,
	#[serde(default, deserialize_with = "labels")]
	pub common_labels: Labels,
	#[serde(default, deserialize_with = "labels")]
	pub common_annotations: Labels,
	#[serde(default, rename = "externalURL", deserialize_with = "text")]
	pub external_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// a single alert of the group
pub struct AlertItem {
	#[serde(default, deserialize_with = "labels")]
	pub labels: Labels,
	#[serde(default, deserialize_with = "labels")]
	pub annotations: Labels,
	#[serde(default, deserialize_with = "text")]
	pub starts_at: Option<String>,
	#[serde(default, rename = "generatorURL", deserialize_with = "text")]
	pub generator_url: Option<String>,
}

/// treat `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// deserialize a label map, stringifying non-string values on the way
fn labels<'de, D>(deserializer: D) -> Result<Labels, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: IndexMap<String, Value> = nullable(deserializer)?;

	Ok(raw.into_iter().map(|(key, value)| (key, stringify(value))).collect())
}

/// deserialize any json value as text, `None` if it's null or empty
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;

	Ok(Some(stringify(value)).filter(|text| !text.is_empty()))
}

/// Converts a json value into its label representation. Falsy values become
/// the empty string so they get filtered out together with empty strings.
fn stringify(value: Value) -> String {
	match value {
		Value::String(s) => s,
		Value::Null | Value::Bool(false) => String::new(),
		Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
		Value::Array(ref a) if a.is_empty() => String::new(),
		Value::Object(ref o) if o.is_empty() => String::new(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_alertmanager_payload() {
		let json = r#"{
			"version": "4",
			"groupKey": "{}:{alertname=\"DiskFull\"}",
			"receiver": "email",
			"status": "firing",
			"groupLabels": {},
			"commonLabels": { "alertname": "DiskFull", "severity": "critical" },
			"commonAnnotations": { "summary": "disk is full" },
			"externalURL": "http://signoz:3301",
			"alerts": [{
				"status": "firing",
				"labels": { "zeta": "1", "alpha": "2", "mid": "3" },
				"annotations": {},
				"startsAt": "2024-01-15T10:30:00Z",
				"endsAt": "0001-01-01T00:00:00Z",
				"generatorURL": "http://signoz:3301/alerts/1",
				"fingerprint": "abc"
			}]
		}"#;

		let payload: WebhookPayload = serde_json::from_str(json).unwrap();

		assert_eq!(payload.status.as_deref(), Some("firing"));
		assert_eq!(payload.external_url.as_deref(), Some("http://signoz:3301"));
		assert_eq!(payload.common_labels["alertname"], "DiskFull");
		assert_eq!(payload.alerts.len(), 1);

		let alert = &payload.alerts[0];
		let keys: Vec<_> = alert.labels.keys().map(String::as_str).collect();
		assert_eq!(keys, ["zeta", "alpha", "mid"]);
		assert_eq!(alert.starts_at.as_deref(), Some("2024-01-15T10:30:00Z"));
		assert_eq!(alert.generator_url.as_deref(), Some("http://signoz:3301/alerts/1"));
	}

	#[test]
	fn missing_and_null_fields_are_empty() {
		let payload: WebhookPayload =
			serde_json::from_str(r#"{"alerts": [{"labels": null}], "commonLabels": null}"#).unwrap();

		assert!(payload.status.is_none());
		assert!(payload.common_labels.is_empty());
		assert!(payload.common_annotations.is_empty());
		assert!(payload.alerts[0].labels.is_empty());
		assert!(payload.alerts[0].starts_at.is_none());

		let payload: WebhookPayload = serde_json::from_str(r#"{"alerts": null}"#).unwrap();
		assert!(payload.alerts.is_empty());
	}

	#[test]
	fn scalar_fields_accept_any_json() {
		let payload: WebhookPayload = serde_json::from_str(
			r#"{
				"externalURL": 42,
				"alerts": [
					{"startsAt": 1709294400, "generatorURL": null},
					{"startsAt": "", "generatorURL": ["http://a"]},
					{"startsAt": {"at": "now"}}
				]
			}"#,
		)
		.unwrap();

		assert_eq!(payload.external_url.as_deref(), Some("42"));
		assert_eq!(payload.alerts[0].starts_at.as_deref(), Some("1709294400"));
		assert_eq!(payload.alerts[0].generator_url, None);
		assert_eq!(payload.alerts[1].starts_at, None);
		assert_eq!(payload.alerts[1].generator_url.as_deref(), Some(r#"["http://a"]"#));
		assert_eq!(payload.alerts[2].starts_at.as_deref(), Some(r#"{"at":"now"}"#));
	}

	#[test]
	fn non_string_labels_are_stringified() {
		let payload: WebhookPayload = serde_json::from_str(
			r#"{"commonLabels": {
				"threshold": 90.5, "port": 8080, "flag": true,
				"zero": 0, "off": false, "none": null, "list": [], "obj": {}
			}}"#,
		)
		.unwrap();

		let labels = &payload.common_labels;
		assert_eq!(labels["threshold"], "90.5");
		assert_eq!(labels["port"], "8080");
		assert_eq!(labels["flag"], "true");
		for key in ["zero", "off", "none", "list", "obj"] {
			assert_eq!(labels[key], "", "{key} should be empty");
		}
	}
}
