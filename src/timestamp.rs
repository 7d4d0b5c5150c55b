//! display formatting of alert start times
use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// shown for alerts without a start time
pub const MISSING_TIMESTAMP: &str = "N/A";

/// `DD/MM HH:MM:SS`, no year and no timezone
const DISPLAY_FORMAT: &str = "%d/%m %H:%M:%S";

/// Formats an ISO-8601 timestamp for display.
///
/// Times are shown in the offset they were sent with. Missing timestamps become
/// [MISSING_TIMESTAMP], unparsable ones are returned unchanged.
pub fn format_timestamp(raw: Option<&str>) -> String {
	let raw = match raw {
		Some(raw) if !raw.is_empty() => raw,
		_ => return MISSING_TIMESTAMP.to_string(),
	};

	let normalized = match raw.strip_suffix('Z') {
		Some(stripped) => Cow::Owned(format!("{stripped}+00:00")),
		None => Cow::Borrowed(raw),
	};
	let normalized = truncate_fraction(&normalized);

	match parse(&normalized) {
		Some(formatted) => formatted,
		None => {
			tracing::debug!("could not parse timestamp {raw:?}, using it verbatim");
			raw.to_string()
		}
	}
}

/// Cuts fractional seconds down to microseconds.
fn truncate_fraction(ts: &str) -> Cow<'_, str> {
	let dot = match ts.find('.') {
		Some(dot) => dot,
		None => return Cow::Borrowed(ts),
	};

	let digits = ts[dot + 1..].bytes().take_while(u8::is_ascii_digit).count();
	if digits <= 6 {
		return Cow::Borrowed(ts);
	}

	Cow::Owned(format!("{}{}", &ts[..dot + 7], &ts[dot + 1 + digits..]))
}

/// parse with explicit offset first, then without any offset, then a plain date
fn parse(ts: &str) -> Option<String> {
	if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
		return Some(dt.format(DISPLAY_FORMAT).to_string());
	}

	for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
		if let Ok(dt) = NaiveDateTime::parse_from_str(ts, format) {
			return Some(dt.format(DISPLAY_FORMAT).to_string());
		}
	}

	NaiveDate::parse_from_str(ts, "%Y-%m-%d")
		.ok()
		.and_then(|date| date.and_hms_opt(0, 0, 0))
		.map(|dt| dt.format(DISPLAY_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_timestamps() {
		assert_eq!(format_timestamp(None), "N/A");
		assert_eq!(format_timestamp(Some("")), "N/A");
	}

	#[test]
	fn nanosecond_precision() {
		assert_eq!(format_timestamp(Some("2024-01-15T10:30:00.123456789Z")), "15/01 10:30:00");
	}

	#[test]
	fn keeps_sent_offset() {
		assert_eq!(format_timestamp(Some("2024-03-01T12:00:00Z")), "01/03 12:00:00");
		assert_eq!(format_timestamp(Some("2024-03-01T09:15:42-03:00")), "01/03 09:15:42");
		assert_eq!(format_timestamp(Some("2024-03-01T09:15:42.5+02:00")), "01/03 09:15:42");
	}

	#[test]
	fn naive_timestamps() {
		assert_eq!(format_timestamp(Some("2024-12-24T23:59:01")), "24/12 23:59:01");
		assert_eq!(format_timestamp(Some("2024-12-24")), "24/12 00:00:00");
	}

	#[test]
	fn garbage_is_returned_verbatim() {
		assert_eq!(format_timestamp(Some("yesterday-ish")), "yesterday-ish");
		assert_eq!(format_timestamp(Some("2024-13-45T99:00:00Z")), "2024-13-45T99:00:00Z");
	}

	#[test]
	fn fraction_truncation() {
		assert_eq!(truncate_fraction("10:30:00.123456789+00:00"), "10:30:00.123456+00:00");
		assert_eq!(truncate_fraction("10:30:00.123+00:00"), "10:30:00.123+00:00");
		assert_eq!(truncate_fraction("10:30:00+00:00"), "10:30:00+00:00");
	}
}
