//! Channel/program notification model and tolerant payload parsing.
//!
//! Producers are loosely typed (hand-written JSON, other languages, host status
//! adapters), so [`ChannelEvent::from_json_value`] never fails: every field has
//! a safe default. Only undecodable bytes are rejected, by
//! [`ChannelEvent::from_slice`], so a transport can drop the message.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::{InfobarError, InfobarResult};

/// One "currently tuned channel and program" notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelEvent {
    pub channel_number: i64,
    pub channel_name: String,
    /// Title of the program airing now.
    pub title: String,
    pub start: DateTime<Utc>,
    /// Only used for the remaining-time readout.
    pub end: DateTime<Utc>,
    /// Producer-side emission time (`ts` on the wire).
    pub received_at: DateTime<Utc>,
    pub next_title: Option<String>,
    pub next_start: Option<DateTime<Utc>>,
}

impl ChannelEvent {
    /// Build an event from any JSON value, substituting defaults for missing or
    /// mistyped fields. Missing timestamps become "now".
    pub fn from_json_value(value: &Value) -> Self {
        Self::from_json_value_at(value, Utc::now())
    }

    /// Same as [`Self::from_json_value`] with an explicit "now".
    pub fn from_json_value_at(value: &Value, now: DateTime<Utc>) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);
        let field = |key: &str| obj.get(key).filter(|v| !v.is_null());

        let next_title = field("next_title")
            .and_then(coerce_string)
            .filter(|s| !s.is_empty());

        Self {
            channel_number: field("channel_number").and_then(coerce_i64).unwrap_or(0),
            channel_name: field("channel_name")
                .and_then(coerce_string)
                .unwrap_or_default(),
            title: field("title").and_then(coerce_string).unwrap_or_default(),
            start: field("start").and_then(coerce_timestamp).unwrap_or(now),
            end: field("end").and_then(coerce_timestamp).unwrap_or(now),
            received_at: field("ts").and_then(coerce_unix_seconds).unwrap_or(now),
            next_title,
            next_start: field("next_start").and_then(coerce_timestamp),
        }
    }

    /// Decode one UTF-8 JSON payload (a datagram or the event file contents).
    pub fn from_slice(bytes: &[u8]) -> InfobarResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| InfobarError::payload(format!("invalid event json: {e}")))?;
        if !value.is_object() {
            return Err(InfobarError::payload("event payload must be a json object"));
        }
        Ok(Self::from_json_value(&value))
    }

    /// Wire/file representation of this event.
    pub fn to_payload(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "ts".to_string(),
            Value::from(self.received_at.timestamp_millis() as f64 / 1000.0),
        );
        obj.insert("channel_number".to_string(), Value::from(self.channel_number));
        obj.insert(
            "channel_name".to_string(),
            Value::from(self.channel_name.clone()),
        );
        obj.insert("title".to_string(), Value::from(self.title.clone()));
        obj.insert("start".to_string(), Value::from(iso_utc(self.start)));
        obj.insert("end".to_string(), Value::from(iso_utc(self.end)));
        if let Some(next_title) = &self.next_title {
            obj.insert("next_title".to_string(), Value::from(next_title.clone()));
        }
        if let Some(next_start) = self.next_start {
            obj.insert("next_start".to_string(), Value::from(iso_utc(next_start)));
        }
        Value::Object(obj)
    }
}

/// `HH:MM` left until `end`, floored to whole minutes and clamped at `00:00`.
pub fn format_remaining(now: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let secs = (end - now).num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{hours:02}:{minutes:02}")
}

/// Parse an ISO-8601 timestamp. Values without a timezone are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M%:z",
    ];
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Unix seconds (fractional allowed) to a UTC timestamp.
pub fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

pub(crate) fn iso_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn coerce_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str().and_then(parse_timestamp)
}

fn coerce_unix_seconds(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => n.as_f64().and_then(from_unix_seconds),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(from_unix_seconds),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn parses_full_payload() {
        let now = at("2025-08-16T19:00:00Z");
        let ev = ChannelEvent::from_json_value_at(
            &json!({
                "ts": 1734111111,
                "channel_number": 3,
                "channel_name": "TV3 Stockholm",
                "title": "Mamma Mia!",
                "start": "2025-08-16T20:00:00",
                "end": "2025-08-16T22:18:00",
                "next_title": "Nyheterna",
                "next_start": "2025-08-16T22:18:00"
            }),
            now,
        );
        assert_eq!(ev.channel_number, 3);
        assert_eq!(ev.channel_name, "TV3 Stockholm");
        assert_eq!(ev.title, "Mamma Mia!");
        assert_eq!(ev.start, at("2025-08-16T20:00:00Z"));
        assert_eq!(ev.end, at("2025-08-16T22:18:00Z"));
        assert_eq!(ev.received_at.timestamp(), 1734111111);
        assert_eq!(ev.next_title.as_deref(), Some("Nyheterna"));
        assert_eq!(ev.next_start, Some(at("2025-08-16T22:18:00Z")));
    }

    #[test]
    fn garbage_inputs_fall_back_to_defaults() {
        let now = at("2025-01-01T00:00:00Z");
        for value in [
            json!({}),
            json!(null),
            json!([1, 2, 3]),
            json!("not an object"),
            json!({"channel_number": "three", "title": null, "end": 42, "start": "yesterday"}),
            json!({"channel_number": {}, "channel_name": [], "ts": "soon", "next_title": ""}),
        ] {
            let ev = ChannelEvent::from_json_value_at(&value, now);
            assert_eq!(ev.channel_number, 0, "{value}");
            assert_eq!(ev.channel_name, "", "{value}");
            assert_eq!(ev.title, "", "{value}");
            assert_eq!(ev.start, now, "{value}");
            assert_eq!(ev.end, now, "{value}");
            assert_eq!(ev.received_at, now, "{value}");
            assert_eq!(ev.next_title, None, "{value}");
            assert_eq!(ev.next_start, None, "{value}");
        }
    }

    #[test]
    fn loose_types_are_coerced() {
        let now = at("2025-01-01T00:00:00Z");
        let ev = ChannelEvent::from_json_value_at(
            &json!({"channel_number": "7", "channel_name": 42, "title": true, "ts": "1700000000.5"}),
            now,
        );
        assert_eq!(ev.channel_number, 7);
        assert_eq!(ev.channel_name, "42");
        assert_eq!(ev.title, "true");
        assert_eq!(ev.received_at.timestamp_millis(), 1_700_000_000_500);

        let ev = ChannelEvent::from_json_value_at(&json!({"channel_number": 12.9}), now);
        assert_eq!(ev.channel_number, 12);
    }

    #[test]
    fn next_fields_are_independently_optional() {
        let now = at("2025-01-01T00:00:00Z");
        let only_title = ChannelEvent::from_json_value_at(&json!({"next_title": "News"}), now);
        assert_eq!(only_title.next_title.as_deref(), Some("News"));
        assert_eq!(only_title.next_start, None);

        let only_start = ChannelEvent::from_json_value_at(
            &json!({"next_start": "2025-01-01T01:00:00"}),
            now,
        );
        assert_eq!(only_start.next_title, None);
        assert_eq!(only_start.next_start, Some(at("2025-01-01T01:00:00Z")));
    }

    #[test]
    fn timestamps_accept_common_iso_shapes() {
        let expect = at("2025-08-16T20:00:00Z");
        for s in [
            "2025-08-16T20:00:00",
            "2025-08-16T20:00:00Z",
            "2025-08-16T20:00:00+00:00",
            "2025-08-16T22:00:00+02:00",
            "2025-08-16T22:00:00+0200",
            "2025-08-16T20:00",
            "2025-08-16 20:00:00",
            "2025-08-16T20:00:00.000",
        ] {
            assert_eq!(parse_timestamp(s), Some(expect), "{s}");
        }
        assert_eq!(parse_timestamp("2025-08-16"), Some(at("2025-08-16T00:00:00Z")));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("tomorrow"), None);
    }

    #[test]
    fn remaining_time_is_floored_and_clamped() {
        let now = at("2025-08-16T20:00:00Z");
        let in_2h05 = now + TimeDelta::seconds(2 * 3600 + 5 * 60);
        assert_eq!(format_remaining(now, in_2h05), "02:05");
        assert_eq!(format_remaining(now, in_2h05 - TimeDelta::seconds(1)), "02:04");
        assert_eq!(format_remaining(now, now - TimeDelta::hours(3)), "00:00");
        assert_eq!(format_remaining(now, now + TimeDelta::seconds(59)), "00:00");
    }

    #[test]
    fn reversed_window_is_kept_and_remaining_clamps() {
        let now = at("2025-08-16T20:00:00Z");
        let ev = ChannelEvent::from_json_value_at(
            &json!({"start": "2025-08-16T21:00:00", "end": "2025-08-16T19:00:00"}),
            now,
        );
        assert!(ev.end < ev.start);
        assert_eq!(format_remaining(now, ev.end), "00:00");
    }

    #[test]
    fn from_slice_rejects_only_undecodable_payloads() {
        assert!(ChannelEvent::from_slice(b"{not json").is_err());
        assert!(ChannelEvent::from_slice(b"[1,2]").is_err());
        assert!(ChannelEvent::from_slice(&[0xff, 0xfe]).is_err());
        let ev = ChannelEvent::from_slice(br#"{"channel_number": 5, "bogus": 1}"#).unwrap();
        assert_eq!(ev.channel_number, 5);
    }

    #[test]
    fn payload_survives_a_trip_through_the_wire_shape() {
        let now = at("2025-08-16T20:00:00Z");
        let ev = ChannelEvent {
            channel_number: 3,
            channel_name: "TV3".to_string(),
            title: "Movie".to_string(),
            start: now,
            end: now + TimeDelta::seconds(7080),
            received_at: now,
            next_title: None,
            next_start: None,
        };
        let payload = ev.to_payload();
        assert!(payload.get("next_title").is_none());
        assert_eq!(payload["end"], "2025-08-16T21:58:00Z");
        assert_eq!(ChannelEvent::from_json_value_at(&payload, now), ev);
    }
}
