//! Host integration: turn a host application's "status changed" payload into
//! an infobar notification.
//!
//! Hosts name the same concept differently (`channel_number` vs `channelNum`
//! vs `channel.number`), so each field is looked up through an ordered list of
//! key paths and the first truthy match wins.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    event::{coerce_i64, coerce_string, from_unix_seconds, parse_timestamp},
    transport::{InfobarNotifier, NowPlaying},
};

type KeyPath = &'static [&'static str];

const CHANNEL_NUMBER: &[KeyPath] = &[&["channel_number"], &["channelNum"], &["channel", "number"]];
const CHANNEL_NAME: &[KeyPath] = &[&["channel_name"], &["channel", "name"]];
const NOW_BLOCK: &[KeyPath] = &[&["now"], &["current"], &["programme"]];
const NEXT_BLOCK: &[KeyPath] = &[&["next"], &["up_next"]];
const TITLE: &[KeyPath] = &[&["title"], &["name"]];
const START: &[KeyPath] = &[&["start"], &["start_time"]];
const END: &[KeyPath] = &[&["end"], &["end_time"]];

/// Truthiness as the host payloads use it: empty strings, zero, empty
/// containers, `false` and `null` all count as absent.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, path: KeyPath) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut cur = obj.get(*first)?;
    for key in rest {
        cur = cur.as_object()?.get(*key)?;
    }
    Some(cur)
}

/// First truthy value along `strategies`.
fn first_match<'a>(obj: &'a Map<String, Value>, strategies: &[KeyPath]) -> Option<&'a Value> {
    strategies
        .iter()
        .filter_map(|path| lookup(obj, path))
        .find(|v| is_truthy(v))
}

fn first_object<'a>(
    obj: &'a Map<String, Value>,
    strategies: &[KeyPath],
) -> Option<&'a Map<String, Value>> {
    first_match(obj, strategies).and_then(Value::as_object)
}

fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => n.as_f64().and_then(from_unix_seconds),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Extract now/next information from a host status payload.
///
/// Returns `None` unless both a channel name and a current title are present.
pub fn extract_now_playing(payload: &Value) -> Option<NowPlaying> {
    let obj = payload.as_object()?;
    let empty = Map::new();

    let channel_number = first_match(obj, CHANNEL_NUMBER)
        .and_then(coerce_i64)
        .unwrap_or(0);
    let channel_name = first_match(obj, CHANNEL_NAME)
        .and_then(coerce_string)
        .unwrap_or_default();

    let now = first_object(obj, NOW_BLOCK).unwrap_or(&empty);
    let next = first_object(obj, NEXT_BLOCK).unwrap_or(&empty);

    let title = first_match(now, TITLE)
        .and_then(coerce_string)
        .unwrap_or_default();
    if channel_name.is_empty() || title.is_empty() {
        return None;
    }

    Some(NowPlaying {
        channel_number,
        channel_name,
        title,
        start: first_match(now, START).and_then(timestamp),
        end: first_match(now, END).and_then(timestamp),
        next_title: first_match(next, TITLE).and_then(coerce_string),
        next_start: first_match(next, START).and_then(timestamp),
    })
}

/// Observer the host calls after publishing its status.
#[derive(Clone, Debug)]
pub struct InfobarHook {
    notifier: InfobarNotifier,
}

impl InfobarHook {
    pub fn new(notifier: InfobarNotifier) -> Self {
        Self { notifier }
    }

    /// Forward `payload` to the overlay and hand `host_result` back untouched.
    /// Nothing here can fail the host.
    pub fn observe<T>(&self, payload: &Value, host_result: T) -> T {
        self.forward(payload);
        host_result
    }

    /// Returns whether a notification was written.
    pub fn forward(&self, payload: &Value) -> bool {
        let Some(now_playing) = extract_now_playing(payload) else {
            return false;
        };
        match self.notifier.notify(&now_playing) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "infobar hook notification failed");
                false
            }
        }
    }

    /// Adapter-process mode: one JSON status payload per line. Returns the
    /// number of notifications written.
    pub fn relay_lines<R: BufRead>(&self, reader: R) -> std::io::Result<usize> {
        let mut sent = 0;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(payload) => {
                    if self.forward(&payload) {
                        sent += 1;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "skipping malformed status line"),
            }
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{
        net::{SocketAddr, UdpSocket},
        path::PathBuf,
        time::SystemTime,
    };

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "infobar_{name}_{}_{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn dead_addr() -> SocketAddr {
        UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
    }

    #[test]
    fn flat_keys_are_extracted() {
        let np = extract_now_playing(&json!({
            "channel_number": 3,
            "channel_name": "TV3",
            "now": {"title": "Movie", "start": "2025-08-16T20:00:00", "end": 1755382680},
            "next": {"title": "News", "start_time": "2025-08-16T22:18:00Z"}
        }))
        .unwrap();
        assert_eq!(np.channel_number, 3);
        assert_eq!(np.channel_name, "TV3");
        assert_eq!(np.title, "Movie");
        assert_eq!(np.start, parse_timestamp("2025-08-16T20:00:00"));
        assert_eq!(np.end.map(|d| d.timestamp()), Some(1_755_382_680));
        assert_eq!(np.next_title.as_deref(), Some("News"));
        assert_eq!(np.next_start, parse_timestamp("2025-08-16T22:18:00Z"));
    }

    #[test]
    fn nested_and_alternate_keys_are_extracted() {
        let np = extract_now_playing(&json!({
            "channel": {"number": "12", "name": "Twelve"},
            "current": {"name": "Show", "start_time": 1700000000, "end_time": "bad"},
            "up_next": {"name": "Later"}
        }))
        .unwrap();
        assert_eq!(np.channel_number, 12);
        assert_eq!(np.channel_name, "Twelve");
        assert_eq!(np.title, "Show");
        assert_eq!(np.start.map(|d| d.timestamp()), Some(1_700_000_000));
        assert_eq!(np.end, None);
        assert_eq!(np.next_title.as_deref(), Some("Later"));
        assert_eq!(np.next_start, None);
    }

    #[test]
    fn earlier_strategies_win_and_falsy_values_fall_through() {
        let np = extract_now_playing(&json!({
            "channel_number": 0,
            "channelNum": 8,
            "channel": {"number": 9, "name": "Nested"},
            "channel_name": "Flat",
            "now": {},
            "programme": {"title": "From programme"}
        }))
        .unwrap();
        assert_eq!(np.channel_number, 8);
        assert_eq!(np.channel_name, "Flat");
        assert_eq!(np.title, "From programme");
    }

    #[test]
    fn missing_name_or_title_yields_nothing() {
        assert!(extract_now_playing(&json!({"channel_name": "X"})).is_none());
        assert!(extract_now_playing(&json!({"now": {"title": "Y"}})).is_none());
        assert!(extract_now_playing(&json!([1, 2])).is_none());
        assert!(extract_now_playing(&json!({"channel": "flat string", "now": "x"})).is_none());
    }

    #[test]
    fn observe_returns_host_value_for_anything() {
        let dir = temp_dir("hook_observe");
        let hook = InfobarHook::new(InfobarNotifier::new(dir.join("ev.json"), dead_addr()));
        assert_eq!(hook.observe(&json!(null), 41), 41);
        assert_eq!(hook.observe(&json!({"bogus": true}), "ok"), "ok");
        let rv: Result<u8, String> = Err("host failed".to_string());
        assert_eq!(
            hook.observe(&json!({"channel_name": "A", "now": {"title": "B"}}), rv.clone()),
            rv
        );
        assert!(dir.join("ev.json").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn notifier_failures_are_swallowed() {
        let dir = temp_dir("hook_unwritable");
        std::fs::create_dir_all(&dir).unwrap();
        // A directory where the event file should be makes the write fail.
        let target = dir.join("ev.json");
        std::fs::create_dir_all(target.join("occupied")).unwrap();
        let hook = InfobarHook::new(InfobarNotifier::new(&target, dead_addr()));
        let payload = json!({"channel_name": "A", "now": {"title": "B"}});
        assert!(!hook.forward(&payload));
        assert_eq!(hook.observe(&payload, 7), 7);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn relay_counts_forwarded_lines() {
        let dir = temp_dir("hook_relay");
        let hook = InfobarHook::new(InfobarNotifier::new(dir.join("ev.json"), dead_addr()));
        let input = concat!(
            "{\"channel_name\": \"A\", \"now\": {\"title\": \"One\"}}\n",
            "\n",
            "not json\n",
            "{\"channel_name\": \"\"}\n",
            "{\"channel_name\": \"A\", \"now\": {\"title\": \"Two\"}}\n",
        );
        let sent = hook.relay_lines(std::io::Cursor::new(input)).unwrap();
        assert_eq!(sent, 2);
        let last = crate::ChannelEvent::from_slice(&std::fs::read(dir.join("ev.json")).unwrap())
            .unwrap();
        assert_eq!(last.title, "Two");
        std::fs::remove_dir_all(&dir).ok();
    }
}
