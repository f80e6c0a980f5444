use std::{
    net::{SocketAddr, UdpSocket},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::{
    config::OverlayConfig,
    error::{InfobarError, InfobarResult},
    event::ChannelEvent,
};

/// What a producer knows about the tuned channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NowPlaying {
    pub channel_number: i64,
    pub channel_name: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub next_title: Option<String>,
    pub next_start: Option<DateTime<Utc>>,
}

impl NowPlaying {
    /// Event as it will appear on the wire; missing times become `now`.
    pub fn to_event(&self, now: DateTime<Utc>) -> ChannelEvent {
        ChannelEvent {
            channel_number: self.channel_number,
            channel_name: self.channel_name.clone(),
            title: self.title.clone(),
            start: self.start.unwrap_or(now),
            end: self.end.unwrap_or(now),
            received_at: now,
            next_title: self.next_title.clone().filter(|s| !s.is_empty()),
            next_start: self.next_start,
        }
    }
}

/// Producer side of both transports.
///
/// The file write is authoritative; the datagram only wakes the overlay
/// sooner, so its failures are ignored.
#[derive(Clone, Debug)]
pub struct InfobarNotifier {
    event_file: PathBuf,
    udp_addr: SocketAddr,
}

impl InfobarNotifier {
    pub fn new(event_file: impl Into<PathBuf>, udp_addr: SocketAddr) -> Self {
        Self {
            event_file: event_file.into(),
            udp_addr,
        }
    }

    pub fn from_config(cfg: &OverlayConfig) -> Self {
        Self::new(cfg.event_file.clone(), cfg.udp_addr)
    }

    pub fn event_file(&self) -> &Path {
        &self.event_file
    }

    pub fn notify(&self, now_playing: &NowPlaying) -> InfobarResult<()> {
        self.notify_at(now_playing, Utc::now())
    }

    pub fn notify_at(&self, now_playing: &NowPlaying, now: DateTime<Utc>) -> InfobarResult<()> {
        let payload = now_playing.to_event(now).to_payload();
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| InfobarError::payload(format!("encode event: {e}")))?;

        write_atomic(&self.event_file, &bytes)?;

        if let Err(e) = send_datagram(self.udp_addr, &bytes) {
            tracing::debug!(addr = %self.udp_addr, error = %e, "infobar datagram not sent");
        }
        Ok(())
    }
}

fn send_datagram(addr: SocketAddr, bytes: &[u8]) -> std::io::Result<()> {
    let bind: SocketAddr = if addr.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind)?;
    socket.send_to(bytes, addr)?;
    Ok(())
}

/// Write `<path>.tmp` next to the target, then rename over it so the watcher
/// never sees a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> InfobarResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            InfobarError::transport(format!("create event dir '{}': {e}", parent.display()))
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(|e| {
        InfobarError::transport(format!("write event file '{}': {e}", tmp.display()))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        InfobarError::transport(format!("replace event file '{}': {e}", path.display()))
    })?;
    Ok(())
}
