use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{InfobarError, InfobarResult},
    fade::FadeTiming,
};

pub const DEFAULT_UDP_ADDR: &str = "127.0.0.1:42424";
pub const DEFAULT_EVENT_FILE: &str = "runtime/infobar_event.json";

pub const ENV_EVENT_FILE: &str = "INFOBAR_EVENT_FILE";
pub const ENV_UDP_ADDR: &str = "INFOBAR_UDP_ADDR";

/// Immutable overlay settings, built once at startup and handed to the
/// compositor and painter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Loopback endpoint for event datagrams.
    pub udp_addr: SocketAddr,
    /// Shared event file polled once per frame.
    pub event_file: PathBuf,
    pub fade: FadeTiming,
    /// Presentation loop rate in frames per second.
    pub frame_rate: u32,
    pub layout: LayoutConfig,
    pub fonts: FontConfig,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Safe-area inset as a fraction of each screen dimension.
    pub safe_margin: f32,
    /// Width the bar's metrics were designed at.
    pub baseline_width: f32,
    /// Alpha of the body band at full visibility.
    pub body_alpha: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            safe_margin: 0.05,
            baseline_width: 720.0,
            body_alpha: 238,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    /// Family looked up in the system font database.
    pub family: String,
    /// Explicit font files; take precedence over `family`.
    pub regular_path: Option<PathBuf>,
    pub bold_path: Option<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "DejaVu Sans".to_string(),
            regular_path: None,
            bold_path: None,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            udp_addr: SocketAddr::from(([127, 0, 0, 1], 42424)),
            event_file: PathBuf::from(DEFAULT_EVENT_FILE),
            fade: FadeTiming::default(),
            frame_rate: 60,
            layout: LayoutConfig::default(),
            fonts: FontConfig::default(),
        }
    }
}

impl OverlayConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> InfobarResult<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> InfobarResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            InfobarError::config(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> InfobarResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| InfobarError::config(format!("parse config json: {e}")))
    }

    pub fn apply_env(&mut self) -> InfobarResult<()> {
        self.apply_overrides(
            std::env::var(ENV_EVENT_FILE).ok(),
            std::env::var(ENV_UDP_ADDR).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        event_file: Option<String>,
        udp_addr: Option<String>,
    ) -> InfobarResult<()> {
        if let Some(path) = event_file.filter(|s| !s.trim().is_empty()) {
            self.event_file = PathBuf::from(path);
        }
        if let Some(addr) = udp_addr.filter(|s| !s.trim().is_empty()) {
            self.udp_addr = parse_socket_addr(&addr)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> InfobarResult<()> {
        for (name, v) in [
            ("fade.fade_in_s", self.fade.fade_in_s),
            ("fade.hold_s", self.fade.hold_s),
            ("fade.fade_out_s", self.fade.fade_out_s),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(InfobarError::config(format!(
                    "{name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        if self.frame_rate == 0 || self.frame_rate > 1000 {
            return Err(InfobarError::config("frame_rate must be in 1..=1000"));
        }
        let margin = self.layout.safe_margin;
        if !margin.is_finite() || !(0.0..0.5).contains(&margin) {
            return Err(InfobarError::config(
                "layout.safe_margin must be in [0, 0.5)",
            ));
        }
        if !self.layout.baseline_width.is_finite() || self.layout.baseline_width <= 0.0 {
            return Err(InfobarError::config(
                "layout.baseline_width must be finite and > 0",
            ));
        }
        if self.fonts.family.trim().is_empty() && self.fonts.regular_path.is_none() {
            return Err(InfobarError::config(
                "fonts.family or fonts.regular_path is required",
            ));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }
}

pub fn parse_socket_addr(raw: &str) -> InfobarResult<SocketAddr> {
    raw.trim()
        .parse()
        .map_err(|e| InfobarError::config(format!("invalid socket address '{raw}': {e}")))
}
