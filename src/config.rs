// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::drivers::{Column, OxyError, WindowKind};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "OXYSCOPE_CONFIG";
/// Picked up from the working directory when present.
pub const CONFIG_FILE: &str = "oxyscope.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Serial,
    Simulated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    Gui,
    Png,
}

/// Synthetic pulse generator used when no board is plugged in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub block_len: usize,
    pub interval_us: f64,
    pub jitter_us: f64,
    pub pulse_bpm: f64,
    /// Also send a device-side spectrum column `F`.
    pub send_spectrum: bool,
    pub seed: Option<u64>,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            block_len: 64,
            interval_us: 2000.0,
            jitter_us: 25.0,
            pulse_bpm: 72.0,
            send_spectrum: true,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub port: String,
    /// Must match the rate the board firmware opens its serial port with.
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Boards reset when the port opens; wait this long before the first read.
    pub settle_ms: u64,
    pub window_size: usize,
    pub window: String,
    pub channel: String,
    pub demean: bool,
    /// Duration of one `ts` unit; the board stamps samples in microseconds.
    pub seconds_per_tick: f64,
    pub render_pause_ms: u64,
    pub source: SourceKind,
    pub render: RenderKind,
    pub png_path: PathBuf,
    pub png_every: u32,
    pub simulation: SimulationConfig,
}
impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 1_000_000,
            timeout_ms: 2000,
            settle_ms: 2000,
            window_size: 256,
            window: "hann".to_string(),
            channel: "A0".to_string(),
            demean: false,
            seconds_per_tick: 1e-6,
            render_pause_ms: 10,
            source: SourceKind::Serial,
            render: RenderKind::Gui,
            png_path: PathBuf::from("oxyscope.png"),
            png_every: 10,
            simulation: SimulationConfig::default(),
        }
    }
}
impl AcquisitionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn render_pause(&self) -> Duration {
        Duration::from_millis(self.render_pause_ms)
    }
    pub fn window_kind(&self) -> Result<WindowKind, OxyError> {
        self.window.parse()
    }
    pub fn channel_column(&self) -> Result<Column, OxyError> {
        Column::channel(&self.channel)
    }
    pub fn validate(&self) -> Result<(), OxyError> {
        if self.window_size < 4 {
            return Err(OxyError::Config(format!(
                "window_size must be at least 4, got {}",
                self.window_size
            )));
        }
        if self.baud_rate == 0 || self.timeout_ms == 0 {
            return Err(OxyError::Config(
                "baud_rate and timeout_ms must be positive".into(),
            ));
        }
        if !(self.seconds_per_tick > 0.0) {
            return Err(OxyError::Config("seconds_per_tick must be positive".into()));
        }
        if self.png_every == 0 {
            return Err(OxyError::Config("png_every must be at least 1".into()));
        }
        if self.simulation.block_len == 0 || !(self.simulation.interval_us > 0.0) {
            return Err(OxyError::Config(
                "simulation needs a positive block_len and interval_us".into(),
            ));
        }
        self.window_kind()?;
        self.channel_column()?;
        Ok(())
    }
    pub fn from_json(text: &str) -> Result<Self, OxyError> {
        let config: AcquisitionConfig =
            serde_json::from_str(text).map_err(|e| OxyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("could not parse {}", path.display()))
    }
    /// `$OXYSCOPE_CONFIG`, else `./oxyscope.json`, else the built-in defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_path(PathBuf::from(path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            return Self::from_path(local);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_are_valid() {
        let config = AcquisitionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.window_kind().unwrap(), WindowKind::Hann);
        assert_eq!(config.channel_column().unwrap(), Column::A0);
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }
    #[test]
    fn partial_json_keeps_defaults() {
        let config = AcquisitionConfig::from_json(
            r#"{ "port": "COM4", "baud_rate": 115200, "demean": true,
                 "source": "simulated", "render": "png",
                 "simulation": { "pulse_bpm": 90.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.port, "COM4");
        assert_eq!(config.baud_rate, 115200);
        assert!(config.demean);
        assert_eq!(config.source, SourceKind::Simulated);
        assert_eq!(config.render, RenderKind::Png);
        assert_eq!(config.simulation.pulse_bpm, 90.0);
        assert_eq!(config.simulation.block_len, 64);
        assert_eq!(config.window_size, 256);
    }
    #[test]
    fn rejects_bad_values() {
        assert!(AcquisitionConfig::from_json(r#"{ "window": "kaiser" }"#).is_err());
        assert!(AcquisitionConfig::from_json(r#"{ "channel": "ts" }"#).is_err());
        assert!(AcquisitionConfig::from_json(r#"{ "window_size": 2 }"#).is_err());
        assert!(AcquisitionConfig::from_json("not json").is_err());
    }
}
