use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::segmentation::SegmenterConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Delay between mount and the first source reconcile.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_time_update_interval_ms")]
    pub time_update_interval_ms: u64,
    /// Frame rate assumed by `step()`.
    #[serde(default = "default_step_fps")]
    pub step_fps: u32,
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
    /// Gate the segmentation loop on the `active` option.
    #[serde(default = "default_true")]
    pub require_active: bool,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    /// Refresh rate of the headless runner.
    #[serde(default = "default_display_fps")]
    pub display_fps: u32,
}

fn default_version() -> u32 { 1 }
fn default_settle_delay_ms() -> u64 { 1000 }
fn default_time_update_interval_ms() -> u64 { 100 }
fn default_step_fps() -> u32 { 24 }
fn default_inference_timeout_ms() -> u64 { 2000 }
fn default_true() -> bool { true }
fn default_display_fps() -> u32 { 60 }

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            settle_delay_ms: default_settle_delay_ms(),
            time_update_interval_ms: default_time_update_interval_ms(),
            step_fps: default_step_fps(),
            inference_timeout_ms: default_inference_timeout_ms(),
            require_active: true,
            segmenter: SegmenterConfig::default(),
            display_fps: default_display_fps(),
        }
    }
}

impl PlayerSettings {
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("segplay").join("settings.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn save(&self) {
        self.save_to(&Self::config_path());
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings: {e}");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No settings found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create config dir: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::error!("Failed to write settings: {e}");
                } else {
                    log::debug!("Saved settings to {}", path.display());
                }
            }
            Err(e) => log::error!("Failed to serialize settings: {e}"),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn time_update_interval(&self) -> Duration {
        Duration::from_millis(self.time_update_interval_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display_fps.max(1) as f64)
    }
}
