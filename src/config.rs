use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Floor below which raw predictions are discarded (inference layer).
    pub confidence_threshold: f32,
    /// Overlap-suppression strictness for NMS (inference layer).
    pub nms_threshold: f32,
    /// Fraction of the frame size a box corner may drift between frames and
    /// still be matched to the same track.
    pub movement_margin: f32,
    /// Seconds without a matching detection before a track expires.
    pub expiry_timeout_secs: u64,
    pub model_config_path: String,
    pub model_weights_path: String,
    pub labels_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            confidence_threshold: 0.5,
            nms_threshold: 0.3,
            movement_margin: 0.3,
            expiry_timeout_secs: 5,
            model_config_path: "mlmodels/yolov3-tiny.cfg".to_string(),
            model_weights_path: "mlmodels/yolov3-tiny.weights".to_string(),
            labels_path: "mlmodels/coco.names".to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing fields fall back to the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let cfg: Config = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Configuration(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(Error::Configuration(format!(
                "nms_threshold must be within [0, 1], got {}",
                self.nms_threshold
            )));
        }
        if !(self.movement_margin > 0.0 && self.movement_margin <= 1.0) {
            return Err(Error::Configuration(format!(
                "movement_margin must be within (0, 1], got {}",
                self.movement_margin
            )));
        }
        if self.expiry_timeout_secs == 0 {
            return Err(Error::Configuration(
                "expiry_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
