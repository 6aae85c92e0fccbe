pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod tracker;
pub mod visualization;

// Re-export main types
pub use crate::config::Config;
pub use crate::detection::{BoundingBox, Detection};
pub use crate::detector::Detector;
pub use crate::error::Error;
pub use crate::tracker::{Tracker, TrackerConfig};
