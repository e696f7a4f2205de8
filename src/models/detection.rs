use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use crate::models::label::FeeStatus;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One face as reported by the external detector.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub descriptor: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Frame {
    pub detections: Vec<Detection>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlayColor {
    Green,
    Red,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Overlay {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub caption: String,
    pub color: OverlayColor,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisteredFace {
    pub name: String,
    pub fee: Option<FeeStatus>,
    pub email: Option<String>,
    pub samples: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Alert {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}
