use serde::Serialize;

use crate::models::detection::{BoundingBox, Overlay, OverlayColor};
use crate::models::label::FeeStatus;
use crate::pipeline::matcher::FaceMatch;

/// What a single match should trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Nobody registered is close enough: alert only.
    Unknown,
    /// Registered with an unpaid fee: alert and try to notify.
    Unpaid { name: String, email: Option<String> },
    /// Any other fee value: log only.
    Cleared { name: String, fee: Option<FeeStatus> },
}

impl Verdict {
    pub fn alert_message(&self) -> Option<String> {
        match self {
            Verdict::Unknown => Some("Unrecognized person detected".to_string()),
            Verdict::Unpaid { name, .. } => Some(format!("Unpaid fee: {}", name)),
            Verdict::Cleared { .. } => None,
        }
    }
}

pub fn decide(best: &FaceMatch) -> Verdict {
    let Some(identity) = best.identity() else {
        return Verdict::Unknown;
    };
    let name = identity.name().to_string();
    match identity.fee() {
        Some(fee) if fee.is_unpaid() => Verdict::Unpaid {
            name,
            email: identity.email().map(str::to_string),
        },
        fee => Verdict::Cleared { name, fee: fee.cloned() },
    }
}

/// Box caption and color for the camera overlay. Only `Paid` is green.
pub fn overlay(bbox: BoundingBox, verdict: &Verdict) -> Overlay {
    let (caption, paid) = match verdict {
        Verdict::Unknown => ("Unknown".to_string(), false),
        Verdict::Unpaid { name, .. } => (format!("{} • {}", name, FeeStatus::Unpaid), false),
        Verdict::Cleared { name, fee } => {
            let fee_text = fee.as_ref().map(|f| f.as_str()).unwrap_or("");
            let paid = fee.as_ref().map(|f| f.is_paid()).unwrap_or(false);
            (format!("{} • {}", name, fee_text).trim().to_string(), paid)
        }
    };
    Overlay {
        bbox,
        caption,
        color: if paid { OverlayColor::Green } else { OverlayColor::Red },
    }
}
