use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the fields of a composite identity label.
/// Not escaped anywhere, so a field containing it will not decode cleanly.
pub const LABEL_DELIMITER: &str = "||";

/// Label the matcher reports when nothing is within threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FeeStatus {
    Paid,
    Unpaid,
    #[default]
    Unset,
    Other(String),
}

impl FeeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Paid" => FeeStatus::Paid,
            "Unpaid" => FeeStatus::Unpaid,
            "" => FeeStatus::Unset,
            other => FeeStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FeeStatus::Paid => "Paid",
            FeeStatus::Unpaid => "Unpaid",
            FeeStatus::Unset => "",
            FeeStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, FeeStatus::Paid)
    }

    pub fn is_unpaid(&self) -> bool {
        matches!(self, FeeStatus::Unpaid)
    }
}

impl fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FeeStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FeeStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FeeStatus::parse(&raw))
    }
}

/// A registered rider: who they are, whether the fee is paid, and where
/// notices go.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub fee: FeeStatus,
    pub email: String,
}

impl Identity {
    pub fn label(&self) -> String {
        encode(&self.name, &self.fee, &self.email)
    }
}

/// Result of splitting a stored label. Older registrations may carry fewer
/// fields than the current three.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedLabel {
    Full { name: String, fee: FeeStatus, email: String },
    Partial { name: String, fee: FeeStatus },
    Legacy { name: String },
}

impl DecodedLabel {
    pub fn name(&self) -> &str {
        match self {
            DecodedLabel::Full { name, .. }
            | DecodedLabel::Partial { name, .. }
            | DecodedLabel::Legacy { name } => name,
        }
    }

    pub fn fee(&self) -> Option<&FeeStatus> {
        match self {
            DecodedLabel::Full { fee, .. } | DecodedLabel::Partial { fee, .. } => Some(fee),
            DecodedLabel::Legacy { .. } => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            DecodedLabel::Full { email, .. } => Some(email),
            _ => None,
        }
    }
}

pub fn encode(name: &str, fee: &FeeStatus, email: &str) -> String {
    [name, fee.as_str(), email].join(LABEL_DELIMITER)
}

pub fn decode(label: &str) -> DecodedLabel {
    let parts: Vec<&str> = label.split(LABEL_DELIMITER).collect();
    match parts.as_slice() {
        [name, fee, email] => DecodedLabel::Full {
            name: name.to_string(),
            fee: FeeStatus::parse(fee),
            email: email.to_string(),
        },
        [name, fee] => DecodedLabel::Partial {
            name: name.to_string(),
            fee: FeeStatus::parse(fee),
        },
        _ => DecodedLabel::Legacy { name: label.to_string() },
    }
}
