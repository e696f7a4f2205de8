use serde::Serialize;

use crate::models::label::{self, DecodedLabel, UNKNOWN_LABEL};
use crate::pipeline::store::LabeledDescriptors;

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub label: String,
    pub distance: f32,
}

impl FaceMatch {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }

    /// Decoded identity, or `None` for the unknown sentinel.
    pub fn identity(&self) -> Option<DecodedLabel> {
        if self.is_unknown() {
            None
        } else {
            Some(label::decode(&self.label))
        }
    }
}

/// Nearest-label matcher over registered descriptors.
///
/// A label's distance to a query is the mean Euclidean distance to each of
/// its samples. The closest label wins if it is strictly under the
/// threshold; otherwise the result is the `unknown` sentinel carrying the
/// best distance seen.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    labeled: Vec<LabeledDescriptors>,
    threshold: f32,
}

impl FaceMatcher {
    /// `None` when there is nothing to match against.
    pub fn build(entries: &[LabeledDescriptors], threshold: f32) -> Option<Self> {
        let labeled: Vec<LabeledDescriptors> = entries
            .iter()
            .filter(|e| !e.descriptors.is_empty())
            .cloned()
            .collect();
        if labeled.is_empty() {
            return None;
        }
        Some(Self { labeled, threshold })
    }

    pub fn label_count(&self) -> usize {
        self.labeled.len()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn find_best_match(&self, query: &[f32]) -> FaceMatch {
        let mut best: Option<(&str, f32)> = None;
        for entry in &self.labeled {
            let distance = mean_distance(query, &entry.descriptors);
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((entry.label.as_str(), distance)),
            }
        }
        match best {
            Some((label, distance)) if distance < self.threshold => FaceMatch { label: label.to_string(), distance },
            Some((_, distance)) => FaceMatch { label: UNKNOWN_LABEL.to_string(), distance },
            None => FaceMatch { label: UNKNOWN_LABEL.to_string(), distance: f32::INFINITY },
        }
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn mean_distance(query: &[f32], samples: &[Vec<f32>]) -> f32 {
    let total: f32 = samples.iter().map(|s| euclidean_distance(query, s)).sum();
    total / samples.len() as f32
}
