//! Comparison result document
//!
//! The structured comparison produced once per pair of devices. The JSON
//! shape (camelCase keys) is shared by the provider's schema-constrained
//! output, the `/api/compare` response body, and the client. Once parsed
//! and validated a [`ComparisonResult`] is treated as read-only context for
//! every follow-up chat turn.

use crate::error::{DuelError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Upper bound of every rating score
pub const MAX_RATING: f64 = 10.0;

/// Six scores out of ten for a single device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceRating {
    pub overall: f64,
    pub performance: f64,
    pub camera: f64,
    pub battery: f64,
    pub display: f64,
    pub value: f64,
}

impl DeviceRating {
    /// Scores paired with their display labels, in presentation order
    pub fn labeled(&self) -> [(&'static str, f64); 6] {
        [
            ("Overall", self.overall),
            ("Performance", self.performance),
            ("Camera", self.camera),
            ("Battery", self.battery),
            ("Display", self.display),
            ("Value", self.value),
        ]
    }
}

/// Profile of one compared device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceComparison {
    /// Full, corrected device name
    pub name: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub rating: DeviceRating,
}

/// Cross-cutting summary of the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedSummary {
    pub overview: String,
    pub key_differences: Vec<String>,
    pub best_for_device_one: String,
    pub best_for_device_two: String,
}

/// The full comparison document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub detailed_summary: DetailedSummary,
    /// Winning device name, or a tie marker such as "It's a tie"
    pub winner: String,
    pub winner_reason: String,
    pub device_one: DeviceComparison,
    pub device_two: DeviceComparison,
}

/// Interpretation of the free-text `winner` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    DeviceOne,
    DeviceTwo,
    Tie,
    /// The model named something that matches neither device
    Unrecognized(String),
}

impl ComparisonResult {
    /// Parse and validate a comparison document from a JSON body
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Validation`] when the body is not JSON, does not
    /// match the document shape, or carries out-of-range values.
    ///
    /// # Examples
    ///
    /// ```
    /// use device_duel::comparison::ComparisonResult;
    ///
    /// assert!(ComparisonResult::from_json("{\"winner\": \"A\"}").is_err());
    /// ```
    pub fn from_json(body: &str) -> Result<Self> {
        let result: Self = serde_json::from_str(body.trim()).map_err(|e| {
            DuelError::Validation(format!("comparison document has the wrong shape: {}", e))
        })?;
        result.validate()?;
        Ok(result)
    }

    /// Check value-level constraints that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Validation`] for blank device names or ratings
    /// that are not finite numbers in `[0, 10]`.
    pub fn validate(&self) -> Result<()> {
        for (slot, device) in [("deviceOne", &self.device_one), ("deviceTwo", &self.device_two)] {
            if device.name.trim().is_empty() {
                return Err(DuelError::Validation(format!("{}.name is empty", slot)).into());
            }
            for (label, score) in device.rating.labeled() {
                if !score.is_finite() || !(0.0..=MAX_RATING).contains(&score) {
                    return Err(DuelError::Validation(format!(
                        "{}.rating.{} must be within 0-10, got {}",
                        slot,
                        label.to_lowercase(),
                        score
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Names of both devices, in comparison order
    pub fn device_names(&self) -> (&str, &str) {
        (&self.device_one.name, &self.device_two.name)
    }

    /// Resolve the `winner` text against the two device names
    pub fn winner_designation(&self) -> Winner {
        let winner = self.winner.trim();
        if winner.eq_ignore_ascii_case(self.device_one.name.trim()) {
            Winner::DeviceOne
        } else if winner.eq_ignore_ascii_case(self.device_two.name.trim()) {
            Winner::DeviceTwo
        } else if winner.to_lowercase().contains("tie") {
            Winner::Tie
        } else {
            Winner::Unrecognized(winner.to_string())
        }
    }
}

/// Obtains one comparison document for a pair of device names
///
/// The call is atomic from the caller's perspective and mutates no shared
/// state; installing the result is the caller's job.
#[async_trait]
pub trait ComparisonRequestor: Send + Sync {
    /// Request a comparison of `device_one` and `device_two`
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::InvalidInput`] for a blank name (before any
    /// network call), [`DuelError::Transport`] for network or status
    /// failures, and [`DuelError::Validation`] when the body does not parse
    /// into a [`ComparisonResult`].
    async fn request_comparison(
        &self,
        device_one: &str,
        device_two: &str,
    ) -> Result<ComparisonResult>;
}

/// Trim both device names, rejecting blanks
///
/// # Errors
///
/// Returns [`DuelError::InvalidInput`] naming the first blank slot.
///
/// # Examples
///
/// ```
/// use device_duel::comparison::normalize_device_names;
///
/// let (one, two) = normalize_device_names(" Pixel 9 ", "iPhone 16").unwrap();
/// assert_eq!(one, "Pixel 9");
/// assert!(normalize_device_names("Pixel 9", "  ").is_err());
/// ```
pub fn normalize_device_names(device_one: &str, device_two: &str) -> Result<(String, String)> {
    let one = device_one.trim();
    let two = device_two.trim();
    if one.is_empty() {
        return Err(DuelError::InvalidInput("first device name is empty".to_string()).into());
    }
    if two.is_empty() {
        return Err(DuelError::InvalidInput("second device name is empty".to_string()).into());
    }
    Ok((one.to_string(), two.to_string()))
}
