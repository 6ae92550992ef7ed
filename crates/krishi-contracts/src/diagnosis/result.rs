use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ScanError;

pub const MALFORMED_DIAGNOSIS_MESSAGE: &str =
    "The server returned a diagnosis in an unexpected format.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub text: String,
    pub eco_friendly: bool,
}

/// A validated diagnosis, in the order and shape the backend ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub disease: String,
    pub crop: String,
    pub confidence: f64,
    pub confidence_percent: f64,
    pub description: String,
    pub treatment: Vec<Treatment>,
    pub prevention: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    prediction: PredictionWire,
    details: DetailsWire,
}

#[derive(Debug, Deserialize)]
struct PredictionWire {
    disease: String,
    crop: String,
    #[serde(default)]
    confidence: Option<f64>,
    confidence_percent: f64,
}

#[derive(Debug, Deserialize)]
struct DetailsWire {
    #[serde(default)]
    description: String,
    #[serde(default)]
    treatment: Vec<TreatmentWire>,
    #[serde(default)]
    prevention: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TreatmentWire {
    text: String,
    #[serde(default)]
    eco_friendly: bool,
}

impl DiagnosisResult {
    /// Parses and validates a `/predict` success body.
    pub fn from_json(body: &str) -> Result<Self, ScanError> {
        let wire: PredictResponse = serde_json::from_str(body)
            .map_err(|_| ScanError::RequestRejected(MALFORMED_DIAGNOSIS_MESSAGE.to_string()))?;
        Self::from_wire(wire)
    }

    fn from_wire(wire: PredictResponse) -> Result<Self, ScanError> {
        let PredictResponse {
            prediction,
            details,
        } = wire;
        let pct = prediction.confidence_percent;
        if prediction.disease.trim().is_empty() || !pct.is_finite() || !(0.0..=100.0).contains(&pct)
        {
            return Err(ScanError::RequestRejected(
                MALFORMED_DIAGNOSIS_MESSAGE.to_string(),
            ));
        }
        let confidence = prediction
            .confidence
            .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
            .unwrap_or(pct / 100.0);

        Ok(Self {
            disease: prediction.disease.trim().to_string(),
            crop: prediction.crop.trim().to_string(),
            confidence,
            confidence_percent: pct,
            description: details.description,
            treatment: details
                .treatment
                .into_iter()
                .map(|item| Treatment {
                    text: item.text,
                    eco_friendly: item.eco_friendly,
                })
                .collect(),
            prevention: details.prevention,
        })
    }
}

/// Message to show for a non-2xx `/predict` reply.
///
/// Uses the structured `detail` string when the body has one, otherwise a
/// generic server-error line.
pub fn rejection_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|value| value.get("detail"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|detail| !detail.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Server error ({status}). Please try again later."))
}
