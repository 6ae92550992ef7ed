use serde::Serialize;

use super::result::DiagnosisResult;

pub const ECO_FRIENDLY_BADGE: &str = "🌱 Eco-Friendly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

struct TierRow {
    min_percent: f64,
    tier: ConfidenceTier,
    color: &'static str,
}

// First row whose floor the percentage reaches wins.
const TIER_TABLE: [TierRow; 3] = [
    TierRow {
        min_percent: 90.0,
        tier: ConfidenceTier::High,
        color: "var(--kv-green-400)",
    },
    TierRow {
        min_percent: 75.0,
        tier: ConfidenceTier::Medium,
        color: "var(--kv-earth-400)",
    },
    TierRow {
        min_percent: f64::NEG_INFINITY,
        tier: ConfidenceTier::Low,
        color: "#f97316",
    },
];

impl ConfidenceTier {
    pub fn from_percent(percent: f64) -> Self {
        TIER_TABLE
            .iter()
            .find(|row| percent >= row.min_percent)
            .map(|row| row.tier)
            .unwrap_or(Self::Low)
    }

    pub fn color(self) -> &'static str {
        TIER_TABLE
            .iter()
            .find(|row| row.tier == self)
            .map(|row| row.color)
            .unwrap_or("#f97316")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentLine {
    pub text: String,
    pub eco_friendly: bool,
    pub badge: Option<&'static str>,
}

/// Display-ready view of a [`DiagnosisResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayModel {
    pub disease: String,
    pub crop: String,
    pub is_healthy: bool,
    pub confidence_percent: f64,
    pub tier: ConfidenceTier,
    pub tier_color: &'static str,
    pub description: String,
    pub treatments: Vec<TreatmentLine>,
    pub prevention: Vec<String>,
}

pub fn present(result: &DiagnosisResult) -> DisplayModel {
    let tier = ConfidenceTier::from_percent(result.confidence_percent);
    DisplayModel {
        disease: result.disease.clone(),
        crop: result.crop.clone(),
        is_healthy: result.disease.to_lowercase().contains("healthy"),
        confidence_percent: result.confidence_percent,
        tier,
        tier_color: tier.color(),
        description: result.description.clone(),
        treatments: result
            .treatment
            .iter()
            .map(|item| TreatmentLine {
                text: item.text.clone(),
                eco_friendly: item.eco_friendly,
                badge: item.eco_friendly.then_some(ECO_FRIENDLY_BADGE),
            })
            .collect(),
        prevention: result.prevention.clone(),
    }
}
