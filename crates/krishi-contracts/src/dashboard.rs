use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub disease: String,
    pub crop: String,
    pub confidence: f64,
    #[serde(default)]
    pub filename: Option<String>,
    pub scanned_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub scans: Vec<ScanRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseStat {
    pub disease: String,
    pub crop: String,
    pub total_scans: u64,
    pub last_scanned: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub total_scans: u64,
    #[serde(default)]
    pub by_disease: Vec<DiseaseStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub id: String,
    pub disease: String,
    pub crop: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiseaseCatalog {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub diseases: Vec<DiseaseEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Opaque bearer credential issued by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Pulls the token out of an auth response (`access_token` or `token`).
    pub fn from_response(payload: &Value) -> Option<Self> {
        ["access_token", "token"]
            .iter()
            .filter_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
