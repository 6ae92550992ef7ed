use anyhow::{bail, Context, Result};
use krishi_contracts::dashboard::{
    AuthToken, DiseaseCatalog, HealthStatus, HistoryResponse, LoginRequest, RegisterRequest,
    ScanRecord, StatsResponse,
};
use krishi_contracts::weather::WeatherForecast;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::truncate_text;

const FORECAST_DAILY: &str =
    "sunrise,sunset,rain_sum,showers_sum,temperature_2m_max,temperature_2m_min,weathercode";
const FORECAST_HOURLY: &str = "temperature_2m,weathercode";

/// Read-mostly calls behind the dashboard: scan history, aggregate stats,
/// the disease catalog, auth, and the weather forecast.
pub struct DashboardClient {
    http: HttpClient,
    config: ClientConfig,
}

impl DashboardClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build dashboard HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn health(&self) -> Result<HealthStatus> {
        self.get_json("health", "/")
    }

    pub fn history(&self) -> Result<Vec<ScanRecord>> {
        let response: HistoryResponse = self.get_json("history", "/history")?;
        if !response.success {
            bail!("history request was not successful");
        }
        Ok(response.scans)
    }

    pub fn stats(&self) -> Result<StatsResponse> {
        let response: StatsResponse = self.get_json("stats", "/stats")?;
        if !response.success {
            bail!("stats request was not successful");
        }
        Ok(response)
    }

    pub fn diseases(&self) -> Result<DiseaseCatalog> {
        self.get_json("diseases", "/diseases")
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let endpoint = self.config.endpoint("/api/auth/login");
        let request = self.http.post(&endpoint).json(&LoginRequest { email, password });
        self.auth_token("login", &endpoint, request)
    }

    pub fn register(&self, full_name: &str, email: &str, password: &str) -> Result<AuthToken> {
        let endpoint = self.config.endpoint("/api/auth/register");
        let request = self.http.post(&endpoint).json(&RegisterRequest {
            full_name,
            email,
            password,
        });
        self.auth_token("register", &endpoint, request)
    }

    /// Open-Meteo forecast with one past day, in the location's timezone.
    pub fn forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherForecast> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            bail!("latitude must be within -90..=90, got {latitude}");
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            bail!("longitude must be within -180..=180, got {longitude}");
        }
        let endpoint = format!("{}/forecast", self.config.weather_api_base);
        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("daily", FORECAST_DAILY.to_string()),
                ("hourly", FORECAST_HOURLY.to_string()),
                ("timezone", "auto".to_string()),
                ("past_days", "1".to_string()),
            ])
            .send()
            .with_context(|| format!("weather request failed ({endpoint})"))?;
        let payload = response_json_or_error("weather", response)?;
        serde_json::from_value(payload).context("weather returned an unexpected forecast shape")
    }

    fn get_json<T: DeserializeOwned>(&self, label: &str, path: &str) -> Result<T> {
        let endpoint = self.config.endpoint(path);
        let response = self
            .authorized(self.http.get(&endpoint))
            .send()
            .with_context(|| format!("{label} request failed ({endpoint})"))?;
        let payload = response_json_or_error(label, response)?;
        serde_json::from_value(payload)
            .with_context(|| format!("{label} returned an unexpected payload"))
    }

    fn auth_token(
        &self,
        label: &str,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<AuthToken> {
        let response = request
            .send()
            .with_context(|| format!("{label} request failed ({endpoint})"))?;
        let payload = response_json_or_error(label, response)?;
        match AuthToken::from_response(&payload) {
            Some(token) => Ok(token),
            None => bail!("{label} response carried no token"),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| truncate_text(&body, 512));
        bail!("{label} request failed ({code}): {detail}");
    }
    serde_json::from_str(&body).with_context(|| format!("{label} returned invalid JSON payload"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::DashboardClient;
    use crate::config::ClientConfig;
    use crate::testing::StubServer;

    fn client_for(server: &StubServer, token: Option<&str>) -> anyhow::Result<DashboardClient> {
        let mut config = ClientConfig::default()
            .with_api_base(Some(server.url()))
            .with_bearer_token(token);
        config.weather_api_base = server.url().to_string();
        DashboardClient::new(config)
    }

    #[test]
    fn history_and_stats_are_typed() -> anyhow::Result<()> {
        let history = json!({
            "success": true,
            "scans": [{
                "id": 7, "disease": "Tomato Early Blight", "crop": "Tomato",
                "confidence": 0.91, "filename": "leaf.jpg", "scanned_at": "2026-10-01T08:00:00"
            }]
        });
        let stats = json!({
            "success": true,
            "total_scans": 12,
            "by_disease": [{
                "disease": "Healthy", "crop": "Potato",
                "total_scans": 5, "last_scanned": "2026-10-02"
            }]
        });
        let server = StubServer::serve(vec![(200, history.to_string()), (200, stats.to_string())]);
        let client = client_for(&server, Some("tok"))?;

        let scans = client.history()?;
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].disease, "Tomato Early Blight");
        let stats = client.stats()?;
        assert_eq!(stats.total_scans, 12);
        assert_eq!(stats.by_disease[0].crop, "Potato");

        let requests = server.finish();
        assert_eq!(requests[0].url, "/history");
        assert_eq!(requests[1].url, "/stats");
        assert_eq!(requests[0].header("Authorization"), Some("Bearer tok"));
        Ok(())
    }

    #[test]
    fn unsuccessful_history_is_an_error() -> anyhow::Result<()> {
        let server = StubServer::serve(vec![(200, json!({"success": false}).to_string())]);
        let client = client_for(&server, None)?;
        assert!(client.history().is_err());
        server.finish();
        Ok(())
    }

    #[test]
    fn health_and_catalog() -> anyhow::Result<()> {
        let health = json!({
            "status": "healthy",
            "service": "KrishiVision API",
            "version": "1.0.0",
            "message": "hi"
        });
        let catalog = json!({
            "total": 1,
            "diseases": [{"id": "tomato_early_blight", "disease": "Early Blight", "crop": "Tomato"}]
        });
        let server = StubServer::serve(vec![(200, health.to_string()), (200, catalog.to_string())]);
        let client = client_for(&server, None)?;

        assert_eq!(client.health()?.status, "healthy");
        let catalog = client.diseases()?;
        assert_eq!(catalog.total, 1);
        assert_eq!(catalog.diseases[0].id, "tomato_early_blight");
        let requests = server.finish();
        assert_eq!(requests[0].url, "/");
        assert_eq!(requests[1].url, "/diseases");
        Ok(())
    }

    #[test]
    fn login_posts_credentials_and_reads_token() -> anyhow::Result<()> {
        let server = StubServer::serve(vec![
            (200, json!({"access_token": "abc123", "token_type": "bearer"}).to_string()),
            (400, json!({"detail": "Email already registered"}).to_string()),
        ]);
        let client = client_for(&server, None)?;

        let token = client.login("farmer@example.com", "secret")?;
        assert_eq!(token.as_str(), "abc123");
        let err = client.register("Asha", "farmer@example.com", "secret").unwrap_err();
        assert!(err.to_string().contains("Email already registered"));

        let requests = server.finish();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "/api/auth/login");
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body)?;
        assert_eq!(sent, json!({"email": "farmer@example.com", "password": "secret"}));
        assert_eq!(requests[1].url, "/api/auth/register");
        Ok(())
    }

    #[test]
    fn forecast_requests_open_meteo_fields() -> anyhow::Result<()> {
        let body = json!({
            "latitude": 26.9, "longitude": 75.8,
            "hourly": {"time": ["2026-10-19T00:00"], "temperature_2m": [21.5], "weathercode": [1]},
            "daily": {
                "time": ["2026-10-18", "2026-10-19"],
                "rain_sum": [0.0, 1.2],
                "showers_sum": [0.0, null]
            }
        });
        let server = StubServer::serve(vec![(200, body.to_string())]);
        let client = client_for(&server, None)?;

        let forecast = client.forecast(26.91, 75.79)?;
        assert_eq!(forecast.daily.time.len(), 2);
        assert_eq!(forecast.hourly.temperature_2m, vec![Some(21.5)]);

        let requests = server.finish();
        let url = &requests[0].url;
        assert!(url.starts_with("/forecast?latitude=26.91&longitude=75.79"));
        assert!(url.contains("past_days=1"));
        assert!(url.contains("timezone=auto"));
        assert!(url.contains("hourly=temperature_2m%2Cweathercode"));
        Ok(())
    }

    #[test]
    fn forecast_rejects_impossible_coordinates() -> anyhow::Result<()> {
        let client = DashboardClient::new(ClientConfig::default())?;
        assert!(client.forecast(120.0, 10.0).is_err());
        assert!(client.forecast(10.0, f64::NAN).is_err());
        Ok(())
    }
}
