use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;

/// Open-Meteo `/forecast` response, restricted to the fields we request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherForecast {
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub weathercode: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailySeries {
    pub time: Vec<String>,
    #[serde(default)]
    pub sunrise: Vec<Option<String>>,
    #[serde(default)]
    pub sunset: Vec<Option<String>>,
    #[serde(default)]
    pub rain_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub showers_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub weathercode: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: String,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub rain_mm: f64,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSummary {
    pub current_temp: Option<f64>,
    pub current_code: i64,
    /// Today's slots from midnight, at most 24. Slot `i` is hour `i`;
    /// a missing reading stays `None` in place.
    pub hourly: Vec<Option<f64>>,
    /// Upcoming days; the `past_days=1` entry is dropped.
    pub forecast: Vec<DayForecast>,
}

impl WeatherSummary {
    pub fn rainy_days(&self) -> Vec<&DayForecast> {
        self.forecast.iter().filter(|day| day.rain_mm > 0.0).collect()
    }
}

/// Derives the dashboard view of a forecast for the local time `now`.
///
/// Returns `None` when the hourly series has no entry for today.
pub fn summarize_forecast(
    forecast: &WeatherForecast,
    now: NaiveDateTime,
) -> Option<WeatherSummary> {
    let today = now.date();
    let start = forecast
        .hourly
        .time
        .iter()
        .position(|stamp| parse_local_date(stamp) == Some(today))?;
    let temps = &forecast.hourly.temperature_2m;
    let end = (start + 24).min(temps.len());
    let hourly: Vec<Option<f64>> = temps.get(start..end).unwrap_or_default().to_vec();

    let current_idx = start + now.hour() as usize;
    let current_temp = temps
        .get(current_idx)
        .copied()
        .flatten()
        .or_else(|| hourly.iter().flatten().next().copied());
    let current_code = forecast
        .hourly
        .weathercode
        .get(current_idx)
        .copied()
        .flatten()
        .unwrap_or(0);

    let daily = &forecast.daily;
    let forecast_days = daily
        .time
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, date)| DayForecast {
            date: date.clone(),
            high: at(&daily.temperature_2m_max, idx),
            low: at(&daily.temperature_2m_min, idx),
            rain_mm: at(&daily.rain_sum, idx).unwrap_or(0.0)
                + at(&daily.showers_sum, idx).unwrap_or(0.0),
            sunrise: daily.sunrise.get(idx).cloned().flatten(),
            sunset: daily.sunset.get(idx).cloned().flatten(),
            code: at(&daily.weathercode, idx).unwrap_or(0),
        })
        .collect();

    Some(WeatherSummary {
        current_temp,
        current_code,
        hourly,
        forecast: forecast_days,
    })
}

fn at<T: Copy>(series: &[Option<T>], idx: usize) -> Option<T> {
    series.get(idx).copied().flatten()
}

fn parse_local_date(stamp: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M")
        .map(|value| value.date())
        .or_else(|_| NaiveDate::parse_from_str(stamp, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{summarize_forecast, WeatherForecast};

    fn forecast() -> anyhow::Result<WeatherForecast> {
        let mut times = Vec::new();
        let mut temps = Vec::new();
        let mut codes = Vec::new();
        for day in ["2026-10-18", "2026-10-19"] {
            for hour in 0..24 {
                times.push(format!("{day}T{hour:02}:00"));
                let temp = if day == "2026-10-18" {
                    10.0
                } else {
                    20.0 + hour as f64
                };
                let code = if hour == 14 { 61 } else { 0 };
                temps.push(json!(temp));
                codes.push(json!(code));
            }
        }
        Ok(serde_json::from_value(json!({
            "latitude": 26.91,
            "longitude": 75.79,
            "hourly": {"time": times, "temperature_2m": temps, "weathercode": codes},
            "daily": {
                "time": ["2026-10-18", "2026-10-19", "2026-10-20"],
                "sunrise": ["2026-10-18T06:20", "2026-10-19T06:21", null],
                "sunset": ["2026-10-18T17:50", "2026-10-19T17:49", "2026-10-20T17:48"],
                "rain_sum": [5.0, 0.0, 1.5],
                "showers_sum": [0.0, null, 0.5],
                "temperature_2m_max": [30.0, 31.0, 29.0],
                "temperature_2m_min": [18.0, 19.0, 17.0],
                "weathercode": [61, 0, 80]
            }
        }))?)
    }

    #[test]
    fn summary_starts_at_today_and_skips_yesterday() -> anyhow::Result<()> {
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|date| date.and_hms_opt(14, 30, 0))
            .ok_or_else(|| anyhow::anyhow!("bad date"))?;
        let summary =
            summarize_forecast(&forecast()?, now).ok_or_else(|| anyhow::anyhow!("no summary"))?;

        assert_eq!(summary.hourly.len(), 24);
        assert_eq!(summary.hourly[0], Some(20.0));
        assert_eq!(summary.current_temp, Some(34.0));
        assert_eq!(summary.current_code, 61);
        assert_eq!(summary.forecast.len(), 2);
        assert_eq!(summary.forecast[0].date, "2026-10-19");
        assert_eq!(summary.forecast[0].rain_mm, 0.0);
        assert_eq!(summary.forecast[1].rain_mm, 2.0);
        assert_eq!(summary.forecast[1].sunrise, None);
        let rainy: Vec<&str> = summary
            .rainy_days()
            .iter()
            .map(|d| d.date.as_str())
            .collect();
        assert_eq!(rainy, vec!["2026-10-20"]);
        Ok(())
    }

    #[test]
    fn null_reading_keeps_hours_aligned() -> anyhow::Result<()> {
        let mut forecast = forecast()?;
        // Slot 24 is 2026-10-19T00:00, so today's 02:00 is slot 26.
        forecast.hourly.temperature_2m[26] = None;
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|date| date.and_hms_opt(2, 10, 0))
            .ok_or_else(|| anyhow::anyhow!("bad date"))?;
        let summary =
            summarize_forecast(&forecast, now).ok_or_else(|| anyhow::anyhow!("no summary"))?;

        assert_eq!(summary.hourly.len(), 24);
        assert_eq!(summary.hourly[2], None);
        assert_eq!(summary.hourly[4], Some(24.0));
        assert_eq!(summary.hourly[23], Some(43.0));
        // The current hour has no reading; fall back to the first one today.
        assert_eq!(summary.current_temp, Some(20.0));
        Ok(())
    }

    #[test]
    fn no_summary_without_today() -> anyhow::Result<()> {
        let now = NaiveDate::from_ymd_opt(2027, 1, 1)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .ok_or_else(|| anyhow::anyhow!("bad date"))?;
        assert_eq!(summarize_forecast(&forecast()?, now), None);
        Ok(())
    }
}
