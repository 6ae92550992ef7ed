#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherInfo {
    pub icon: &'static str,
    pub label: &'static str,
}

// WMO weather interpretation codes, grouped by their upper bound.
const CODE_TABLE: [(i64, &str, &str); 9] = [
    (0, "☀️", "Clear sky"),
    (3, "⛅", "Partly cloudy"),
    (48, "🌫️", "Foggy"),
    (57, "🌧️", "Drizzle"),
    (67, "🌧️", "Rain"),
    (77, "❄️", "Snow"),
    (82, "🌦️", "Rain showers"),
    (86, "🌨️", "Snow showers"),
    (99, "⛈️", "Thunderstorm"),
];

pub fn weather_info(code: i64) -> WeatherInfo {
    CODE_TABLE
        .iter()
        .find(|(max, _, _)| code <= *max)
        .map(|&(_, icon, label)| WeatherInfo { icon, label })
        .unwrap_or(WeatherInfo {
            icon: "🌤️",
            label: "Unknown",
        })
}
