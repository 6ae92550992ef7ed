mod chart;
mod codes;
mod forecast;

pub use chart::{
    hour_labels, ChartPoint, TemperatureChart, XLabel, YLabel, CHART_HEIGHT, CHART_WIDTH,
};
pub use codes::{weather_info, WeatherInfo};
pub use forecast::{
    summarize_forecast, DailySeries, DayForecast, HourlySeries, WeatherForecast, WeatherSummary,
};
