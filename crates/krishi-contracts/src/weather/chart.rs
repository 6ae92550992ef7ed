pub const CHART_WIDTH: f64 = 700.0;
pub const CHART_HEIGHT: f64 = 180.0;
const PAD_X: f64 = 40.0;
const PAD_Y: f64 = 20.0;
const Y_STEPS: usize = 4;
const X_LABEL_EVERY: usize = 4;

/// A plotted reading. `slot` is its index in the hourly series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub slot: usize,
    pub temp: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YLabel {
    pub value: i64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XLabel {
    pub label: String,
    pub x: f64,
}

/// Screen-space geometry of the hourly temperature line chart.
///
/// Bounds are padded by 2° and rounded outward so the line never touches
/// the frame. Missing readings leave their slot empty; the line joins the
/// neighbours on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureChart {
    pub min: f64,
    pub max: f64,
    pub points: Vec<ChartPoint>,
    pub line_path: String,
    pub area_path: String,
    pub y_labels: Vec<YLabel>,
    pub x_labels: Vec<XLabel>,
}

impl TemperatureChart {
    pub fn layout(hours: &[String], temps: &[Option<f64>]) -> Option<Self> {
        let readings: Vec<(usize, f64)> = temps
            .iter()
            .enumerate()
            .filter_map(|(slot, temp)| (*temp).filter(|value| value.is_finite()).map(|t| (slot, t)))
            .collect();
        if readings.is_empty() {
            return None;
        }
        let chart_w = CHART_WIDTH - PAD_X * 2.0;
        let chart_h = CHART_HEIGHT - PAD_Y * 2.0;

        let lowest = readings.iter().map(|&(_, t)| t).fold(f64::INFINITY, f64::min);
        let highest = readings.iter().map(|&(_, t)| t).fold(f64::NEG_INFINITY, f64::max);
        let min = (lowest - 2.0).floor();
        let max = (highest + 2.0).ceil();
        let range = if max - min == 0.0 { 1.0 } else { max - min };

        let last = temps.len().saturating_sub(1);
        let slot_x = |slot: usize| {
            // A lone slot sits mid-chart instead of dividing by zero.
            let fraction = if last == 0 {
                0.5
            } else {
                slot as f64 / last as f64
            };
            PAD_X + fraction * chart_w
        };
        let points: Vec<ChartPoint> = readings
            .iter()
            .map(|&(slot, temp)| ChartPoint {
                slot,
                temp,
                x: slot_x(slot),
                y: PAD_Y + chart_h - ((temp - min) / range) * chart_h,
            })
            .collect();

        let line_path = points
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let op = if idx == 0 { "M" } else { "L" };
                format!("{op}{},{}", point.x, point.y)
            })
            .collect::<Vec<String>>()
            .join(" ");
        let baseline = PAD_Y + chart_h;
        let first_x = points.first().map(|point| point.x).unwrap_or(PAD_X);
        let last_x = points.last().map(|point| point.x).unwrap_or(PAD_X);
        let area_path = format!("{line_path} L{last_x},{baseline} L{first_x},{baseline} Z");

        let y_labels = (0..=Y_STEPS)
            .map(|step| {
                let fraction = step as f64 / Y_STEPS as f64;
                YLabel {
                    value: (min + range * fraction).round() as i64,
                    y: PAD_Y + chart_h - fraction * chart_h,
                }
            })
            .collect();

        let x_labels = hours
            .iter()
            .take(temps.len())
            .enumerate()
            .filter(|(slot, _)| slot % X_LABEL_EVERY == 0)
            .map(|(slot, label)| XLabel {
                label: label.clone(),
                x: slot_x(slot),
            })
            .collect();

        Some(Self {
            min,
            max,
            points,
            line_path,
            area_path,
            y_labels,
            x_labels,
        })
    }

    /// Point for the reading labelled with `hour` (`"HH:00"` labels).
    pub fn point_for_hour(&self, hours: &[String], hour: u32) -> Option<ChartPoint> {
        let slot = hours.iter().position(|label| {
            label
                .split(':')
                .next()
                .and_then(|value| value.trim().parse::<u32>().ok())
                == Some(hour)
        })?;
        self.points.iter().find(|point| point.slot == slot).copied()
    }

    /// Readings on labelled slots, which get a dot marker.
    pub fn marker_points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter().filter(|point| point.slot % X_LABEL_EVERY == 0)
    }
}

/// `00:00` through `23:00`.
pub fn hour_labels() -> Vec<String> {
    (0..24).map(|hour| format!("{hour:02}:00")).collect()
}
