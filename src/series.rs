use chrono::{DateTime, Utc};

/// One downsampled sample. `value` is `None` when the database had no
/// reading for that window (sensor gap); the timestamp is kept so the
/// time axis stays continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Chronologically ordered samples for one metric, exactly as returned
/// by the database aggregation. Never re-sorted client-side.
pub type MetricSeries = Vec<ChartPoint>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Pressure];

    /// Field name as stored in the `_field` column.
    pub fn field(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Pressure => "Pressure",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Pressure => "hPa",
        }
    }

    pub fn stroke(self) -> &'static str {
        match self {
            Metric::Temperature => "#e8590c",
            Metric::Humidity => "#1971c2",
            Metric::Pressure => "#2f9e44",
        }
    }

    pub fn fill(self) -> &'static str {
        match self {
            Metric::Temperature => "#ffe8cc",
            Metric::Humidity => "#d0ebff",
            Metric::Pressure => "#d3f9d8",
        }
    }
}

/// Most recent point that actually carries a value, scanning backwards
/// over trailing gaps. `None` when the whole series is gaps or empty.
pub fn latest_displayable(series: &[ChartPoint]) -> Option<f64> {
    series.iter().rev().find_map(|point| point.value)
}
