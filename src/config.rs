use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub influx_url: String,
    pub influx_org: String,
    pub influx_bucket: String,
    pub influx_token: String,
    pub measurement: String,
    pub device: String,
    pub poll_interval_secs: u64,
    pub range_hours: u32,
    pub window_minutes: u32,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{key} must be set to a non-empty value"))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let influx_url = required("INFLUX_URL")?
            .trim_end_matches('/')
            .to_string();
        let influx_org = required("INFLUX_ORG")?;
        let influx_bucket = required("INFLUX_BUCKET")?;
        let influx_token = required("INFLUX_TOKEN")?;

        let measurement = optional("INFLUX_MEASUREMENT", "environment");
        let device = optional("INFLUX_DEVICE", "bme280");

        let poll_interval_secs = lookup("DASHBOARD_POLL_INTERVAL_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v != 0)
            .unwrap_or(60);
        let range_hours = lookup("DASHBOARD_RANGE_HOURS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v != 0)
            .unwrap_or(24);
        let window_minutes = lookup("DASHBOARD_WINDOW_MINUTES")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v != 0)
            .unwrap_or(5);

        Ok(Self {
            influx_url,
            influx_org,
            influx_bucket,
            influx_token,
            measurement,
            device,
            poll_interval_secs,
            range_hours,
            window_minutes,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
