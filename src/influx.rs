use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::DashboardConfig;
use crate::series::{ChartPoint, Metric, MetricSeries};

const QUERY_TIMEOUT: Duration = Duration::from_secs(20);

/// InfluxDB v2 query client. One instance is shared by all metric
/// fetches; the underlying reqwest client pools connections.
#[derive(Clone)]
pub struct InfluxClient {
    http: Client,
    url: String,
    org: String,
    bucket: String,
    token: String,
    measurement: String,
    device: String,
    range_hours: u32,
    window_minutes: u32,
}

#[derive(Debug, Deserialize)]
struct InfluxErrorBody {
    message: Option<String>,
}

impl InfluxClient {
    pub fn new(http: Client, config: &DashboardConfig) -> Self {
        Self {
            http,
            url: config.influx_url.clone(),
            org: config.influx_org.clone(),
            bucket: config.influx_bucket.clone(),
            token: config.influx_token.clone(),
            measurement: config.measurement.clone(),
            device: config.device.clone(),
            range_hours: config.range_hours,
            window_minutes: config.window_minutes,
        }
    }

    fn flux_query(&self, metric: Metric) -> String {
        format!(
            r#"from(bucket: "{bucket}")
  |> range(start: -{range}h)
  |> filter(fn: (r) => r._measurement == "{measurement}")
  |> filter(fn: (r) => r.device == "{device}")
  |> filter(fn: (r) => r._field == "{field}")
  |> aggregateWindow(every: {window}m, fn: mean, createEmpty: true)
  |> keep(columns: ["_time", "_value"])"#,
            bucket = flux_escape(&self.bucket),
            range = self.range_hours,
            measurement = flux_escape(&self.measurement),
            device = flux_escape(&self.device),
            field = metric.field(),
            window = self.window_minutes,
        )
    }

    /// Runs one time-range query for a metric and returns its points in
    /// the order the database emitted them. No retry here; the next
    /// poll cycle is the retry.
    pub async fn query_series(&self, metric: Metric) -> Result<MetricSeries> {
        let response = self
            .http
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/csv")
            .header("Content-Type", "application/vnd.flux")
            .timeout(QUERY_TIMEOUT)
            .body(self.flux_query(metric))
            .send()
            .await
            .with_context(|| format!("InfluxDB query request failed for {}", metric.field()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<InfluxErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message)
                .unwrap_or(body);
            anyhow::bail!(
                "InfluxDB returned HTTP {status} for {}: {detail}",
                metric.field()
            );
        }

        let body = response
            .text()
            .await
            .context("failed to read InfluxDB query response")?;
        parse_annotated_csv(&body)
            .with_context(|| format!("failed to parse InfluxDB response for {}", metric.field()))
    }
}

/// Escapes a value for interpolation into a Flux string literal.
fn flux_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parses an annotated-CSV query response into chart points.
///
/// Annotation rows (`#datatype`, `#group`, `#default`) are skipped, the
/// header row maps the `_time` and `_value` columns, and every data row
/// becomes exactly one point. An empty `_value` cell is a gap
/// (`value: None`), not a dropped row. Repeated headers from multiple
/// result tables re-map the columns.
pub fn parse_annotated_csv(body: &str) -> Result<MetricSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut points = Vec::new();
    let mut time_idx: Option<usize> = None;
    let mut value_idx: Option<usize> = None;

    for record in reader.records() {
        let record = record.context("malformed CSV record in InfluxDB response")?;

        if record.iter().any(|field| field == "_time") {
            time_idx = record.iter().position(|field| field == "_time");
            value_idx = record.iter().position(|field| field == "_value");
            continue;
        }

        let (Some(time_idx), Some(value_idx)) = (time_idx, value_idx) else {
            anyhow::bail!("InfluxDB response data row arrived before a header row");
        };

        let raw_time = record.get(time_idx).unwrap_or_default().trim();
        let time = DateTime::parse_from_rfc3339(raw_time)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("invalid _time value {raw_time:?}"))?;

        let raw_value = record.get(value_idx).unwrap_or_default().trim();
        let value = if raw_value.is_empty() {
            None
        } else {
            Some(
                raw_value
                    .parse::<f64>()
                    .with_context(|| format!("invalid _value {raw_value:?}"))?,
            )
        };

        points.push(ChartPoint { time, value });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> InfluxClient {
        let config = DashboardConfig {
            influx_url: "http://localhost:8086".to_string(),
            influx_org: "home".to_string(),
            influx_bucket: "sensors".to_string(),
            influx_token: "secret".to_string(),
            measurement: "environment".to_string(),
            device: "bme280".to_string(),
            poll_interval_secs: 60,
            range_hours: 24,
            window_minutes: 5,
        };
        InfluxClient::new(Client::new(), &config)
    }

    #[test]
    fn flux_query_filters_on_the_requested_field() {
        let query = test_client().flux_query(Metric::Humidity);
        assert!(query.contains(r#"from(bucket: "sensors")"#));
        assert!(query.contains("range(start: -24h)"));
        assert!(query.contains(r#"r._measurement == "environment""#));
        assert!(query.contains(r#"r.device == "bme280""#));
        assert!(query.contains(r#"r._field == "humidity""#));
        assert!(query.contains("every: 5m"));
    }

    #[test]
    fn flux_escape_neutralizes_quotes() {
        assert_eq!(flux_escape(r#"bu"cket"#), r#"bu\"cket"#);
        assert_eq!(flux_escape(r"back\slash"), r"back\\slash");
    }

    const RESPONSE: &str = "\
#datatype,string,long,dateTime:RFC3339,double\r\n\
#group,false,false,false,false\r\n\
#default,_result,,,\r\n\
,result,table,_time,_value\r\n\
,_result,0,2024-05-01T00:00:00Z,20.1\r\n\
,_result,0,2024-05-01T00:05:00Z,\r\n\
,_result,0,2024-05-01T00:10:00Z,20.4\r\n";

    #[test]
    fn one_point_per_row_in_input_order() {
        let points = parse_annotated_csv(RESPONSE).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].value, Some(20.1));
        assert_eq!(points[2].value, Some(20.4));
        assert!(points[0].time < points[1].time);
        assert!(points[1].time < points[2].time);
    }

    #[test]
    fn empty_value_cell_becomes_a_gap_not_zero() {
        let points = parse_annotated_csv(RESPONSE).unwrap();
        assert_eq!(points[1].value, None);
        assert_eq!(
            points[1].time,
            DateTime::parse_from_rfc3339("2024-05-01T00:05:00Z").unwrap()
        );
    }

    #[test]
    fn empty_response_yields_empty_series() {
        assert!(parse_annotated_csv("").unwrap().is_empty());
        assert!(parse_annotated_csv("\r\n").unwrap().is_empty());
    }

    #[test]
    fn repeated_header_from_second_table_is_handled() {
        let body = "\
,result,table,_time,_value\r\n\
,_result,0,2024-05-01T00:00:00Z,1.5\r\n\
\r\n\
#datatype,string,long,dateTime:RFC3339,double\r\n\
,result,table,_time,_value\r\n\
,_result,1,2024-05-01T00:05:00Z,2.5\r\n";
        let points = parse_annotated_csv(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, Some(2.5));
    }

    #[test]
    fn data_before_header_is_an_error() {
        let body = ",_result,0,2024-05-01T00:00:00Z,1.5\r\n";
        assert!(parse_annotated_csv(body).is_err());
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let body = "\
,result,table,_time,_value\r\n\
,_result,0,not-a-time,1.5\r\n";
        assert!(parse_annotated_csv(body).is_err());
    }
}
