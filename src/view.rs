use chrono::Local;

use crate::chart;
use crate::config::DashboardConfig;
use crate::poller::DashboardState;
use crate::series::Metric;

const STYLE: &str = "\
body { font-family: system-ui, sans-serif; margin: 24px; color: #212529; }\n\
h1 { margin-bottom: 4px; }\n\
.subtitle { color: #868e96; margin-top: 0; }\n\
.updated { color: #495057; }\n\
.status { font-size: 1.1em; }\n\
.status.error { color: #c92a2a; }\n\
.charts { display: flex; flex-wrap: wrap; gap: 16px; }\n\
.card { border: 1px solid #dee2e6; border-radius: 8px; padding: 12px; }\n\
.card-head { display: flex; justify-content: space-between; align-items: baseline; }\n\
.card-head h2 { margin: 0; font-size: 1em; }\n\
.latest { font-size: 1.4em; font-weight: 600; }\n\
.tick { font-size: 9px; fill: #868e96; }\n\
.placeholder { fill: #868e96; }\n";

/// Renders the whole page from one state snapshot. While a cycle is in
/// flight the page shows the loading state; a failed cycle shows one
/// generic error, never per-metric detail.
pub fn render_page(state: &DashboardState, config: &DashboardConfig) -> String {
    let (refresh_secs, body) = if state.loading {
        (2, "<p class=\"status\">Loading sensor data…</p>".to_string())
    } else if state.error {
        (
            config.poll_interval_secs,
            "<p class=\"status error\">Failed to load sensor data. \
             The dashboard retries automatically.</p>"
                .to_string(),
        )
    } else {
        let updated_line = state
            .updated_at
            .map(|ts| {
                format!(
                    "<p class=\"updated\">Updated at {}</p>",
                    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                )
            })
            .unwrap_or_default();
        let cards: Vec<String> = Metric::ALL
            .iter()
            .map(|metric| chart::render_card(*metric, state.series(*metric)))
            .collect();
        (
            config.poll_interval_secs,
            format!(
                "{updated_line}\n<div class=\"charts\">\n{}\n</div>",
                cards.join("\n")
            ),
        )
    };

    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\n\
         <title>Environment Dashboard</title>\n\
         <style>\n{STYLE}</style>\n\
         </head>\n\
         <body>\n\
         <h1>Environment Dashboard</h1>\n\
         <p class=\"subtitle\">bucket {bucket} · device {device}</p>\n\
         {body}\n\
         </body>\n\
         </html>\n",
        bucket = escape_html(&config.influx_bucket),
        device = escape_html(&config.device),
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
