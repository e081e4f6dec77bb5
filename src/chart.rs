use chrono::Local;

use crate::series::{latest_displayable, ChartPoint, Metric};

const WIDTH: f64 = 380.0;
const HEIGHT: f64 = 200.0;
const MARGIN_LEFT: f64 = 52.0;
const MARGIN_RIGHT: f64 = 12.0;
const MARGIN_TOP: f64 = 12.0;
const MARGIN_BOTTOM: f64 = 26.0;
const Y_TICKS: u32 = 4;
const X_TICKS: u32 = 4;

pub fn format_value(value: f64) -> String {
    format!("{value:.1}")
}

/// One metric card: title, latest-value summary and the area chart.
pub fn render_card(metric: Metric, series: &[ChartPoint]) -> String {
    let latest = match latest_displayable(series) {
        Some(value) => format!("{} {}", format_value(value), metric.unit()),
        None => "no data".to_string(),
    };
    format!(
        "<div class=\"card\">\n\
         <div class=\"card-head\"><h2>{title}</h2><span class=\"latest\">{latest}</span></div>\n\
         {chart}\n\
         </div>",
        title = metric.title(),
        chart = render_chart(metric, series),
    )
}

/// Renders a series as an inline SVG area chart.
///
/// The x axis is a numeric time scale over the actual min/max of the
/// series, so gaps in time keep their real width. A point without a
/// value breaks the area path; it is never drawn at zero. Hover
/// tooltips come from per-point `<title>` elements.
pub fn render_chart(metric: Metric, series: &[ChartPoint]) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let mut svg = format!(
        "<svg viewBox=\"0 0 {WIDTH} {HEIGHT}\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         role=\"img\" aria-label=\"{title}\">\n\
         <rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" width=\"{plot_w}\" height=\"{plot_h}\" \
         fill=\"none\" stroke=\"#dee2e6\"/>\n",
        title = metric.title(),
    );

    let values: Vec<f64> = series.iter().filter_map(|point| point.value).collect();
    if values.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"middle\" class=\"placeholder\">\
             no data available</text>\n</svg>",
            x = MARGIN_LEFT + plot_w / 2.0,
            y = MARGIN_TOP + plot_h / 2.0,
        ));
        return svg;
    }

    let t_min = series.first().map(|p| p.time.timestamp_millis()).unwrap_or(0) as f64;
    let t_max = series.last().map(|p| p.time.timestamp_millis()).unwrap_or(0) as f64;
    let t_span = (t_max - t_min).max(1.0);

    let v_min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let v_max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let pad = ((v_max - v_min) * 0.05).max(0.1);
    let y_lo = v_min - pad;
    let y_hi = v_max + pad;

    let x_of = |t: f64| MARGIN_LEFT + (t - t_min) / t_span * plot_w;
    let y_of = |v: f64| MARGIN_TOP + (y_hi - v) / (y_hi - y_lo) * plot_h;
    let baseline = MARGIN_TOP + plot_h;

    // Consecutive valued points form one segment; a gap starts a new one.
    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for point in series {
        match point.value {
            Some(value) => {
                let x = x_of(point.time.timestamp_millis() as f64);
                current.push((x, y_of(value)));
            }
            None => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    let mut area = String::new();
    let mut line = String::new();
    for segment in &segments {
        if segment.len() < 2 {
            continue;
        }
        let first = segment[0];
        let last = segment[segment.len() - 1];
        area.push_str(&format!("M {:.1} {baseline:.1} ", first.0));
        line.push_str(&format!("M {:.1} {:.1} ", first.0, first.1));
        for (x, y) in segment {
            area.push_str(&format!("L {x:.1} {y:.1} "));
        }
        for (x, y) in &segment[1..] {
            line.push_str(&format!("L {x:.1} {y:.1} "));
        }
        area.push_str(&format!("L {:.1} {baseline:.1} Z ", last.0));
    }
    if !area.is_empty() {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{}\" stroke=\"none\"/>\n",
            area.trim_end(),
            metric.fill(),
        ));
    }
    if !line.is_empty() {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>\n",
            line.trim_end(),
            metric.stroke(),
        ));
    }

    for tick in 0..=Y_TICKS {
        let v = y_lo + (y_hi - y_lo) * f64::from(tick) / f64::from(Y_TICKS);
        let y = y_of(v);
        svg.push_str(&format!(
            "<line x1=\"{x1}\" y1=\"{y:.1}\" x2=\"{x2:.1}\" y2=\"{y:.1}\" stroke=\"#f1f3f5\"/>\n\
             <text x=\"{tx:.1}\" y=\"{ty:.1}\" text-anchor=\"end\" class=\"tick\">{label} {unit}</text>\n",
            x1 = MARGIN_LEFT,
            x2 = MARGIN_LEFT + plot_w,
            tx = MARGIN_LEFT - 4.0,
            ty = y + 3.0,
            label = format_value(v),
            unit = metric.unit(),
        ));
    }

    for tick in 0..=X_TICKS {
        let t = t_min + t_span * f64::from(tick) / f64::from(X_TICKS);
        let time = chrono::DateTime::from_timestamp_millis(t as i64)
            .map(|dt| dt.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_default();
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"middle\" class=\"tick\">{time}</text>\n",
            x = x_of(t),
            y = baseline + 16.0,
        ));
    }

    for point in series {
        let Some(value) = point.value else { continue };
        let x = x_of(point.time.timestamp_millis() as f64);
        let y = y_of(value);
        let stamp = point
            .time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        svg.push_str(&format!(
            "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"3\" fill=\"{stroke}\">\
             <title>{stamp}: {value} {unit}</title></circle>\n",
            stroke = metric.stroke(),
            value = format_value(value),
            unit = metric.unit(),
        ));
    }

    svg.push_str("</svg>");
    svg
}
