use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::poller::SharedState;
use crate::view;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub dashboard: SharedState,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn dashboard_page(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.dashboard.read().await.clone();
    Html(view::render_page(&snapshot, &state.config))
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{shared_state, DashboardState};
    use crate::series::ChartPoint;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(DashboardConfig {
                influx_url: "http://localhost:8086".to_string(),
                influx_org: "home".to_string(),
                influx_bucket: "sensors".to_string(),
                influx_token: "secret".to_string(),
                measurement: "environment".to_string(),
                device: "bme280".to_string(),
                poll_interval_secs: 60,
                range_hours: 24,
                window_minutes: 5,
            }),
            dashboard: shared_state(),
        }
    }

    async fn get_body(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let (status, body) = get_body(test_state(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn root_serves_loading_page_before_first_cycle() {
        let (status, body) = get_body(test_state(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Loading sensor data"));
    }

    #[tokio::test]
    async fn root_serves_charts_once_state_is_ready() {
        let state = test_state();
        {
            let series = vec![ChartPoint {
                time: Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap(),
                value: Some(21.3),
            }];
            let mut guard = state.dashboard.write().await;
            *guard = DashboardState {
                loading: false,
                error: false,
                temperature: series.clone(),
                humidity: series.clone(),
                pressure: series,
                updated_at: Some(Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap()),
            };
        }
        let (status, body) = get_body(state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h2>Temperature</h2>"));
        assert!(body.contains("21.3 °C"));
    }
}
