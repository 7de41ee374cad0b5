// NetForensics Daemon - HTTP API
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! JSON API over the shared state.
//!
//! Handlers only read: they clone `Arc<Sample>` handles out of the history
//! and publisher and do all formatting outside any lock.

use crate::app::AppState;
use crate::metrics::encode_metrics;
use crate::persist::{to_csv, PersistError};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use netforensics::{ForensicsError, HealthStatus, HOURS};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Samples returned by `/history` when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// Largest accepted `/history` limit.
pub const MAX_HISTORY_LIMIT: i64 = 1000;
/// Largest accepted `/heatmap` span.
pub const MAX_HEATMAP_DAYS: i64 = 31;

const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ForensicsError> for ApiError {
    fn from(e: ForensicsError) -> Self {
        match e {
            ForensicsError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(e: PersistError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/state", get(state_handler))
        .route("/history", get(history_handler))
        .route("/heatmap", get(heatmap_handler))
        .route("/anomalies", get(anomalies_handler))
        .route("/stats", get(stats_handler))
        .route("/cells", get(cells_handler))
        .route("/export/history.csv", get(export_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>NetForensics</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
    </style>
</head>
<body>
    <h1>NetForensics</h1>
    <p>Cellular link monitor: radio, congestion or operator policy?</p>
    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/state">/state</a> - Latest sample</div>
        <div class="endpoint"><a href="/history">/history?limit=50&amp;page=0</a> - Recent samples, newest first</div>
        <div class="endpoint"><a href="/heatmap">/heatmap?days=5</a> - Mean PSI per day and hour</div>
        <div class="endpoint"><a href="/anomalies">/anomalies</a> - Accountability log</div>
        <div class="endpoint"><a href="/stats">/stats</a> - Hourly score floor, weekly and monthly</div>
        <div class="endpoint"><a href="/cells">/cells</a> - Serving-cell sessions</div>
        <div class="endpoint"><a href="/export/history.csv">/export/history.csv</a> - History as CSV</div>
        <div class="endpoint"><a href="/health">/health</a> - Collector health</div>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
    </div>
</body>
</html>"#,
    )
}

/// Latest sample, flattened, plus `uptime` in seconds, the verdict
/// `headline` and `monthly_usage_gb`.
async fn state_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.publisher.get_state();
    let uptime = snapshot.uptime.as_secs();
    let body = match snapshot.sample {
        Some(sample) => {
            let mut value = serde_json::to_value(sample.as_ref())
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            if let Value::Object(map) = &mut value {
                map.insert("uptime".to_string(), json!(uptime));
                map.insert("headline".to_string(), json!(sample.headline()));
                map.insert(
                    "monthly_usage_gb".to_string(),
                    json!(sample.monthly_usage_gb()),
                );
            }
            value
        }
        None => json!({ "score": null, "uptime": uptime }),
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
    page: Option<i64>,
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest(format!(
            "limit must be positive, got {limit}"
        )));
    }
    let page = query.page.unwrap_or(0);
    if page < 0 {
        return Err(ApiError::BadRequest(format!(
            "page must not be negative, got {page}"
        )));
    }
    let limit = limit.min(MAX_HISTORY_LIMIT);

    let samples = state.history.snapshot();
    let total = samples.len();
    let skip = usize::try_from(page.saturating_mul(limit)).unwrap_or(usize::MAX);
    let data: Vec<_> = samples.iter().rev().skip(skip).take(limit as usize).collect();
    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "total": total,
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    days: Option<i64>,
}

async fn heatmap_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<Value>, ApiError> {
    let days = query
        .days
        .unwrap_or(state.aggregator.config().heatmap_days as i64);
    if days <= 0 {
        return Err(ApiError::BadRequest(format!(
            "days must be positive, got {days}"
        )));
    }
    let samples = state.history.snapshot();
    let heatmap = state
        .aggregator
        .heatmap(&samples, days.min(MAX_HEATMAP_DAYS) as usize);
    Ok(Json(json!(heatmap)))
}

async fn anomalies_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let samples = state.history.snapshot();
    Json(json!({ "data": state.aggregator.anomalies(&samples) }))
}

/// Hourly score floor over the last week and month.
async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let samples = state.history.snapshot();
    let now = Utc::now();
    let by_hour = |days: i64| -> BTreeMap<usize, Option<f64>> {
        state
            .aggregator
            .hourly_floor(&samples, now, days)
            .into_iter()
            .enumerate()
            .take(HOURS)
            .collect()
    };
    Json(json!({
        "weekly": by_hour(WEEK_DAYS),
        "monthly": by_hour(MONTH_DAYS),
    }))
}

async fn cells_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (current, data) = {
        let cells = state.cells();
        (cells.current(), cells.sessions())
    };
    Json(json!({ "current": current, "data": data }))
}

async fn export_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let samples = state.history.snapshot();
    let body = to_csv(samples.iter().map(|s| s.as_ref()))?;
    let filename = format!(
        "attachment; filename=\"netforensics-{}.csv\"",
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    )
        .into_response())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health().report();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        encode_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TELEMETRY;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Duration;
    use netforensics::{
        CollectorError, CycleInput, EngineConfig, Pipeline, RadioReading, ThroughputReading,
    };
    use tower::ServiceExt;

    fn seeded_state(n: usize) -> Arc<AppState> {
        let state = Arc::new(AppState::default());
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let t0 = Utc::now() - Duration::minutes(n as i64);
        for i in 0..n {
            let sample = pipeline.process(
                CycleInput {
                    radio: Some(RadioReading {
                        sinr: Some(28.0),
                        rsrq: Some(-5.0),
                        rsrp: Some(-72.0),
                        band: Some("B3".to_string()),
                        pci: Some("101".to_string()),
                        enodeb: Some("51234".to_string()),
                    }),
                    throughput: Some(ThroughputReading {
                        down_mbps: 4.0,
                        down_mbps_initial: 20.0,
                        up_mbps: 1.0,
                        latency_samples: vec![],
                        rate_samples: vec![20.0, 19.0, 4.0, 4.1, 3.9, 4.0, 4.0, 4.1],
                        total_bytes: 4_000_000,
                    }),
                    ..Default::default()
                },
                t0 + Duration::minutes(i as i64),
            );
            let sample = Arc::new(sample);
            state.history.append(Arc::clone(&sample));
            state.cells_mut().observe(&sample);
            state.publisher.publish(sample);
        }
        state
    }

    async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let (status, body) = get(state, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_state_before_first_sample() {
        let (status, body) = get_json(Arc::new(AppState::default()), "/state").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["score"].is_null());
        assert!(body["uptime"].is_u64());
    }

    #[tokio::test]
    async fn test_state_is_flattened() {
        let (status, body) = get_json(seeded_state(3), "/state").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["score"].as_f64().unwrap() > 90.0);
        assert_eq!(body["verdict"], "policy");
        assert_eq!(body["band"], "B3");
        assert!(body.get("uptime").is_some());
    }

    #[tokio::test]
    async fn test_history_newest_first_and_capped() {
        let state = seeded_state(10);
        let (status, body) = get_json(Arc::clone(&state), "/history?limit=4").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 4);
        let newest = state.history.latest().unwrap();
        assert_eq!(
            data[0]["timestamp"],
            serde_json::to_value(newest.timestamp).unwrap()
        );

        let (_, body) = get_json(state, "/history").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 10);
        assert_eq!(body["total"], 10);
        assert_eq!(body["page"], 0);
    }

    #[tokio::test]
    async fn test_history_pages_back_in_time() {
        let state = seeded_state(10);
        let samples = state.history.snapshot();
        let (status, body) = get_json(Arc::clone(&state), "/history?limit=4&page=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 4);
        assert_eq!(body["total"], 10);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(
            data[0]["timestamp"],
            serde_json::to_value(samples[5].timestamp).unwrap()
        );

        let (_, body) = get_json(Arc::clone(&state), "/history?limit=4&page=2").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        let (_, body) = get_json(Arc::clone(&state), "/history?limit=4&page=9").await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = get_json(state, "/history?page=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_state_reports_usage_and_headline() {
        let (_, body) = get_json(seeded_state(3), "/state").await;
        assert_eq!(body["data_bytes"], 4_000_000);
        assert_eq!(body["monthly_bytes"], 12_000_000);
        assert_eq!(body["monthly_usage_gb"], 0.011);
        // Policy without earlier confirmations
        assert_eq!(body["confident"], false);
        assert_eq!(body["headline"], "Observed, low confidence");
    }

    #[tokio::test]
    async fn test_responses_allow_any_origin() {
        let request = Request::builder()
            .uri("/state")
            .header(header::ORIGIN, "http://dashboard.local")
            .body(Body::empty())
            .unwrap();
        let response = router(seeded_state(1)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_history_rejects_non_positive_limit() {
        for uri in ["/history?limit=0", "/history?limit=-3"] {
            let (status, body) = get_json(seeded_state(2), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_anomalies_and_heatmap() {
        let state = seeded_state(5);
        let (_, body) = get_json(Arc::clone(&state), "/anomalies").await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(data[0]["label"], "policy-like pattern");

        let (status, body) = get_json(Arc::clone(&state), "/heatmap?days=2").await;
        assert_eq!(status, StatusCode::OK);
        let days = body["days"].as_array().unwrap();
        assert!(!days.is_empty() && days.len() <= 2);
        assert_eq!(days[0]["hours"].as_array().unwrap().len(), HOURS);

        let (status, _) = get_json(state, "/heatmap?days=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_has_every_hour() {
        let (_, body) = get_json(seeded_state(3), "/stats").await;
        let weekly = body["weekly"].as_object().unwrap();
        assert_eq!(weekly.len(), HOURS);
        assert!(weekly.values().any(|v| v.is_number()));
        assert_eq!(body["monthly"].as_object().unwrap().len(), HOURS);
    }

    #[tokio::test]
    async fn test_cells_reports_open_session() {
        let (_, body) = get_json(seeded_state(3), "/cells").await;
        assert_eq!(body["current"]["pci"], "101");
        assert_eq!(body["current"]["samples"], 3);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (status, body) = get(seeded_state(4), "/export/history.csv").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("timestamp,"));
        assert_eq!(text.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_health_turns_unavailable() {
        let state = Arc::new(AppState::default());
        let (status, _) = get_json(Arc::clone(&state), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let err = CollectorError::Unavailable {
            collector: "sim-modem",
            reason: "gone".to_string(),
        };
        for _ in 0..5 {
            state.health_mut().record_failure(TELEMETRY, &err, Utc::now());
        }
        let (status, body) = get_json(state, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, body) = get(seeded_state(1), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).is_ok());
    }
}
