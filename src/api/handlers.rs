//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::arbitrage::{format_opportunities_table, Opportunity, OpportunityKind, Risk, DISCLAIMER};
use crate::error::ScanError;
use crate::scanner::{parse_filter, OpportunityQuery, Scanner, DEFAULT_LIMIT};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner>,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Ready once the first snapshot is published.
    pub fn is_ready(&self) -> bool {
        self.scanner.snapshot().is_published()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_scan: Option<OffsetDateTime>,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Query string of `GET /api/opportunities`.
#[derive(Debug, Default, Deserialize)]
pub struct OpportunitiesParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min_profit: Option<Decimal>,
    pub risk: Option<String>,
    #[serde(alias = "sport")]
    pub category: Option<String>,
    pub limit: Option<usize>,
    /// `text` renders the plain-text table.
    pub format: Option<String>,
}

impl OpportunitiesParams {
    fn to_query(&self) -> Result<OpportunityQuery, String> {
        Ok(OpportunityQuery {
            kind: parse_filter::<OpportunityKind>(self.kind.as_deref())?,
            min_profit: self.min_profit.unwrap_or(Decimal::ZERO),
            risk: parse_filter::<Risk>(self.risk.as_deref())?,
            category: self.category.clone(),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }
}

/// Body of `GET /api/opportunities`.
#[derive(Debug, Serialize)]
pub struct OpportunitiesResponse {
    pub count: usize,
    pub total_matching: usize,
    pub opportunities: Vec<Opportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub disclaimer: &'static str,
}

/// Query string of `GET /api/markets`.
#[derive(Debug, Default, Deserialize)]
pub struct MarketsParams {
    #[serde(alias = "sport")]
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - 200 after the first published scan, 503 before.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.scanner.snapshot();
    let response = ReadyResponse {
        ready: snapshot.is_published(),
        last_scan: snapshot.scan_timestamp,
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Filtered opportunities, most profitable first.
pub async fn opportunities(
    State(state): State<AppState>,
    Query(params): Query<OpportunitiesParams>,
) -> Response {
    let query = match params.to_query() {
        Ok(query) => query,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let result = state.scanner.query(&query);

    if params.format.as_deref() == Some("text") {
        let mut body = format_opportunities_table(&result.opportunities);
        if let Some(reason) = &result.reason {
            body.push_str(&format!("\n({})", reason));
        }
        body.push_str("\n\n");
        body.push_str(DISCLAIMER);
        return ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response();
    }

    Json(OpportunitiesResponse {
        count: result.opportunities.len(),
        total_matching: result.total_matching,
        opportunities: result.opportunities,
        reason: result.reason,
        disclaimer: DISCLAIMER,
    })
    .into_response()
}

/// One event group and its opportunities.
pub async fn opportunity_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Response {
    match state.scanner.group(&group_id) {
        Some(detail) => Json(detail).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("event group not found: {}", group_id),
        ),
    }
}

/// Run a scan now; 409 when one is already running.
pub async fn trigger_scan(State(state): State<AppState>) -> Response {
    match state.scanner.trigger_scan().await {
        Ok(report) => Json(report).into_response(),
        Err(e @ ScanError::ScanInProgress) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Cached markets and per-venue status.
pub async fn markets(
    State(state): State<AppState>,
    Query(params): Query<MarketsParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(500);
    Json(state.scanner.markets(params.category.as_deref(), limit))
}

/// Aggregate statistics.
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scanner.stats())
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics recorder not installed"),
    }
}
