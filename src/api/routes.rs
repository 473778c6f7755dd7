//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    health, markets, metrics, opportunities, opportunity_group, ready, stats, trigger_scan,
    AppState,
};
use super::websocket::websocket_handler;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Scanner surface
        .route("/api/opportunities", get(opportunities))
        .route("/api/opportunities/:group_id", get(opportunity_group))
        .route("/api/scan", post(trigger_scan))
        .route("/api/markets", get(markets))
        .route("/api/stats", get(stats))
        .route("/metrics", get(metrics))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::config::{DetectionSettings, MatchSettings, ScanSettings};
    use crate::market::{MockConfig, MockVenueClient, RawMarket, VenueClient};
    use crate::scanner::Scanner;

    fn venue(id: &str, yes: rust_decimal::Decimal, no: rust_decimal::Decimal) -> Arc<dyn VenueClient> {
        Arc::new(MockVenueClient::new(id).with_market(RawMarket::with_decimal_odds(
            &format!("{}-fed", id),
            "Will the Fed cut rates in March?",
            Some("economics"),
            &[("Yes", yes), ("No", no)],
        )))
    }

    fn scanner(venues: Vec<Arc<dyn VenueClient>>) -> Arc<Scanner> {
        Arc::new(Scanner::new(
            venues,
            &MatchSettings::default(),
            DetectionSettings::default(),
            ScanSettings {
                interval: Duration::from_secs(3600),
                venue_timeout: Duration::from_millis(1000),
                cycle_timeout: Duration::from_millis(3000),
                broadcast_capacity: 4,
            },
        ))
    }

    fn arb_scanner() -> Arc<Scanner> {
        scanner(vec![
            venue("alpha", dec!(2.10), dec!(1.70)),
            venue("beta", dec!(1.75), dec!(2.05)),
        ])
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(AppState::new(arb_scanner()));
        let (status, _) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_before_first_scan() {
        let app = create_router(AppState::new(arb_scanner()));
        let (status, _) = get(app, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_after_scan() {
        let scanner = arb_scanner();
        scanner.trigger_scan().await.unwrap();
        let app = create_router(AppState::new(scanner));
        let (status, _) = get(app, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn opportunities_before_scan_carry_reason() {
        let app = create_router(AppState::new(arb_scanner()));
        let (status, body) = get(app, "/api/opportunities").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 0);
        assert_eq!(json["reason"], "no scan has completed yet");
    }

    #[tokio::test]
    async fn scan_then_query() {
        let scanner = arb_scanner();
        let state = AppState::new(scanner);

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/scan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, body) = get(create_router(state.clone()), "/api/opportunities?type=ARBITRAGE&risk=all").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["opportunities"][0]["type"], "ARBITRAGE");
        let group_id = json["opportunities"][0]["event_group_id"].as_str().unwrap().to_string();

        let (status, body) = get(create_router(state.clone()), &format!("/api/opportunities/{}", group_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"outcome_alignment\""));

        let (status, _) = get(create_router(state.clone()), "/api/opportunities/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(create_router(state.clone()), "/api/opportunities?format=text").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Type"));
        assert!(body.contains("DISCLAIMER"));

        let (_, body) = get(create_router(state.clone()), "/api/stats").await;
        let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(stats["scans_completed"], 1);
        assert_eq!(stats["by_type"]["ARBITRAGE"], 1);

        let (_, body) = get(create_router(state), "/api/markets?category=economics").await;
        let markets: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(markets["total_markets"], 4);
        assert_eq!(markets["venues"]["alpha"]["state"], "active");
    }

    #[tokio::test]
    async fn bad_filter_is_400() {
        let app = create_router(AppState::new(arb_scanner()));
        let (status, _) = get(app, "/api/opportunities?risk=extreme").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn concurrent_scan_is_409() {
        let slow = Arc::new(
            MockVenueClient::new("slow").with_config(MockConfig {
                latency_ms: 300,
                fail_with: None,
            }),
        );
        let scanner = scanner(vec![slow]);
        let state = AppState::new(scanner.clone());

        let first = tokio::spawn({
            let scanner = scanner.clone();
            async move { scanner.trigger_scan().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/scan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "scan already in progress");

        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let app = create_router(AppState::new(arb_scanner()));
        let (status, _) = get(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
