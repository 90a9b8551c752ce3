use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::event_store::EventStore,
    schemas::{validate_input, AnalyticsQuery},
    services::analytics::{
        period::{ensure_within, resolve_instants, resolve_relative},
        report::generate_report,
        types::{AnalyticsReport, Period},
        ReportOptions,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/analytics", axum::routing::get(billboard_analytics))
}

async fn billboard_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<AnalyticsReport>> {
    validate_input(&query)?;
    let store = event_store(&state)?;

    let period = resolve_requested_period(&query, Utc::now().date_naive(), &state.config)?;
    let mut options = ReportOptions::from_config(&state.config);
    options.ranking_limit = query.top;

    let report = generate_report(store, query.org_id.trim(), &period, &options).await?;
    Ok(Json(report))
}

fn event_store(state: &AppState) -> AppResult<&dyn EventStore> {
    state.event_store.as_deref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Event store is not configured. Set DATABASE_URL or LOCAL_EVENTS_PATH.".to_string(),
        )
    })
}

/// Explicit `start`/`end` must come together; otherwise `range` (or the
/// configured default) is resolved against `today`.
fn resolve_requested_period(
    query: &AnalyticsQuery,
    today: NaiveDate,
    config: &AppConfig,
) -> AppResult<Period> {
    let start = non_empty_opt(query.start.as_deref());
    let end = non_empty_opt(query.end.as_deref());

    let period = match (start, end) {
        (Some(start), Some(end)) => resolve_instants(parse_instant(start)?, parse_instant(end)?)?,
        (None, None) => {
            let range = non_empty_opt(query.range.as_deref())
                .unwrap_or(config.default_report_range.as_str());
            resolve_relative(range, today)?
        }
        _ => {
            return Err(AppError::BadRequest(
                "start and end must be provided together.".to_string(),
            ))
        }
    };

    ensure_within(&period, config.max_report_days)?;
    Ok(period)
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339 with any offset.
fn parse_instant(value: &str) -> AppResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| AppError::BadRequest("Invalid ISO date.".to_string()))
}

fn non_empty_opt(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|item| !item.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{parse_instant, resolve_requested_period};
    use crate::{
        config::AppConfig, error::AppError, repository::memory::InMemoryEventStore,
        routes::v1_router, schemas::AnalyticsQuery, state::AppState,
    };

    const FIXTURE: &str = r#"{
        "detections": [
            {"org_id": "default_org", "billboard_id": "b1", "viewer_identity": "alice",
             "detected_at": "2025-11-03T10:00:00Z", "view_duration": 120.0},
            {"org_id": "default_org", "billboard_id": "b1", "viewer_identity": "bob",
             "detected_at": "2025-11-04T10:00:00Z", "view_duration": 60.0},
            {"org_id": "default_org", "billboard_id": "b2", "viewer_identity": "alice",
             "detected_at": "2025-11-05T10:00:00Z", "view_duration": 30.0}
        ],
        "visits": [
            {"org_id": "default_org", "store_id": "s1", "viewer_identity": "alice",
             "visited_at": "2025-11-03T12:00:00Z", "duration": 600.0, "confidence_score": 0.9},
            {"org_id": "default_org", "store_id": "s1", "viewer_identity": "alice",
             "visited_at": "2025-11-05T12:00:00Z", "duration": 300.0, "confidence_score": 0.8}
        ],
        "billboards": [
            {"billboard_id": "b1", "name": "Gangnam North", "location": "Gangnam Station"}
        ]
    }"#;

    fn query(start: Option<&str>, end: Option<&str>, range: Option<&str>) -> AnalyticsQuery {
        AnalyticsQuery {
            org_id: "default_org".to_string(),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            range: range.map(str::to_string),
            top: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 7).unwrap()
    }

    fn app(with_store: bool) -> axum::Router {
        let store = with_store.then(|| {
            Arc::new(InMemoryEventStore::from_json(FIXTURE).expect("fixture"))
                as Arc<dyn crate::repository::event_store::EventStore>
        });
        let state = AppState::with_store(AppConfig::for_tests(), store);
        axum::Router::new()
            .nest("/v1", v1_router())
            .with_state(state)
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[test]
    fn parses_dates_and_rfc3339() {
        assert_eq!(
            parse_instant("2025-11-01").unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2025-11-01T09:00:00+09:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_instant("11/01/2025"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn explicit_bounds_win_over_range() {
        let config = AppConfig::for_tests();
        let period = resolve_requested_period(
            &query(Some("2025-11-01"), Some("2025-11-07"), Some("today")),
            today(),
            &config,
        )
        .unwrap();
        assert_eq!(period.days, 7);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn falls_back_to_default_range() {
        let config = AppConfig::for_tests();
        let period = resolve_requested_period(&query(None, None, None), today(), &config).unwrap();
        assert_eq!(period.days, 7);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_half_open_and_oversized_periods() {
        let mut config = AppConfig::for_tests();
        assert!(matches!(
            resolve_requested_period(&query(Some("2025-11-01"), None, None), today(), &config),
            Err(AppError::BadRequest(_))
        ));

        config.max_report_days = 30;
        assert!(matches!(
            resolve_requested_period(&query(None, None, Some("31d")), today(), &config),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn serves_report_for_explicit_period() {
        let (status, body) = get(
            app(true),
            "/v1/analytics?org_id=default_org&start=2025-11-03&end=2025-11-05",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["org_id"], "default_org");
        assert_eq!(body["period"]["days"], 3);
        assert_eq!(body["period"]["end"], "2025-11-05T23:59:59Z");
        assert_eq!(body["data"]["summary"]["total_viewers"], 2);
        assert_eq!(body["data"]["daily_history"].as_array().map(Vec::len), Some(3));

        let ranking = body["data"]["ranking"].as_array().expect("ranking");
        assert_eq!(ranking[0]["billboard_id"], "b1");
        assert_eq!(ranking[0]["name"], "Gangnam North");
        assert_eq!(ranking[1]["billboard_id"], "b2");
    }

    #[tokio::test]
    async fn top_limits_ranking_rows() {
        let (status, body) = get(
            app(true),
            "/v1/analytics?org_id=default_org&start=2025-11-03&end=2025-11-05&top=1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["ranking"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn reversed_period_is_bad_request() {
        let (status, body) = get(
            app(true),
            "/v1/analytics?org_id=default_org&start=2025-11-05&end=2025-11-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap_or_default().starts_with("Invalid range"));
    }

    #[tokio::test]
    async fn half_open_period_is_bad_request() {
        let (status, _) = get(app(true), "/v1/analytics?org_id=default_org&start=2025-11-05").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_org_is_unprocessable() {
        let (status, _) = get(app(true), "/v1/analytics?org_id=&range=7d").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn blank_org_is_unprocessable() {
        let (status, _) = get(app(true), "/v1/analytics?org_id=%20%20&range=7d").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn earliest_representable_date_is_bad_request() {
        let earliest = NaiveDate::MIN.format("%Y-%m-%d").to_string();
        let (status, body) = get(
            app(true),
            &format!("/v1/analytics?org_id=default_org&start={earliest}&end={earliest}"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap_or_default().starts_with("Invalid range"));
    }

    #[tokio::test]
    async fn missing_store_is_unavailable() {
        let (status, body) = get(app(false), "/v1/analytics?org_id=default_org&range=7d").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"].as_str().unwrap_or_default().contains("LOCAL_EVENTS_PATH"));
    }
}
