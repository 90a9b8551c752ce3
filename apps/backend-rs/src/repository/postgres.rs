use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use super::event_store::EventStore;
use crate::error::{AppError, AppResult};
use crate::services::analytics::types::{BillboardMetadata, DetectionEvent, VisitEvent};

const DETECTIONS_SQL: &str = "SELECT b.billboard_id, d.viewer_identity, d.detected_at, d.duration
     FROM detections d
     JOIN billboards b ON b.id = d.billboard_id
     WHERE d.organization_id = $1
       AND d.detected_at >= $2
       AND d.detected_at <= $3
     ORDER BY d.detected_at";

const VISITS_SQL: &str = "SELECT s.store_id, v.viewer_identity, v.visited_at, v.duration,
            v.confidence_score, v.had_billboard_exposure
     FROM store_visits v
     JOIN stores s ON s.id = v.store_id
     WHERE v.organization_id = $1
       AND v.visited_at >= $2
       AND v.visited_at <= $3
     ORDER BY v.visited_at";

/// Event store backed by the analytics Postgres database.
///
/// New-viewer lookups hit `viewer_first_seen`, which holds one row per
/// identity and organization with its earliest detection there, instead of
/// scanning `detections`.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn get_detections(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<DetectionEvent>> {
        let rows = sqlx::query(DETECTIONS_SQL)
            .bind(org_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        rows.iter().map(read_detection).collect()
    }

    async fn get_visits(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<VisitEvent>> {
        let rows = sqlx::query(VISITS_SQL)
            .bind(org_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        rows.iter().map(read_visit).collect()
    }

    async fn first_seen_before(
        &self,
        org_id: &str,
        viewer_identity: &str,
        before: DateTime<Utc>,
    ) -> AppResult<bool> {
        let seen = self
            .first_seen_before_many(org_id, &[viewer_identity.to_string()], before)
            .await?;
        Ok(!seen.is_empty())
    }

    async fn get_billboard_metadata(
        &self,
        billboard_id: &str,
    ) -> AppResult<Option<BillboardMetadata>> {
        let mut found = self
            .get_billboard_metadata_many(&[billboard_id.to_string()])
            .await?;
        Ok(found.remove(billboard_id))
    }

    async fn first_seen_before_many(
        &self,
        org_id: &str,
        identities: &[String],
        before: DateTime<Utc>,
    ) -> AppResult<HashSet<String>> {
        if identities.is_empty() {
            return Ok(HashSet::new());
        }
        let mut query = first_seen_query(org_id, identities, before);
        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("viewer_identity").map_err(map_db_error))
            .collect()
    }

    async fn get_billboard_metadata_many(
        &self,
        billboard_ids: &[String],
    ) -> AppResult<HashMap<String, BillboardMetadata>> {
        if billboard_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT billboard_id, name, location
             FROM billboards
             WHERE billboard_id = ANY($1)",
        )
        .bind(billboard_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut found = HashMap::new();
        for row in rows {
            let billboard_id = row
                .try_get::<String, _>("billboard_id")
                .map_err(map_db_error)?;
            found.insert(
                billboard_id,
                BillboardMetadata {
                    name: row.try_get("name").map_err(map_db_error)?,
                    location: row.try_get("location").map_err(map_db_error)?,
                },
            );
        }
        Ok(found)
    }

    async fn health_check(&self) -> AppResult<()> {
        // Bounded so the healthcheck answers quickly even when the first
        // connection hangs.
        match tokio::time::timeout(
            Duration::from_secs(3),
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(map_db_error(error)),
            Err(_) => {
                tracing::error!("Event store health query timed out (3s)");
                Err(AppError::Dependency(
                    "Event store health query timed out.".to_string(),
                ))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn first_seen_query(
    org_id: &str,
    identities: &[String],
    before: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT viewer_identity FROM viewer_first_seen WHERE organization_id = ",
    );
    query
        .push_bind(org_id.to_string())
        .push(" AND viewer_identity = ANY(")
        .push_bind(identities.to_vec())
        .push(") AND first_seen_at < ")
        .push_bind(before);
    query
}

fn read_detection(row: &PgRow) -> AppResult<DetectionEvent> {
    Ok(DetectionEvent {
        billboard_id: row.try_get("billboard_id").map_err(map_db_error)?,
        viewer_identity: row.try_get("viewer_identity").map_err(map_db_error)?,
        detected_at: row.try_get("detected_at").map_err(map_db_error)?,
        view_duration: row
            .try_get::<Option<f64>, _>("duration")
            .map_err(map_db_error)?
            .unwrap_or(0.0),
    })
}

fn read_visit(row: &PgRow) -> AppResult<VisitEvent> {
    Ok(VisitEvent {
        store_id: row.try_get("store_id").map_err(map_db_error)?,
        viewer_identity: row.try_get("viewer_identity").map_err(map_db_error)?,
        visited_at: row.try_get("visited_at").map_err(map_db_error)?,
        duration: row
            .try_get::<Option<f64>, _>("duration")
            .map_err(map_db_error)?
            .unwrap_or(0.0),
        confidence_score: row
            .try_get::<Option<f64>, _>("confidence_score")
            .map_err(map_db_error)?
            .unwrap_or(0.0),
        had_billboard_exposure: row
            .try_get::<Option<bool>, _>("had_billboard_exposure")
            .map_err(map_db_error)?
            .unwrap_or(false),
    })
}

fn map_db_error(error: sqlx::Error) -> AppError {
    tracing::error!(db_error = %error, "Event store query failed");
    AppError::Dependency("Event store query failed.".to_string())
}
