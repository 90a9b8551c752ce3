use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::event_store::EventStore;
use crate::error::{AppError, AppResult};
use crate::services::analytics::types::{BillboardMetadata, DetectionEvent, VisitEvent};

#[derive(Debug, Clone, Deserialize)]
struct OrgDetection {
    org_id: String,
    #[serde(flatten)]
    event: DetectionEvent,
}

#[derive(Debug, Clone, Deserialize)]
struct OrgVisit {
    org_id: String,
    #[serde(flatten)]
    event: VisitEvent,
}

#[derive(Debug, Clone, Deserialize)]
struct RegisteredBillboard {
    billboard_id: String,
    #[serde(flatten)]
    metadata: BillboardMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    detections: Vec<OrgDetection>,
    #[serde(default)]
    visits: Vec<OrgVisit>,
    #[serde(default)]
    billboards: Vec<RegisteredBillboard>,
}

/// Event store held entirely in memory, loaded from a JSON fixture for local
/// development or assembled record by record in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventStore {
    detections: Vec<OrgDetection>,
    visits: Vec<OrgVisit>,
    billboards: HashMap<String, BillboardMetadata>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{"detections": [...], "visits": [...], "billboards": [...]}`.
    /// Every detection and visit carries an `org_id`.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let fixture: Fixture = serde_json::from_str(raw)
            .map_err(|error| AppError::Internal(format!("Invalid events fixture: {error}")))?;
        Ok(Self {
            detections: fixture.detections,
            visits: fixture.visits,
            billboards: fixture
                .billboards
                .into_iter()
                .map(|item| (item.billboard_id, item.metadata))
                .collect(),
        })
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            AppError::Internal(format!(
                "Could not read events fixture {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn with_detection(mut self, org_id: &str, event: DetectionEvent) -> Self {
        self.detections.push(OrgDetection {
            org_id: org_id.to_string(),
            event,
        });
        self
    }

    pub fn with_visit(mut self, org_id: &str, event: VisitEvent) -> Self {
        self.visits.push(OrgVisit {
            org_id: org_id.to_string(),
            event,
        });
        self
    }

    pub fn with_billboard(mut self, billboard_id: &str, metadata: BillboardMetadata) -> Self {
        self.billboards.insert(billboard_id.to_string(), metadata);
        self
    }

    pub fn event_count(&self) -> usize {
        self.detections.len() + self.visits.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_detections(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<DetectionEvent>> {
        let mut found = self
            .detections
            .iter()
            .filter(|item| item.org_id == org_id)
            .filter(|item| item.event.detected_at >= start && item.event.detected_at <= end)
            .map(|item| item.event.clone())
            .collect::<Vec<_>>();
        found.sort_by_key(|event| event.detected_at);
        Ok(found)
    }

    async fn get_visits(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<VisitEvent>> {
        let mut found = self
            .visits
            .iter()
            .filter(|item| item.org_id == org_id)
            .filter(|item| item.event.visited_at >= start && item.event.visited_at <= end)
            .map(|item| item.event.clone())
            .collect::<Vec<_>>();
        found.sort_by_key(|event| event.visited_at);
        Ok(found)
    }

    async fn first_seen_before(
        &self,
        org_id: &str,
        viewer_identity: &str,
        before: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self.detections.iter().any(|item| {
            item.org_id == org_id
                && item.event.viewer_identity == viewer_identity
                && item.event.detected_at < before
        }))
    }

    async fn get_billboard_metadata(
        &self,
        billboard_id: &str,
    ) -> AppResult<Option<BillboardMetadata>> {
        Ok(self.billboards.get(billboard_id).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
