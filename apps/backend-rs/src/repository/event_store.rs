use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::services::analytics::types::{BillboardMetadata, DetectionEvent, VisitEvent};

/// Read access to recorded detection and visit events.
///
/// Range bounds are inclusive on both ends. Implementations never mutate
/// the events they serve.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_detections(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<DetectionEvent>>;

    async fn get_visits(
        &self,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<VisitEvent>>;

    /// Whether `viewer_identity` has any detection in `org_id` strictly
    /// before `before`.
    async fn first_seen_before(
        &self,
        org_id: &str,
        viewer_identity: &str,
        before: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn get_billboard_metadata(
        &self,
        billboard_id: &str,
    ) -> AppResult<Option<BillboardMetadata>>;

    /// Subset of `identities` first seen in `org_id` before `before`.
    async fn first_seen_before_many(
        &self,
        org_id: &str,
        identities: &[String],
        before: DateTime<Utc>,
    ) -> AppResult<HashSet<String>> {
        let mut seen = HashSet::new();
        for identity in identities {
            if self.first_seen_before(org_id, identity, before).await? {
                seen.insert(identity.clone());
            }
        }
        Ok(seen)
    }

    /// Metadata for the registered billboards among `billboard_ids`.
    async fn get_billboard_metadata_many(
        &self,
        billboard_ids: &[String],
    ) -> AppResult<HashMap<String, BillboardMetadata>> {
        let mut found = HashMap::new();
        for billboard_id in billboard_ids {
            if let Some(metadata) = self.get_billboard_metadata(billboard_id).await? {
                found.insert(billboard_id.clone(), metadata);
            }
        }
        Ok(found)
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}
