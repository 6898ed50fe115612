use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::acquire::MediaType;
use crate::schema::ExtractionResult;
use crate::ExtractionPipeline;

/// One uploaded artifact, immutable once stored.
#[derive(Debug, Clone)]
pub struct RawSubmission {
    pub id: Uuid,
    pub file_name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
    /// Explicit link to an existing case, when the caller supplied one.
    pub case_id: Option<Uuid>,
    /// Sibling artifacts uploaded in the same batch, caller-supplied.
    pub related_artifact_ids: Vec<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

impl RawSubmission {
    pub fn new(file_name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            media_type,
            bytes,
            case_id: None,
            related_artifact_ids: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_case(mut self, case_id: Uuid) -> Self {
        self.case_id = Some(case_id);
        self
    }

    pub fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            id: self.id,
            media_type: self.media_type,
            case_id: self.case_id,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Queryable processing state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
struct ArtifactState {
    meta: ArtifactMeta,
    status: ArtifactStatus,
    error: Option<String>,
    result: Option<ExtractionResult>,
}

/// The identity and timing facts about an artifact that sibling discovery
/// needs. Carried explicitly rather than held as ambient session state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: Uuid,
    pub media_type: MediaType,
    pub case_id: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

/// Snapshot returned to status pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: ArtifactStatus,
    pub error: Option<String>,
}

/// In-process registry of artifact states. Extraction runs out-of-band; the
/// upload path registers the artifact and returns immediately, and callers
/// poll or re-fetch.
#[derive(Default)]
pub struct ArtifactRegistry {
    inner: RwLock<HashMap<Uuid, ArtifactState>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, submission: &RawSubmission) {
        let mut inner = self.inner.write().await;
        inner.insert(
            submission.id,
            ArtifactState {
                meta: submission.meta(),
                status: ArtifactStatus::Pending,
                error: None,
                result: None,
            },
        );
    }

    pub async fn mark_processing(&self, id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.get_mut(&id) {
            state.status = ArtifactStatus::Processing;
        }
    }

    pub async fn mark_completed(&self, id: Uuid, result: ExtractionResult) {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.get_mut(&id) {
            state.status = ArtifactStatus::Completed;
            state.error = None;
            state.result = Some(result);
        }
    }

    pub async fn mark_failed(&self, id: Uuid, message: String) {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.get_mut(&id) {
            state.status = ArtifactStatus::Failed;
            state.error = Some(message);
        }
    }

    pub async fn status(&self, id: Uuid) -> Option<StatusReport> {
        let inner = self.inner.read().await;
        inner.get(&id).map(|state| StatusReport {
            status: state.status,
            error: state.error.clone(),
        })
    }

    pub async fn result(&self, id: Uuid) -> Option<ExtractionResult> {
        let inner = self.inner.read().await;
        inner.get(&id).and_then(|state| state.result.clone())
    }

    pub async fn artifacts(&self) -> Vec<ArtifactMeta> {
        let inner = self.inner.read().await;
        inner.values().map(|state| state.meta).collect()
    }
}

/// Upload-facing boundary: accepts an artifact, returns immediately, and
/// completes extraction on a background task with a queryable status flag.
pub struct Intake {
    registry: Arc<ArtifactRegistry>,
    pipeline: Arc<ExtractionPipeline>,
}

impl Intake {
    pub fn new(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self {
            registry: Arc::new(ArtifactRegistry::new()),
            pipeline,
        }
    }

    pub fn registry(&self) -> Arc<ArtifactRegistry> {
        Arc::clone(&self.registry)
    }

    /// Register the artifact and kick off extraction out-of-band. One
    /// extraction in flight per artifact; a failed attempt leaves the
    /// artifact `Failed` with a stored message, safely retryable via a new
    /// submission of the same bytes.
    pub async fn submit(&self, submission: RawSubmission) -> Uuid {
        let id = submission.id;
        self.registry.register(&submission).await;
        info!("Accepted artifact {} ({})", id, submission.file_name);

        let registry = Arc::clone(&self.registry);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            registry.mark_processing(id).await;
            match pipeline.process(&submission).await {
                Ok(result) => registry.mark_completed(id, result).await,
                Err(e) => {
                    error!("Extraction of artifact {} failed: {}", id, e);
                    registry.mark_failed(id, e.to_string()).await;
                }
            }
        });
        id
    }
}

/// A pair of artifacts worth offering as merge candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingSuggestion {
    pub first: Uuid,
    pub second: Uuid,
}

/// Discover merge candidates among unassigned financial-model uploads that
/// landed within the trailing window of each other.
///
/// Pure suggestion: nothing is linked or merged here. Applying a merge still
/// requires the caller to confirm the pair explicitly and invoke
/// [`crate::merge::merge`]; discovery without confirmation never changes
/// data.
pub fn suggest_siblings(artifacts: &[ArtifactMeta], window_secs: i64) -> Vec<SiblingSuggestion> {
    let mut suggestions = Vec::new();
    let candidates: Vec<&ArtifactMeta> = artifacts
        .iter()
        .filter(|meta| meta.case_id.is_none() && meta.media_type == MediaType::Spreadsheet)
        .collect();

    for (idx, first) in candidates.iter().enumerate() {
        for second in &candidates[idx + 1..] {
            let gap = (second.uploaded_at - first.uploaded_at).num_seconds().abs();
            if gap <= window_secs {
                suggestions.push(SiblingSuggestion {
                    first: first.id,
                    second: second.id,
                });
            }
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn meta(media_type: MediaType, case_id: Option<Uuid>, offset_secs: i64) -> ArtifactMeta {
        ArtifactMeta {
            id: Uuid::new_v4(),
            media_type,
            case_id,
            uploaded_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_unassigned_models_within_window_are_suggested() {
        let a = meta(MediaType::Spreadsheet, None, 0);
        let b = meta(MediaType::Spreadsheet, None, 120);
        let suggestions = suggest_siblings(&[a, b], 300);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].first, a.id);
        assert_eq!(suggestions[0].second, b.id);
    }

    #[test]
    fn test_outside_window_not_suggested() {
        let a = meta(MediaType::Spreadsheet, None, 0);
        let b = meta(MediaType::Spreadsheet, None, 301);
        assert!(suggest_siblings(&[a, b], 300).is_empty());
    }

    #[test]
    fn test_assigned_or_non_model_artifacts_ignored() {
        let assigned = meta(MediaType::Spreadsheet, Some(Uuid::new_v4()), 0);
        let pdf = meta(MediaType::Pdf, None, 10);
        let model = meta(MediaType::Spreadsheet, None, 20);
        assert!(suggest_siblings(&[assigned, pdf, model], 300).is_empty());
    }

    #[tokio::test]
    async fn test_registry_status_lifecycle() {
        let registry = ArtifactRegistry::new();
        let submission = RawSubmission::new("notes.txt", MediaType::PlainText, b"hello".to_vec());
        registry.register(&submission).await;

        assert_eq!(
            registry.status(submission.id).await.unwrap().status,
            ArtifactStatus::Pending
        );

        registry.mark_processing(submission.id).await;
        assert_eq!(
            registry.status(submission.id).await.unwrap().status,
            ArtifactStatus::Processing
        );

        registry
            .mark_failed(submission.id, "corrupt file".to_string())
            .await;
        let report = registry.status(submission.id).await.unwrap();
        assert_eq!(report.status, ArtifactStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("corrupt file"));
    }
}
