//! Report submission flow.
//!
//! Orchestrates a single user-initiated report creation end to end:
//!
//! ```text
//! Idle -> Validating -> (ImageUploading) -> Persisting -> Recording -> Done
//!                 \___________________________________________________-> Failed
//! ```
//!
//! Each flow instance serves exactly one in-flight submission; the steps are
//! suspending operations executed strictly in order, never in parallel. The
//! ordering guarantee follows from the shape of the flow: the first timeline
//! entry is only appended after the report row is durably committed, so a
//! timeline entry is never observable before its report.
//!
//! Two steps are best-effort by design:
//! - image upload: a failed upload is logged and the flow proceeds without an
//!   image reference, because a photo must not block a rescue;
//! - the first timeline append: if it fails the report still exists, and the
//!   failure is logged rather than rolled back.
//!
//! Validation and location errors are caught here and never reach the store.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::images::ImageStore;
use crate::model::{ImageAttachment, IssueType, NewReport};
use crate::storage::Storage;

/// Where a submission flow instance currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Nothing submitted yet.
    Idle,
    /// Checking actor, title, and coordinates.
    Validating,
    /// Pushing the attached photo to the image store.
    ImageUploading,
    /// Writing the report row.
    Persisting,
    /// Appending the first timeline entry.
    Recording,
    /// The report exists and the caller has its id.
    Done,
    /// Terminal failure; reachable from any non-idle state.
    Failed,
}

/// Everything the reporter provides for one submission.
///
/// Coordinates are optional here because the location capture happens in a
/// collaborator the flow does not control; their absence is rejected with
/// [`StoreError::LocationRequired`] before anything is persisted.
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    /// Stable identifier of the signed-in reporter. Must be non-empty.
    pub user_id: String,
    pub issue_type: IssueType,
    pub title: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    /// Photo attached by the reporter, if any.
    pub image: Option<ImageAttachment>,
}

/// What a completed flow hands back to the caller.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// Identifier of the newly created report.
    pub report_id: i64,
    /// Public URL of the uploaded photo, or `None` if there was no photo or
    /// the upload failed.
    pub image_url: Option<String>,
}

/// A single-use submission flow bound to the report store.
pub struct SubmissionFlow<'a> {
    storage: &'a Storage,
    state: SubmissionState,
}

impl<'a> SubmissionFlow<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            state: SubmissionState::Idle,
        }
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(from = ?self.state, to = ?next, "Submission flow transition");
        self.state = next;
    }

    /// Run the flow to completion.
    ///
    /// `uploader` is the image store collaborator; pass `None` when no store
    /// is configured, in which case an attached photo is dropped with a
    /// warning rather than failing the submission.
    pub async fn run<U: ImageStore>(
        mut self,
        uploader: Option<&U>,
        input: SubmissionInput,
    ) -> Result<SubmissionOutcome, StoreError> {
        self.transition(SubmissionState::Validating);

        if input.user_id.trim().is_empty() {
            self.transition(SubmissionState::Failed);
            return Err(StoreError::missing("user_id"));
        }

        // Both coordinates must be present; a half-captured location is as
        // useless to a rescuer as none at all.
        let (latitude, longitude) = match (input.latitude, input.longitude) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                self.transition(SubmissionState::Failed);
                return Err(StoreError::LocationRequired);
            }
        };

        if input.title.trim().is_empty() {
            self.transition(SubmissionState::Failed);
            return Err(StoreError::missing("title"));
        }

        let image_url = match (&input.image, uploader) {
            (Some(attachment), Some(uploader)) => {
                self.transition(SubmissionState::ImageUploading);
                match uploader.upload(attachment).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        // Best effort: the report goes ahead without a photo.
                        warn!(error = %e, filename = %attachment.filename,
                              "Image upload failed, continuing without image");
                        None
                    }
                }
            }
            (Some(attachment), None) => {
                warn!(filename = %attachment.filename,
                      "No image store configured, dropping attachment");
                None
            }
            (None, _) => None,
        };

        self.transition(SubmissionState::Persisting);

        let new_report = NewReport {
            user_id: input.user_id.clone(),
            issue_type: input.issue_type,
            title: input.title.clone(),
            description: input.description.clone(),
            latitude,
            longitude,
            location_address: input.location_address.clone(),
            image_url: image_url.clone(),
            observed_at: input.observed_at,
        };

        let report_id = match self.storage.create_report(&new_report).await {
            Ok(id) => id,
            Err(e) => {
                self.transition(SubmissionState::Failed);
                return Err(e);
            }
        };

        self.transition(SubmissionState::Recording);

        let note = format!(
            "{} issue at ({:.4}, {:.4})",
            input.issue_type.as_str(),
            latitude,
            longitude
        );
        if let Err(e) = self
            .storage
            .append_timeline(report_id, &input.user_id, "Report submitted", Some(&note), image_url.as_deref())
            .await
        {
            // The report is already committed; losing its first log line is
            // an accepted eventual-consistency tradeoff.
            warn!(report_id, error = %e, "Failed to record first timeline entry");
        }

        self.transition(SubmissionState::Done);

        info!(
            report_id,
            issue_type = input.issue_type.as_str(),
            has_image = image_url.is_some(),
            "Report submitted"
        );

        Ok(SubmissionOutcome {
            report_id,
            image_url,
        })
    }
}
