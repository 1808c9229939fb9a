use serde::Serialize;
use tracing::info;

use crate::upstream::{ReviewSummation, SubmissionApi, UpstreamError};

/// Which write the upsert issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpsertAction {
    Created,
    Updated { summation_id: String },
}

/// Creates the submission's summation, or overwrites the first existing one.
///
/// The read and the write are not atomic; two processors racing on one submission can
/// both create.
pub async fn upsert_summation<S>(
    api: &S,
    summation: &ReviewSummation,
) -> Result<UpsertAction, UpstreamError>
where
    S: SubmissionApi + ?Sized,
{
    let existing = api
        .list_review_summations(&summation.submission_id)
        .await?;

    match existing.into_iter().next() {
        Some(record) => {
            info!(
                submission_id = %summation.submission_id,
                summation_id = %record.id,
                "Updating existing Review Summation"
            );
            api.update_review_summation(&record.id, summation).await?;
            Ok(UpsertAction::Updated {
                summation_id: record.id,
            })
        }
        None => {
            info!(
                submission_id = %summation.submission_id,
                "Creating new Review Summation"
            );
            api.create_review_summation(summation).await?;
            Ok(UpsertAction::Created)
        }
    }
}
