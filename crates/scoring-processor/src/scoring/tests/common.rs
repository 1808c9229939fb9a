use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::scoring::ScoringService;
use crate::upstream::{
    ChallengeApi, ChallengeId, Review, ReviewSummation, ReviewType, ScorecardId, StoredSummation,
    Submission, SubmissionApi, UpstreamError,
};

pub(crate) const REVIEW_TYPE: &str = "68c5a381-c8ab-48af-92a7-7a869a4ee6c3";
pub(crate) const ITERATIVE_TYPE: &str = "c56a4180-65aa-42ec-a945-5fd21dec0503";
pub(crate) const SCREENING_TYPE: &str = "a3bb3b7c-3b5e-4b70-8e0a-4b2c3f1d0a01";
pub(crate) const AV_SCAN_TYPE: &str = "55bbb17d-aac2-45a6-89c3-a8d102863d05";

pub(crate) fn review_types() -> Vec<ReviewType> {
    [
        (REVIEW_TYPE, "Review"),
        (ITERATIVE_TYPE, "Iterative Review"),
        (SCREENING_TYPE, "Screening"),
        (AV_SCAN_TYPE, "AV Scan"),
    ]
    .into_iter()
    .map(|(id, name)| ReviewType {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
    })
    .collect()
}

pub(crate) fn review(submission_id: &str, type_id: &str, score: f64, scorecard: u64) -> Review {
    Review {
        id: format!("{submission_id}-{type_id}-{score}"),
        type_id: type_id.to_string(),
        score,
        reviewer_id: Some("09798a0f-401b-4a16-afe8-039d9581e47c".to_string()),
        submission_id: submission_id.to_string(),
        score_card_id: ScorecardId::from(scorecard),
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct CallLog {
    pub(crate) review_fetches: usize,
    pub(crate) review_type_listings: usize,
    pub(crate) submission_fetches: usize,
    pub(crate) created: Vec<ReviewSummation>,
    pub(crate) updated: Vec<(String, ReviewSummation)>,
}

#[derive(Default)]
struct MemoryState {
    reviews: HashMap<String, Review>,
    reviews_by_submission: HashMap<String, Vec<Review>>,
    submissions: HashMap<String, Submission>,
    challenge_submissions: HashMap<ChallengeId, Vec<Submission>>,
    summations: HashMap<String, Vec<StoredSummation>>,
    review_types: Vec<ReviewType>,
    failing_writes: HashSet<String>,
    calls: CallLog,
}

#[derive(Default, Clone)]
pub(crate) struct MemorySubmissionApi {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySubmissionApi {
    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("submission api mutex poisoned")
    }

    pub(crate) fn with_review_types(self, review_types: Vec<ReviewType>) -> Self {
        self.state().review_types = review_types;
        self
    }

    pub(crate) fn with_reviews(self, reviews: Vec<Review>) -> Self {
        {
            let mut state = self.state();
            for review in reviews {
                state.reviews.insert(review.id.clone(), review.clone());
                state
                    .reviews_by_submission
                    .entry(review.submission_id.clone())
                    .or_default()
                    .push(review);
            }
        }
        self
    }

    pub(crate) fn with_submission(self, submission: Submission) -> Self {
        {
            let mut state = self.state();
            if let Some(challenge_id) = submission.challenge_id.clone() {
                state
                    .challenge_submissions
                    .entry(challenge_id)
                    .or_default()
                    .push(submission.clone());
            }
            state.submissions.insert(submission.id.clone(), submission);
        }
        self
    }

    pub(crate) fn with_summation(self, submission_id: &str, summation_id: &str) -> Self {
        self.state()
            .summations
            .entry(submission_id.to_string())
            .or_default()
            .push(StoredSummation {
                id: summation_id.to_string(),
                submission_id: Some(submission_id.to_string()),
                aggregate_score: None,
                is_final: None,
            });
        self
    }

    pub(crate) fn failing_writes_for(self, submission_id: &str) -> Self {
        self.state().failing_writes.insert(submission_id.to_string());
        self
    }

    pub(crate) fn calls(&self) -> CallLog {
        self.state().calls.clone()
    }

    pub(crate) fn summations_for(&self, submission_id: &str) -> Vec<StoredSummation> {
        self.state()
            .summations
            .get(submission_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SubmissionApi for MemorySubmissionApi {
    async fn get_review(&self, review_id: &str) -> Result<Review, UpstreamError> {
        let mut state = self.state();
        state.calls.review_fetches += 1;
        state
            .reviews
            .get(review_id)
            .cloned()
            .ok_or_else(|| UpstreamError::Status {
                url: format!("reviews/{review_id}"),
                status: 404,
            })
    }

    async fn list_reviews(&self, submission_id: &str) -> Result<Vec<Review>, UpstreamError> {
        Ok(self
            .state()
            .reviews_by_submission
            .get(submission_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_submission(&self, submission_id: &str) -> Result<Submission, UpstreamError> {
        let mut state = self.state();
        state.calls.submission_fetches += 1;
        state
            .submissions
            .get(submission_id)
            .cloned()
            .ok_or_else(|| UpstreamError::Status {
                url: format!("submissions/{submission_id}"),
                status: 404,
            })
    }

    async fn list_review_summations(
        &self,
        submission_id: &str,
    ) -> Result<Vec<StoredSummation>, UpstreamError> {
        Ok(self.summations_for(submission_id))
    }

    async fn create_review_summation(&self, body: &ReviewSummation) -> Result<(), UpstreamError> {
        let mut state = self.state();
        if state.failing_writes.contains(&body.submission_id) {
            return Err(UpstreamError::Unavailable("create rejected".to_string()));
        }
        state.calls.created.push(body.clone());
        let id = format!("summation-{}", state.calls.created.len());
        state
            .summations
            .entry(body.submission_id.clone())
            .or_default()
            .push(StoredSummation {
                id,
                submission_id: Some(body.submission_id.clone()),
                aggregate_score: Some(body.aggregate_score),
                is_final: body.is_final,
            });
        Ok(())
    }

    async fn update_review_summation(
        &self,
        summation_id: &str,
        body: &ReviewSummation,
    ) -> Result<(), UpstreamError> {
        let mut state = self.state();
        if state.failing_writes.contains(&body.submission_id) {
            return Err(UpstreamError::Unavailable("update rejected".to_string()));
        }
        state
            .calls
            .updated
            .push((summation_id.to_string(), body.clone()));
        Ok(())
    }

    async fn list_review_types(&self) -> Result<Vec<ReviewType>, UpstreamError> {
        let mut state = self.state();
        state.calls.review_type_listings += 1;
        Ok(state.review_types.clone())
    }

    async fn list_submissions(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<Submission>, UpstreamError> {
        Ok(self
            .state()
            .challenge_submissions
            .get(challenge_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryChallengeApi {
    scorecards: Arc<Mutex<HashMap<ChallengeId, ScorecardId>>>,
    lookups: Arc<Mutex<usize>>,
}

impl MemoryChallengeApi {
    pub(crate) fn with_scorecard(self, challenge_id: ChallengeId, scorecard_id: ScorecardId) -> Self {
        self.scorecards
            .lock()
            .expect("challenge api mutex poisoned")
            .insert(challenge_id, scorecard_id);
        self
    }

    pub(crate) fn lookups(&self) -> usize {
        *self.lookups.lock().expect("challenge api mutex poisoned")
    }
}

#[async_trait]
impl ChallengeApi for MemoryChallengeApi {
    async fn scorecard_id(&self, challenge_id: &ChallengeId) -> Result<ScorecardId, UpstreamError> {
        *self.lookups.lock().expect("challenge api mutex poisoned") += 1;
        self.scorecards
            .lock()
            .expect("challenge api mutex poisoned")
            .get(challenge_id)
            .cloned()
            .ok_or_else(|| UpstreamError::Unavailable(format!("challenge {challenge_id}")))
    }
}

pub(crate) fn build_service(
    submissions: &MemorySubmissionApi,
    challenges: &MemoryChallengeApi,
) -> ScoringService<MemorySubmissionApi, MemoryChallengeApi> {
    ScoringService::new(
        Arc::new(submissions.clone()),
        Arc::new(challenges.clone()),
        CacheConfig::default(),
    )
}
