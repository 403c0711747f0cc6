use shared::{
    models::{Poll, Submission, SubmitBookRequest},
    validation::{normalize_comment, validate_submission_request},
    Error, ErrorCode, Result,
};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;
use crate::store::{keys, list_as, swap_as, SharedStore, StoreError};

pub struct SubmissionRegistry {
    store: SharedStore,
    max_per_user: usize,
}

impl SubmissionRegistry {
    pub fn new(store: SharedStore, max_per_user: usize) -> Self {
        Self { store, max_per_user }
    }

    /// Appends a submission to `poll`, which the caller has resolved as open.
    /// Each author owns `max_per_user` numbered slots per poll and the
    /// submission is written by compare-and-swap into the first free one, so
    /// the record is its own quota and the cap holds under concurrency.
    pub async fn submit_book(&self, poll: &Poll, user_id: Uuid, request: SubmitBookRequest) -> Result<Submission> {
        validate_submission_request(&request)?;

        let taken = self.store.list(&keys::user_submissions(poll.club_id, poll.id, user_id)).await?;
        if taken.len() >= self.max_per_user {
            return Err(self.cap_exceeded(poll, user_id, taken.len()));
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            user_id,
            book_id: request.book_id.trim().to_string(),
            comment: normalize_comment(request.comment),
            submitted_at: OffsetDateTime::now_utc(),
            book_details: request.book_details,
        };

        for slot in 0..self.max_per_user {
            let key = keys::submission_slot(poll.club_id, poll.id, user_id, slot);
            match swap_as(&*self.store, &key, None, &submission).await {
                Ok(_) => {
                    info!(
                        poll_id = %poll.id,
                        submission_id = %submission.id,
                        %user_id,
                        slot,
                        title = %submission.book_details.title,
                        "Book submitted"
                    );
                    return Ok(submission);
                }
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.cap_exceeded(poll, user_id, self.max_per_user))
    }

    fn cap_exceeded(&self, poll: &Poll, user_id: Uuid, count: usize) -> Error {
        warn!(poll_id = %poll.id, %user_id, count, "Submission cap reached");
        Error::with_details(
            ErrorCode::SubmissionCapExceeded,
            format!("At most {} submissions per member", self.max_per_user),
            format!("{} already submitted", count),
        )
    }

    /// Submissions of one poll, oldest first.
    pub async fn submissions_for_poll(&self, club_id: Uuid, poll_id: Uuid) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = list_as(&*self.store, &keys::poll_submissions(club_id, poll_id)).await?;
        submissions.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(submissions)
    }

    pub async fn submissions_by_user(&self, club_id: Uuid, poll_id: Uuid, user_id: Uuid) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = list_as(&*self.store, &keys::user_submissions(club_id, poll_id, user_id)).await?;
        submissions.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(submissions)
    }
}
