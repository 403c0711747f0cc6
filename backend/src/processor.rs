use std::sync::Arc;
use futures::stream::{BoxStream, StreamExt};
use shared::{
    irv::{resolve, tally},
    leaderboard::{declared_winner, leader, rank},
    models::*,
    validation::validate_rankings,
    Error, ErrorCode, Result,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::{
    config::Settings,
    members::MemberDirectory,
    polls::PollManager,
    store::{keys, watch, SharedStore},
    submissions::SubmissionRegistry,
    votes::VoteRegistry,
};

/// Submissions and ballots of one poll, frozen for tallying.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub poll: Poll,
    pub candidates: Vec<Uuid>,
    pub ballots: Vec<Vec<Uuid>>,
}

/// Entry point for every club-facing poll operation.
pub struct PollProcessor {
    store: SharedStore,
    members: Arc<dyn MemberDirectory>,
    pub polls: PollManager,
    pub submissions: SubmissionRegistry,
    pub votes: VoteRegistry,
}

impl PollProcessor {
    pub fn new(store: SharedStore, members: Arc<dyn MemberDirectory>, settings: &Settings) -> Self {
        Self {
            polls: PollManager::new(store.clone()),
            submissions: SubmissionRegistry::new(store.clone(), settings.max_submissions_per_user),
            votes: VoteRegistry::new(store.clone()),
            members,
            store,
        }
    }

    pub async fn create_poll(&self, club_id: Uuid, closes_at: OffsetDateTime, requested_by: Uuid) -> Result<Poll> {
        self.members.require_member(club_id, requested_by).await?;
        self.polls.create_poll(club_id, closes_at, requested_by).await
    }

    pub async fn current_poll(&self, club_id: Uuid) -> Result<Option<Poll>> {
        self.polls.current_poll(club_id).await
    }

    pub async fn list_polls(&self, club_id: Uuid) -> Result<Vec<Poll>> {
        self.polls.list_polls(club_id).await
    }

    pub async fn poll(&self, club_id: Uuid, poll_id: Uuid) -> Result<Poll> {
        self.polls.get_poll(club_id, poll_id).await?
            .ok_or_else(|| Error::with_details(ErrorCode::NotFound, "Poll not found", poll_id.to_string()))
    }

    pub async fn update_poll_status(&self, club_id: Uuid, poll_id: Uuid, status: PollStatus, requested_by: Uuid) -> Result<Poll> {
        self.members.require_admin(club_id, requested_by).await?;
        self.polls.update_poll_status(club_id, poll_id, status).await
    }

    pub async fn submit_book(&self, club_id: Uuid, poll_id: Uuid, user_id: Uuid, request: SubmitBookRequest) -> Result<Submission> {
        self.members.require_member(club_id, user_id).await?;
        let poll = self.open_poll(club_id, poll_id).await?;
        self.submissions.submit_book(&poll, user_id, request).await
    }

    pub async fn submissions(&self, club_id: Uuid, poll_id: Uuid) -> Result<Vec<SubmissionView>> {
        let submissions = self.submissions.submissions_for_poll(club_id, poll_id).await?;
        let mut views = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let submitted_by = self.members.display_name(club_id, submission.user_id).await?;
            views.push(SubmissionView { submission, submitted_by });
        }
        Ok(views)
    }

    pub async fn submit_vote(&self, club_id: Uuid, poll_id: Uuid, user_id: Uuid, rankings: Vec<Uuid>) -> Result<Vote> {
        self.members.require_member(club_id, user_id).await?;
        let poll = self.open_poll(club_id, poll_id).await?;

        let submission_ids: Vec<Uuid> = self.submissions.submissions_for_poll(club_id, poll_id)
            .await?
            .iter()
            .map(|s| s.id)
            .collect();
        validate_rankings(&rankings, &submission_ids)?;

        self.votes.submit_vote(&poll, user_id, rankings).await
    }

    pub async fn vote_for_user(&self, club_id: Uuid, poll_id: Uuid, user_id: Uuid) -> Result<Option<Vote>> {
        self.votes.vote_for_user(club_id, poll_id, user_id).await
    }

    pub async fn snapshot(&self, club_id: Uuid, poll_id: Uuid) -> Result<PollSnapshot> {
        let poll = self.poll(club_id, poll_id).await?;
        let candidates = self.submissions.submissions_for_poll(club_id, poll_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let ballots = self.votes.votes_for_poll(club_id, poll_id)
            .await?
            .into_iter()
            .map(|v| v.rankings)
            .collect();
        Ok(PollSnapshot { poll, candidates, ballots })
    }

    /// Live first-choice counts while the poll is open, the full runoff once
    /// `closes_at` has passed.
    pub async fn tally(&self, club_id: Uuid, poll_id: Uuid) -> Result<TallyView> {
        let snapshot = self.snapshot(club_id, poll_id).await?;
        Ok(tally_view(&snapshot, OffsetDateTime::now_utc()))
    }

    pub async fn leaderboard(&self, club_id: Uuid, poll_id: Uuid) -> Result<LeaderboardView> {
        let snapshot = self.snapshot(club_id, poll_id).await?;
        Ok(leaderboard_view(&snapshot, OffsetDateTime::now_utc()))
    }

    /// Recomputed leaderboard after every change in the club's records.
    pub fn watch_leaderboard(self: &Arc<Self>, club_id: Uuid, poll_id: Uuid) -> BoxStream<'static, Result<LeaderboardView>> {
        let processor = Arc::clone(self);
        watch(self.store.clone(), keys::club(club_id))
            .then(move |snapshot| {
                let processor = Arc::clone(&processor);
                async move {
                    snapshot?;
                    processor.leaderboard(club_id, poll_id).await
                }
            })
            .boxed()
    }

    /// Persists `closed` on every expired poll; run periodically.
    pub async fn close_expired_polls(&self) -> Result<usize> {
        self.polls.close_expired_polls().await
    }

    async fn open_poll(&self, club_id: Uuid, poll_id: Uuid) -> Result<Poll> {
        match self.polls.current_poll(club_id).await? {
            Some(poll) if poll.id == poll_id => Ok(poll),
            Some(other) => {
                debug!(%club_id, requested = %poll_id, current = %other.id, "Action on a poll that is not open");
                Err(Error::no_active_poll(club_id))
            }
            None => {
                warn!(%club_id, %poll_id, "No open poll");
                Err(Error::no_active_poll(club_id))
            }
        }
    }
}

pub fn tally_view(snapshot: &PollSnapshot, now: OffsetDateTime) -> TallyView {
    let is_final = snapshot.poll.is_closed_at(now);
    let result = tally(&snapshot.candidates, &snapshot.ballots, is_final);
    TallyView::new(snapshot.poll.id, is_final, snapshot.ballots.len(), result)
}

pub fn leaderboard_view(snapshot: &PollSnapshot, now: OffsetDateTime) -> LeaderboardView {
    let closed = snapshot.poll.is_closed_at(now);
    let entries = rank(&snapshot.candidates, &snapshot.ballots);

    let winner = if closed {
        let result = resolve(&snapshot.candidates, &snapshot.ballots);
        let winner = result.winner().copied();
        let plurality = declared_winner(&entries, closed).map(|e| e.candidate);
        if plurality.is_some() && plurality != winner {
            info!(
                poll_id = %snapshot.poll.id,
                plurality = ?plurality,
                runoff = ?winner,
                "Plurality leader differs from runoff winner"
            );
        }
        winner
    } else {
        None
    };

    LeaderboardView {
        poll_id: snapshot.poll.id,
        closed,
        total_ballots: snapshot.ballots.len(),
        leader: leader(&entries).map(|e| e.candidate),
        winner,
        entries,
    }
}
