use serde::{Serialize, Deserialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::irv::{IrvResult, Outcome};
use crate::leaderboard::LeaderboardEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Submission,
    Voting,
    Closed,
}

impl PollStatus {
    pub fn is_open(self) -> bool {
        !matches!(self, PollStatus::Closed)
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PollStatus::Submission => "submission",
            PollStatus::Voting => "voting",
            PollStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub club_id: Uuid,
    pub status: PollStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub closes_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
}

impl Poll {
    pub fn new(club_id: Uuid, closes_at: OffsetDateTime, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            club_id,
            status: PollStatus::Submission,
            closes_at,
            created_at: OffsetDateTime::now_utc(),
            created_by,
        }
    }

    pub fn is_closed_at(&self, now: OffsetDateTime) -> bool {
        is_poll_closed_at(self.closes_at, now)
    }

    /// Status as observed at `now`: an elapsed `closes_at` wins over the stored field.
    pub fn effective_status(&self, now: OffsetDateTime) -> PollStatus {
        if self.is_closed_at(now) {
            PollStatus::Closed
        } else {
            self.status
        }
    }

    pub fn is_open_at(&self, now: OffsetDateTime) -> bool {
        self.effective_status(now).is_open()
    }

    /// True when the stored status still says open although `closes_at` has passed.
    pub fn needs_closing(&self, now: OffsetDateTime) -> bool {
        self.status.is_open() && self.is_closed_at(now)
    }
}

pub fn is_poll_closed_at(closes_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now >= closes_at
}

pub fn is_poll_closed(closes_at: OffsetDateTime) -> bool {
    is_poll_closed_at(closes_at, OffsetDateTime::now_utc())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub user_id: Uuid,
    pub book_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub book_details: BookDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub user_id: Uuid,
    /// Submission ids, most preferred first. Need not rank every submission.
    pub rankings: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub role: MemberRole,
}

impl Member {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub closes_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollStatusRequest {
    pub status: PollStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBookRequest {
    pub book_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub book_details: BookDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    pub rankings: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub submitted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TallyView {
    pub poll_id: Uuid,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub total_ballots: usize,
    pub winner: Option<Uuid>,
    pub result: IrvResult<Uuid>,
}

impl TallyView {
    pub fn new(poll_id: Uuid, is_final: bool, total_ballots: usize, result: IrvResult<Uuid>) -> Self {
        let winner = match &result.outcome {
            Outcome::Winner(id) => Some(*id),
            _ => None,
        };
        Self { poll_id, is_final, total_ballots, winner, result }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub poll_id: Uuid,
    pub closed: bool,
    pub total_ballots: usize,
    pub entries: Vec<LeaderboardEntry<Uuid>>,
    /// Plurality leader for in-progress display. Not authoritative.
    pub leader: Option<Uuid>,
    /// Authoritative IRV winner, only once the poll has closed.
    pub winner: Option<Uuid>,
}
