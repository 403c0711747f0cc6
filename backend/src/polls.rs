use serde::{Serialize, Deserialize};
use shared::{
    models::{Poll, PollStatus},
    validation::validate_closes_at,
    Error, ErrorCode, Result,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::store::{get_as, keys, list_as, put_as, swap_as, SharedStore, StoreError};

pub use shared::models::{is_poll_closed, is_poll_closed_at};

/// Names the single open poll of a club.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPollMarker {
    pub poll_id: Uuid,
}

/// Owns poll records and their status. Elapsed `closes_at` is the source of
/// truth for closure; reads persist `closed` lazily when they notice it.
pub struct PollManager {
    store: SharedStore,
}

impl PollManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_poll(&self, club_id: Uuid, closes_at: OffsetDateTime, created_by: Uuid) -> Result<Poll> {
        let now = OffsetDateTime::now_utc();
        validate_closes_at(closes_at, now)?;

        let marker_key = keys::open_poll(club_id);
        let expected = self.claimable_marker(club_id, None, now).await?;

        let poll = Poll::new(club_id, closes_at, created_by);
        put_as(&*self.store, &keys::poll(club_id, poll.id), &poll).await?;

        if let Err(e) = swap_as(&*self.store, &marker_key, expected, &OpenPollMarker { poll_id: poll.id }).await {
            // Lost the race for the marker: retire the poll we just wrote.
            let mut orphan = poll.clone();
            orphan.status = PollStatus::Closed;
            put_as(&*self.store, &keys::poll(club_id, orphan.id), &orphan).await?;
            warn!(%club_id, poll_id = %poll.id, "Concurrent poll creation lost: {}", e);
            return Err(match e {
                StoreError::VersionConflict(_) => Error::new(ErrorCode::Conflict, "Club already has an open poll"),
                other => other.into(),
            });
        }

        info!(%club_id, poll_id = %poll.id, closes_at = %poll.closes_at, "Poll created");
        Ok(poll)
    }

    /// Overwrites the status. No forward-only check; reopening a poll claims
    /// the club's open-poll slot.
    pub async fn update_poll_status(&self, club_id: Uuid, poll_id: Uuid, status: PollStatus) -> Result<Poll> {
        let key = keys::poll(club_id, poll_id);
        let (mut poll, _) = get_as::<Poll>(&*self.store, &key).await?
            .ok_or_else(|| Error::with_details(ErrorCode::NoActivePoll, "Poll no longer exists", poll_id.to_string()))?;

        if status.is_open() {
            let now = OffsetDateTime::now_utc();
            let expected = self.claimable_marker(club_id, Some(poll_id), now).await?;
            swap_as(&*self.store, &keys::open_poll(club_id), expected, &OpenPollMarker { poll_id }).await?;
        }

        let previous = poll.status;
        poll.status = status;
        put_as(&*self.store, &key, &poll).await?;
        info!(%club_id, %poll_id, from = %previous, to = %status, "Poll status updated");
        Ok(poll)
    }

    pub async fn get_poll(&self, club_id: Uuid, poll_id: Uuid) -> Result<Option<Poll>> {
        self.load(club_id, poll_id, OffsetDateTime::now_utc()).await
    }

    /// The poll named by the club's marker, if it is still open.
    pub async fn current_poll(&self, club_id: Uuid) -> Result<Option<Poll>> {
        let Some((marker, _)) = get_as::<OpenPollMarker>(&*self.store, &keys::open_poll(club_id)).await? else {
            return Ok(None);
        };
        self.load_open(club_id, marker.poll_id, OffsetDateTime::now_utc()).await
    }

    /// Every poll of the club whose status is still open.
    pub async fn open_polls(&self, club_id: Uuid) -> Result<Vec<Poll>> {
        let now = OffsetDateTime::now_utc();
        let mut open = Vec::new();
        for record in self.store.list(&keys::polls(club_id)).await? {
            let poll: Poll = record.decode()?;
            if poll.needs_closing(now) {
                self.persist_closed(poll, record.version).await?;
            } else if poll.status.is_open() {
                open.push(poll);
            }
        }
        Ok(open)
    }

    pub async fn list_polls(&self, club_id: Uuid) -> Result<Vec<Poll>> {
        let mut polls: Vec<Poll> = list_as(&*self.store, &keys::polls(club_id)).await?;
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    /// Persists `closed` for every time-expired poll still stored as open.
    /// Every open poll is named by its club's marker, so only the markers and
    /// the polls they name are read.
    pub async fn close_expired_polls(&self) -> Result<usize> {
        let now = OffsetDateTime::now_utc();
        let mut closed = 0;
        for record in self.store.list(keys::OPEN_POLLS).await? {
            let Some(club_id) = keys::parse_open_poll(&record.key) else {
                warn!(key = %record.key, "Skipping malformed open-poll marker");
                continue;
            };
            let marker: OpenPollMarker = record.decode()?;
            if let Some((poll, version)) = get_as::<Poll>(&*self.store, &keys::poll(club_id, marker.poll_id)).await? {
                if poll.needs_closing(now) {
                    self.persist_closed(poll, version).await?;
                    closed += 1;
                }
            }
        }
        Ok(closed)
    }

    async fn load(&self, club_id: Uuid, poll_id: Uuid, now: OffsetDateTime) -> Result<Option<Poll>> {
        match get_as::<Poll>(&*self.store, &keys::poll(club_id, poll_id)).await? {
            Some((poll, version)) if poll.needs_closing(now) => Ok(Some(self.persist_closed(poll, version).await?)),
            Some((poll, _)) => Ok(Some(poll)),
            None => Ok(None),
        }
    }

    async fn load_open(&self, club_id: Uuid, poll_id: Uuid, now: OffsetDateTime) -> Result<Option<Poll>> {
        Ok(self.load(club_id, poll_id, now).await?.filter(|p| p.is_open_at(now)))
    }

    /// Version of the marker to swap against, provided the slot is free or
    /// already held by `claimant`.
    async fn claimable_marker(&self, club_id: Uuid, claimant: Option<Uuid>, now: OffsetDateTime) -> Result<Option<u64>> {
        let Some((marker, version)) = get_as::<OpenPollMarker>(&*self.store, &keys::open_poll(club_id)).await? else {
            return Ok(None);
        };
        if Some(marker.poll_id) != claimant {
            if let Some(open) = self.load_open(club_id, marker.poll_id, now).await? {
                warn!(%club_id, open_poll = %open.id, "Club already has an open poll");
                return Err(Error::with_details(
                    ErrorCode::Conflict,
                    "Club already has an open poll",
                    open.id.to_string(),
                ));
            }
        }
        Ok(Some(version))
    }

    async fn persist_closed(&self, mut poll: Poll, version: u64) -> Result<Poll> {
        poll.status = PollStatus::Closed;
        match swap_as(&*self.store, &keys::poll(poll.club_id, poll.id), Some(version), &poll).await {
            Ok(_) => info!(club_id = %poll.club_id, poll_id = %poll.id, "Closed expired poll"),
            Err(StoreError::VersionConflict(_)) => debug!(poll_id = %poll.id, "Poll updated concurrently, skipping close"),
            Err(e) => return Err(e.into()),
        }
        Ok(poll)
    }
}
