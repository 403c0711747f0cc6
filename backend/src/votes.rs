use serde::{Serialize, Deserialize};
use shared::{models::{Poll, Vote}, Error, Result};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;
use crate::store::{get_as, keys, list_as, put_as, swap_as, SharedStore, StoreError};

/// Maps `(poll, user)` to the identity of that member's single ballot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotIndex {
    pub vote_id: Uuid,
}

pub struct VoteRegistry {
    store: SharedStore,
}

impl VoteRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Inserts the member's ballot or overwrites it in place. The ballot
    /// index is created by compare-and-swap, so racing calls for the same
    /// member converge on one vote id.
    pub async fn submit_vote(&self, poll: &Poll, user_id: Uuid, rankings: Vec<Uuid>) -> Result<Vote> {
        let vote_id = self.ballot_id(poll, user_id).await?;
        let key = keys::vote(poll.club_id, vote_id);
        let replaced = self.store.get(&key).await?.is_some();

        let vote = Vote {
            id: vote_id,
            poll_id: poll.id,
            user_id,
            rankings,
            submitted_at: OffsetDateTime::now_utc(),
        };
        put_as(&*self.store, &key, &vote).await?;

        info!(poll_id = %poll.id, %vote_id, %user_id, ranked = vote.rankings.len(), replaced, "Vote recorded");
        Ok(vote)
    }

    async fn ballot_id(&self, poll: &Poll, user_id: Uuid) -> Result<Uuid> {
        let index_key = keys::ballot_index(poll.club_id, poll.id, user_id);
        if let Some((index, _)) = get_as::<BallotIndex>(&*self.store, &index_key).await? {
            return Ok(index.vote_id);
        }

        let fresh = BallotIndex { vote_id: Uuid::new_v4() };
        match swap_as(&*self.store, &index_key, None, &fresh).await {
            Ok(_) => Ok(fresh.vote_id),
            Err(StoreError::VersionConflict(_)) => {
                debug!(poll_id = %poll.id, %user_id, "Ballot index created concurrently");
                get_as::<BallotIndex>(&*self.store, &index_key)
                    .await?
                    .map(|(index, _)| index.vote_id)
                    .ok_or_else(|| Error::storage(format!("ballot index {} disappeared", index_key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ballots of one poll, oldest first.
    pub async fn votes_for_poll(&self, club_id: Uuid, poll_id: Uuid) -> Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = list_as::<Vote>(&*self.store, &keys::votes(club_id))
            .await?
            .into_iter()
            .filter(|v| v.poll_id == poll_id)
            .collect();
        votes.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(votes)
    }

    pub async fn vote_for_user(&self, club_id: Uuid, poll_id: Uuid, user_id: Uuid) -> Result<Option<Vote>> {
        let Some((index, _)) = get_as::<BallotIndex>(&*self.store, &keys::ballot_index(club_id, poll_id, user_id)).await? else {
            return Ok(None);
        };
        Ok(get_as::<Vote>(&*self.store, &keys::vote(club_id, index.vote_id)).await?.map(|(vote, _)| vote))
    }
}
