use shared::{models::Member, Error, ErrorCode, Result};
use tracing::warn;
use uuid::Uuid;
use crate::store::{get_as, keys, put_as, SharedStore};

/// Club roster lookups: display names and the admin role.
#[rocket::async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member(&self, club_id: Uuid, user_id: Uuid) -> Result<Option<Member>>;

    async fn display_name(&self, club_id: Uuid, user_id: Uuid) -> Result<String> {
        Ok(self.member(club_id, user_id).await?
            .map(|m| m.display_name)
            .unwrap_or_else(|| user_id.to_string()))
    }

    async fn require_member(&self, club_id: Uuid, user_id: Uuid) -> Result<Member> {
        self.member(club_id, user_id).await?.ok_or_else(|| {
            warn!(%club_id, %user_id, "Rejected non-member");
            Error::new(ErrorCode::Unauthorized, "Not a member of this club")
        })
    }

    async fn require_admin(&self, club_id: Uuid, user_id: Uuid) -> Result<Member> {
        let member = self.require_member(club_id, user_id).await?;
        if !member.is_admin() {
            warn!(%club_id, %user_id, "Rejected admin-only action");
            return Err(Error::new(ErrorCode::Unauthorized, "Only club admins can do this"));
        }
        Ok(member)
    }
}

/// Roster kept as `club/{club}/member/{user}` records.
pub struct StoreMembers {
    store: SharedStore,
}

impl StoreMembers {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, club_id: Uuid, member: &Member) -> Result<()> {
        put_as(&*self.store, &keys::member(club_id, member.user_id), member).await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl MemberDirectory for StoreMembers {
    async fn member(&self, club_id: Uuid, user_id: Uuid) -> Result<Option<Member>> {
        Ok(get_as::<Member>(&*self.store, &keys::member(club_id, user_id)).await?.map(|(m, _)| m))
    }
}
