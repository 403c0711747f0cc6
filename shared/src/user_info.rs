use serde::{Serialize, Deserialize};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// The calling club member, as asserted by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: Uuid,
}

impl UserInfo {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self::new)
    }
}

// Backend-specific Rocket implementation
#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::http::Status;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for UserInfo {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            match req.headers().get_one(USER_ID_HEADER).and_then(UserInfo::from_header) {
                Some(user) => Outcome::Success(user),
                None => Outcome::Error((Status::Unauthorized, ())),
            }
        }
    }
}
