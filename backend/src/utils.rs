use crate::error::ApiError;
use uuid::Uuid;

pub fn parse_id(id: &str, what: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidId(what))
}

pub fn parse_poll_path(club_id: &str, poll_id: &str) -> Result<(Uuid, Uuid), ApiError> {
    Ok((parse_id(club_id, "club")?, parse_id(poll_id, "poll")?))
}
