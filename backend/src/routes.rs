use std::sync::Arc;
use futures::StreamExt;
use rocket::{State, get, patch, post, put, http::Status, serde::json::Json};
use rocket::response::stream::{Event, EventStream};
use tracing::{error, instrument};
use shared::{models::*, user_info::UserInfo};
use crate::{
    error::ApiError,
    processor::PollProcessor,
    utils::{parse_id, parse_poll_path},
};

pub struct AppState {
    pub processor: Arc<PollProcessor>,
}

impl AppState {
    pub fn new(processor: PollProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[instrument(skip(state, request))]
#[post("/clubs/<club_id>/polls", format = "json", data = "<request>")]
pub async fn create_poll(
    state: &State<AppState>,
    club_id: &str,
    request: Json<CreatePollRequest>,
    user: UserInfo,
) -> Result<Json<Poll>, ApiError> {
    let club_id = parse_id(club_id, "club")?;
    let poll = state.processor
        .create_poll(club_id, request.closes_at, user.user_id)
        .await?;
    Ok(Json(poll))
}

#[get("/clubs/<club_id>/polls")]
pub async fn list_polls(state: &State<AppState>, club_id: &str) -> Result<Json<Vec<Poll>>, ApiError> {
    let club_id = parse_id(club_id, "club")?;
    Ok(Json(state.processor.list_polls(club_id).await?))
}

#[get("/clubs/<club_id>/polls/current", rank = 1)]
pub async fn current_poll(state: &State<AppState>, club_id: &str) -> Result<Json<Option<Poll>>, ApiError> {
    let club_id = parse_id(club_id, "club")?;
    Ok(Json(state.processor.current_poll(club_id).await?))
}

#[get("/clubs/<club_id>/polls/<poll_id>", rank = 2)]
pub async fn get_poll(state: &State<AppState>, club_id: &str, poll_id: &str) -> Result<Json<Poll>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    Ok(Json(state.processor.poll(club_id, poll_id).await?))
}

#[instrument(skip(state, request))]
#[patch("/clubs/<club_id>/polls/<poll_id>/status", format = "json", data = "<request>")]
pub async fn update_poll_status(
    state: &State<AppState>,
    club_id: &str,
    poll_id: &str,
    request: Json<UpdatePollStatusRequest>,
    user: UserInfo,
) -> Result<Json<Poll>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    let poll = state.processor
        .update_poll_status(club_id, poll_id, request.status, user.user_id)
        .await?;
    Ok(Json(poll))
}

#[instrument(skip(state, request))]
#[post("/clubs/<club_id>/polls/<poll_id>/submissions", format = "json", data = "<request>")]
pub async fn submit_book(
    state: &State<AppState>,
    club_id: &str,
    poll_id: &str,
    request: Json<SubmitBookRequest>,
    user: UserInfo,
) -> Result<Json<Submission>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    let submission = state.processor
        .submit_book(club_id, poll_id, user.user_id, request.into_inner())
        .await?;
    Ok(Json(submission))
}

#[get("/clubs/<club_id>/polls/<poll_id>/submissions")]
pub async fn list_submissions(state: &State<AppState>, club_id: &str, poll_id: &str) -> Result<Json<Vec<SubmissionView>>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    Ok(Json(state.processor.submissions(club_id, poll_id).await?))
}

#[instrument(skip(state, request))]
#[put("/clubs/<club_id>/polls/<poll_id>/vote", format = "json", data = "<request>")]
pub async fn submit_vote(
    state: &State<AppState>,
    club_id: &str,
    poll_id: &str,
    request: Json<SubmitVoteRequest>,
    user: UserInfo,
) -> Result<Json<Vote>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    let vote = state.processor
        .submit_vote(club_id, poll_id, user.user_id, request.into_inner().rankings)
        .await?;
    Ok(Json(vote))
}

#[get("/clubs/<club_id>/polls/<poll_id>/vote")]
pub async fn my_vote(
    state: &State<AppState>,
    club_id: &str,
    poll_id: &str,
    user: UserInfo,
) -> Result<Json<Option<Vote>>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    Ok(Json(state.processor.vote_for_user(club_id, poll_id, user.user_id).await?))
}

#[get("/clubs/<club_id>/polls/<poll_id>/tally")]
pub async fn get_tally(state: &State<AppState>, club_id: &str, poll_id: &str) -> Result<Json<TallyView>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    Ok(Json(state.processor.tally(club_id, poll_id).await?))
}

#[get("/clubs/<club_id>/polls/<poll_id>/leaderboard")]
pub async fn get_leaderboard(state: &State<AppState>, club_id: &str, poll_id: &str) -> Result<Json<LeaderboardView>, ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    Ok(Json(state.processor.leaderboard(club_id, poll_id).await?))
}

#[get("/clubs/<club_id>/polls/<poll_id>/leaderboard/live")]
pub async fn live_leaderboard(state: &State<AppState>, club_id: &str, poll_id: &str) -> Result<EventStream![], ApiError> {
    let (club_id, poll_id) = parse_poll_path(club_id, poll_id)?;
    state.processor.poll(club_id, poll_id).await?;

    let mut updates = state.processor.watch_leaderboard(club_id, poll_id);
    Ok(EventStream! {
        while let Some(update) = updates.next().await {
            match update {
                Ok(view) => yield Event::json(&view),
                Err(e) => {
                    error!(%poll_id, "Live leaderboard stopped: {}", e);
                    yield Event::data(e.to_string()).event("error");
                    break;
                }
            }
        }
    })
}
