pub mod config;
pub mod processor;
pub mod routes;
pub mod store;
pub mod pg_store;
pub mod polls;
pub mod submissions;
pub mod votes;
pub mod members;
pub mod cors;
pub mod error;
pub mod utils;
pub mod catchers;
pub use shared::user_info;
pub use shared::{models::*, error::*, user_info::*};
pub use shared::irv::{resolve, tally, IrvResult, Outcome, Round, CandidateTally};
pub use shared::leaderboard::{rank, LeaderboardEntry};

use rocket::{catchers, routes, Build, Rocket};
use crate::{catchers::*, config::Settings, cors::CORS, routes::*};

pub fn build_rocket(state: AppState, settings: &Settings) -> Rocket<Build> {
    rocket::build()
        .attach(CORS::new(settings.allowed_origins.clone()))
        .manage(state)
        .mount(
            "/api",
            routes![
                all_options,
                create_poll,
                list_polls,
                current_poll,
                get_poll,
                update_poll_status,
                submit_book,
                list_submissions,
                submit_vote,
                my_vote,
                get_tally,
                get_leaderboard,
                live_leaderboard
            ],
        )
        .register(
            "/",
            catchers![
                unauthorized,
                forbidden,
                bad_request,
                unprocessable,
                internal_error,
                not_found
            ],
        )
}
