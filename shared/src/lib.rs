pub mod error;
pub mod models;
pub mod validation;
pub mod user_info;
pub mod irv;
pub mod leaderboard;

pub use error::{Error, ErrorCode, Result, ErrorResponse};
pub use models::*;
pub use validation::*;
pub use user_info::*;
pub use irv::{resolve, tally, CandidateTally, IrvResult, Outcome, Round};
pub use leaderboard::{declared_winner, leader, rank, LeaderboardEntry};

#[cfg(test)]
mod tests;
