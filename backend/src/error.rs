use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::{ErrorCode, ErrorResponse};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid {0} id")]
    InvalidId(&'static str),
    #[error(transparent)]
    Domain(#[from] shared::Error),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidId(_) => ErrorCode::InvalidInput,
            ApiError::Domain(e) => e.code,
        }
    }

    pub fn status(&self) -> Status {
        match self.code() {
            ErrorCode::NoActivePoll => Status::Conflict,
            ErrorCode::Conflict => Status::Conflict,
            ErrorCode::SubmissionCapExceeded => Status::Forbidden,
            ErrorCode::Unauthorized => Status::Forbidden,
            ErrorCode::NotFound => Status::NotFound,
            ErrorCode::InvalidInput => Status::BadRequest,
            ErrorCode::StorageFailure => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {} failed: {}", req.method(), req.uri(), self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };

        rocket::Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
