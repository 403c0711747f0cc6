use rocket::{Request, catch, serde::json::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorMessage {
    error: String,
    status: u16,
}

fn message(error: &str, status: u16) -> Json<ErrorMessage> {
    Json(ErrorMessage {
        error: error.into(),
        status,
    })
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Json<ErrorMessage> {
    message("Missing or malformed X-User-Id header.", 401)
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Json<ErrorMessage> {
    message("You are not allowed to do this in this club.", 403)
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorMessage> {
    message("Invalid request parameters.", 400)
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ErrorMessage> {
    message("Request body could not be parsed.", 422)
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorMessage> {
    message("An internal server error occurred.", 500)
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ErrorMessage> {
    message("The requested resource was not found.", 404)
}
