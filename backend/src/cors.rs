use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};
use rocket::http::Header;
use shared::user_info::USER_ID_HEADER;

/// Reflects the request origin when it starts with one of the allowed
/// prefixes.
pub struct CORS {
    allowed_origins: Vec<String>,
}

impl CORS {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|prefix| origin.starts_with(prefix.as_str()))
    }
}

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = req.headers().get_one("Origin") else { return };

        if self.allows(origin) {
            res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
            res.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, PUT, PATCH, OPTIONS"));
            res.set_header(Header::new("Access-Control-Allow-Headers", format!("Content-Type, {}", USER_ID_HEADER)));
            res.set_header(Header::new("Access-Control-Max-Age", "86400"));
        }
    }
}
