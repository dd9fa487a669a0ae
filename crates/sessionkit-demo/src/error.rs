use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sessionkit_core::SessionError;
use sessionkit_util_error::FmtCompact as _;
use snafu::Snafu;
use tracing::{debug, warn};

use crate::LOG_TARGET;
use crate::routes::AppJson;

#[derive(Debug, Snafu)]
pub enum RequestError {
    #[snafu(transparent)]
    Session { source: SessionError },
    #[snafu(transparent)]
    Json { source: JsonRejection },
}

pub type RequestResult<T> = std::result::Result<T, RequestError>;

// How we want error responses to be serialized
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        debug!(
            target: LOG_TARGET,
            err = %self.fmt_compact(),
            "Request Error"
        );

        let (status_code, message) = match self {
            RequestError::Json { source } => (source.status(), source.body_text()),
            err => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    "Unexpected Request Error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Service Error".to_owned(),
                )
            }
        };

        (status_code, AppJson(ErrorResponse { message })).into_response()
    }
}
