//! errors of the alert pipeline and their http representation
use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfacing while handling a single webhook request.
#[derive(Error, Debug)]
pub enum AlertError {
    /// the webhook contained no alerts, acknowledged as ignored
    #[error("alert group contains no alerts")]
    EmptyPayload,
    #[error("invalid or missing credentials")]
    Unauthorized,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid alert payload: {0}")]
    Validation(String),
    #[error("failed to render email")]
    Render(#[from] tera::Error),
    #[error("failed to dispatch email")]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Errors of the mail provider call. Never retried.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no email recipients configured")]
    NoRecipients,
    #[error("request to mail provider failed")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider responded with {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl DispatchError {
    /// label value for the failure metric
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoRecipients => "no_recipients",
            Self::Transport(err) if err.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// body of every non-error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Acknowledgement {
    Delivered { ok: bool, items_processed: usize },
    Ignored { status: &'static str, reason: &'static str },
}

impl Acknowledgement {
    pub fn delivered(items_processed: usize) -> Self {
        Self::Delivered { ok: true, items_processed }
    }

    pub fn empty_payload() -> Self {
        Self::Ignored { status: "ignored", reason: "empty_payload" }
    }
}

/// body of every error response, the detail never contains internals
#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: &'static str,
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        match self {
            Self::EmptyPayload => Json(Acknowledgement::empty_payload()).into_response(),
            Self::Unauthorized => {
                tracing::warn!("rejected request with invalid credentials");
                (
                    StatusCode::UNAUTHORIZED,
                    [(WWW_AUTHENTICATE, "Basic")],
                    Json(ErrorDetail { detail: "Invalid credentials" }),
                )
                    .into_response()
            }
            Self::Validation(ref reason) => {
                tracing::warn!("rejected malformed alert payload: {reason}");
                (StatusCode::BAD_REQUEST, Json(ErrorDetail { detail: "Invalid alert payload" }))
                    .into_response()
            }
            error => {
                tracing::error!("failed to process alert: {:#}", anyhow::Error::new(error));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorDetail { detail: "Internal processing error" }),
                )
                    .into_response()
            }
        }
    }
}
