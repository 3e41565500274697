use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure of one collection cycle. Any of these aborts the whole scrape.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("storage node API unreachable at {url}: {source}")]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bad response from {url}: {reason}")]
    UpstreamBadResponse { url: String, reason: String },

    #[error("satellite {id} not found on storage node")]
    SatelliteNotFound { id: String },

    #[error("malformed storage node data: {0}")]
    MalformedUpstreamData(String),
}

impl CollectError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamBadResponse { .. } => "upstream_bad_response",
            Self::SatelliteNotFound { .. } => "satellite_not_found",
            Self::MalformedUpstreamData(_) => "malformed_upstream_data",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable { .. }
            | Self::UpstreamBadResponse { .. }
            | Self::SatelliteNotFound { .. } => StatusCode::BAD_GATEWAY,
            Self::MalformedUpstreamData(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollectError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(error = %self, kind = self.kind(), status = %status, "scrape failed");
        (status, format!("scrape failed: {self}\n")).into_response()
    }
}

pub type CollectResult<T> = Result<T, CollectError>;
