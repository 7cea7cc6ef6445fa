use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::check::Status;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid gateway id: {0:?}")]
    InvalidGatewayId(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unable to get data: server returned {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("last seen in the future ({last_seen}, {} seconds ahead)", .ahead.num_seconds())]
    LastSeenInFuture {
        last_seen: DateTime<Utc>,
        ahead: TimeDelta,
    },

    #[error("gateway {0} has never been seen")]
    NeverSeen(String),

    #[error("io error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Plugin status this error is reported as.
    pub fn status(&self) -> Status {
        match self {
            Error::NeverSeen(_) => Status::Critical,
            _ => Status::Unknown,
        }
    }
}
