use serde::{ser::Serializer, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config invalid: {0}")]
    Config(String),
    #[error("harness is no longer running")]
    HarnessClosed,
    #[error("updater bridge is closed")]
    BridgeClosed,
    #[error("updater unavailable: {0}")]
    UpdaterUnavailable(String),
    #[error("malformed bridge message: {0}")]
    MalformedMessage(String),
    #[error("unknown updater command: {0}")]
    UnknownCommand(String),
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
