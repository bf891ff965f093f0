//! Error type for the host runtime

use std::path::PathBuf;

use headset_control::{BringupError, FrameError, StorageError};
use thiserror::Error;

/// Errors that can occur while hosting the control plane
#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("host frame error: {0}")]
    Frame(FrameError),
    #[error("NVRAM error: {0}")]
    Storage(StorageError),
    #[error("bring-up failed: {0}")]
    Bringup(BringupError),
    #[error("control context is gone")]
    ChannelClosed,
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<FrameError> for HostError {
    fn from(e: FrameError) -> Self {
        HostError::Frame(e)
    }
}

impl From<StorageError> for HostError {
    fn from(e: StorageError) -> Self {
        HostError::Storage(e)
    }
}

impl From<BringupError> for HostError {
    fn from(e: BringupError) -> Self {
        HostError::Bringup(e)
    }
}

pub type HostResult<T> = Result<T, HostError>;
