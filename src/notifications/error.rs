use thiserror::Error;

use super::senders::SenderError;
use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Notifier not found: {0}")]
    NotFound(String),
    #[error("Notifier already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Sender error: {0}")]
    SenderError(#[from] SenderError),
    #[error("Notifier {0} does not support testing")]
    TestUnsupported(String),
}
