use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("channel handle '{0}' already has an active subscriber")]
    HandleInUse(String),

    #[error("no subscriber on channel handle '{0}'")]
    NoSubscriber(String),

    #[error("subscriber on channel handle '{0}' went away")]
    Closed(String),
}
