use thiserror::Error;

/// Page content did not have the shape the bot relies on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("no match for {0}")]
    MissingMatch(String),
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error("invalid procedure title `{0}`")]
    InvalidTitle(String),
    #[error("malformed admin list: {0}")]
    MalformedList(String),
    #[error("{0} is not a vote")]
    NotAVote(String),
}
