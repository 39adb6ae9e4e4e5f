use crate::domain::{AccountId, CardId, Token};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Unknown card: {0}")]
    UnknownCard(CardId),
    #[error("Bad credentials")]
    BadCredentials,
    #[error("Unknown session: {0}")]
    UnknownSession(Token),
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),
    #[error("Identifier pool exhausted: {0}")]
    PoolExhausted(&'static str),
    #[error("Duplicate link: {0}")]
    DuplicateLink(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),
    #[error("No account selected in session: {0}")]
    NoAccountSelected(Token),
    #[error("No card inserted")]
    NoCardInserted,
    #[error("A session is already in progress on this terminal")]
    SessionInProgress,
    #[error("Cannot reset while {0} terminal(s) are registered")]
    TerminalsOnline(usize),
    #[error("Terminal task failed: {0}")]
    TerminalTask(#[from] tokio::task::JoinError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BankError>;
