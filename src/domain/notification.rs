use super::AccountId;
use serde::Serialize;
use std::fmt;

/// What the terminal is asked to do with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Informational display.
    Show,
    /// Prompt for further input.
    ShowInput,
    /// Error display; the session has been aborted or the request refused.
    ShowError,
    /// Accept cash from the user.
    Take,
    /// Dispense cash to the user.
    Give,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Show => "SHOW",
            Self::ShowInput => "SHOW_INPUT",
            Self::ShowError => "SHOW_ERROR",
            Self::Take => "TAKE",
            Self::Give => "GIVE",
        };
        f.write_str(name)
    }
}

/// A message pushed from the bank to the terminal that owns a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub info: i64,
    pub message: String,
    /// Selectable accounts; only set on the account prompt.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<AccountId>,
}

impl Notification {
    pub fn new(kind: NotificationKind, info: i64, message: impl Into<String>) -> Self {
        Self {
            kind,
            info,
            message: message.into(),
            accounts: Vec::new(),
        }
    }

    /// Prompt listing the accounts linked to the session's card.
    pub fn account_prompt(accounts: Vec<AccountId>) -> Self {
        let message = accounts
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            kind: NotificationKind::ShowInput,
            info: accounts.len() as i64,
            message,
            accounts,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::ShowInput, 1, message)
    }

    pub fn show(info: i64, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Show, info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::ShowError, -1, message)
    }

    pub fn take(amount: i64) -> Self {
        Self::new(NotificationKind::Take, amount, "Insert cash")
    }

    pub fn give(amount: i64) -> Self {
        Self::new(NotificationKind::Give, amount, "Take your cash")
    }
}
