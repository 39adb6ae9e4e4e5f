//! Configuration for the bank coordinator.

use crate::domain::Pin;
use crate::error::{BankError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_POOL_CAPACITY: u32 = 1000;
pub const DEFAULT_PIN: Pin = 8888;
pub const DEFAULT_ADMIN_PASSCODE: u32 = 12345;

/// Where the account selected by a session is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// In the session record, keyed by token. Sessions sharing a card stay independent.
    #[default]
    Session,
    /// In the card's single handler slot. A second selection on the same card
    /// clears the first and fails.
    CardSlot,
}

/// Bank configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Size of each identifier pool (accounts, cards, tokens, terminals).
    pub pool_capacity: u32,

    /// PIN given to every newly issued card.
    pub default_pin: Pin,

    /// Shared secret for the administrative owner lookup.
    pub admin_passcode: u32,

    pub selection_mode: SelectionMode,

    /// Sessions idle for longer than this are aborted by the sweeper.
    pub session_idle_timeout_secs: Option<u64>,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            default_pin: DEFAULT_PIN,
            admin_passcode: DEFAULT_ADMIN_PASSCODE,
            selection_mode: SelectionMode::default(),
            session_idle_timeout_secs: None,
        }
    }
}

impl BankConfig {
    /// Loads a JSON configuration file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(BankError::Config(
                "pool_capacity must be greater than zero".to_string(),
            ));
        }
        if self.session_idle_timeout_secs == Some(0) {
            return Err(BankError::Config(
                "session_idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        self.session_idle_timeout_secs.map(Duration::from_secs)
    }
}
