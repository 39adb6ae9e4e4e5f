use super::AccountId;
use crate::error::{BankError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Represents a monetary value in whole currency units.
///
/// Wraps an `i64` so balance arithmetic stays separate from ids and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Balance(pub i64);

/// Represents a strictly positive amount moved by a deposit or withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    /// Creates a new amount, rejecting zero and negative values.
    pub fn new(value: i64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(BankError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(amount: i64) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `None` if the sum does not fit in a balance.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `None` if the difference would be negative.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).filter(|v| *v >= 0).map(Self)
    }
}

/// The operation a terminal asks for once an account is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    CheckBalance,
}

/// A validated transaction, ready to be applied to an [`Account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    Deposit(Amount),
    Withdraw(Amount),
    CheckBalance,
}

impl Transaction {
    /// Builds a transaction from the terminal-facing kind and raw amount.
    ///
    /// The amount is ignored for balance checks.
    pub fn new(kind: TransactionKind, amount: i64) -> Result<Self> {
        match kind {
            TransactionKind::Deposit => Ok(Self::Deposit(Amount::new(amount)?)),
            TransactionKind::Withdraw => Ok(Self::Withdraw(Amount::new(amount)?)),
            TransactionKind::CheckBalance => Ok(Self::CheckBalance),
        }
    }

}

/// Result of applying a [`Transaction`].
///
/// `amount` is the amount moved for deposits and withdrawals (the requested
/// amount when either is rejected) and the current balance for checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub accepted: bool,
    pub amount: i64,
}

/// A balance-holding account.
///
/// The id and owner are fixed at creation; only the balance changes, and never
/// below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    owner: String,
    balance: Balance,
}

/// Shared handle to an account. Held by the card link table and, while an
/// account is selected, by the session record.
pub type AccountRef = Arc<Mutex<Account>>;

impl Account {
    /// Creates a new account with an opening balance.
    pub fn new(id: AccountId, owner: impl Into<String>, opening: Balance) -> Self {
        Self {
            id,
            owner: owner.into(),
            balance: opening,
        }
    }

    pub fn into_ref(self) -> AccountRef {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    /// Deposits funds unless the balance would overflow. Returns whether it did.
    pub fn deposit(&mut self, amount: Amount) -> bool {
        match self.balance.checked_add(amount.into()) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => false,
        }
    }

    /// Withdraws funds if the balance covers them. Returns whether it did.
    pub fn withdraw(&mut self, amount: Amount) -> bool {
        match self.balance.checked_sub(amount.into()) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => false,
        }
    }

    pub fn perform(&mut self, tx: Transaction) -> TransactionOutcome {
        match tx {
            Transaction::Deposit(amount) => TransactionOutcome {
                accepted: self.deposit(amount),
                amount: amount.value(),
            },
            Transaction::Withdraw(amount) => TransactionOutcome {
                accepted: self.withdraw(amount),
                amount: amount.value(),
            },
            // Balance checks settle nothing.
            Transaction::CheckBalance => TransactionOutcome {
                accepted: false,
                amount: self.balance.value(),
            },
        }
    }
}

/// Read-only view of an account for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub owner: String,
    pub balance: i64,
    pub account: AccountId,
    pub card: super::CardId,
}
