use super::account::{Account, AccountRef, Transaction, TransactionOutcome};
use super::{CardId, Pin, Token};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// The forwarding binding a session installs on its card.
#[derive(Debug)]
struct Binding {
    token: Token,
    account: Weak<Mutex<Account>>,
}

/// A payment card gating access to the accounts linked to it.
///
/// The card may carry a single forwarding binding to the account selected by
/// the session using it. The binding is weak: it never keeps an account alive
/// and never becomes a second owner of it. It is tagged with the token of the
/// session that installed it, and only that session can use or remove it.
#[derive(Debug)]
pub struct Card {
    id: CardId,
    pin: Pin,
    handler: Option<Binding>,
}

impl Card {
    /// Creates a new card with no binding.
    pub fn new(id: CardId, pin: Pin) -> Self {
        Self {
            id,
            pin,
            handler: None,
        }
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    /// No lockout or attempt counting.
    pub fn verify(&self, pin: Pin) -> bool {
        self.pin == pin
    }

    /// Binds the forwarding handler to `account` on behalf of `token`.
    ///
    /// Fails if another session's handler is already bound, and in that case
    /// also clears the existing binding so the owning session has to select
    /// again. A session re-selecting replaces its own binding.
    pub fn bind_handler(&mut self, token: Token, account: &AccountRef) -> bool {
        if let Some(existing) = self.handler.take()
            && existing.token != token
        {
            return false;
        }
        self.handler = Some(Binding {
            token,
            account: Arc::downgrade(account),
        });
        true
    }

    /// Clears the binding if `token` installed it. Returns whether it did.
    pub fn unbind_handler(&mut self, token: Token) -> bool {
        match &self.handler {
            Some(binding) if binding.token == token => {
                self.handler = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Routes a transaction to the account bound by `token`, if that binding
    /// is still in place and the account is alive.
    pub fn forward(&self, token: Token, tx: Transaction) -> Option<TransactionOutcome> {
        let binding = self.handler.as_ref().filter(|b| b.token == token)?;
        let account = binding.account.upgrade()?;
        let mut account = account.lock();
        Some(account.perform(tx))
    }
}
