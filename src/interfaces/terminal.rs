use crate::application::bank::Bank;
use crate::domain::account::{TransactionKind, TransactionOutcome};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::{AccountId, CardId, Pin, TerminalId, Token};
use crate::error::{BankError, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// An ATM front end driving one session at a time against a shared [`Bank`].
///
/// Notifications for the current session arrive on an unbounded channel and
/// are collected into a transcript until drained. Dropping the terminal closes
/// its session and gives its terminal id back.
pub struct AtmTerminal {
    id: TerminalId,
    bank: Arc<Bank>,
    token: Option<Token>,
    sender: UnboundedSender<Notification>,
    receiver: UnboundedReceiver<Notification>,
    transcript: Vec<Notification>,
}

impl AtmTerminal {
    /// Creates a new terminal, taking a terminal id from the bank.
    pub fn new(bank: Arc<Bank>) -> Result<Self> {
        let id = bank.register_terminal()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        info!(terminal = id, "Terminal online");
        Ok(Self {
            id,
            bank,
            token: None,
            sender,
            receiver,
            transcript: Vec::new(),
        })
    }

    pub fn id(&self) -> TerminalId {
        self.id
    }

    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// Authenticates the card and returns the accounts it can select.
    pub fn insert_card(&mut self, card: CardId, pin: Pin) -> Result<Vec<AccountId>> {
        if self.token.is_some() {
            self.display(Notification::error("Transaction duplication"));
            return Err(BankError::SessionInProgress);
        }

        let token = self.bank.authenticate(card, pin).inspect_err(|e| {
            self.display(Notification::error(e.to_string()));
        })?;
        if let Err(e) = self.bank.acknowledge(token, Arc::new(self.sender.clone())) {
            self.bank.close_session(token);
            self.display(Notification::error(e.to_string()));
            return Err(e);
        }
        self.token = Some(token);
        self.refresh();

        match self.transcript.last() {
            Some(prompt) if prompt.kind == NotificationKind::ShowInput => {
                Ok(prompt.accounts.clone())
            }
            _ => Err(BankError::UnknownCard(card)),
        }
    }

    pub fn select_account(&mut self, account: AccountId) -> Result<()> {
        let token = self.token.ok_or(BankError::NoCardInserted)?;
        let result = self.bank.select_account(token, account);
        self.refresh();
        result
    }

    pub fn transact(&mut self, kind: TransactionKind, amount: i64) -> Result<TransactionOutcome> {
        let token = self.token.ok_or(BankError::NoCardInserted)?;
        let result = self.bank.perform_transaction(token, kind, amount);
        self.refresh();
        result
    }

    /// Ends the current session. Returns whether one was live.
    pub fn eject_card(&mut self) -> bool {
        let closed = match self.token.take() {
            Some(token) => self.bank.close_session(token),
            None => false,
        };
        self.refresh();
        closed
    }

    /// Returns and clears everything received since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.refresh();
        std::mem::take(&mut self.transcript)
    }

    fn display(&mut self, notification: Notification) {
        self.transcript.push(notification);
    }

    /// Pulls pending notifications and forgets the token once the bank has
    /// closed the session.
    fn refresh(&mut self) {
        while let Ok(notification) = self.receiver.try_recv() {
            debug!(terminal = self.id, kind = %notification.kind, info = notification.info, "{}", notification.message);
            self.transcript.push(notification);
        }
        if let Some(token) = self.token
            && self.bank.session_state(token).is_none()
        {
            self.token = None;
        }
    }
}

impl Drop for AtmTerminal {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.bank.close_session(token);
        }
        self.bank.release_terminal(self.id);
    }
}
