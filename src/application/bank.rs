use crate::config::{BankConfig, SelectionMode};
use crate::domain::account::{
    Account, AccountRef, AccountSnapshot, Balance, Transaction, TransactionKind,
    TransactionOutcome,
};
use crate::domain::card::Card;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::SharedSink;
use crate::domain::{AccountId, CardId, Pin, TerminalId, Token};
use crate::error::{BankError, Result};
use crate::infrastructure::id_pool::IdentifierPool;
use crate::infrastructure::in_memory::{CardLinks, LinkTable, SessionTable, SinkTable};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Ids assigned by [`Bank::provision_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisioned {
    pub account: AccountId,
    pub card: CardId,
}

/// Result of the administrative owner lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerLookup {
    pub card: CardId,
    pub accounts: Vec<AccountId>,
}

/// Lifecycle of a live session. Closed sessions have no state: their token
/// no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Authenticated, no account selected yet.
    Open,
    /// An account is selected and transactions can run.
    Active,
}

/// The shared banking coordinator.
///
/// Owns every account, card, link and live session, and is shared between
/// terminals behind an `Arc`. Each table and each identifier pool has its own
/// lock, held for a single read-modify-write only. Operations that touch
/// several tables take those locks one after another, so a concurrent
/// operation may observe an intermediate state; no lock is held while a
/// notification sink runs.
///
/// Callers must not issue overlapping operations on the same token.
pub struct Bank {
    config: BankConfig,
    account_ids: IdentifierPool,
    card_ids: IdentifierPool,
    tokens: IdentifierPool,
    terminal_ids: IdentifierPool,
    links: LinkTable,
    sessions: SessionTable,
    sinks: SinkTable,
}

impl Default for Bank {
    fn default() -> Self {
        Self::new(BankConfig::default())
    }
}

impl Bank {
    /// Creates a new, empty bank with one identifier pool per id kind, each
    /// holding `config.pool_capacity` ids.
    pub fn new(config: BankConfig) -> Self {
        let capacity = config.pool_capacity;
        info!(capacity, mode = ?config.selection_mode, "Initializing bank");
        Self {
            config,
            account_ids: IdentifierPool::new("accounts", capacity),
            card_ids: IdentifierPool::new("cards", capacity),
            tokens: IdentifierPool::new("tokens", capacity),
            terminal_ids: IdentifierPool::new("terminals", capacity),
            links: LinkTable::new(),
            sessions: SessionTable::new(),
            sinks: SinkTable::new(),
        }
    }

    /// Returns the configuration the bank was created with.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Opens an account for `owner` with an opening balance of `amount`.
    ///
    /// With `card` the account is appended to that card's links; without it a
    /// new card is issued for the account. Ids taken for a failed call go back
    /// to their pools.
    pub fn provision_account(
        &self,
        owner: &str,
        amount: i64,
        card: Option<CardId>,
    ) -> Result<Provisioned> {
        if amount < 0 {
            return Err(BankError::InvalidAmount(amount));
        }

        let account_id = self.account_ids.acquire()?;
        let account = Account::new(account_id, owner, Balance::new(amount)).into_ref();

        let card_id = match card {
            Some(card_id) => {
                if let Err(e) = self.links.append(card_id, account) {
                    warn!(card = card_id, owner, "Unable to link account: {e}");
                    self.account_ids.release(account_id);
                    return Err(e);
                }
                card_id
            }
            None => {
                let card_id = match self.card_ids.acquire() {
                    Ok(id) => id,
                    Err(e) => {
                        self.account_ids.release(account_id);
                        return Err(e);
                    }
                };
                let links = CardLinks::new(Card::new(card_id, self.config.default_pin), account);
                if let Err(e) = self.links.insert(card_id, links) {
                    error!(card = card_id, owner, "Unable to register card: {e}");
                    self.card_ids.release(card_id);
                    self.account_ids.release(account_id);
                    return Err(e);
                }
                card_id
            }
        };

        info!(account = account_id, card = card_id, owner, amount, "Account provisioned");
        Ok(Provisioned {
            account: account_id,
            card: card_id,
        })
    }

    /// Verifies `pin` against the card and opens a session for it.
    ///
    /// This is the only place tokens are minted.
    pub fn authenticate(&self, card: CardId, pin: Pin) -> Result<Token> {
        let verified = self
            .links
            .with_card(card, |links| links.card.verify(pin))
            .ok_or_else(|| {
                warn!(card, "Authentication for unknown card");
                BankError::UnknownCard(card)
            })?;
        if !verified {
            warn!(card, "Incorrect PIN");
            return Err(BankError::BadCredentials);
        }

        let token = self.tokens.acquire()?;
        if let Err(e) = self.sessions.open(token, card) {
            self.tokens.release(token);
            return Err(e);
        }
        info!(token, card, "Session opened");
        Ok(token)
    }

    /// Registers the sink for `token` and sends it the account prompt.
    ///
    /// If the card's links cannot be found the session is aborted instead,
    /// which delivers a single `SHOW_ERROR` to the sink.
    pub fn acknowledge(&self, token: Token, sink: SharedSink) -> Result<()> {
        let session = self
            .sessions
            .touch(token)
            .ok_or(BankError::UnknownSession(token))?;
        self.sinks.register(token, sink.clone())?;

        match self.links.account_ids(session.card) {
            Some(accounts) => {
                debug!(token, count = accounts.len(), "Prompting for account");
                sink.notify(Notification::account_prompt(accounts));
            }
            None => self.abort_session(token, "Unable to find accounts"),
        }
        Ok(())
    }

    /// Selects the account the session will transact on.
    ///
    /// Any lookup failure aborts the session before the error is returned.
    pub fn select_account(&self, token: Token, account: AccountId) -> Result<()> {
        info!(token, account, "Selecting account");
        let Some(session) = self.sessions.touch(token) else {
            self.abort_session(token, "Unknown session");
            return Err(BankError::UnknownSession(token));
        };

        let selected = match self.links.find_account(session.card, account) {
            Ok(selected) => selected,
            Err(e) => {
                self.abort_session(token, "Account not found");
                return Err(e);
            }
        };

        if !self.sessions.select(token, selected.clone()) {
            self.abort_session(token, "Session closed during selection");
            return Err(BankError::UnknownSession(token));
        }

        if self.config.selection_mode == SelectionMode::CardSlot
            && let Err(e) = self.bind_card_slot(token, session.card, &selected)
        {
            let reason = match e {
                BankError::DuplicateLink(_) => "Card already in use",
                BankError::UnknownCard(_) => "Card not found",
                _ => "Session closed during selection",
            };
            self.abort_session(token, reason);
            return Err(e);
        }

        match self.sinks.get(token) {
            Some(sink) => {
                sink.notify(Notification::input("Select transaction type"));
                Ok(())
            }
            None => {
                self.abort_session(token, "Session not acknowledged");
                Err(BankError::UnknownSession(token))
            }
        }
    }

    /// Installs `token`'s binding on the card slot.
    ///
    /// A binding installed for a session that closed in the meantime is taken
    /// back before returning, so no dead token keeps the slot.
    fn bind_card_slot(&self, token: Token, card: CardId, selected: &AccountRef) -> Result<()> {
        match self
            .links
            .with_card(card, |links| links.card.bind_handler(token, selected))
        {
            Some(true) => {}
            Some(false) => {
                return Err(BankError::DuplicateLink(format!("card {card} already bound")));
            }
            None => return Err(BankError::UnknownCard(card)),
        }
        if self.sessions.get(token).is_none() {
            self.links
                .with_card(card, |links| links.card.unbind_handler(token));
            return Err(BankError::UnknownSession(token));
        }
        Ok(())
    }

    /// Runs a transaction against the session's selected account.
    ///
    /// Invalid amounts are refused up front and leave the session untouched.
    /// A rejected withdrawal, or a deposit the balance cannot hold, is reported
    /// as `SHOW_ERROR` but keeps the session active. A session without a
    /// selected account is aborted, and so is a card-slot session whose binding
    /// was cleared or taken over by another session.
    pub fn perform_transaction(
        &self,
        token: Token,
        kind: TransactionKind,
        amount: i64,
    ) -> Result<TransactionOutcome> {
        let tx = Transaction::new(kind, amount)?;

        let Some(session) = self.sessions.touch(token) else {
            self.abort_session(token, "Unknown session");
            return Err(BankError::UnknownSession(token));
        };
        let Some(sink) = self.sinks.get(token) else {
            self.abort_session(token, "Session not acknowledged");
            return Err(BankError::UnknownSession(token));
        };

        let outcome = match self.config.selection_mode {
            SelectionMode::Session => session
                .selected
                .as_ref()
                .map(|account| account.lock().perform(tx)),
            SelectionMode::CardSlot => self
                .links
                .with_card(session.card, |links| links.card.forward(token, tx))
                .flatten(),
        };
        let Some(outcome) = outcome else {
            self.abort_session(token, "No account selected");
            return Err(BankError::NoAccountSelected(token));
        };

        info!(token, ?kind, amount, accepted = outcome.accepted, "Transaction processed");
        let notification = match kind {
            TransactionKind::Deposit if outcome.accepted => Notification::take(outcome.amount),
            TransactionKind::Deposit => Notification::new(
                NotificationKind::ShowError,
                outcome.amount,
                "Balance limit exceeded",
            ),
            TransactionKind::Withdraw if outcome.accepted => Notification::give(outcome.amount),
            TransactionKind::Withdraw => Notification::new(
                NotificationKind::ShowError,
                outcome.amount,
                "Insufficient funds",
            ),
            TransactionKind::CheckBalance => Notification::show(outcome.amount, "Current balance"),
        };
        sink.notify(notification);
        Ok(outcome)
    }

    /// Ends a session at the terminal's request. Returns whether it was live.
    pub fn close_session(&self, token: Token) -> bool {
        let (live, _) = self.teardown(token);
        if live {
            info!(token, "Session closed");
        }
        live
    }

    /// Tears a session down and tells its sink, if one was registered.
    ///
    /// Safe to call on a token that is already closed: nothing happens.
    pub fn abort_session(&self, token: Token, reason: &str) {
        let (live, sink) = self.teardown(token);
        if live || sink.is_some() {
            error!(token, reason, "Session aborted");
        }
        if let Some(sink) = sink {
            sink.notify(Notification::error(reason));
        }
    }

    /// Removes every trace of `token`. The sink goes first and the token is
    /// released last, so a recycled token never meets stale entries.
    fn teardown(&self, token: Token) -> (bool, Option<SharedSink>) {
        let sink = self.sinks.remove(token);
        let Some(session) = self.sessions.remove(token) else {
            return (false, sink);
        };

        if self.config.selection_mode == SelectionMode::CardSlot {
            self.links
                .with_card(session.card, |links| links.card.unbind_handler(token));
        }
        self.tokens.release(token);
        (true, sink)
    }

    /// Returns the state of a live session, or `None` once it is closed.
    pub fn session_state(&self, token: Token) -> Option<SessionState> {
        self.sessions.get(token).map(|session| match session.selected {
            Some(_) => SessionState::Active,
            None => SessionState::Open,
        })
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Aborts every session idle for at least `max_idle`. Returns how many.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let idle = self.sessions.idle(max_idle);
        for token in &idle {
            self.abort_session(*token, "Session timed out");
        }
        if !idle.is_empty() {
            info!(count = idle.len(), "Swept idle sessions");
        }
        idle.len()
    }

    /// Takes a terminal id from the terminal pool.
    pub fn register_terminal(&self) -> Result<TerminalId> {
        let id = self.terminal_ids.acquire()?;
        debug!(terminal = id, "Terminal registered");
        Ok(id)
    }

    /// Gives a terminal id back. Releasing an id that is not held does nothing.
    pub fn release_terminal(&self, id: TerminalId) {
        debug!(terminal = id, "Terminal released");
        self.terminal_ids.release(id);
    }

    /// Looks up the first card holding an account owned by `owner`.
    ///
    /// Gated by a single shared passcode. This is a backdoor kept for
    /// compatibility with existing tooling, not an access control mechanism.
    pub fn privileged_operation(&self, passcode: u32, owner: &str) -> Option<OwnerLookup> {
        if passcode != self.config.admin_passcode {
            warn!("Unauthorized privileged lookup");
            return None;
        }
        info!(owner, "Privileged owner lookup");
        self.links
            .find_by_owner(owner)
            .map(|(card, accounts)| OwnerLookup { card, accounts })
    }

    /// Every account, grouped by card.
    pub fn accounts(&self) -> Vec<AccountSnapshot> {
        self.links.snapshot()
    }

    /// Drops all state and refills every identifier pool.
    ///
    /// Refused while any terminal is registered: its id and any token it holds
    /// would otherwise be handed out again while it still uses them.
    pub fn reset(&self) -> Result<()> {
        let online = self.terminal_ids.held();
        if online > 0 {
            warn!(online, "Refusing to reset with terminals registered");
            return Err(BankError::TerminalsOnline(online));
        }
        info!("Resetting bank");
        self.sinks.clear();
        self.sessions.clear();
        self.links.clear();
        self.account_ids.reset();
        self.card_ids.reset();
        self.tokens.reset();
        self.terminal_ids.reset();
        Ok(())
    }
}
