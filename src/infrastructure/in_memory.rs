use crate::domain::account::{AccountRef, AccountSnapshot};
use crate::domain::card::Card;
use crate::domain::ports::SharedSink;
use crate::domain::{AccountId, CardId, Token};
use crate::error::{BankError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// A card together with the accounts linked to it, in link order.
#[derive(Debug)]
pub struct CardLinks {
    pub card: Card,
    pub accounts: Vec<AccountRef>,
}

impl CardLinks {
    /// Creates a new link list holding a single account.
    pub fn new(card: Card, first: AccountRef) -> Self {
        Self {
            card,
            accounts: vec![first],
        }
    }

    /// Ids of the linked accounts, in link order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.iter().map(|a| a.lock().id()).collect()
    }
}

/// The card to accounts link map.
///
/// Ordered by card id so administrative scans visit cards in a stable order.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: Mutex<BTreeMap<CardId, CardLinks>>,
}

impl LinkTable {
    /// Creates a new, empty link table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly issued card. Fails if the card id is already linked.
    pub fn insert(&self, card_id: CardId, links: CardLinks) -> Result<()> {
        let mut table = self.links.lock();
        if table.contains_key(&card_id) {
            return Err(BankError::DuplicateLink(format!("card {card_id}")));
        }
        table.insert(card_id, links);
        Ok(())
    }

    /// Appends `account` to the link list of an existing card.
    pub fn append(&self, card_id: CardId, account: AccountRef) -> Result<()> {
        let mut table = self.links.lock();
        let links = table
            .get_mut(&card_id)
            .ok_or(BankError::UnknownCard(card_id))?;
        let account_id = account.lock().id();
        if links.accounts.iter().any(|a| a.lock().id() == account_id) {
            return Err(BankError::DuplicateLink(format!("account {account_id}")));
        }
        links.accounts.push(account);
        Ok(())
    }

    /// Runs `f` against the entry for `card_id` while the table lock is held.
    pub fn with_card<R>(&self, card_id: CardId, f: impl FnOnce(&mut CardLinks) -> R) -> Option<R> {
        let mut table = self.links.lock();
        table.get_mut(&card_id).map(f)
    }

    /// Ids of the accounts linked to `card_id`, or `None` for an unknown card.
    pub fn account_ids(&self, card_id: CardId) -> Option<Vec<AccountId>> {
        self.with_card(card_id, |links| links.account_ids())
    }

    /// Resolves `account_id` among the accounts linked to `card_id`.
    pub fn find_account(&self, card_id: CardId, account_id: AccountId) -> Result<AccountRef> {
        self.with_card(card_id, |links| {
            links
                .accounts
                .iter()
                .find(|a| a.lock().id() == account_id)
                .cloned()
        })
        .ok_or(BankError::UnknownCard(card_id))?
        .ok_or(BankError::UnknownAccount(account_id))
    }

    /// First card, in card order, holding an account owned by `owner`.
    pub fn find_by_owner(&self, owner: &str) -> Option<(CardId, Vec<AccountId>)> {
        let table = self.links.lock();
        table
            .iter()
            .find(|(_, links)| links.accounts.iter().any(|a| a.lock().owner() == owner))
            .map(|(card_id, links)| (*card_id, links.account_ids()))
    }

    /// Snapshots every account, grouped by card in card order.
    pub fn snapshot(&self) -> Vec<AccountSnapshot> {
        let table = self.links.lock();
        table
            .values()
            .flat_map(|links| {
                let card = links.card.id();
                links.accounts.iter().map(move |account| {
                    let account = account.lock();
                    AccountSnapshot {
                        owner: account.owner().to_string(),
                        balance: account.balance().value(),
                        account: account.id(),
                        card,
                    }
                })
            })
            .collect()
    }

    /// Removes every card and its links.
    pub fn clear(&self) {
        self.links.lock().clear();
    }
}

/// A live transaction session.
#[derive(Debug, Clone)]
pub struct Session {
    pub card: CardId,
    /// The selected account; `None` until the session becomes active.
    pub selected: Option<AccountRef>,
    pub last_activity: Instant,
}

impl Session {
    /// Creates a new session on `card` with no account selected.
    pub fn new(card: CardId) -> Self {
        Self {
            card,
            selected: None,
            last_activity: Instant::now(),
        }
    }
}

/// The token to session map.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<Token, Session>>,
}

impl SessionTable {
    /// Creates a new, empty session table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new session for `token`. Fails if the token is already live.
    pub fn open(&self, token: Token, card: CardId) -> Result<()> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&token) {
            return Err(BankError::DuplicateLink(format!("token {token}")));
        }
        sessions.insert(token, Session::new(card));
        Ok(())
    }

    /// Returns a copy of the session and records activity on it.
    pub fn touch(&self, token: Token) -> Option<Session> {
        let mut sessions = self.sessions.lock();
        sessions.get_mut(&token).map(|session| {
            session.last_activity = Instant::now();
            session.clone()
        })
    }

    /// Returns a copy of the session without recording activity.
    pub fn get(&self, token: Token) -> Option<Session> {
        self.sessions.lock().get(&token).cloned()
    }

    /// Stores the selected account on a live session. Returns whether the
    /// session was found.
    pub fn select(&self, token: Token, account: AccountRef) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&token) {
            Some(session) => {
                session.selected = Some(account);
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes the session for `token`, returning it if it was live.
    pub fn remove(&self, token: Token) -> Option<Session> {
        self.sessions.lock().remove(&token)
    }

    /// Tokens whose last activity is at least `max_idle` old.
    pub fn idle(&self, max_idle: Duration) -> Vec<Token> {
        let sessions = self.sessions.lock();
        sessions
            .iter()
            .filter(|(_, session)| session.last_activity.elapsed() >= max_idle)
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sessions.lock().clear();
    }
}

/// The token to notification sink map.
#[derive(Default)]
pub struct SinkTable {
    sinks: Mutex<HashMap<Token, SharedSink>>,
}

impl SinkTable {
    /// Creates a new, empty sink table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the sink for `token`. A token gets at most one sink.
    pub fn register(&self, token: Token, sink: SharedSink) -> Result<()> {
        let mut sinks = self.sinks.lock();
        if sinks.contains_key(&token) {
            return Err(BankError::DuplicateLink(format!("sink for token {token}")));
        }
        sinks.insert(token, sink);
        Ok(())
    }

    pub fn get(&self, token: Token) -> Option<SharedSink> {
        self.sinks.lock().get(&token).cloned()
    }

    /// Removes and returns the sink for `token`.
    pub fn remove(&self, token: Token) -> Option<SharedSink> {
        self.sinks.lock().remove(&token)
    }

    pub fn clear(&self) {
        self.sinks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, Balance};
    use crate::domain::notification::Notification;
    use std::sync::Arc;

    fn account(id: AccountId, owner: &str, balance: i64) -> AccountRef {
        Account::new(id, owner, Balance::new(balance)).into_ref()
    }

    #[test]
    fn test_link_table_insert_and_append() {
        let table = LinkTable::new();
        table
            .insert(3, CardLinks::new(Card::new(3, 8888), account(10, "alice", 5)))
            .unwrap();
        table.append(3, account(11, "alice", 7)).unwrap();

        assert_eq!(table.account_ids(3), Some(vec![10, 11]));
        assert!(table.account_ids(4).is_none());
    }

    #[test]
    fn test_link_table_rejects_duplicates() {
        let table = LinkTable::new();
        table
            .insert(3, CardLinks::new(Card::new(3, 8888), account(10, "alice", 5)))
            .unwrap();

        let again = table.insert(3, CardLinks::new(Card::new(3, 8888), account(12, "bob", 0)));
        assert!(matches!(again, Err(BankError::DuplicateLink(_))));

        let same_account = table.append(3, account(10, "alice", 5));
        assert!(matches!(same_account, Err(BankError::DuplicateLink(_))));

        let missing = table.append(99, account(13, "carol", 0));
        assert!(matches!(missing, Err(BankError::UnknownCard(99))));
    }

    #[test]
    fn test_link_table_find_account() {
        let table = LinkTable::new();
        table
            .insert(1, CardLinks::new(Card::new(1, 8888), account(10, "alice", 5)))
            .unwrap();

        assert_eq!(table.find_account(1, 10).unwrap().lock().id(), 10);
        assert!(matches!(
            table.find_account(1, 11),
            Err(BankError::UnknownAccount(11))
        ));
        assert!(matches!(
            table.find_account(2, 10),
            Err(BankError::UnknownCard(2))
        ));
    }

    #[test]
    fn test_link_table_find_by_owner_returns_first_card() {
        let table = LinkTable::new();
        table
            .insert(5, CardLinks::new(Card::new(5, 8888), account(50, "dana", 0)))
            .unwrap();
        table
            .insert(2, CardLinks::new(Card::new(2, 8888), account(20, "dana", 0)))
            .unwrap();

        assert_eq!(table.find_by_owner("dana"), Some((2, vec![20])));
        assert!(table.find_by_owner("erin").is_none());
    }

    #[test]
    fn test_session_table_lifecycle() {
        let sessions = SessionTable::new();
        sessions.open(1, 42).unwrap();
        assert!(matches!(
            sessions.open(1, 43),
            Err(BankError::DuplicateLink(_))
        ));

        assert!(sessions.get(1).unwrap().selected.is_none());
        assert!(sessions.select(1, account(7, "alice", 0)));
        assert!(sessions.get(1).unwrap().selected.is_some());

        assert_eq!(sessions.remove(1).unwrap().card, 42);
        assert!(sessions.remove(1).is_none());
        assert!(!sessions.select(1, account(7, "alice", 0)));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_session_table_idle() {
        let sessions = SessionTable::new();
        sessions.open(1, 42).unwrap();
        assert_eq!(sessions.idle(Duration::ZERO), vec![1]);
        assert!(sessions.idle(Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn test_sink_table() {
        let sinks = SinkTable::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Notification>();
        sinks.register(9, Arc::new(tx.clone())).unwrap();
        assert!(sinks.register(9, Arc::new(tx)).is_err());

        sinks.get(9).unwrap().notify(Notification::show(1, "hello"));
        assert_eq!(rx.try_recv().unwrap().message, "hello");

        assert!(sinks.remove(9).is_some());
        assert!(sinks.get(9).is_none());
        assert!(sinks.remove(9).is_none());
    }
}
