use super::csv::script_reader::{ScriptAction, ScriptStep};
use super::terminal::AtmTerminal;
use crate::application::bank::Bank;
use crate::domain::{AccountId, CardId};
use crate::domain::account::TransactionKind;
use crate::error::{BankError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Counts of script steps that ran and that were refused.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub rejected: usize,
}

impl RunSummary {
    fn record(&mut self, result: Result<()>, step: &ScriptStep) {
        match result {
            Ok(()) => self.executed += 1,
            Err(e) => {
                eprintln!("Error processing step {:?}: {}", step.action, e);
                self.rejected += 1;
            }
        }
    }

    fn merge(&mut self, other: RunSummary) {
        self.executed += other.executed;
        self.rejected += other.rejected;
    }
}

/// Replays an ATM script against a shared bank.
///
/// Setup rows (no terminal) run first, in file order. Each terminal's rows
/// then run on a task of their own, concurrently with the other terminals and
/// in file order within the terminal.
pub struct ScriptRunner {
    bank: Arc<Bank>,
}

impl ScriptRunner {
    pub fn new(bank: Arc<Bank>) -> Self {
        Self { bank }
    }

    pub async fn run<I>(&self, steps: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<ScriptStep>>,
    {
        let mut summary = RunSummary::default();
        let mut setup = Vec::new();
        let mut terminals: BTreeMap<u16, Vec<ScriptStep>> = BTreeMap::new();

        for step in steps {
            match step {
                Ok(step) => match step.terminal {
                    Some(label) => terminals.entry(label).or_default().push(step),
                    None => setup.push(step),
                },
                Err(e) => {
                    eprintln!("Error reading step: {}", e);
                    summary.rejected += 1;
                }
            }
        }

        for step in &setup {
            summary.record(self.setup(step), step);
        }

        let sweeper = self
            .bank
            .config()
            .session_idle_timeout()
            .map(|timeout| spawn_idle_sweeper(self.bank.clone(), timeout));

        let mut tasks = JoinSet::new();
        for (label, steps) in terminals {
            let bank = self.bank.clone();
            tasks.spawn_blocking(move || drive_terminal(bank, label, steps));
        }
        while let Some(joined) = tasks.join_next().await {
            summary.merge(joined?);
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        info!(
            executed = summary.executed,
            rejected = summary.rejected,
            "Script finished"
        );
        Ok(summary)
    }

    fn setup(&self, step: &ScriptStep) -> Result<()> {
        let owner = required(step.owner.as_deref(), "owner")?;
        let amount = step.amount.unwrap_or(0);
        match step.action {
            ScriptAction::Provision => {
                self.bank.provision_account(owner, amount, None)?;
            }
            ScriptAction::Link => {
                let card = lookup_card(&self.bank, owner)?;
                self.bank.provision_account(owner, amount, Some(card))?;
            }
            other => {
                return Err(BankError::Config(format!(
                    "{other:?} needs a terminal"
                )));
            }
        }
        Ok(())
    }
}

/// Periodically aborts sessions idle for longer than `timeout`.
pub fn spawn_idle_sweeper(bank: Arc<Bank>, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(timeout / 2);
        loop {
            interval.tick().await;
            bank.sweep_idle(timeout);
        }
    })
}

/// Replays one terminal's steps. A terminal that cannot come online has all
/// of its steps rejected; the other terminals carry on.
fn drive_terminal(bank: Arc<Bank>, label: u16, steps: Vec<ScriptStep>) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut terminal = match AtmTerminal::new(bank.clone()) {
        Ok(terminal) => terminal,
        Err(e) => {
            eprintln!("Error starting terminal {label}: {e}");
            summary.rejected = steps.len();
            return summary;
        }
    };
    let mut prompt: Vec<AccountId> = Vec::new();

    for step in &steps {
        let result = match step.action {
            ScriptAction::Insert => required(step.owner.as_deref(), "owner")
                .and_then(|owner| lookup_card(&bank, owner))
                .and_then(|card| {
                    let pin = required(step.pin, "pin")?;
                    prompt = terminal.insert_card(card, pin)?;
                    Ok(())
                }),
            ScriptAction::Select => required(step.account, "account").and_then(|index| {
                let account = prompt
                    .get(index)
                    .copied()
                    .ok_or_else(|| BankError::Config(format!("no account at index {index}")))?;
                terminal.select_account(account)
            }),
            ScriptAction::Deposit => terminal
                .transact(TransactionKind::Deposit, step.amount.unwrap_or(0))
                .map(|_| ()),
            ScriptAction::Withdraw => terminal
                .transact(TransactionKind::Withdraw, step.amount.unwrap_or(0))
                .map(|_| ()),
            ScriptAction::Balance => terminal
                .transact(TransactionKind::CheckBalance, 0)
                .map(|_| ()),
            ScriptAction::Eject => {
                terminal.eject_card();
                Ok(())
            }
            ScriptAction::Provision | ScriptAction::Link => Err(BankError::Config(format!(
                "{:?} cannot run on a terminal",
                step.action
            ))),
        };
        summary.record(result, step);

        for notification in terminal.drain_notifications() {
            info!(
                terminal = label,
                kind = %notification.kind,
                info = notification.info,
                "{}",
                notification.message
            );
        }
    }

    if terminal.token().is_some() {
        warn!(terminal = label, "Script ended with a card inserted");
    }
    summary
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| BankError::Config(format!("missing {field}")))
}

/// Scripts refer to cards by owner name, resolved through the admin lookup.
fn lookup_card(bank: &Bank, owner: &str) -> Result<CardId> {
    bank.privileged_operation(bank.config().admin_passcode, owner)
        .map(|lookup| lookup.card)
        .ok_or_else(|| BankError::Config(format!("no card for owner {owner}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::csv::script_reader::ScriptReader;

    fn balance_of(bank: &Bank, owner: &str) -> Vec<i64> {
        bank.accounts()
            .into_iter()
            .filter(|a| a.owner == owner)
            .map(|a| a.balance)
            .collect()
    }

    #[tokio::test]
    async fn test_run_single_terminal() {
        let data = "action, terminal, owner, amount, pin, account\n\
                    provision, , alice, 1000, ,\n\
                    insert, 1, alice, , 8888,\n\
                    select, 1, , , , 0\n\
                    withdraw, 1, , 500, ,\n\
                    withdraw, 1, , 600, ,\n\
                    balance, 1, , , ,\n\
                    eject, 1, , , ,";
        let bank = Arc::new(Bank::default());
        let runner = ScriptRunner::new(bank.clone());

        let summary = runner
            .run(ScriptReader::new(data.as_bytes()).steps())
            .await
            .unwrap();
        assert_eq!(
            summary,
            RunSummary {
                executed: 7,
                rejected: 0
            }
        );
        assert_eq!(balance_of(&bank, "alice"), vec![500]);
        assert_eq!(bank.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_run_concurrent_terminals() {
        let mut data = String::from("action, terminal, owner, amount, pin, account\n");
        for t in 1..=4 {
            data.push_str(&format!("provision, , owner{t}, 0, ,\n"));
        }
        for t in 1..=4 {
            data.push_str(&format!("insert, {t}, owner{t}, , 8888,\n"));
            data.push_str(&format!("select, {t}, , , , 0\n"));
            for _ in 0..25 {
                data.push_str(&format!("deposit, {t}, , 4, ,\n"));
            }
            data.push_str(&format!("eject, {t}, , , ,\n"));
        }

        let bank = Arc::new(Bank::default());
        let summary = ScriptRunner::new(bank.clone())
            .run(ScriptReader::new(data.as_bytes()).steps())
            .await
            .unwrap();

        assert_eq!(summary.rejected, 0);
        for t in 1..=4 {
            assert_eq!(balance_of(&bank, &format!("owner{t}")), vec![100]);
        }
    }

    #[test]
    fn test_terminal_without_free_id_rejects_its_steps() {
        let bank = Arc::new(Bank::new(crate::config::BankConfig {
            pool_capacity: 1,
            ..Default::default()
        }));
        let busy = bank.register_terminal().unwrap();
        let data = "action, terminal, owner, amount, pin, account\n\
                    balance, 2, , , ,\n\
                    eject, 2, , , ,";
        let steps = ScriptReader::new(data.as_bytes())
            .steps()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let summary = drive_terminal(bank.clone(), 2, steps);
        assert_eq!(
            summary,
            RunSummary {
                executed: 0,
                rejected: 2
            }
        );
        bank.release_terminal(busy);
    }

    #[tokio::test]
    async fn test_run_continues_when_a_terminal_cannot_start() {
        let bank = Arc::new(Bank::new(crate::config::BankConfig {
            pool_capacity: 2,
            ..Default::default()
        }));
        let busy = [
            bank.register_terminal().unwrap(),
            bank.register_terminal().unwrap(),
        ];
        let data = "action, terminal, owner, amount, pin, account\n\
                    provision, , alice, 10, ,\n\
                    balance, 1, , , ,";

        let summary = ScriptRunner::new(bank.clone())
            .run(ScriptReader::new(data.as_bytes()).steps())
            .await
            .unwrap();
        assert_eq!(
            summary,
            RunSummary {
                executed: 1,
                rejected: 1
            }
        );
        assert_eq!(balance_of(&bank, "alice"), vec![10]);
        for id in busy {
            bank.release_terminal(id);
        }
    }

    #[tokio::test]
    async fn test_run_reports_rejections() {
        let data = "action, terminal, owner, amount, pin, account\n\
                    provision, , alice, 10, ,\n\
                    link, , alice, 20, ,\n\
                    link, , nobody, 5, ,\n\
                    insert, 1, alice, , 1234,\n\
                    insert, 1, alice, , 8888,\n\
                    select, 1, , , , 1\n\
                    deposit, 1, , -3, ,\n\
                    deposit, 1, , 3, ,";
        let bank = Arc::new(Bank::default());
        let summary = ScriptRunner::new(bank.clone())
            .run(ScriptReader::new(data.as_bytes()).steps())
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                executed: 5,
                rejected: 3
            }
        );
        assert_eq!(balance_of(&bank, "alice"), vec![10, 23]);
    }
}
