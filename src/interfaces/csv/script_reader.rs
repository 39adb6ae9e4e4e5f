use crate::error::{BankError, Result};
use serde::Deserialize;
use std::io::Read;

/// One action in an ATM script.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAction {
    /// Open an account on a newly issued card.
    Provision,
    /// Open an account on the owner's existing card.
    Link,
    Insert,
    Select,
    Deposit,
    Withdraw,
    Balance,
    Eject,
}

/// A row of the script CSV: `action, terminal, owner, amount, pin, account`.
///
/// Rows without a terminal are bank-side setup. `account` is an index into
/// the account list the terminal was last prompted with.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct ScriptStep {
    pub action: ScriptAction,
    pub terminal: Option<u16>,
    pub owner: Option<String>,
    pub amount: Option<i64>,
    pub pin: Option<u32>,
    pub account: Option<usize>,
}

/// Reads script steps from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted, so trailing empty
/// columns can be left out.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes steps; a malformed row yields an error and reading
    /// continues with the next one.
    pub fn steps(self) -> impl Iterator<Item = Result<ScriptStep>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BankError::from))
    }
}
