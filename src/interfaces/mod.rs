//! Terminal-facing side of the bank: the ATM session driver, the CSV script
//! format and the account report.

pub mod csv;
pub mod script;
pub mod terminal;
