use crate::domain::account::AccountSnapshot;
use crate::error::Result;
use std::io::Write;

/// Writes the account report as CSV: `owner,balance,account,card`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: Vec<AccountSnapshot>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(account)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_accounts() {
        let mut out = Vec::new();
        {
            let mut writer = AccountWriter::new(&mut out);
            writer
                .write_accounts(vec![AccountSnapshot {
                    owner: "alice".to_string(),
                    balance: 500,
                    account: 17,
                    card: 3,
                }])
                .unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "owner,balance,account,card\nalice,500,17,3\n");
    }
}
