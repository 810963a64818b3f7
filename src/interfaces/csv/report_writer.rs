use chrono::Utc;
use std::io::Write;

use crate::domain::account::Account;
use crate::domain::card::mask_card_number;
use crate::error::Result;

/// Writes the final account report as CSV.
///
/// Card numbers are masked; PINs never appear.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_accounts(&mut self, accounts: &[Account]) -> Result<()> {
        let today = Utc::now().date_naive();
        self.writer.write_record([
            "account",
            "card",
            "customer",
            "balance",
            "available",
            "daily_limit",
            "remaining_limit",
        ])?;
        for account in accounts {
            self.writer.write_record([
                account.id.to_string(),
                mask_card_number(&account.card_number),
                account.customer_name.clone(),
                account.balance.to_string(),
                account.available_balance.to_string(),
                account.daily_withdrawal_limit.to_string(),
                account.remaining_daily_limit(today).to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
