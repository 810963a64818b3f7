use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use crate::domain::account::AccountId;
use crate::error::{AtmError, Result};

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Withdraw,
    Deposit,
    Complete,
    Balance,
    History,
}

/// One row of an ATM operation script.
///
/// `handle` is a script-local name for a transaction: `withdraw`/`deposit`
/// rows bind it to the transaction they create, and a later `complete` row
/// refers back to it (journal ids are assigned at runtime, so the script
/// cannot know them up front).
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OperationKind,
    pub account: Option<AccountId>,
    pub handle: Option<u32>,
    pub amount: Option<Decimal>,
    pub outcome: Option<String>,
    pub reason: Option<String>,
}

/// Reads operation scripts from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<OperationRecord>` lazily, with
/// whitespace trimming and flexible record lengths, so large scripts stream
/// without loading everything into memory.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g. File,
    /// Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AtmError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_script() {
        let data = "op, account, handle, amount, outcome, reason\n\
                    withdraw, 1, 1, 300.00, ,\n\
                    complete, , 1, , success,\n\
                    deposit, 1, 2, 500.00, ,\n\
                    complete, , 2, , failed, cash jam";
        let reader = OperationReader::new(data.as_bytes());
        let rows: Vec<_> = reader.operations().collect::<Result<_>>().unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].op, OperationKind::Withdraw);
        assert_eq!(rows[0].account, Some(1));
        assert_eq!(rows[0].amount, Some(dec!(300.00)));
        assert_eq!(rows[0].reason, None);

        assert_eq!(rows[1].op, OperationKind::Complete);
        assert_eq!(rows[1].handle, Some(1));
        assert_eq!(rows[1].outcome.as_deref(), Some("success"));

        assert_eq!(rows[3].reason.as_deref(), Some("cash jam"));
    }

    #[test]
    fn test_reader_malformed_row() {
        let data = "op, account, handle, amount, outcome, reason\n\
                    teleport, 1, 1, 300.00, ,\n\
                    withdraw, 1, 1, 300.00, ,";
        let reader = OperationReader::new(data.as_bytes());
        let rows: Vec<_> = reader.operations().collect();

        assert!(rows[0].is_err());
        assert!(rows[1].is_ok());
    }
}
