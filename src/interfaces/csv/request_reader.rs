use crate::domain::account::AccountKey;
use crate::domain::money::Balance;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct RequestRow {
    account: String,
    amount: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    account: String,
    balance: Decimal,
}

/// Row-level problems are the caller's input; only I/O failures stay
/// `CsvError`.
fn row_error(e: csv::Error) -> SettlementError {
    if e.is_io_error() {
        e.into()
    } else {
        SettlementError::InputValidation(format!("malformed row: {}", e))
    }
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Reads withdrawal requests (`account,amount,destination`) from a CSV source.
///
/// Amounts are passed through as text; validating them is the orchestrator's
/// job so that a bad row becomes a client error rather than a read error.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: csv_reader(source),
        }
    }

    /// Lazily deserializes requests, one `Result` per row.
    pub fn requests(self) -> impl Iterator<Item = Result<WithdrawalRequest>> {
        self.reader.into_deserialize().map(|row| {
            let row: RequestRow = row.map_err(row_error)?;
            Ok(WithdrawalRequest::new(row.account, row.amount, row.destination))
        })
    }
}

/// Reads opening balances (`account,balance`) used to provision accounts.
pub struct AccountSeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountSeedReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: csv_reader(source),
        }
    }

    pub fn seeds(self) -> impl Iterator<Item = Result<(AccountKey, Balance)>> {
        self.reader.into_deserialize().map(|row| {
            let row: SeedRow = row.map_err(row_error)?;
            if row.balance.is_sign_negative() {
                return Err(SettlementError::InputValidation(format!(
                    "negative opening balance for {}",
                    row.account
                )));
            }
            Ok((AccountKey::new(row.account)?, Balance::new(row.balance)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "account, amount, destination\nalice@example.com, 200.00, alice@paypal.test\nbob@example.com, ten, bob@paypal.test";
        let results: Vec<Result<WithdrawalRequest>> =
            RequestReader::new(data.as_bytes()).requests().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.account_key, "alice@example.com");
        assert_eq!(first.amount, "200.00");
        assert_eq!(first.payout_destination, "alice@paypal.test");
        // Unparseable amounts are left for validation.
        assert_eq!(results[1].as_ref().unwrap().amount, "ten");
    }

    #[test]
    fn test_reader_missing_column() {
        let data = "account, amount, destination\nalice@example.com, 1.0";
        let results: Vec<Result<WithdrawalRequest>> =
            RequestReader::new(data.as_bytes()).requests().collect();

        assert!(matches!(
            results[0],
            Err(SettlementError::InputValidation(_))
        ));
    }

    #[test]
    fn test_seed_reader() {
        let data = "account,balance\nalice@example.com,500.00\nbob@example.com,-1\n ,3";
        let results: Vec<Result<(AccountKey, Balance)>> =
            AccountSeedReader::new(data.as_bytes()).seeds().collect();

        let (key, balance) = results[0].as_ref().unwrap();
        assert_eq!(key.as_str(), "alice@example.com");
        assert_eq!(*balance, Balance::new(dec!(500)));
        assert!(results[1].is_err());
        assert!(results[2].is_err());
    }
}
