use crate::domain::transaction::Transaction;
use crate::error::Result;
use std::io::Write;

/// Writes transaction history as CSV, one row per record in the given order.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions<'a>(
        &mut self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Result<()> {
        self.writer.write_record([
            "id",
            "account",
            "status",
            "amount_requested",
            "gateway_fee",
            "platform_fee",
            "total_fee",
            "final_amount",
            "currency",
            "payout_reference",
            "created_at",
        ])?;

        for tx in transactions {
            self.writer.write_record([
                tx.id.to_string(),
                tx.account.to_string(),
                tx.status.to_string(),
                format!("{:.2}", tx.amount_requested),
                format!("{:.2}", tx.gateway_fee),
                format!("{:.2}", tx.platform_fee),
                format!("{:.2}", tx.total_fee),
                format!("{:.2}", tx.final_amount),
                tx.currency.clone(),
                tx.payout_reference.clone().unwrap_or_default(),
                tx.created_at.to_rfc3339(),
            ])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountKey;
    use crate::domain::fee::FeeSchedule;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_transactions() {
        let fees = FeeSchedule::default().calculate(Amount::new(dec!(200)).unwrap());
        let tx = Transaction::completed(
            AccountKey::new("alice@example.com").unwrap(),
            dec!(200),
            fees,
            "USD",
            "BATCH-1".to_string(),
            None,
        );

        let mut out = Vec::new();
        TransactionWriter::new(&mut out)
            .write_transactions([&tx])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,account,status"));
        let row = lines.next().unwrap();
        assert!(row.contains("alice@example.com,COMPLETED,200.00,8.80,4.00,12.80,187.20,USD,BATCH-1"));
        assert!(lines.next().is_none());
    }
}
