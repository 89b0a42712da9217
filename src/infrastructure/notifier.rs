use crate::domain::ports::PurchaseNotifier;
use crate::domain::pricing::{Currency, format_price};
use crate::domain::vote::Receipt;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Writes the purchase confirmation to the log instead of mailing it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier {
    currency: Currency,
}

impl LogNotifier {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }
}

#[async_trait]
impl PurchaseNotifier for LogNotifier {
    async fn notify(&self, receipt: &Receipt) -> Result<()> {
        info!(
            email = %receipt.email,
            reference = %receipt.reference,
            "Successfully voted {} time(s) for {} ({}), tally now {}",
            receipt.votes,
            receipt.contestant_name,
            format_price(receipt.amount.minor_units(), self.currency),
            receipt.tally,
        );
        Ok(())
    }
}
