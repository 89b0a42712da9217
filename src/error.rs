use crate::domain::vote::VoteStatus;
use thiserror::Error;

/// Where an error sits in the purchase workflow, and therefore who hears about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any external call. Shown to the purchaser.
    Validation,
    /// The payment provider was unavailable or the purchaser backed out.
    PaymentBoundary,
    /// A replayed callback, a lost entry or a reference collision.
    Consistency,
    /// Money moved but the tally was not credited.
    Credit,
    /// Storage, IO or parsing failures outside the workflow itself.
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Invalid vote quantity {0}: at least one vote is required")]
    InvalidQuantity(i64),
    #[error("Vote quantity {requested} exceeds the limit of {max} per purchase")]
    QuantityTooLarge { requested: i64, max: u32 },
    #[error("Invalid payment intent: {}", .0.join("; "))]
    InvalidPaymentIntent(Vec<String>),
    #[error("Contestant {0} is not open for votes")]
    ContestantNotVotable(String),
    #[error("Contestant {0} not found")]
    ContestantNotFound(String),
    #[error("Contestant {0} is referenced by ledger entries and cannot be deleted")]
    ContestantReferenced(String),
    #[error("{0} is not an administrator")]
    Unauthorized(String),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Payment system unavailable")]
    PaymentSystemUnavailable,
    #[error("Payment {0} cancelled")]
    PaymentCancelled(String),
    #[error("Payment callback for {0} was never delivered")]
    CallbackLost(String),

    #[error("Ledger entry {0} missing")]
    LedgerEntryMissing(String),
    #[error("Ledger entry {0} already completed")]
    DuplicateCompletion(String),
    #[error("Ledger entry {reference} cannot move from {from} to {to}")]
    InvalidTransition {
        reference: String,
        from: VoteStatus,
        to: VoteStatus,
    },
    #[error("Transaction reference {0} already exists")]
    ReferenceCollision(String),
    #[error("Tally for {contestant} changed from {expected} to {actual} during the edit")]
    TallyChanged {
        contestant: String,
        expected: u64,
        actual: u64,
    },

    #[error("Crediting {reference} failed after {attempts} attempts: {source}")]
    CreditingFailed {
        reference: String,
        attempts: u32,
        #[source]
        source: Box<VoteError>,
    },

    #[error("Storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl VoteError {
    pub fn class(&self) -> ErrorClass {
        match self {
            VoteError::InvalidQuantity(_)
            | VoteError::QuantityTooLarge { .. }
            | VoteError::InvalidPaymentIntent(_)
            | VoteError::ContestantNotVotable(_)
            | VoteError::ContestantNotFound(_)
            | VoteError::ContestantReferenced(_)
            | VoteError::Unauthorized(_)
            | VoteError::InvalidEvent(_) => ErrorClass::Validation,
            VoteError::PaymentSystemUnavailable
            | VoteError::PaymentCancelled(_)
            | VoteError::CallbackLost(_) => ErrorClass::PaymentBoundary,
            VoteError::LedgerEntryMissing(_)
            | VoteError::DuplicateCompletion(_)
            | VoteError::InvalidTransition { .. }
            | VoteError::ReferenceCollision(_)
            | VoteError::TallyChanged { .. } => ErrorClass::Consistency,
            VoteError::CreditingFailed { .. } => ErrorClass::Credit,
            _ => ErrorClass::Infrastructure,
        }
    }

    /// Whether repeating the same operation can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            VoteError::ReferenceCollision(_)
            | VoteError::Storage(_)
            | VoteError::CreditingFailed { .. } => true,
            #[cfg(feature = "storage-rocksdb")]
            VoteError::RocksDb(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_payment_intent_lists_every_violation() {
        let err = VoteError::InvalidPaymentIntent(vec![
            "Invalid email format".to_string(),
            "Amount must be greater than 0".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid payment intent: Invalid email format; Amount must be greater than 0"
        );
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(VoteError::InvalidQuantity(0).class(), ErrorClass::Validation);
        assert_eq!(
            VoteError::PaymentSystemUnavailable.class(),
            ErrorClass::PaymentBoundary
        );
        assert_eq!(
            VoteError::DuplicateCompletion("R".into()).class(),
            ErrorClass::Consistency
        );
        let credit = VoteError::CreditingFailed {
            reference: "R".into(),
            attempts: 3,
            source: Box::new(VoteError::Storage("down".into())),
        };
        assert_eq!(credit.class(), ErrorClass::Credit);
        assert!(credit.is_retryable());
        assert!(!VoteError::DuplicateCompletion("R".into()).is_retryable());
    }
}
