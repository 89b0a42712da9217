use super::contestant::{Contestant, ContestantId};
use super::pricing::{Amount, Reference, VoteCount};
use crate::error::{Result, VoteError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A purchaser contact address that passed the `local@domain.tld` shape check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(value: &str) -> Result<Self> {
        match email_violation(value) {
            None => Ok(Self(value.trim().to_string())),
            Some(violation) => Err(VoteError::InvalidPaymentIntent(vec![violation.to_string()])),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the violated constraint, if any.
///
/// Accepts exactly one `@`, no whitespace, and a domain with an inner dot.
pub fn email_violation(value: &str) -> Option<&'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Some("Email is required");
    }
    let well_formed = !value.chars().any(char::is_whitespace)
        && match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain
                        .char_indices()
                        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
            }
            None => false,
        };
    if well_formed {
        None
    } else {
        Some("Invalid email format")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteStatus::Pending => f.write_str("pending"),
            VoteStatus::Completed => f.write_str("completed"),
            VoteStatus::Failed => f.write_str("failed"),
        }
    }
}

impl VoteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VoteStatus::Pending)
    }
}

/// One payment attempt in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTransaction {
    pub reference: Reference,
    pub contestant_id: ContestantId,
    /// Copied at purchase time so the audit trail survives renames.
    pub contestant_name: String,
    pub vote_count: VoteCount,
    pub amount: Amount,
    pub email: Email,
    pub provider_reference: Option<String>,
    pub status: VoteStatus,
    pub timestamp: DateTime<Utc>,
}

impl VoteTransaction {
    pub fn pending(
        reference: Reference,
        contestant: &Contestant,
        vote_count: VoteCount,
        amount: Amount,
        email: Email,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            contestant_id: contestant.id.clone(),
            contestant_name: contestant.name.clone(),
            vote_count,
            amount,
            email,
            provider_reference: None,
            status: VoteStatus::Pending,
            timestamp,
        }
    }

    /// Applies the single permitted `pending -> completed | failed` move.
    ///
    /// Stores call this under their write guard, which turns it into the
    /// conditional write the ledger relies on for idempotency.
    pub fn transition(&mut self, to: VoteStatus, provider_reference: Option<String>) -> Result<()> {
        match (self.status, to) {
            (VoteStatus::Pending, VoteStatus::Completed) => {
                self.provider_reference = provider_reference;
            }
            (VoteStatus::Pending, VoteStatus::Failed) => {}
            (VoteStatus::Completed, VoteStatus::Completed) => {
                return Err(VoteError::DuplicateCompletion(self.reference.to_string()));
            }
            (from, to) => {
                return Err(VoteError::InvalidTransition {
                    reference: self.reference.to_string(),
                    from,
                    to,
                });
            }
        }
        self.status = to;
        Ok(())
    }
}

/// What the hosted checkout is asked to charge.
///
/// Fields are raw so the gateway can report every violation at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub email: String,
    pub amount: u64,
    pub reference: Reference,
}

impl PaymentIntent {
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(violation) = email_violation(&self.email) {
            errors.push(violation.to_string());
        }
        if self.amount == 0 {
            errors.push("Amount must be greater than 0".to_string());
        }
        if self.reference.is_empty() {
            errors.push("Transaction reference is required".to_string());
        }
        errors
    }
}

/// A purchaser's request, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub contestant_id: ContestantId,
    pub email: String,
    pub vote_count: i64,
}

/// The single outcome a payment session resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { provider_reference: String },
    Cancelled,
}

/// Returned to the caller once votes are credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub reference: Reference,
    pub provider_reference: String,
    pub contestant_id: ContestantId,
    pub contestant_name: String,
    pub votes: u32,
    pub amount: Amount,
    pub email: Email,
    /// Contestant tally right after this credit.
    pub tally: u64,
}
