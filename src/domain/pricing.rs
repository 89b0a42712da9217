use crate::error::{Result, VoteError};
use chrono::Utc;
use clap::ValueEnum;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price of a single vote in the smallest currency unit (₦100.00).
pub const PRICE_PER_VOTE: u64 = 10_000;

/// [`PRICE_PER_VOTE`] as an [`Amount`].
pub const DEFAULT_VOTE_PRICE: Amount = Amount(PRICE_PER_VOTE);

/// Number of random characters appended to every transaction reference.
pub const REFERENCE_RANDOM_LEN: usize = 12;

/// A strictly positive monetary amount in the smallest currency unit.
///
/// Integer minor units keep price arithmetic exact; conversion to a decimal
/// only happens when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub fn new(minor_units: u64) -> Result<Self> {
        if minor_units > 0 {
            Ok(Self(minor_units))
        } else {
            Err(VoteError::InvalidPaymentIntent(vec![
                "Amount must be greater than 0".to_string(),
            ]))
        }
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    /// The amount in major units, e.g. naira rather than kobo.
    pub fn major_units(&self) -> Decimal {
        to_major(self.0)
    }
}

fn to_major(minor_units: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(minor_units), 2)
}

impl TryFrom<u64> for Amount {
    type Error = VoteError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A purchasable vote quantity, always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteCount(u32);

impl VoteCount {
    pub fn new(requested: i64) -> Result<Self> {
        if requested < 1 {
            return Err(VoteError::InvalidQuantity(requested));
        }
        u32::try_from(requested)
            .map(Self)
            .map_err(|_| VoteError::QuantityTooLarge {
                requested,
                max: u32::MAX,
            })
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Currencies the hosted checkout settles in. All of them have two minor digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Ngn,
    Ghs,
    Kes,
    Usd,
    Zar,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Ghs => "GHS",
            Currency::Kes => "KES",
            Currency::Usd => "USD",
            Currency::Zar => "ZAR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Ngn => "₦",
            Currency::Ghs => "GH₵",
            Currency::Kes => "KSh",
            Currency::Usd => "$",
            Currency::Zar => "R",
        }
    }
}

/// Total charge for `vote_count` votes at the default price.
pub fn price(vote_count: i64) -> Result<Amount> {
    price_at(VoteCount::new(vote_count)?, DEFAULT_VOTE_PRICE)
}

/// Total charge for `vote_count` votes at `per_vote`.
pub fn price_at(vote_count: VoteCount, per_vote: Amount) -> Result<Amount> {
    per_vote
        .0
        .checked_mul(u64::from(vote_count.0))
        .map(Amount)
        .ok_or(VoteError::QuantityTooLarge {
            requested: i64::from(vote_count.0),
            max: u32::try_from(u64::MAX / per_vote.0).unwrap_or(u32::MAX),
        })
}

/// Renders an amount of minor units as `₦1,234.50`.
pub fn format_price(minor_units: u64, currency: Currency) -> String {
    let rendered = to_major(minor_units).to_string();
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));
    format!("{}{}.{}", currency.symbol(), group_thousands(whole), fraction)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Our own identifier for a payment attempt, distinct from the provider's.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates `VOTE_<millis>_<random>`, uppercased.
pub fn generate_reference() -> Reference {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_RANDOM_LEN)
        .map(char::from)
        .collect();
    Reference(format!("VOTE_{}_{}", Utc::now().timestamp_millis(), random).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    #[test]
    fn test_price_for_five_votes() {
        assert_eq!(price(5).unwrap().minor_units(), 50_000);
    }

    #[test]
    fn test_price_rejects_non_positive_quantity() {
        assert!(matches!(price(0), Err(VoteError::InvalidQuantity(0))));
        assert!(matches!(price(-4), Err(VoteError::InvalidQuantity(-4))));
    }

    #[test]
    fn test_price_overflow_is_too_large() {
        let per_vote = Amount::new(u64::MAX / 2).unwrap();
        let result = price_at(VoteCount::new(3).unwrap(), per_vote);
        assert!(matches!(result, Err(VoteError::QuantityTooLarge { .. })));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(
            Amount::new(0),
            Err(VoteError::InvalidPaymentIntent(_))
        ));
    }

    #[test]
    fn test_major_units() {
        assert_eq!(price(5).unwrap().major_units(), dec!(500.00));
        assert_eq!(Amount::new(50_050).unwrap().major_units(), dec!(500.50));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(10_000, Currency::Ngn), "₦100.00");
        assert_eq!(format_price(50, Currency::Ngn), "₦0.50");
        assert_eq!(format_price(0, Currency::Usd), "$0.00");
        assert_eq!(format_price(123_456_789, Currency::Ngn), "₦1,234,567.89");
    }

    #[test]
    fn test_reference_shape() {
        let reference = generate_reference();
        let parts: Vec<&str> = reference.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "VOTE");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), REFERENCE_RANDOM_LEN);
        assert_eq!(reference.as_str(), reference.as_str().to_uppercase());
    }

    #[test]
    fn test_references_are_distinct_in_a_tight_loop() {
        let references: HashSet<Reference> = (0..10_000).map(|_| generate_reference()).collect();
        assert_eq!(references.len(), 10_000);
    }
}
