//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::entities::ParticipantId;

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub participant: ParticipantId,
    pub balance: i64,
    /// Sum of loans issued and not yet repaid. Loans are added to the
    /// balance when issued.
    pub loan: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet entry model (append-only ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: i64,
    pub participant: ParticipantId,
    /// Signed: debits are negative.
    pub amount: i64,
    pub balance_after: i64,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

impl std::str::FromStr for EntryDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(EntryDirection::Debit),
            "credit" => Ok(EntryDirection::Credit),
            other => Err(format!("unknown entry direction {other:?}")),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Bet,
    Win,
    Loan,
    Repayment,
    Refund,
}

impl EntryType {
    #[must_use]
    pub fn direction(self) -> EntryDirection {
        match self {
            EntryType::Bet | EntryType::Repayment => EntryDirection::Debit,
            EntryType::Win | EntryType::Loan | EntryType::Refund => EntryDirection::Credit,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Bet => write!(f, "bet"),
            EntryType::Win => write!(f, "win"),
            EntryType::Loan => write!(f, "loan"),
            EntryType::Repayment => write!(f, "repayment"),
            EntryType::Refund => write!(f, "refund"),
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bet" => Ok(EntryType::Bet),
            "win" => Ok(EntryType::Win),
            "loan" => Ok(EntryType::Loan),
            "repayment" => Ok(EntryType::Repayment),
            "refund" => Ok(EntryType::Refund),
            other => Err(format!("unknown entry type {other:?}")),
        }
    }
}
