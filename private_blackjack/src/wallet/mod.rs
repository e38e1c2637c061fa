//! Wallet module: the ledger interface the engine consumes and its
//! backends.
//!
//! This module implements:
//! - `WalletLedger`, the async interface (get-or-create, add/remove funds,
//!   loans, balance, entry history)
//! - An in-memory ledger and a PostgreSQL ledger
//! - Per-participant locking for multi-step sequences
//! - `Cashier`, which debits with the automatic loan fallback
//!
//! ## Example
//!
//! ```
//! use private_blackjack::entities::ParticipantId;
//! use private_blackjack::wallet::{Cashier, EntryType, InMemoryWalletLedger, WalletLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(InMemoryWalletLedger::new(40));
//!     let alice = ParticipantId::new("alice");
//!     ledger.get_or_create_wallet(&alice).await?;
//!
//!     // 40 can't cover 100, so a loan of 100 is issued and the debit retried.
//!     let cashier = Cashier::new(ledger.clone(), 100);
//!     let balance = cashier
//!         .remove_funds_with_loan(&alice, 100, EntryType::Bet, "opening bet")
//!         .await?;
//!     assert_eq!(balance, 40);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod funds;
pub mod ledger;
pub mod locks;
pub mod models;
pub mod postgres;

pub use errors::{WalletError, WalletResult};
pub use funds::Cashier;
pub use ledger::{InMemoryWalletLedger, WalletLedger};
pub use locks::ParticipantLocks;
pub use models::{EntryDirection, EntryType, Wallet, WalletEntry};
pub use postgres::PgWalletLedger;
