//! The wallet interface consumed by the engine, and its in-memory backend.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    errors::{WalletError, WalletResult},
    models::{EntryType, Wallet, WalletEntry},
};
use crate::game::entities::ParticipantId;

/// Trait for wallet ledger operations
///
/// Every balance change appends a [`WalletEntry`]. Amounts are positive;
/// the entry records the signed movement.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Get the participant's wallet, creating it with the starting balance
    /// if it doesn't exist yet
    async fn get_or_create_wallet(&self, participant: &ParticipantId) -> WalletResult<Wallet>;

    /// Current balance
    async fn balance(&self, participant: &ParticipantId) -> WalletResult<i64>;

    /// Credit the wallet
    async fn add_funds(
        &self,
        participant: &ParticipantId,
        amount: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64>;

    /// Debit the wallet, failing with `WalletError::InsufficientFunds` if
    /// the balance can't cover it
    async fn remove_funds(
        &self,
        participant: &ParticipantId,
        amount: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64>;

    /// Credit the wallet with a loan and add it to the outstanding loan
    async fn add_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64>;

    /// Pay back part or all of the outstanding loan from the balance
    async fn repay_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64>;

    /// Most recent entries first
    async fn entries(&self, participant: &ParticipantId, limit: usize)
    -> WalletResult<Vec<WalletEntry>>;
}

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<ParticipantId, Wallet>,
    entries: Vec<WalletEntry>,
}

impl LedgerState {
    fn wallet_mut(&mut self, participant: &ParticipantId) -> WalletResult<&mut Wallet> {
        self.wallets
            .get_mut(participant)
            .ok_or_else(|| WalletError::WalletNotFound(participant.to_string()))
    }

    fn append(
        &mut self,
        participant: &ParticipantId,
        amount: i64,
        balance_after: i64,
        entry_type: EntryType,
        description: &str,
    ) {
        let id = i64::try_from(self.entries.len()).unwrap_or(i64::MAX) + 1;
        self.entries.push(WalletEntry {
            id,
            participant: participant.clone(),
            amount,
            balance_after,
            direction: entry_type.direction(),
            entry_type,
            description: Some(description.to_string()),
            created_at: Utc::now(),
        });
    }
}

/// Wallet ledger kept in process memory. Each call is atomic; callers
/// that need several calls to be atomic serialize through
/// [`ParticipantLocks`](super::locks::ParticipantLocks).
#[derive(Debug)]
pub struct InMemoryWalletLedger {
    starting_balance: i64,
    state: Mutex<LedgerState>,
}

impl InMemoryWalletLedger {
    #[must_use]
    pub fn new(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            state: Mutex::new(LedgerState::default()),
        }
    }
}

fn check_amount(amount: i64) -> WalletResult<()> {
    if amount <= 0 {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(())
}

#[async_trait]
impl WalletLedger for InMemoryWalletLedger {
    async fn get_or_create_wallet(&self, participant: &ParticipantId) -> WalletResult<Wallet> {
        let mut state = self.state.lock().await;
        let wallet = state.wallets.entry(participant.clone()).or_insert_with(|| {
            log::debug!("Creating wallet for {participant}");
            let now = Utc::now();
            Wallet {
                participant: participant.clone(),
                balance: self.starting_balance,
                loan: 0,
                created_at: now,
                updated_at: now,
            }
        });
        Ok(wallet.clone())
    }

    async fn balance(&self, participant: &ParticipantId) -> WalletResult<i64> {
        let mut state = self.state.lock().await;
        Ok(state.wallet_mut(participant)?.balance)
    }

    async fn add_funds(
        &self,
        participant: &ParticipantId,
        amount: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(participant)?;
        let new_balance = wallet
            .balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;
        wallet.balance = new_balance;
        wallet.updated_at = Utc::now();
        state.append(participant, amount, new_balance, entry_type, description);
        Ok(new_balance)
    }

    async fn remove_funds(
        &self,
        participant: &ParticipantId,
        amount: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(participant)?;
        if wallet.balance < amount {
            return Err(WalletError::InsufficientFunds {
                participant: participant.to_string(),
                available: wallet.balance,
                required: amount,
            });
        }
        wallet.balance -= amount;
        wallet.updated_at = Utc::now();
        let new_balance = wallet.balance;
        state.append(participant, -amount, new_balance, entry_type, description);
        Ok(new_balance)
    }

    async fn add_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(participant)?;
        let new_balance = wallet
            .balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;
        wallet.balance = new_balance;
        wallet.loan += amount;
        wallet.updated_at = Utc::now();
        state.append(participant, amount, new_balance, EntryType::Loan, "automatic loan");
        Ok(new_balance)
    }

    async fn repay_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(participant)?;
        if amount > wallet.loan {
            return Err(WalletError::RepaymentExceedsLoan {
                outstanding: wallet.loan,
                requested: amount,
            });
        }
        if amount > wallet.balance {
            return Err(WalletError::InsufficientFunds {
                participant: participant.to_string(),
                available: wallet.balance,
                required: amount,
            });
        }
        wallet.balance -= amount;
        wallet.loan -= amount;
        wallet.updated_at = Utc::now();
        let new_balance = wallet.balance;
        state.append(participant, -amount, new_balance, EntryType::Repayment, "loan repayment");
        Ok(new_balance)
    }

    async fn entries(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> WalletResult<Vec<WalletEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| &entry.participant == participant)
            .take(limit)
            .cloned()
            .collect())
    }
}
