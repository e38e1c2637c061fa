//! Debits and credits on behalf of a game, including the automatic loan
//! fallback.

use std::sync::Arc;

use super::{
    errors::WalletResult, ledger::WalletLedger, locks::ParticipantLocks, models::EntryType,
};
use crate::game::entities::{ParticipantId, Usd};

/// The only path by which game code touches a wallet.
#[derive(Clone)]
pub struct Cashier {
    ledger: Arc<dyn WalletLedger>,
    locks: Arc<ParticipantLocks>,
    loan_increment: Usd,
}

impl Cashier {
    pub fn new(ledger: Arc<dyn WalletLedger>, loan_increment: Usd) -> Self {
        Self {
            ledger,
            locks: Arc::new(ParticipantLocks::new()),
            loan_increment,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn WalletLedger> {
        &self.ledger
    }

    pub fn loan_increment(&self) -> Usd {
        self.loan_increment
    }

    /// Debit `amount`, falling back to one fixed-size loan.
    ///
    /// 1. Try the debit.
    /// 2. If and only if it failed for insufficient funds: read the
    ///    balance, add `loan_increment` as a loan, retry the debit once.
    /// 3. Anything else, including a second failure, goes back to the
    ///    caller untouched.
    ///
    /// The loan is not sized to the shortfall, so a debit that is short
    /// by more than the increment still fails after the retry.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - Still short after the loan
    /// * Any other `WalletError` from the ledger
    pub async fn remove_funds_with_loan(
        &self,
        participant: &ParticipantId,
        amount: Usd,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        let _guard = self.locks.lock(participant).await;
        let amount = i64::from(amount);

        match self
            .ledger
            .remove_funds(participant, amount, entry_type, description)
            .await
        {
            Err(err) if err.is_insufficient_funds() => {
                let balance = self.ledger.balance(participant).await?;
                log::warn!(
                    "{participant} can't cover {amount} with {balance}; lending {}",
                    self.loan_increment
                );
                self.ledger
                    .add_loan(participant, i64::from(self.loan_increment))
                    .await?;
                self.ledger
                    .remove_funds(participant, amount, entry_type, description)
                    .await
            }
            result => result,
        }
    }

    /// Credit `amount` under the participant's lock.
    pub async fn add_funds(
        &self,
        participant: &ParticipantId,
        amount: Usd,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        let _guard = self.locks.lock(participant).await;
        self.ledger
            .add_funds(participant, i64::from(amount), entry_type, description)
            .await
    }
}
