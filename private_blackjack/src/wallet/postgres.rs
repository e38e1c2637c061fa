//! PostgreSQL wallet ledger.
//!
//! Expects two tables:
//!
//! ```sql
//! CREATE TABLE wallets (
//!     participant TEXT PRIMARY KEY,
//!     balance     BIGINT NOT NULL,
//!     loan        BIGINT NOT NULL DEFAULT 0,
//!     created_at  TIMESTAMP NOT NULL DEFAULT NOW(),
//!     updated_at  TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! CREATE TABLE wallet_entries (
//!     id            BIGSERIAL PRIMARY KEY,
//!     participant   TEXT NOT NULL REFERENCES wallets (participant),
//!     amount        BIGINT NOT NULL,
//!     balance_after BIGINT NOT NULL,
//!     direction     TEXT NOT NULL,
//!     entry_type    TEXT NOT NULL,
//!     description   TEXT,
//!     created_at    TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

use super::{
    errors::{WalletError, WalletResult},
    ledger::WalletLedger,
    models::{EntryDirection, EntryType, Wallet, WalletEntry},
};
use crate::game::entities::ParticipantId;

/// Wallet ledger backed by PostgreSQL. Every balance change runs in a
/// transaction holding the wallet row lock, so concurrent debits against
/// the same participant are serialized by the database.
#[derive(Clone)]
pub struct PgWalletLedger {
    pool: Arc<PgPool>,
    default_balance: i64,
}

impl PgWalletLedger {
    /// Create a new wallet ledger
    ///
    /// `DEFAULT_WALLET_BALANCE` overrides the balance new wallets start with.
    pub fn new(pool: Arc<PgPool>) -> Self {
        let default_balance = std::env::var("DEFAULT_WALLET_BALANCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        Self {
            pool,
            default_balance,
        }
    }

    #[must_use]
    pub fn with_default_balance(mut self, default_balance: i64) -> Self {
        self.default_balance = default_balance;
        self
    }

    /// Lock the wallet row and return its balance and loan
    async fn lock_wallet(
        tx: &mut Transaction<'_, Postgres>,
        participant: &ParticipantId,
    ) -> WalletResult<(i64, i64)> {
        let row = sqlx::query("SELECT balance, loan FROM wallets WHERE participant = $1 FOR UPDATE")
            .bind(participant.as_str())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(participant.to_string()))?;

        Ok((row.get("balance"), row.get("loan")))
    }

    async fn store(
        tx: &mut Transaction<'_, Postgres>,
        participant: &ParticipantId,
        balance: i64,
        loan: i64,
    ) -> WalletResult<()> {
        sqlx::query(
            "UPDATE wallets SET balance = $1, loan = $2, updated_at = NOW() WHERE participant = $3",
        )
        .bind(balance)
        .bind(loan)
        .bind(participant.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append a ledger entry
    async fn create_entry(
        tx: &mut Transaction<'_, Postgres>,
        participant: &ParticipantId,
        amount: i64,
        balance_after: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_entries (participant, amount, balance_after, direction, entry_type, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(participant.as_str())
        .bind(amount)
        .bind(balance_after)
        .bind(entry_type.direction().to_string())
        .bind(entry_type.to_string())
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }
}

fn check_amount(amount: i64) -> WalletResult<()> {
    if amount <= 0 {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(())
}

#[async_trait]
impl WalletLedger for PgWalletLedger {
    async fn get_or_create_wallet(&self, participant: &ParticipantId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (participant, balance, loan)
            VALUES ($1, $2, 0)
            ON CONFLICT (participant) DO UPDATE SET participant = EXCLUDED.participant
            RETURNING participant, balance, loan, created_at, updated_at
            "#,
        )
        .bind(participant.as_str())
        .bind(self.default_balance)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(Wallet {
            participant: ParticipantId::new(row.get::<&str, _>("participant")),
            balance: row.get("balance"),
            loan: row.get("loan"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    async fn balance(&self, participant: &ParticipantId) -> WalletResult<i64> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE participant = $1")
            .bind(participant.as_str())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(participant.to_string()))?;

        Ok(row.get("balance"))
    }

    async fn add_funds(
        &self,
        participant: &ParticipantId,
        amount: i64,
        entry_type: EntryType,
        description: &str,
    ) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut tx = self.pool.begin().await?;

        let (balance, loan) = Self::lock_wallet(&mut tx, participant).await?;
        let new_balance = balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;
        Self::store(&mut tx, participant, new_balance, loan).await?;
        Self::create_entry(&mut tx, participant, amount, new_balance, entry_type, description)
            .await?;

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let (balance, loan) = Self::lock_wallet(&mut tx, participant).await?;
        if balance < amount {
            return Err(WalletError::InsufficientFunds {
                participant: participant.to_string(),
                available: balance,
                required: amount,
            });
        }
        let new_balance = balance - amount;
        Self::store(&mut tx, participant, new_balance, loan).await?;
        Self::create_entry(&mut tx, participant, -amount, new_balance, entry_type, description)
            .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn add_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut tx = self.pool.begin().await?;

        let (balance, loan) = Self::lock_wallet(&mut tx, participant).await?;
        let new_balance = balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;
        let new_loan = loan.checked_add(amount).ok_or(WalletError::BalanceOverflow)?;
        Self::store(&mut tx, participant, new_balance, new_loan).await?;
        Self::create_entry(
            &mut tx,
            participant,
            amount,
            new_balance,
            EntryType::Loan,
            "automatic loan",
        )
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn repay_loan(&self, participant: &ParticipantId, amount: i64) -> WalletResult<i64> {
        check_amount(amount)?;
        let mut tx = self.pool.begin().await?;

        let (balance, loan) = Self::lock_wallet(&mut tx, participant).await?;
        if amount > loan {
            return Err(WalletError::RepaymentExceedsLoan {
                outstanding: loan,
                requested: amount,
            });
        }
        if amount > balance {
            return Err(WalletError::InsufficientFunds {
                participant: participant.to_string(),
                available: balance,
                required: amount,
            });
        }
        let new_balance = balance - amount;
        Self::store(&mut tx, participant, new_balance, loan - amount).await?;
        Self::create_entry(
            &mut tx,
            participant,
            -amount,
            new_balance,
            EntryType::Repayment,
            "loan repayment",
        )
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn entries(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> WalletResult<Vec<WalletEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, participant, amount, balance_after, direction, entry_type, description, created_at
            FROM wallet_entries
            WHERE participant = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(participant.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| WalletEntry {
                id: row.get("id"),
                participant: ParticipantId::new(row.get::<&str, _>("participant")),
                amount: row.get("amount"),
                balance_after: row.get("balance_after"),
                direction: row
                    .get::<&str, _>("direction")
                    .parse()
                    .unwrap_or(EntryDirection::Credit),
                entry_type: row
                    .get::<&str, _>("entry_type")
                    .parse()
                    .unwrap_or(EntryType::Win),
                description: row.get("description"),
                created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, DatabaseConfig};

    async fn setup() -> (PgWalletLedger, Arc<PgPool>) {
        let config = DatabaseConfig::from_env();
        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        let pool = Arc::new(db.pool().clone());
        (PgWalletLedger::new(pool.clone()).with_default_balance(50), pool)
    }

    async fn cleanup(pool: &PgPool, participant: &ParticipantId) {
        let _ = sqlx::query("DELETE FROM wallet_entries WHERE participant = $1")
            .bind(participant.as_str())
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM wallets WHERE participant = $1")
            .bind(participant.as_str())
            .execute(pool)
            .await;
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
    async fn test_pg_debit_loan_and_entries() {
        let (ledger, pool) = setup().await;
        let participant = ParticipantId::new("pg_wallet_test");
        cleanup(&pool, &participant).await;

        let wallet = ledger.get_or_create_wallet(&participant).await.unwrap();
        assert_eq!(wallet.balance, 50);

        let err = ledger
            .remove_funds(&participant, 100, EntryType::Bet, "bet")
            .await
            .unwrap_err();
        assert!(err.is_insufficient_funds());

        assert_eq!(ledger.add_loan(&participant, 100).await.unwrap(), 150);
        assert_eq!(
            ledger
                .remove_funds(&participant, 100, EntryType::Bet, "bet")
                .await
                .unwrap(),
            50
        );

        let entries = ledger.entries(&participant, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, EntryType::Bet);
        assert_eq!(entries[1].entry_type, EntryType::Loan);

        cleanup(&pool, &participant).await;
    }
}
