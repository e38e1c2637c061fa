//! Table configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::config::parse_env_or;
use crate::game::{
    UserError,
    constants::{
        DEFAULT_MAX_BET, DEFAULT_MIN_BET, DEFAULT_NUM_DECKS, DEFAULT_STARTING_BALANCE,
        LOAN_INCREMENT, MAX_PLAYERS, MAX_TABLE_BET,
    },
    entities::Usd,
    rules::{BlackjackRules, GameRules},
};

/// Largest shoe a table may use
pub const MAX_NUM_DECKS: usize = 8;

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// 52-card decks per shoe
    pub num_decks: usize,

    /// Smallest opening bet
    pub min_bet: Usd,

    /// Largest opening bet
    pub max_bet: Usd,

    /// Participants per game
    pub max_players: usize,

    /// Loan granted when a bet can't be covered
    pub loan_increment: Usd,

    /// Balance new wallets start with
    pub starting_balance: i64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            num_decks: DEFAULT_NUM_DECKS,
            min_bet: DEFAULT_MIN_BET,
            max_bet: DEFAULT_MAX_BET,
            max_players: MAX_PLAYERS,
            loan_increment: LOAN_INCREMENT,
            starting_balance: i64::from(DEFAULT_STARTING_BALANCE),
        }
    }
}

/// Configuration error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.into(),
    }
}

impl TableConfig {
    /// Load configuration from environment variables
    ///
    /// - `BJ_NUM_DECKS` (default: 2)
    /// - `BJ_MIN_BET` (default: 10)
    /// - `BJ_MAX_BET` (default: 1000)
    /// - `BJ_MAX_PLAYERS` (default: 7)
    /// - `BJ_LOAN_INCREMENT` (default: 100)
    /// - `BJ_STARTING_BALANCE` (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_decks: parse_env_or("BJ_NUM_DECKS", defaults.num_decks),
            min_bet: parse_env_or("BJ_MIN_BET", defaults.min_bet),
            max_bet: parse_env_or("BJ_MAX_BET", defaults.max_bet),
            max_players: parse_env_or("BJ_MAX_PLAYERS", defaults.max_players),
            loan_increment: parse_env_or("BJ_LOAN_INCREMENT", defaults.loan_increment),
            starting_balance: parse_env_or("BJ_STARTING_BALANCE", defaults.starting_balance),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_decks == 0 || self.num_decks > MAX_NUM_DECKS {
            return Err(invalid(
                "BJ_NUM_DECKS",
                format!("Must be between 1 and {MAX_NUM_DECKS}"),
            ));
        }

        if self.min_bet == 0 {
            return Err(invalid("BJ_MIN_BET", "Must be greater than 0"));
        }

        if self.max_bet > MAX_TABLE_BET {
            return Err(invalid(
                "BJ_MAX_BET",
                format!("Must be at most {MAX_TABLE_BET}"),
            ));
        }

        if self.max_bet < self.min_bet {
            return Err(invalid(
                "BJ_MAX_BET",
                format!("Must be at least the min bet ({})", self.min_bet),
            ));
        }

        if self.max_players == 0 || self.max_players > MAX_PLAYERS {
            return Err(invalid(
                "BJ_MAX_PLAYERS",
                format!("Must be between 1 and {MAX_PLAYERS}"),
            ));
        }

        if self.loan_increment == 0 {
            return Err(invalid("BJ_LOAN_INCREMENT", "Must be greater than 0"));
        }

        if self.starting_balance < 0 {
            return Err(invalid("BJ_STARTING_BALANCE", "Must not be negative"));
        }

        Ok(())
    }

    /// House rules for games at this table
    #[must_use]
    pub fn rules(&self) -> GameRules {
        BlackjackRules {
            num_decks: self.num_decks,
        }
        .into()
    }

    /// Check an opening bet against the table limits
    pub fn check_bet(&self, bet: Usd) -> Result<(), UserError> {
        if bet < self.min_bet || bet > self.max_bet {
            return Err(UserError::InvalidBet {
                min: self.min_bet,
                max: self.max_bet,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::HouseRules;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "BJ_NUM_DECKS",
        "BJ_MIN_BET",
        "BJ_MAX_BET",
        "BJ_MAX_PLAYERS",
        "BJ_LOAN_INCREMENT",
        "BJ_STARTING_BALANCE",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: serialized with every other test that touches the environment.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn test_default_is_valid() {
        let config = TableConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules().num_decks(), DEFAULT_NUM_DECKS);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            (
                TableConfig {
                    num_decks: 0,
                    ..TableConfig::default()
                },
                "BJ_NUM_DECKS",
            ),
            (
                TableConfig {
                    min_bet: 50,
                    max_bet: 40,
                    ..TableConfig::default()
                },
                "BJ_MAX_BET",
            ),
            (
                TableConfig {
                    max_bet: MAX_TABLE_BET + 1,
                    ..TableConfig::default()
                },
                "BJ_MAX_BET",
            ),
            (
                TableConfig {
                    max_players: MAX_PLAYERS + 1,
                    ..TableConfig::default()
                },
                "BJ_MAX_PLAYERS",
            ),
            (
                TableConfig {
                    loan_increment: 0,
                    ..TableConfig::default()
                },
                "BJ_LOAN_INCREMENT",
            ),
        ];
        for (config, expected) in cases {
            let ConfigError::Invalid { var, .. } = config.validate().unwrap_err();
            assert_eq!(var, expected);
        }
    }

    #[test]
    fn test_check_bet_limits() {
        let config = TableConfig::default();
        assert!(config.check_bet(DEFAULT_MIN_BET).is_ok());
        assert!(config.check_bet(DEFAULT_MAX_BET).is_ok());
        assert_eq!(
            config.check_bet(DEFAULT_MIN_BET - 1),
            Err(UserError::InvalidBet {
                min: DEFAULT_MIN_BET,
                max: DEFAULT_MAX_BET
            })
        );
        assert!(config.check_bet(DEFAULT_MAX_BET + 1).is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("BJ_NUM_DECKS", "6");
            std::env::set_var("BJ_LOAN_INCREMENT", "250");
            std::env::set_var("BJ_MIN_BET", "lots");
        }
        let config = TableConfig::from_env();
        clear_env();

        assert_eq!(config.num_decks, 6);
        assert_eq!(config.loan_increment, 250);
        assert_eq!(config.min_bet, DEFAULT_MIN_BET);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        assert_eq!(TableConfig::from_env(), TableConfig::default());
    }
}
