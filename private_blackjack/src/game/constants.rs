use super::entities::Usd;

/// Seats at a single table. Split sub-hands don't count against this.
pub const MAX_PLAYERS: usize = 7;

pub const DEFAULT_NUM_DECKS: usize = 2;

/// The dealer keeps drawing while below this score.
pub const DEALER_STAND_SCORE: u8 = 17;

pub const BLACKJACK_SCORE: u8 = 21;

/// Fixed loan issued when a wallet can't cover a required debit. It does
/// not scale with the shortfall.
pub const LOAN_INCREMENT: Usd = 100;

pub const DEFAULT_MIN_BET: Usd = 10;
pub const DEFAULT_MAX_BET: Usd = 1_000;

/// Ceiling for a table's max bet. A doubled natural at this size still
/// pays out well inside `Usd`.
pub const MAX_TABLE_BET: Usd = 1_000_000;
pub const DEFAULT_STARTING_BALANCE: Usd = 1_000;

pub const MAX_USER_INPUT_LENGTH: usize = 32;
