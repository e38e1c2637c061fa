//! Table module: the entry point a presentation layer talks to.
//!
//! This module implements:
//! - `TableService`: create/join/deal/act/settle/cancel, one game per session
//! - `GameRegistry`: the session-keyed map of active games
//! - `TableConfig`: limits and house settings, loadable from the environment
//!
//! ## Example
//!
//! ```
//! use private_blackjack::entities::{ParticipantId, SessionId};
//! use private_blackjack::table::{TableConfig, TableService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), private_blackjack::GameError> {
//!     let service = TableService::in_memory(TableConfig::default());
//!     let room = SessionId::from("room-1");
//!     let alice = ParticipantId::new("alice");
//!
//!     service.create_game(&room).await?;
//!     service.join(&room, &alice, 50).await?;
//!     service.start_dealing(&room).await?;
//!     let update = service.force_complete(&room).await?;
//!     assert!(update.view.payouts_processed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod registry;
pub mod service;

pub use config::{ConfigError, TableConfig};
pub use registry::{GameHandle, GameRegistry};
pub use service::{TableService, TableUpdate};
