//! bankwerk - Online Banking Core
//!
//! TAN-authenticated funds transfers over an atomic double-entry ledger.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier newtypes (UserId, AccountId, TransferId, ...)
//! - [`money`] - Fixed-point amounts and currencies
//! - [`iban`] - Checksum-verified external account identifiers
//! - [`error`] - Error taxonomy with stable machine codes
//! - [`identity`] - Bearer credential verification port
//! - [`ledger`] - Accounts, ledger entries and the transactional store
//! - [`tan`] - One-time authorization challenges
//! - [`transfer`] - Two-phase orchestrator and single-phase peer path
//! - [`standing_order`] - Recurring transfer definitions and scheduler
//! - [`api`] - HTTP surface
//! - [`config`] / [`logging`] - Service wiring

pub mod api;
pub mod config;
pub mod core_types;
pub mod error;
pub mod iban;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod standing_order;
pub mod tan;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{AccountId, ChallengeId, EntryId, OrderId, TransferId, UserId};
pub use error::BankError;
pub use iban::Iban;
pub use ledger::{Account, AccountKind, Direction, LedgerEntry, MemoryStore, TransactionalStore};
pub use money::{Amount, Currency};
pub use standing_order::{Frequency, StandingOrder, StandingOrderScheduler};
pub use tan::{TanChallenge, TanManager};
pub use transfer::{
    PeerTransferService, RecipientRef, Transfer, TransferOrchestrator, TransferStatus,
};
