//! Funds Transfers
//!
//! Two execution paths over the same atomic store primitive:
//!
//! - **Two-phase** (`orchestrator`): initiate → TAN challenge → execute.
//!   The state machine is forward-only:
//!
//!   ```text
//!   Initiated → TanPending → { Executed | Expired | Failed }
//!   ```
//!
//! - **Single-phase** (`p2p`): checking-account-to-checking-account peer
//!   transfers with no challenge step.
//!
//! # Safety Invariants
//!
//! 1. TAN consumption and the ledger mutation commit in the same unit.
//! 2. The funds check at execute time is authoritative; initiate's is not.
//! 3. Every committed transfer writes a debit/credit pair summing to zero.

pub mod orchestrator;
pub mod p2p;
pub mod status;
pub mod types;

pub use orchestrator::TransferOrchestrator;
pub use p2p::PeerTransferService;
pub use status::TransferStatus;
pub use types::{
    ExecuteReceipt, ExecuteRequest, InitiateReceipt, InitiateRequest, RecipientRef, Transfer,
};
