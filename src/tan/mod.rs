//! TAN (Transaction Authentication Number) Challenges
//!
//! Strong customer authentication for the two-phase transfer flow: each
//! initiated transfer is paired with a short-lived numeric challenge that the
//! user must answer before funds move. Challenges are dynamically linked to
//! the exact transfer details they authorize and bound to the initiating
//! session's user.

pub mod challenge;
pub mod manager;

pub use challenge::{TanChallenge, TanVerdict};
pub use manager::TanManager;
