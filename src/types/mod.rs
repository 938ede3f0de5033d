//! Core domain records, serialized as JSON everywhere the [`crate::store`]
//! touches them.

pub mod amount;

mod amb;
mod bounty;
mod message_id;
mod order;

pub use amb::{AmbKind, AmbMessage, AmbPayload};
pub use bounty::{Bounty, BountyStatus};
pub use message_id::MessageIdentifier;
pub use order::{ConfirmOrder, EvalOrder, InFlightPermit, Order, SubmitOrder, SubmitOrderResult};
