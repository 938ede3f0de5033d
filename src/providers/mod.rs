//! Production implementations of the relayer's trait abstractions.
//!
//! This module provides the "real" implementations of the traits defined in
//! [`crate::traits`] that interact with actual blockchain RPC endpoints and
//! the system clock.
//!
//! Users building applications will typically use these providers, while
//! test code will implement custom fakes (see [`crate::testing`]).

mod alloy;
mod tokio_clock;

pub use self::alloy::AlloyChainProvider;
pub use self::tokio_clock::TokioClock;
