//! Money-movement core of an ATM backend.
//!
//! Implements a two-phase reserve/commit transaction engine over a keyed
//! account store and an append-mostly transaction journal. Withdrawals
//! reserve funds against the available balance at initiation and settle the
//! true balance only once the physical dispense is confirmed; deposits defer
//! all balance movement to settlement. Multi-writer safety comes from
//! optimistic version stamps at the store boundary, not locks.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
