//! Domain layer: the account aggregate, journal entries, and the store
//! ports the application layer is written against.

pub mod account;
pub mod card;
pub mod ports;
pub mod transaction;
