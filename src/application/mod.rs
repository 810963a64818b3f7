//! Application layer: the reserve/commit coordinator that orchestrates the
//! two-phase withdrawal and deferred-settlement deposit protocols, and the
//! card+PIN authentication service in front of it.

pub mod auth;
pub mod coordinator;
