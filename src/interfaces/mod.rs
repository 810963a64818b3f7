//! Edge adapters: CSV operation scripts in, CSV account reports out.

pub mod csv;
