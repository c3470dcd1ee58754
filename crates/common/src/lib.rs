//! Helpers shared by the persistence crates and binaries.

pub mod utils;
