//! Entities for the subscription registry and the timeout table, plus
//! connection helpers. Saga entities are declared by the host.

pub mod errors;
pub mod db;
pub mod subscription;
pub mod timeout_data;

#[cfg(test)]
mod tests;
