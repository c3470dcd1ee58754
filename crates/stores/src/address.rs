//! Endpoint addresses and message contract identifiers.
//!
//! Both are stored by their canonical string form, which round-trips
//! through `Display` and `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PersistenceError;

/// Destination address, canonical form `queue@machine` (or just `queue`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    queue: String,
    machine: String,
}

impl Address {
    pub fn new(queue: impl Into<String>, machine: impl Into<String>) -> Self {
        Self { queue: queue.into(), machine: machine.into() }
    }

    /// Address without a machine part.
    pub fn local(queue: impl Into<String>) -> Self { Self::new(queue, "") }

    pub fn queue(&self) -> &str { &self.queue }

    pub fn machine(&self) -> &str { &self.machine }

    /// An address with no queue identifies nothing.
    pub fn is_empty(&self) -> bool { self.queue.trim().is_empty() }

    /// Reject addresses whose canonical string would not parse back to the
    /// same value.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.is_empty() {
            return Err(PersistenceError::invalid("address has no queue"));
        }
        if self.queue.contains('@') {
            return Err(PersistenceError::invalid(format!("queue '{}' must not contain '@'", self.queue)));
        }
        if self.queue.trim() != self.queue || self.machine.trim() != self.machine {
            return Err(PersistenceError::invalid(format!("address '{self}' has surrounding whitespace")));
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.machine.is_empty() {
            write!(f, "{}", self.queue)
        } else {
            write!(f, "{}@{}", self.queue, self.machine)
        }
    }
}

impl FromStr for Address {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (queue, machine) = s.split_once('@').unwrap_or((s, ""));
        let address = Self::new(queue, machine);
        address
            .validate()
            .map_err(|e| PersistenceError::Serialization(format!("address '{s}': {e}")))?;
        Ok(address)
    }
}

const VERSION_SEPARATOR: &str = ", Version=";

/// Message contract identifier, canonical form `TypeName` or
/// `TypeName, Version=x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageType {
    type_name: String,
    version: Option<String>,
}

impl MessageType {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), version: None }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Identifier derived from a Rust message type.
    pub fn of<T: ?Sized>() -> Self { Self::new(std::any::type_name::<T>()) }

    pub fn type_name(&self) -> &str { &self.type_name }

    pub fn version(&self) -> Option<&str> { self.version.as_deref() }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}{}{}", self.type_name, VERSION_SEPARATOR, v),
            None => write!(f, "{}", self.type_name),
        }
    }
}

impl FromStr for MessageType {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.split_once(VERSION_SEPARATOR) {
            Some((name, version)) => (name, Some(version.to_string())),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(PersistenceError::Serialization(format!("message type '{s}' has no name")));
        }
        Ok(Self { type_name: name.to_string(), version })
    }
}
