//! Flat string encoding of timeout headers (a JSON object).

use std::collections::{BTreeMap, HashMap};

use crate::errors::PersistenceError;

pub fn to_flat_string(headers: &HashMap<String, String>) -> Result<String, PersistenceError> {
    // sorted so equal maps encode identically
    let sorted: BTreeMap<&String, &String> = headers.iter().collect();
    Ok(serde_json::to_string(&sorted)?)
}

pub fn from_flat_string(flat: &str) -> Result<HashMap<String, String>, PersistenceError> {
    if flat.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(flat)?)
}
