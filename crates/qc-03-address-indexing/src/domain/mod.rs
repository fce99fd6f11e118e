//! # Domain Layer
//!
//! Pure types: entities, the on-disk key codec, configuration, query
//! results and errors. No I/O.

pub mod entities;
pub mod errors;
pub mod keys;
pub mod queries;
pub mod script;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use keys::*;
pub use queries::*;
pub use script::*;
pub use value_objects::*;

use serde::Serializer;

/// Serialize a hash as lowercase hex.
pub fn serialize_hash<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(hash))
}

/// Serialize raw bytes (scripts) as lowercase hex.
pub fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}
