//! # Address Indexing Services
//!
//! - [`IndexMaintainer`]: the only writer. Implements `IndexMaintenanceApi`.
//! - [`AddressIndexQuery`]: read-only. Implements `AddressIndexQueryApi`.

mod maintenance;
mod query;

pub use maintenance::IndexMaintainer;
pub use query::AddressIndexQuery;
