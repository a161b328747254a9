//! Concrete query-engine backends wired up by the binary
//!
//! The workflow core only knows the `QueryEngine` trait; these are the
//! implementations behind the two shipped tools.

mod docs;
mod sqlite;

pub use docs::DocumentStore;
pub use sqlite::NlSqlEngine;
