//! qrouter - hybrid SQL + document question answering
//!
//! A router workflow sits between the user and two retrieval backends:
//! a structured SQLite store and a plain-text document set. A reasoning
//! model picks the right tool (or none) for each query, tool calls run
//! concurrently, and the loop continues until the model produces a
//! final answer.

pub mod config;
pub mod engines;
pub mod error;
pub mod history;
pub mod reasoning;
pub mod tools;
pub mod ui;
pub mod workflow;

pub use error::{Error, Result};
