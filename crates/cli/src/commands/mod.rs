//! CLI command implementations.

pub mod api_status;
pub mod migrate;
