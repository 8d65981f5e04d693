//! Common utilities shared across the node's services.

pub mod logging;
