//! Shared request-handling helpers.

pub mod cookies;
