//! Request pipeline middleware.

pub mod auth;
