//! # envi_core
//!
//! Core authentication domain logic for Envi.

pub mod auth;
pub mod migrate;
pub mod models;
