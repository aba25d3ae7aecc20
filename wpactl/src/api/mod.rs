//! Public API module.
//!
//! This module contains the high-level user-facing API for the `wpactl` crate.

pub mod collaborators;
pub mod models;
pub mod wpa_client;
