//! Utility functions and helpers.

pub(crate) mod utils;
pub(crate) mod validation;
