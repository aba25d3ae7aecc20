//! Core internal logic of the control channel client.
//!
//! Line framing, event classification, serialized command issuance and the
//! workflows composed on top of it.

pub(crate) mod channel;
pub(crate) mod classifier;
pub(crate) mod framer;
pub(crate) mod networks;
pub(crate) mod process;
pub(crate) mod scan;
pub(crate) mod status;
