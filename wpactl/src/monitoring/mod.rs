//! Event fan-out and waiting on daemon state transitions.

pub(crate) mod events;
pub(crate) mod state_wait;
