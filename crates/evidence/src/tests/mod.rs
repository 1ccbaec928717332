//! Engine-level scenarios.

pub(crate) mod support;

mod ask_flow;
