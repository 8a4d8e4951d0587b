//! Bounded audit log of original vs. masked requests.

mod recorder;
mod store;

pub use recorder::{record_masquerade, truncate_body, MasqueradeCapture, MAX_TRACE_BODY_BYTES};
pub use store::{MasqueradeTraceStore, DEFAULT_MAX_TRACE_RECORDS};
