//! # Cloakgate Core
//!
//! Cloaking subsystem of the Cloakgate gateway.
//!
//! ```text
//! cloakgate-core/src/
//! ├── cloak/      # session identifiers, pools, registry, cloak policy, Cloaker facade
//! ├── trace/      # masquerade trace ring buffer + recorder
//! ├── transport/  # ClientHello profiles, dialers, fingerprinting HTTPS transport
//! └── modules/    # config file loading
//! ```
//!
//! None of the services here are global. Construct each once at process start
//! and share it via `Arc` with every request worker.

#![allow(
    clippy::significant_drop_tightening,
    reason = "lock guards are scoped to short metadata updates"
)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing))]

pub mod cloak;
pub mod error;
pub mod modules;
pub mod trace;
pub mod transport;

pub use cloak::{Cloaker, SessionPoolRegistry};
pub use error::{AppError, AppResult};
pub use trace::MasqueradeTraceStore;
pub use transport::{ClientHelloProfile, FingerprintTransport, FingerprintTransportConfig};
