//! Session identity cloaking: identifier format, rotating pools, registry,
//! cloak policy and the request-level facade.

mod cloaker;
mod policy;
mod registry;
mod session_pool;
pub mod user_id;

pub use cloaker::{CloakOutcome, CloakRequest, Cloaker};
pub use policy::{is_reference_client, should_cloak, REFERENCE_CLIENT_UA_PREFIX};
pub use registry::{ResolvedUserId, SessionPoolRegistry};
pub use session_pool::{
    select_index, AuthSessionPool, SessionEntry, DEFAULT_GRACE_PERIOD, DEFAULT_MAX_SESSIONS,
    DEFAULT_ROTATION_INTERVAL,
};
pub use user_id::{generate_fake_user_id, is_valid_user_id};
