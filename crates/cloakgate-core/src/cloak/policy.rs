use cloakgate_types::CloakMode;

/// User-Agent prefix sent by the reference CLI client.
pub const REFERENCE_CLIENT_UA_PREFIX: &str = "claude-cli";

pub fn is_reference_client(user_agent: &str) -> bool {
    user_agent.starts_with(REFERENCE_CLIENT_UA_PREFIX)
}

/// Whether a request should be cloaked under `mode`.
///
/// `Auto` leaves requests from the reference client alone since they already
/// carry a genuine identity.
pub fn should_cloak(mode: CloakMode, user_agent: &str) -> bool {
    match mode {
        CloakMode::Always => true,
        CloakMode::Never => false,
        CloakMode::Auto => !is_reference_client(user_agent),
    }
}
