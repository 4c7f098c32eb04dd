//! Outcome strings and step keys

use tendcloud_api::pass::Outcomes;
use tendcloud_provider::ProviderError;

/// Step keys used in outcome maps
pub mod step {
    pub const REMOVING: &str = "removing";
    pub const CREATE: &str = "create";
    pub const DEPLOY: &str = "deploy";
    pub const CREATE_TAG: &str = "create-tag";
    pub const START: &str = "start";
    pub const WAIT: &str = "wait";
    pub const NO_OP: &str = "no-op";
    pub const CHECK: &str = "check";
    pub const DUPLICATE_CONFIGURATION: &str = "duplicate-configuration";
    pub const DUPLICATE_EXISTING: &str = "duplicate-existing";
    pub const ALREADY_REMOVING: &str = "already-removing";
    pub const AWAITING_REMOVAL: &str = "awaiting-removal";
    pub const IMMUTABLE_FIELD_CHANGED: &str = "immutable-field-changed";
}

/// `<action> failure: <message>`, followed by the provider's hint if any
#[must_use]
pub fn failure(action: &str, err: &ProviderError) -> String {
    match err.recommend() {
        Some(hint) => format!("{action} failure: {err}\n{hint}"),
        None => format!("{action} failure: {err}"),
    }
}

/// `<action> successful.`
#[must_use]
pub fn success(action: &str) -> String {
    format!("{action} successful.")
}

/// Outcome maps of the three action phases of one family
#[derive(Debug, Default)]
pub struct PhaseOutcomes {
    pub removing: Outcomes,
    pub modify: Outcomes,
    pub create: Outcomes,
}
