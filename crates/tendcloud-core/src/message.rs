//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use kameo_macros::Reply;

use tendcloud_api::pass::PassResult;

// ============================================================================
// ControllerActor Messages
// ============================================================================

/// Start a pass if none is running and the desired state changed since the
/// last pass started
#[derive(Debug)]
pub struct Tick;

/// Start a pass now, regardless of the desired state's modification time
#[derive(Debug)]
pub struct TriggerPass;

/// Get the most recent pass result
#[derive(Debug)]
pub struct GetLastPass;

/// Whether a message started a pass
#[derive(Debug, Clone, Copy, Reply)]
pub struct PassStarted {
    /// `false` when a pass was already running or nothing changed
    pub started: bool,
}

/// Last pass response
#[derive(Debug, Clone, Reply)]
pub struct LastPass {
    /// Whether a pass is running right now
    pub in_flight: bool,
    /// Result of the last finished pass
    pub result: Option<PassResult>,
}
