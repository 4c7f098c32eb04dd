//! Application state shared across HTTP handlers

use kameo::actor::ActorRef;
use tendcloud_core::ControllerActor;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Reference to the controller actor
    pub controller: ActorRef<ControllerActor>,
}

impl AppState {
    /// Create new application state
    pub fn new(controller: ActorRef<ControllerActor>) -> Self {
        Self { controller }
    }
}
