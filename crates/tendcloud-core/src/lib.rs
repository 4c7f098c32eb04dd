//! tendcloud-core: Reconciliation engine and controller actor
//!
//! Compares desired state against provider listings per resource family,
//! tags removals, applies modifications, creates what is missing and
//! reconciles child resources of serving clusters. The `ControllerActor`
//! schedules passes and keeps the last [`PassResult`].

pub mod actor;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod family;
pub mod message;
pub mod outcome;
pub mod pass;
pub mod resource;
pub mod scheduler;
pub mod validate;
pub mod waiter;

pub use actor::controller::{ControllerActor, ControllerActorArgs, PASS_LOG_TARGET};
pub use config::{DesiredState, ProviderSettings};
pub use engine::{Engine, Report, Scope};
pub use error::CoreError;
pub use message::{GetLastPass, LastPass, PassStarted, Tick, TriggerPass};
pub use pass::{DesiredSource, GatewayFactory, Reconciler};
pub use resource::{DesiredResource, ExistingResource, ResourceKind, Target};
pub use scheduler::{PassGate, PassPermit};
pub use tendcloud_api::pass::PassResult;
pub use waiter::Poller;
