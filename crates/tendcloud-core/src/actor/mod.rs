//! Actor implementations

pub mod controller;

pub use controller::{ControllerActor, ControllerActorArgs};
