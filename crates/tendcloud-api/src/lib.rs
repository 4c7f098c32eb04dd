//! tendcloud-api: Shared API types and schemas
//!
//! Contains the pass report types emitted by the controller and the
//! request/response types of the status API, used across the daemon,
//! client and CLI.

pub mod pass;
pub mod responses;
