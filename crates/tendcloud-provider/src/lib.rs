//! tendcloud-provider: Cloud provider gateway abstraction
//!
//! Provides the gateway traits the reconciler drives for each resource
//! family (message queue, relational database, cache), the request and
//! record types they exchange, the encoding of ownership metadata (tags and
//! JSON descriptions), and an in-memory simulated cloud implementing every
//! gateway.

pub mod error;
pub mod sim;
pub mod tags;
pub mod traits;
pub mod types;

pub use error::ProviderError;
pub use sim::SimCloud;
pub use tags::{ChildDescription, Tag, TagsExt};
pub use traits::{CacheGateway, QueueGateway, RelationalGateway};
