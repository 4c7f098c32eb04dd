//! tendcloud-client: HTTP client library for the tendcloud daemon
//!
//! # Examples
//!
//! ```no_run
//! use tendcloud_client::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new("http://localhost:8080")?;
//!
//! let health = client.health().await?;
//! println!("Status: {}", health.status);
//!
//! if client.trigger_pass().await?.started {
//!     println!("pass started");
//! }
//!
//! let last = client.last_pass().await?;
//! if let Some(result) = last.result {
//!     println!("{} messages", result.messages.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;

pub use error::{ClientError, Result};
pub use http::HttpClient;
