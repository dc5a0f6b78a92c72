//! Saltfish Client
//!
//! Typed wrapper around the generated `DatasetStore` gRPC client: every
//! operation returns `Result` instead of an in-band status, rejected
//! requests surface as [`ClientError::Rejected`] carrying the status name
//! and server message, and [`SchemaBuilder`] assembles feature lists
//! without touching the wire types.
//!
//! ## Example
//!
//! ```ignore
//! use saltfish_client::{NewDataset, SaltfishClient, SchemaBuilder};
//!
//! let mut client = SaltfishClient::connect("http://localhost:5555").await?;
//! let dataset_id = client
//!     .create_dataset(NewDataset {
//!         user_id: 42,
//!         name: "iris".to_string(),
//!         schema: SchemaBuilder::new()
//!             .numerical("sepal_len")
//!             .categorical("species")
//!             .build(),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod schema;

pub use client::{NewDataset, SaltfishClient};
pub use error::{ClientError, Result};
pub use schema::SchemaBuilder;
