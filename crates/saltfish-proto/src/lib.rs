//! Saltfish Protocol Buffer Definitions
//!
//! This crate contains the gRPC service definition and message types for the
//! saltfish dataset service: the `DatasetStore` service with its five
//! operations (CreateDataset, DeleteDataset, GenerateId, GetDatasets,
//! PutRecords) and the data-model messages (`Schema`, `Record`,
//! `TaggedRecord`, `Dataset`).
//!
//! Domain failures travel in band as the per-response `Status` enums; the
//! transport layer only ever sees successful replies.
//!
//! ## Usage
//!
//! ```ignore
//! use saltfish_proto::saltfish::{
//!     dataset_store_client::DatasetStoreClient, GenerateIdRequest,
//! };
//!
//! let mut client = DatasetStoreClient::connect("http://localhost:5555").await?;
//! let resp = client.generate_id(GenerateIdRequest { count: 4 }).await?;
//! ```

/// Generated messages and the `DatasetStore` service.
pub mod saltfish {
    tonic::include_proto!("saltfish");
}

/// Encoded file descriptor set, used by the server's reflection service.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    tonic::include_file_descriptor_set!("saltfish_descriptor");
