//! Upstream access to the bitable service.
//!
//! Everything the pipeline needs from the tabular service goes through the
//! [`TableStore`] trait: fetch a record, update a record, download an
//! attachment, upload a binary. Keeping the seam this narrow means the
//! pipeline and the webhook tests never touch the network: test suites
//! substitute an in-memory fake and count calls, while production wires in
//! [`BitableClient`].

pub mod client;
pub mod token;

pub use client::BitableClient;
pub use token::{Clock, SystemClock, TokenCache};

use crate::error::ContractError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A record's field map: field name → raw field value.
///
/// Values are kept as raw JSON because the upstream field shapes are
/// heterogeneous (scalars, tagged-object arrays, attachment descriptors,
/// linked-record references); normalisation happens in the pipeline.
pub type Fields = Map<String, Value>;

/// An immutable record snapshot, fetched once per generation request.
#[derive(Debug, Clone)]
pub struct Record {
    pub record_id: String,
    pub fields: Fields,
}

/// A downloaded binary attachment.
#[derive(Debug, Clone)]
pub struct Media {
    /// Declared content type of the response body.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The narrow upstream interface the pipeline runs against.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch a single record by table and record id.
    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Record, ContractError>;

    /// Partially update a record's fields.
    async fn update_record(
        &self,
        table_id: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<(), ContractError>;

    /// Download an attachment binary by its file token.
    async fn download_media(&self, file_token: &str) -> Result<Media, ContractError>;

    /// Upload a binary to the configured parent storage node.
    ///
    /// Returns the file token issued by the storage service. A response
    /// without a token is an error, never an empty token.
    async fn upload_media(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ContractError>;
}
