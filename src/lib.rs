//! # contract-press
//!
//! Webhook-driven contract-PDF generation for a bitable supply-chain
//! ledger. A button in the table fires a webhook with a record id; this
//! crate fetches the record, resolves its values (following linked records
//! for payment terms, quantity unit, and the product image), renders the
//! fixed purchase-sale contract template to an A4 PDF, uploads it, and
//! attaches it back onto the record.
//!
//! ## Pipeline
//!
//! ```text
//! webhook ──▶ fetch record ──▶ normalize ──▶ resolve links ──▶ inline image
//!                                                                   │
//! respond ◀── write back ◀── upload ◀── render PDF ◀── build HTML ◀─┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use contract_press::bitable::BitableClient;
//! use contract_press::config::AppConfig;
//! use contract_press::generate::generate_contract;
//! use contract_press::pipeline::render::ChromiumRenderer;
//!
//! # async fn run() -> Result<(), contract_press::error::ContractError> {
//! let config = AppConfig::from_env()?;
//! let store = BitableClient::new(&config)?;
//! let renderer = ChromiumRenderer::new(config.render_settle_ms);
//!
//! let artifact = generate_contract(&store, &renderer, &config, "recXXXXXX").await?;
//! println!("attached {}", artifact.file_name);
//! # Ok(())
//! # }
//! ```
//!
//! The `server` feature (on by default) adds the axum webhook surface and
//! the `contract-press` binary.

pub mod bitable;
pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod publish;

#[cfg(feature = "server")]
pub mod server;

pub use config::AppConfig;
pub use error::ContractError;
pub use generate::{generate_contract, PublishedArtifact};
