//! Error types for the contract-press library.
//!
//! A single [`ContractError`] enum covers every failure mode of the
//! generation pipeline. Each variant carries the context a caller needs to
//! diagnose the failure (upstream status codes, response bodies, parent-node
//! hints), and each maps to exactly one HTTP status via
//! [`ContractError::status`] so the webhook layer never has to inspect
//! variants itself.
//!
//! Propagation policy: every pipeline stage either returns a usable value or
//! an error; the webhook handler catches the error, logs it, and returns a
//! uniform failure JSON body. There is no partial success and no automatic
//! retry at any layer. The one soft spot is the product image, which is
//! resolved with a non-fatal path in `generate` rather than through an error
//! variant here.

use thiserror::Error;

/// All errors returned by the contract-press library.
#[derive(Debug, Error)]
pub enum ContractError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The webhook shared-secret header was missing or did not match.
    #[error("Unauthorized")]
    Unauthorized,

    /// The trigger payload carried no record identifier.
    #[error("Missing record_id")]
    MissingRecordId,

    // ── Configuration errors ──────────────────────────────────────────────
    /// A required credential or identifier is absent from the environment.
    #[error("Missing configuration: {0}")]
    Config(String),

    // ── Upstream API errors ───────────────────────────────────────────────
    /// The tabular service returned a non-success response or a non-zero
    /// envelope code. `context` names the operation (API path) that failed.
    #[error("Bitable API {context} failed: {status} {body}")]
    Api {
        context: String,
        status: u16,
        body: String,
    },

    /// A binary attachment download failed.
    #[error("Download media failed: {status} {body}")]
    MediaDownload { status: u16, body: String },

    /// The PDF upload returned no file token.
    ///
    /// `parent_hint` is the first few characters of the parent node, enough
    /// to recognise a permission misconfiguration without leaking the full
    /// identifier into logs.
    #[error(
        "Upload PDF failed: {status} code={code} msg={msg} parent_type={parent_type} parent_node~={parent_hint}"
    )]
    Upload {
        status: u16,
        code: i64,
        msg: String,
        parent_type: String,
        parent_hint: String,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The headless rendering engine failed to produce a PDF.
    #[error("PDF rendering failed: {0}")]
    Render(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task join failures, I/O on temp files).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContractError {
    /// HTTP status the webhook response should carry for this error.
    pub fn status(&self) -> u16 {
        match self {
            ContractError::Unauthorized => 401,
            ContractError::MissingRecordId => 400,
            ContractError::Config(_)
            | ContractError::Api { .. }
            | ContractError::MediaDownload { .. }
            | ContractError::Upload { .. }
            | ContractError::Render(_)
            | ContractError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_carries_context_and_status() {
        let e = ContractError::Api {
            context: "/bitable/v1/apps/x/tables/y/records/z".into(),
            status: 403,
            body: r#"{"code":1061004}"#.into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("403"), "got: {msg}");
        assert!(msg.contains("records/z"));
    }

    #[test]
    fn upload_error_display_includes_parent_hint() {
        let e = ContractError::Upload {
            status: 200,
            code: 1061004,
            msg: "forbidden".into(),
            parent_type: "bitable_file".into(),
            parent_hint: "bascnAbCdE".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("1061004"));
        assert!(msg.contains("bascnAbCdE"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ContractError::Unauthorized.status(), 401);
        assert_eq!(ContractError::MissingRecordId.status(), 400);
        assert_eq!(ContractError::Config("x".into()).status(), 500);
        assert_eq!(ContractError::Render("boom".into()).status(), 500);
    }
}
