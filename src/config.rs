//! Service configuration, read from the environment.
//!
//! The service runs as a webhook target where CLI flags are unavailable, so
//! every knob is an env var with a documented default. [`AppConfig::from_env`]
//! fails fast on missing credentials and identifiers; everything else falls
//! back.
//!
//! Field-name overrides exist because the upstream bitable schema is not
//! under our control: operators can repoint the attachment field, the SKU
//! link field, and the image fields without a redeploy of the table.

use crate::error::ContractError;
use std::path::PathBuf;

/// Default bitable API origin.
pub const DEFAULT_API_BASE: &str = "https://open.feishu.cn/open-apis";

/// Everything the pipeline and the webhook server need, in one struct.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// App credential pair for the tenant-token handshake.
    pub app_id: String,
    pub app_secret: String,

    /// The bitable (base) identifier hosting the contract table.
    pub app_token: String,
    /// Table holding contract records.
    pub table_id: String,

    /// API origin; overridable so tests can point at a local stub.
    pub api_base: String,

    /// Shared secret for the webhook trigger. When set, requests must carry
    /// it in the `x-webhook-token` header.
    pub webhook_secret: Option<String>,

    /// Attachment field the generated PDF is written back to.
    pub attachment_field: String,
    /// Product-image field on the contract record itself.
    pub contract_image_field: String,
    /// Link field pointing at the SKU master table.
    pub sku_link_field: String,
    /// Image field on the linked SKU record.
    pub sku_image_field: String,

    /// Fallbacks for buyer contact identity when the lookup fields on the
    /// contract record are empty (lookup fields lag behind edits upstream).
    pub buyer_contact_fallback: String,
    pub buyer_phone_fallback: String,

    /// Signing-location text printed on the contract.
    pub sign_place: String,

    /// Upload destination. `parent_node` defaults to the bitable itself;
    /// override both when the app lacks edit rights on the base.
    pub upload_parent_type: String,
    pub upload_parent_node: Option<String>,

    /// Directory holding NotoSansSC-Regular.ttf / NotoSansSC-Bold.ttf.
    /// Missing fonts are skipped with a warning, not fatal.
    pub fonts_dir: PathBuf,

    /// Settle delay after web fonts report ready, in milliseconds. CJK glyph
    /// rasterisation needs a beat beyond `document.fonts.ready`.
    pub render_settle_ms: u64,

    /// Listen port for the webhook server.
    pub port: u16,
}

impl AppConfig {
    /// Load the configuration from the environment.
    ///
    /// # Errors
    /// Returns [`ContractError::Config`] naming the first missing required
    /// variable (`FEISHU_APP_ID`, `FEISHU_APP_SECRET`, `FEISHU_APP_TOKEN`,
    /// `FEISHU_CONTRACT_TABLE_ID`).
    pub fn from_env() -> Result<Self, ContractError> {
        Ok(Self {
            app_id: require("FEISHU_APP_ID")?,
            app_secret: require("FEISHU_APP_SECRET")?,
            app_token: require("FEISHU_APP_TOKEN")?,
            table_id: require("FEISHU_CONTRACT_TABLE_ID")?,
            api_base: var_or("FEISHU_API_BASE", DEFAULT_API_BASE),
            webhook_secret: var_opt("WEBHOOK_TOKEN"),
            attachment_field: var_or("FEISHU_CONTRACT_ATTACHMENT_FIELD", "合同附件"),
            contract_image_field: var_or("FEISHU_PRODUCT_IMAGE_FIELD", "产品图"),
            sku_link_field: var_or("FEISHU_SKU_LINK_FIELD", "SKU"),
            sku_image_field: var_or("FEISHU_SKU_IMAGE_FIELD", "产品图"),
            buyer_contact_fallback: var_or("BUYER_CONTACT_NAME", "胡红亮"),
            buyer_phone_fallback: var_or("BUYER_CONTACT_PHONE", ""),
            sign_place: var_or("SIGN_PLACE", "临安"),
            upload_parent_type: var_or("FEISHU_UPLOAD_PARENT_TYPE", "bitable_file"),
            upload_parent_node: var_opt("FEISHU_UPLOAD_PARENT_NODE"),
            fonts_dir: PathBuf::from(var_or("FONTS_DIR", "public/fonts")),
            render_settle_ms: var_opt("RENDER_SETTLE_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            port: var_opt("PORT").and_then(|v| v.parse().ok()).unwrap_or(8787),
        })
    }

    /// Storage node the PDF is uploaded under: the configured override, or
    /// the bitable itself.
    pub fn upload_parent_node(&self) -> &str {
        self.upload_parent_node.as_deref().unwrap_or(&self.app_token)
    }
}

fn require(name: &str) -> Result<String, ContractError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ContractError::Config(name.to_string())),
    }
}

fn var_or(name: &str, default: &str) -> String {
    var_opt(name).unwrap_or_else(|| default.to_string())
}

fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
