//! End-to-end contract generation for one record.
//!
//! ## Why one linear pass?
//!
//! Generation is a fail-fast sequence: fetch the record, resolve every
//! display value (following linked records where the contract row holds a
//! reference instead of text), render the document, upload it, and write
//! the attachment back. Any step's failure aborts the rest, so a record
//! never ends up with a PDF attached that does not match its current
//! field values.

use crate::bitable::TableStore;
use crate::config::AppConfig;
use crate::error::ContractError;
use crate::pipeline::links::{
    extract_link_items, pick_file_token, resolve_attachment_from_linked_records,
    resolve_text_from_linked_records, LinkRef,
};
use crate::pipeline::media::download_media_to_data_url;
use crate::pipeline::normalize::{
    fmt_date_cn, fmt_money_with_comma, pick_field, to_text, today_cn,
};
use crate::pipeline::render::HtmlRenderer;
use crate::pipeline::template::{build_contract_html, embedded_font_css, ContractValues};
use crate::publish::{contract_file_name, publish_pdf};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reference to the uploaded contract PDF, echoed back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublishedArtifact {
    pub record_id: String,
    pub file_token: String,
    pub file_name: String,
}

/// Generate, upload, and attach the contract PDF for `record_id`.
pub async fn generate_contract(
    store: &dyn TableStore,
    renderer: &dyn HtmlRenderer,
    config: &AppConfig,
    record_id: &str,
) -> Result<PublishedArtifact, ContractError> {
    let start = Instant::now();
    info!(%record_id, "starting contract generation");

    // ── Step 1: Fetch the contract record ────────────────────────────────
    let record = store.get_record(&config.table_id, record_id).await?;
    let fields = &record.fields;

    // ── Step 2: Resolve display values ───────────────────────────────────
    // Field names are tried in order; ledgers rename columns over time and
    // the older spellings stay as fallbacks.
    let contract_no = text_of(fields, &["合同号", "合同编号"]);
    let sku = text_of(fields, &["产品SKU", "SKU", "型号/规格"]);
    let product_name = text_of(fields, &["产品名称", "品名"]);

    let supplier_name = text_of(fields, &["供应商名称", "供方"]);
    let supplier_contact = text_of(fields, &["供应商联系人", "联系人"]);
    let supplier_phone = text_of(fields, &["供应商联系电话", "联系电话"]);

    let buyer_name = text_of(fields, &["采购方", "需方"]);
    // Buyer contact fields are lookup columns that are sometimes not yet
    // backfilled; the configured fallbacks keep the document signable.
    let buyer_contact = non_empty_or(
        text_of(fields, &["采购方联系人"]),
        &config.buyer_contact_fallback,
    );
    let buyer_phone = non_empty_or(
        text_of(fields, &["采购方联系方式", "采购方联系电话"]),
        &config.buyer_phone_fallback,
    );

    let qty = text_of(fields, &["数量", "采购数量"]);
    let unit_price = money_of(
        fields,
        &["出厂含税单价（元/台）", "出厂含税单价", "含税出厂单价", "含税单价"],
    );
    let total_price = money_of(fields, &["采购总价", "合同总价", "金额（元）", "金额"]);

    let planned_delivery = date_of(fields, &["预计交货日期"]);
    let product_remark = text_of(fields, &["产品备注", "备注", "产品说明"]);

    // Sign date falls back to today in the contract's calendar.
    let sign_date = {
        let d = date_of(fields, &["签订日期"]);
        if d.is_empty() { today_cn() } else { d }
    };

    // ── Step 3: Follow linked records ────────────────────────────────────
    // Payment terms may live on the record directly or behind a link.
    let payment_candidates = ["付款条件", "付款方式", "账期"];
    let payment_raw = pick_field(fields, &payment_candidates);
    let mut payment_terms = payment_raw.map(to_text).unwrap_or_default();
    if payment_terms.is_empty() {
        if let Some(raw) = payment_raw {
            let links = extract_link_items(raw);
            if !links.is_empty() {
                payment_terms =
                    resolve_text_from_linked_records(store, &links, &payment_candidates).await?;
            }
        }
    }

    // Quantity unit and (fallback) product image come from the linked SKU
    // master record.
    let sku_val = pick_field(
        fields,
        &[config.sku_link_field.as_str(), "产品SKU", "产品SKU/规格"],
    );
    let sku_links: Vec<LinkRef> = sku_val.map(extract_link_items).unwrap_or_default();

    let mut qty_unit = if sku_links.is_empty() {
        String::new()
    } else {
        resolve_text_from_linked_records(store, &sku_links, &["数量单位"]).await?
    };
    if qty_unit.is_empty() {
        qty_unit = "台".to_string();
    }

    let img_val = pick_field(
        fields,
        &[
            config.contract_image_field.as_str(),
            "产品图片",
            "产品主图",
            "参考图",
            "图片",
        ],
    );
    let mut img_token = img_val.and_then(pick_file_token);
    if img_token.is_none() && !sku_links.is_empty() {
        img_token = resolve_attachment_from_linked_records(
            store,
            &sku_links,
            &[
                config.sku_image_field.as_str(),
                "产品图片",
                "主图",
                "图片",
                "参考图",
            ],
        )
        .await?;
    }

    // ── Step 4: Inline the product image ─────────────────────────────────
    // A broken image must not block the contract itself.
    let product_img_data_url = match img_token {
        Some(token) => match download_media_to_data_url(store, &token).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(%token, error = %e, "product image unavailable, rendering without it");
                None
            }
        },
        None => None,
    };

    // ── Step 5: Build the document and render it ─────────────────────────
    let values = ContractValues {
        contract_no: contract_no.clone(),
        sign_date,
        sign_place: config.sign_place.clone(),
        supplier_name,
        supplier_contact,
        supplier_phone,
        buyer_name,
        buyer_contact,
        buyer_phone,
        product_name,
        sku: sku.clone(),
        qty,
        qty_unit,
        unit_price,
        total_price,
        planned_delivery,
        product_remark,
        payment_terms,
        product_img_data_url,
        font_css: embedded_font_css(&config.fonts_dir),
    };
    let html = build_contract_html(&values);
    debug!(html_bytes = html.len(), "contract html built");

    let pdf = renderer.render_pdf(&html).await?;

    // ── Step 6: Upload and write back ────────────────────────────────────
    let file_name = contract_file_name(&contract_no, &sku);
    let file_token = publish_pdf(
        store,
        &config.table_id,
        record_id,
        &config.attachment_field,
        &file_name,
        pdf,
    )
    .await?;

    info!(
        %record_id,
        %file_name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "contract generated"
    );

    Ok(PublishedArtifact {
        record_id: record_id.to_string(),
        file_token,
        file_name,
    })
}

fn text_of(fields: &crate::bitable::Fields, candidates: &[&str]) -> String {
    pick_field(fields, candidates).map(to_text).unwrap_or_default()
}

fn money_of(fields: &crate::bitable::Fields, candidates: &[&str]) -> String {
    pick_field(fields, candidates)
        .map(fmt_money_with_comma)
        .unwrap_or_default()
}

fn date_of(fields: &crate::bitable::Fields, candidates: &[&str]) -> String {
    match pick_field(fields, candidates) {
        Some(v) if !date_value_absent(v) => fmt_date_cn(v),
        _ => String::new(),
    }
}

/// A date field counts as absent when null, empty text, or a zero epoch;
/// a cleared date cell must not render as 1970年1月1日.
fn date_value_absent(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(true),
        _ => to_text(v).is_empty(),
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
