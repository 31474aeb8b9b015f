//! Upload the rendered PDF and attach it to the contract record.

use crate::bitable::TableStore;
use crate::error::ContractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::info;

static RE_FILENAME_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("valid regex"));

/// Build the attachment file name from the contract number and SKU.
///
/// Characters that are unsafe in file names are replaced with underscores.
/// A missing contract number falls back to 合同 so the artifact is still
/// identifiable; a missing SKU just drops that segment.
pub fn contract_file_name(contract_no: &str, sku: &str) -> String {
    let no = sanitize(contract_no);
    let no = if no.is_empty() { "合同".to_string() } else { no };
    let sku = sanitize(sku);

    if sku.is_empty() {
        format!("{no}.pdf")
    } else {
        format!("{no}_{sku}.pdf")
    }
}

fn sanitize(s: &str) -> String {
    RE_FILENAME_UNSAFE.replace_all(s.trim(), "_").to_string()
}

/// Upload `pdf` as a drive media file and write it back to the record's
/// attachment field. Returns the new file token.
///
/// Write-back replaces the field's previous contents, so the record always
/// shows exactly one current contract PDF.
pub async fn publish_pdf(
    store: &dyn TableStore,
    table_id: &str,
    record_id: &str,
    attachment_field: &str,
    file_name: &str,
    pdf: Vec<u8>,
) -> Result<String, ContractError> {
    let size = pdf.len();
    let file_token = store.upload_media(file_name, pdf).await?;
    info!(%file_name, size, %file_token, "pdf uploaded");

    let fields = json!({
        attachment_field: [{ "file_token": file_token, "name": file_name }]
    });
    store.update_record(table_id, record_id, fields).await?;

    Ok(file_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_number_and_sku() {
        assert_eq!(contract_file_name("HT-2025-001", "ZD-120"), "HT-2025-001_ZD-120.pdf");
    }

    #[test]
    fn missing_sku_drops_segment() {
        assert_eq!(contract_file_name("HT-2025-001", ""), "HT-2025-001.pdf");
    }

    #[test]
    fn missing_contract_no_falls_back() {
        assert_eq!(contract_file_name("", "ZD-120"), "合同_ZD-120.pdf");
        assert_eq!(contract_file_name("  ", ""), "合同.pdf");
    }

    #[test]
    fn unsafe_characters_become_underscores() {
        assert_eq!(contract_file_name("HT/2025:001", "A*B?"), "HT_2025_001_A_B_.pdf");
        assert_eq!(contract_file_name(r#"a\b"c<d>e|f"#, ""), "a_b_c_d_e_f.pdf");
    }
}
