//! Attachment bytes to inline data URLs.
//!
//! The rendering engine loads the page from a temp file with no network
//! access to the drive service, so the product image has to travel inside
//! the HTML itself. A data URL keeps the document self-contained and spares
//! us short-lived signed URLs that could expire mid-render.

use crate::bitable::TableStore;
use crate::error::ContractError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Download a media token and encode it as `data:{content-type};base64,...`.
pub async fn download_media_to_data_url(
    store: &dyn TableStore,
    file_token: &str,
) -> Result<String, ContractError> {
    let media = store.download_media(file_token).await?;
    let b64 = STANDARD.encode(&media.bytes);
    Ok(format!("data:{};base64,{}", media.content_type, b64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitable::{Media, Record, TableStore};
    use async_trait::async_trait;
    use serde_json::Value;

    struct OnePixelStore;

    #[async_trait]
    impl TableStore for OnePixelStore {
        async fn get_record(&self, _: &str, _: &str) -> Result<Record, ContractError> {
            unreachable!("not used in this test")
        }
        async fn update_record(&self, _: &str, _: &str, _: Value) -> Result<(), ContractError> {
            unreachable!("not used in this test")
        }
        async fn download_media(&self, file_token: &str) -> Result<Media, ContractError> {
            assert_eq!(file_token, "tok1");
            Ok(Media {
                content_type: "image/png".into(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            })
        }
        async fn upload_media(&self, _: &str, _: Vec<u8>) -> Result<String, ContractError> {
            unreachable!("not used in this test")
        }
    }

    #[tokio::test]
    async fn encodes_content_type_and_payload() {
        let url = download_media_to_data_url(&OnePixelStore, "tok1")
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }
}
