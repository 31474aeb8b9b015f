//! Webhook end-to-end tests against in-memory fakes.
//!
//! The router is driven directly with `tower::ServiceExt::oneshot`; the
//! table store and the renderer are substituted so the full pipeline runs
//! without network or a browser. The fakes count upstream calls, letting
//! the auth tests assert that a rejected request touched nothing.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use contract_press::bitable::{Fields, Media, Record, TableStore};
use contract_press::config::{AppConfig, DEFAULT_API_BASE};
use contract_press::error::ContractError;
use contract_press::pipeline::render::HtmlRenderer;
use contract_press::server::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ── Fakes ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeStore {
    records: HashMap<(String, String), Fields>,
    fail_upload: bool,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    updates: Mutex<Vec<(String, Value)>>,
    uploads: Mutex<Vec<String>>,
}

impl FakeStore {
    fn with_record(mut self, table_id: &str, record_id: &str, fields: Value) -> Self {
        let fields = fields
            .as_object()
            .cloned()
            .unwrap_or_default();
        self.records
            .insert((table_id.to_string(), record_id.to_string()), fields);
        self
    }

    fn upstream_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableStore for FakeStore {
    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Record, ContractError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let fields = self
            .records
            .get(&(table_id.to_string(), record_id.to_string()))
            .cloned()
            .ok_or_else(|| ContractError::Api {
                context: format!("records/{record_id}"),
                status: 404,
                body: r#"{"code":1254043}"#.into(),
            })?;
        Ok(Record {
            record_id: record_id.to_string(),
            fields,
        })
    }

    async fn update_record(
        &self,
        _table_id: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<(), ContractError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((record_id.to_string(), fields));
        }
        Ok(())
    }

    async fn download_media(&self, _file_token: &str) -> Result<Media, ContractError> {
        Ok(Media {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        })
    }

    async fn upload_media(&self, file_name: &str, _bytes: Vec<u8>) -> Result<String, ContractError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload {
            return Err(ContractError::Upload {
                status: 200,
                code: 1061004,
                msg: "forbidden".into(),
                parent_type: "bitable_file".into(),
                parent_hint: "bascnTest".into(),
            });
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(file_name.to_string());
        }
        Ok("filtokUploaded".into())
    }
}

#[derive(Default)]
struct FakeRenderer {
    html: Mutex<Option<String>>,
}

#[async_trait]
impl HtmlRenderer for FakeRenderer {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, ContractError> {
        if let Ok(mut slot) = self.html.lock() {
            *slot = Some(html.to_string());
        }
        Ok(b"%PDF-1.4 fake".to_vec())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn test_config(secret: Option<&str>) -> AppConfig {
    AppConfig {
        app_id: "cli_test".into(),
        app_secret: "secret".into(),
        app_token: "bascnTestApp".into(),
        table_id: "tblContracts".into(),
        api_base: DEFAULT_API_BASE.into(),
        webhook_secret: secret.map(str::to_string),
        attachment_field: "合同附件".into(),
        contract_image_field: "产品图".into(),
        sku_link_field: "SKU".into(),
        sku_image_field: "产品图".into(),
        buyer_contact_fallback: "胡红亮".into(),
        buyer_phone_fallback: String::new(),
        sign_place: "临安".into(),
        upload_parent_type: "bitable_file".into(),
        upload_parent_node: None,
        // Nonexistent on purpose: font embedding soft-skips.
        fonts_dir: PathBuf::from("does/not/exist"),
        render_settle_ms: 0,
        port: 0,
    }
}

fn app(
    config: AppConfig,
    store: Arc<FakeStore>,
    renderer: Arc<FakeRenderer>,
) -> axum::Router {
    create_router(AppState {
        config: Arc::new(config),
        store,
        renderer,
    })
}

fn print_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/contracts/print")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-webhook-token", token);
    }
    builder
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A contract record whose payment terms and quantity unit only exist on
/// the linked SKU master record.
fn contract_fields() -> Value {
    json!({
        "合同号": "HT-2025-001",
        "产品SKU": { "text": "ZD-120" },
        "产品名称": "折叠桌",
        "供应商名称": "杭州某某家具有限公司",
        "供应商联系人": "张三",
        "供应商联系电话": "13800000000",
        "采购方": "某某贸易有限公司",
        "数量": 500,
        "出厂含税单价": 24.69134,
        "采购总价": "￥12,345.67",
        "签订日期": 1735689600000u64,
        "付款条件": { "table_id": "tblTerms", "record_ids": ["recTerm1"] },
        "SKU": { "table_id": "tblSku", "record_ids": ["recSku1"] }
    })
}

fn linked_records(store: FakeStore) -> FakeStore {
    store
        .with_record("tblTerms", "recTerm1", json!({ "付款条件": "月结30天" }))
        .with_record(
            "tblSku",
            "recSku1",
            json!({
                "数量单位": "台",
                "产品图": [{ "file_token": "imgTok1" }]
            }),
        )
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_secret_is_rejected_before_any_upstream_call() {
    let store = Arc::new(linked_records(
        FakeStore::default().with_record("tblContracts", "rec1", contract_fields()),
    ));
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(Some("s3cret")), store.clone(), renderer);

    let resp = app
        .oneshot(print_request(Some("wrong"), json!({ "record_id": "rec1" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(store.upstream_calls(), 0);
}

#[tokio::test]
async fn missing_secret_header_is_rejected_when_secret_configured() {
    let store = Arc::new(FakeStore::default());
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(Some("s3cret")), store.clone(), renderer);

    let resp = app
        .oneshot(print_request(None, json!({ "record_id": "rec1" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.upstream_calls(), 0);
}

#[tokio::test]
async fn missing_record_id_is_bad_request() {
    let store = Arc::new(FakeStore::default());
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(None), store.clone(), renderer);

    let resp = app
        .oneshot(print_request(None, json!({})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Missing record_id");
    assert_eq!(store.upstream_calls(), 0);
}

#[tokio::test]
async fn camel_case_record_id_is_accepted() {
    let store = Arc::new(linked_records(
        FakeStore::default().with_record("tblContracts", "rec1", contract_fields()),
    ));
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(None), store, renderer);

    let resp = app
        .oneshot(print_request(None, json!({ "recordId": "rec1" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn generates_uploads_and_writes_back() {
    let store = Arc::new(linked_records(
        FakeStore::default().with_record("tblContracts", "rec1", contract_fields()),
    ));
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(
        test_config(Some("s3cret")),
        store.clone(),
        renderer.clone(),
    );

    let resp = app
        .oneshot(print_request(Some("s3cret"), json!({ "record_id": "rec1" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["record_id"], "rec1");
    assert_eq!(body["file_token"], "filtokUploaded");
    assert_eq!(body["file_name"], "HT-2025-001_ZD-120.pdf");

    // Rendered document reflects the resolved values.
    let html = renderer.html.lock().unwrap().clone().unwrap();
    assert!(html.contains("HT-2025-001"));
    assert!(html.contains("12,345.67"));
    assert!(html.contains("壹万贰仟叁佰肆拾伍元陆角柒分"));
    // Payment terms came through the linked record.
    assert!(html.contains("月结30天"));
    // Quantity unit from the SKU master.
    assert!(html.contains("数量（台）"));
    // No planned-delivery field: the sentence must not dangle a separator.
    assert!(html.contains("计划交货期：具体以需方通知的出货计划为准"));
    assert!(!html.contains("：，"));
    // Product image resolved via the SKU link and inlined.
    assert!(html.contains("data:image/png;base64,AQID"));
    // Sign date from the record's epoch-ms field, Shanghai calendar.
    assert!(html.contains("签订日期：2025年1月1日"));

    // Write-back attaches exactly the uploaded token under the configured
    // attachment field.
    let updates = store.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (record_id, fields) = &updates[0];
    assert_eq!(record_id, "rec1");
    assert_eq!(
        fields["合同附件"],
        json!([{ "file_token": "filtokUploaded", "name": "HT-2025-001_ZD-120.pdf" }])
    );
}

#[tokio::test]
async fn upload_failure_aborts_before_write_back() {
    let mut store = linked_records(
        FakeStore::default().with_record("tblContracts", "rec1", contract_fields()),
    );
    store.fail_upload = true;
    let store = Arc::new(store);
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(None), store.clone(), renderer);

    let resp = app
        .oneshot(print_request(None, json!({ "record_id": "rec1" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Upload PDF failed"), "got: {error}");
    assert!(error.contains("1061004"));
    assert_eq!(store.update_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_record_is_a_surfaced_api_error() {
    let store = Arc::new(FakeStore::default());
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(None), store, renderer);

    let resp = app
        .oneshot(print_request(None, json!({ "record_id": "recMissing" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("recMissing"));
}

#[tokio::test]
async fn health_endpoint_answers_without_auth() {
    let store = Arc::new(FakeStore::default());
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(test_config(Some("s3cret")), store, renderer);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}
