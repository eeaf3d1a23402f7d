//! Invoice API endpoints.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{Invoice, InvoiceUpdate, NewInvoice};
use crate::error::I18nError;

use super::AppState;
use super::files::invalid_body;

/// List invoices query parameters
#[derive(Deserialize)]
pub struct ListInvoicesParams {
    /// Case-insensitive match on vendor name or invoice number
    pub q: Option<String>,
}

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

pub async fn list_invoices_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<Vec<Invoice>>, I18nError> {
    let invoices = state
        .service
        .list_invoices(params.q.as_deref())
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(invoices))
}

pub async fn create_invoice_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewInvoice>, JsonRejection>,
) -> Result<(StatusCode, Json<Invoice>), I18nError> {
    let Json(new) = payload.map_err(|e| state.i18n_error(invalid_body(e)))?;

    let invoice = state
        .service
        .create_invoice(new)
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, I18nError> {
    let invoice = state
        .service
        .get_invoice(&id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(invoice))
}

/// Update an invoice (PUT or POST)
pub async fn update_invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<InvoiceUpdate>, JsonRejection>,
) -> Result<Json<Invoice>, I18nError> {
    let Json(update) = payload.map_err(|e| state.i18n_error(invalid_body(e)))?;

    let invoice = state
        .service
        .update_invoice(&id, update)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(invoice))
}

pub async fn delete_invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, I18nError> {
    state
        .service
        .delete_invoice(&id)
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(DeleteResponse {
        success: true,
        message: state.service.i18n.get("en", "invoice-delete-success", None),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn invoice_body(file_url: &str, vendor: &str, number: &str) -> Value {
        json!({
            "fileUrl": file_url,
            "fileName": "invoice.pdf",
            "vendor": { "name": vendor },
            "invoice": {
                "number": number,
                "date": "2024-06-01",
                "total": "250.00",
                "lineItems": [
                    { "description": "Service", "unitPrice": 250, "quantity": 1, "total": 250 }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_create_get_and_duplicate() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (status, created) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/a.pdf", "Acme", "A-1")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["invoice"]["total"], 250.0);
        let id = created["_id"].as_str().unwrap().to_string();

        let (status, fetched) = send_json(&app, get(&format!("/api/v1/invoices/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["vendor"]["name"], "Acme");

        let (status, error) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/a.pdf", "Other", "B-2")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["message"], "Invoice already exists");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_payloads() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (status, error) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/a.pdf", "", "A-1")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["message"], "vendor.name is required");

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/invoices")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, error) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "invalid_request");

        let mut body = invoice_body("http://f/nan.pdf", "Acme", "N-1");
        body["invoice"]["lineItems"][0]["unitPrice"] = json!("NaN");
        let (status, error) = send_json(&app, json_request("POST", "/api/v1/invoices", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "invalid_request");

        let mut body = invoice_body("http://f/inf.pdf", "Acme", "N-2");
        body["invoice"]["total"] = json!("inf");
        let (status, _) = send_json(&app, json_request("POST", "/api/v1/invoices", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, all) = send_json(&app, get("/api/v1/invoices")).await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn test_search() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        for (url, vendor, number) in [
            ("http://f/1.pdf", "Blue Harbor Ltd", "BH-100"),
            ("http://f/2.pdf", "Green Field", "GF-7"),
            ("http://f/3.pdf", "Stone & Co", "X-harbor-3"),
        ] {
            let (status, _) = send_json(
                &app,
                json_request("POST", "/api/v1/invoices", invoice_body(url, vendor, number)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, all) = send_json(&app, get("/api/v1/invoices")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);
        // newest first
        assert_eq!(all[0]["vendor"]["name"], "Stone & Co");

        let (_, hits) = send_json(&app, get("/api/v1/invoices?q=HARBOR")).await;
        assert_eq!(hits.as_array().unwrap().len(), 2);

        let (_, hits) = send_json(&app, get("/api/v1/invoices?q=gf-7")).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["vendor"]["name"], "Green Field");
    }

    #[tokio::test]
    async fn test_search_non_ascii_names() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (status, _) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/m.pdf", "Müller GmbH", "É-1")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, hits) = send_json(&app, get("/api/v1/invoices?q=M%C3%9CLLER")).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, hits) = send_json(&app, get("/api/v1/invoices?q=%C3%A9-1")).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["vendor"]["name"], "Müller GmbH");
    }

    #[tokio::test]
    async fn test_update_via_put_and_post() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (_, created) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/a.pdf", "Acme", "A-1")),
        )
        .await;
        let uri = format!("/api/v1/invoices/{}", created["_id"].as_str().unwrap());

        let mut full = created.clone();
        full["vendor"]["name"] = json!("Acme Holdings");
        full["invoice"]["lineItems"] = json!([]);
        let (status, updated) = send_json(&app, json_request("PUT", &uri, full)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["vendor"]["name"], "Acme Holdings");
        assert_eq!(updated["invoice"]["lineItems"], json!([]));
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let (status, updated) = send_json(
            &app,
            json_request("POST", &uri, json!({ "fileName": "renamed.pdf" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["fileName"], "renamed.pdf");
        assert_eq!(updated["vendor"]["name"], "Acme Holdings");

        let (status, error) = send_json(
            &app,
            json_request("PUT", "/api/v1/invoices/does-not-exist", json!({ "fileName": "x.pdf" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["message"], "Invoice not found");
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (_, created) = send_json(
            &app,
            json_request("POST", "/api/v1/invoices", invoice_body("http://f/a.pdf", "Acme", "A-1")),
        )
        .await;
        let uri = format!("/api/v1/invoices/{}", created["_id"].as_str().unwrap());

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(uri.as_str())
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = send_json(&app, delete()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "message": "Invoice deleted successfully" }));

        let (status, _) = send_json(&app, delete()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_json(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
