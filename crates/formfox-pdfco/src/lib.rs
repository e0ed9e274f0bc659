//! pdf.co document service client.
//!
//! Covers the four capabilities the core needs: file upload (presigned-URL
//! flow), plain-text extraction, native form-field query, and form fill.
//! Every endpoint is called with `async: false` so the reply carries the
//! result directly. pdf.co reports failures inside a 200 response via an
//! `error` flag; those messages are surfaced verbatim.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use formfox_core::backend::{
    BoxFuture, DocumentBackend, DocumentError, FieldValue, NativeField,
};
use formfox_core::session::SourceRef;

pub const DEFAULT_BASE_URL: &str = "https://api.pdf.co/v1";

pub struct PdfCo {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PdfCo {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_endpoint(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<serde_json::Value, DocumentError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(DocumentError::NotFound);
        }
        if !status.is_success() {
            tracing::warn!(%status, endpoint, "pdf.co request rejected");
            return Err(DocumentError::Remote(format!("HTTP {status}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DocumentError::Remote(e.to_string()))?;
        check_envelope(data)
    }

    /// One-shot presigned upload: fetch a presigned PUT URL, then PUT the
    /// bytes. Returns the hosted file's URL.
    async fn upload_file(&self, path: &Path, timeout: Duration) -> Result<String, DocumentError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.pdf");
        let url = format!(
            "{}/file/upload/get-presigned-url?name={}&contenttype=application/pdf",
            self.base_url,
            urlencoding::encode(filename)
        );

        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            return Err(DocumentError::Upload(format!("HTTP {}", resp.status())));
        }
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DocumentError::Upload(e.to_string()))?;
        let data = check_envelope(data).map_err(|e| DocumentError::Upload(e.to_string()))?;

        let presigned = data["presignedUrl"]
            .as_str()
            .ok_or_else(|| DocumentError::Upload("no presigned URL in reply".to_string()))?;
        let hosted = data["url"]
            .as_str()
            .ok_or_else(|| DocumentError::Upload("no hosted URL in reply".to_string()))?
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| DocumentError::NotFound)?;

        let put = self
            .client
            .put(presigned)
            .header("Content-Type", "application/pdf")
            .timeout(timeout)
            .body(bytes)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !put.status().is_success() {
            return Err(DocumentError::Upload(format!("HTTP {}", put.status())));
        }

        tracing::info!(file = %filename, "uploaded document to pdf.co");
        Ok(hosted)
    }

    /// Resolve a source to a hosted URL, uploading local files first.
    async fn hosted_url(
        &self,
        source: &SourceRef,
        timeout: Duration,
    ) -> Result<String, DocumentError> {
        match source {
            SourceRef::Remote(url) => Ok(url.clone()),
            SourceRef::Local(path) => self.upload_file(path, timeout).await,
        }
    }
}

/// Map reqwest transport errors onto the document error taxonomy.
fn map_reqwest_err(e: reqwest::Error) -> DocumentError {
    if e.is_timeout() {
        DocumentError::Timeout
    } else {
        DocumentError::Remote(e.to_string())
    }
}

/// pdf.co wraps failures in a 200 reply with `error: true` and a message.
fn check_envelope(data: serde_json::Value) -> Result<serde_json::Value, DocumentError> {
    if data["error"].as_bool().unwrap_or(false) {
        let message = data["message"]
            .as_str()
            .unwrap_or("unknown pdf.co error")
            .to_string();
        return Err(DocumentError::Remote(message));
    }
    Ok(data)
}

/// Parse the `/pdf/info/fields` reply into the core's native-field shape.
/// Fields live under `info.FieldsInfo.Fields`, in document order.
fn parse_fields_info(data: &serde_json::Value) -> Vec<NativeField> {
    data["info"]["FieldsInfo"]["Fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .map(|f| NativeField {
                    name: f["FieldName"].as_str().unwrap_or_default().to_string(),
                    declared_type: f["Type"].as_str().unwrap_or_default().to_string(),
                    page: f["PageIndex"].as_u64().map(|p| p as u32),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Serialize)]
struct FillField<'a> {
    #[serde(rename = "fieldName")]
    field_name: &'a str,
    value: &'a str,
}

impl DocumentBackend for PdfCo {
    fn name(&self) -> &str {
        "pdf.co"
    }

    fn extract_text<'a>(
        &'a self,
        source: &'a SourceRef,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        Box::pin(async move {
            let url = self.hosted_url(source, timeout).await?;
            let body = serde_json::json!({ "url": url, "inline": true, "async": false });
            let data = self.post_json("/pdf/convert/to/text", &body, timeout).await?;
            let text = data["body"].as_str().unwrap_or_default().to_string();
            if text.trim().is_empty() {
                // Scanned or image-only document.
                return Err(DocumentError::Unreadable);
            }
            Ok(text)
        })
    }

    fn native_fields<'a>(
        &'a self,
        source: &'a SourceRef,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<NativeField>, DocumentError>> {
        Box::pin(async move {
            let url = self.hosted_url(source, timeout).await?;
            let body = serde_json::json!({ "url": url, "async": false });
            let data = self.post_json("/pdf/info/fields", &body, timeout).await?;
            Ok(parse_fields_info(&data))
        })
    }

    fn upload<'a>(
        &'a self,
        path: &'a Path,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        Box::pin(self.upload_file(path, timeout))
    }

    fn fill<'a>(
        &'a self,
        url: &'a str,
        values: &'a [FieldValue],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        Box::pin(async move {
            let fields: Vec<FillField<'_>> = values
                .iter()
                .map(|fv| FillField {
                    field_name: &fv.name,
                    value: &fv.value,
                })
                .collect();
            let body = serde_json::json!({ "url": url, "fields": fields, "async": false });
            let data = self.post_json("/pdf/edit/fill", &body, timeout).await?;
            data["url"]
                .as_str()
                .map(String::from)
                .ok_or_else(|| DocumentError::Remote("no result URL in fill reply".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_info_parses_documented_shape() {
        let data = serde_json::json!({
            "info": { "FieldsInfo": { "Fields": [
                { "FieldName": "Vorname", "Type": "EditBox", "PageIndex": 1 },
                { "FieldName": "Zustimmung", "Type": "CheckBox", "PageIndex": 2 }
            ]}}
        });
        let fields = parse_fields_info(&data);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "Vorname");
        assert_eq!(fields[0].declared_type, "EditBox");
        assert_eq!(fields[1].page, Some(2));
    }

    #[test]
    fn fields_info_missing_section_is_empty() {
        let data = serde_json::json!({ "info": {} });
        assert!(parse_fields_info(&data).is_empty());
    }

    #[test]
    fn envelope_error_surfaces_message_verbatim() {
        let data = serde_json::json!({ "error": true, "message": "Invalid API key" });
        let err = check_envelope(data).unwrap_err();
        assert_eq!(err.to_string(), "Invalid API key");
    }

    #[test]
    fn envelope_success_passes_through() {
        let data = serde_json::json!({ "error": false, "url": "https://x" });
        assert!(check_envelope(data).is_ok());
    }

    #[test]
    fn fill_fields_serialize_with_pdfco_casing() {
        let f = FillField { field_name: "Vorname", value: "Max" };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["fieldName"], "Vorname");
        assert_eq!(json["value"], "Max");
    }

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_document_error() {
        let c = PdfCo::with_endpoint("http://192.0.2.1:9/v1", "key");
        let source = SourceRef::Remote("https://files.example/a.pdf".into());
        let err = c
            .native_fields(&source, Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Timeout | DocumentError::Remote(_)
        ));
    }
}
