use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    BriefSummary, DashboardSummary, FeedbackReport, ImportOptions, ImportReceipt, IsAnalyzing,
    LastImports, SummaryQuery,
};

const LAST_IMPORTS_PATH: &str = "/api/reviews/last_imports";
const IMPORT_PATH: &str = "/api/reviews/import";
const IS_ANALYZING_PATH: &str = "/api/dashboard/is-analyzing";
const SUMMARY_PATH: &str = "/api/dashboard/summary";
const BRIEF_PATH: &str = "/api/recommendations/brief";
const FEEDBACK_REPORT_PATH: &str = "/api/recommendations/feedback-report";

const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("{url} returned '{content_type}' instead of JSON")]
    ContentType { url: String, content_type: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// --- Backend trait ---

/// Read side of the Review Insight backend, as used by page loads.
pub trait DashboardApi: Send + Sync + 'static {
    fn is_analyzing(&self) -> impl Future<Output = Result<bool, FetchError>> + Send;

    fn summary(
        &self,
        query: &SummaryQuery,
    ) -> impl Future<Output = Result<DashboardSummary, FetchError>> + Send;

    fn brief(&self) -> impl Future<Output = Result<BriefSummary, FetchError>> + Send;

    fn feedback_report(&self) -> impl Future<Output = Result<FeedbackReport, FetchError>> + Send;

    fn last_imports(&self) -> impl Future<Output = Result<LastImports, FetchError>> + Send;
}

// --- HTTP implementation ---

#[derive(Debug, Clone)]
pub struct HttpDashboardApi {
    base_url: String,
    client: Client,
}

impl HttpDashboardApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let start = Instant::now();
        debug!("Requesting {}", url);

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_json_content_type(&content_type) {
            return Err(FetchError::ContentType { url, content_type });
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;
        let value = serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            url: url.clone(),
            source,
        })?;

        info!(
            "Fetched {} - duration={:.2}s, bytes={}",
            url,
            start.elapsed().as_secs_f32(),
            bytes.len()
        );
        Ok(value)
    }

    /// Upload a review file for processing.
    pub async fn import_file(
        &self,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<ImportReceipt, FetchError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reviews.csv".to_string());
        let metadata = serde_json::json!({ "original_filename": file_name }).to_string();

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("source", options.source.clone())
            .text("delimiter", options.delimiter.clone())
            .text("encoding", options.encoding.clone())
            .text("metadata", metadata);

        let url = self.url(IMPORT_PATH);
        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .multipart(form);
        self.send_json(url, request).await
    }
}

impl DashboardApi for HttpDashboardApi {
    async fn is_analyzing(&self) -> Result<bool, FetchError> {
        let url = self.url(IS_ANALYZING_PATH);
        let status: IsAnalyzing = self.send_json(url.clone(), self.get(&url)).await?;
        Ok(status.is_analyzing)
    }

    async fn summary(&self, query: &SummaryQuery) -> Result<DashboardSummary, FetchError> {
        let url = self.url(SUMMARY_PATH);
        let request = self.get(&url).query(query);
        self.send_json(url, request).await
    }

    async fn brief(&self) -> Result<BriefSummary, FetchError> {
        let url = self.url(BRIEF_PATH);
        self.send_json(url.clone(), self.get(&url)).await
    }

    async fn feedback_report(&self) -> Result<FeedbackReport, FetchError> {
        let url = self.url(FEEDBACK_REPORT_PATH);
        self.send_json(url.clone(), self.get(&url)).await
    }

    async fn last_imports(&self) -> Result<LastImports, FetchError> {
        let url = self.url(LAST_IMPORTS_PATH);
        self.send_json(url.clone(), self.get(&url)).await
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= BODY_EXCERPT_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response and hand back the raw request text.
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (base_url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            let Some(head_end) = text.find("\r\n\r\n") else { continue };
            let head = text[..head_end].to_lowercase();
            let body_len = buf.len() - (head_end + 4);

            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());
            match content_length {
                Some(len) if body_len >= len => break,
                Some(_) => continue,
                None if head.contains("transfer-encoding: chunked") => {
                    if text.ends_with("0\r\n\r\n") {
                        break;
                    }
                }
                None => break,
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    #[tokio::test]
    async fn test_is_analyzing_sends_json_no_cache_request() {
        let (base_url, server) =
            serve_once("200 OK", "application/json", r#"{"is_analyzing": true}"#).await;
        let api = HttpDashboardApi::new(&base_url);

        assert!(api.is_analyzing().await.unwrap());

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/dashboard/is-analyzing http/1.1"));
        assert!(request.contains("accept: application/json"));
        assert!(request.contains("cache-control: no-cache"));
    }

    #[tokio::test]
    async fn test_summary_sends_date_range_and_product() {
        let (base_url, server) = serve_once(
            "200 OK",
            "application/json; charset=utf-8",
            r#"{"total_reviews": 12, "sentiment_distribution": {"positive": 12}}"#,
        )
        .await;
        let api = HttpDashboardApi::new(&format!("{}/", base_url));
        let query = SummaryQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            product_id: 3,
        };

        let summary = api.summary(&query).await.unwrap();
        assert_eq!(summary.total_reviews, 12);

        let request = server.await.unwrap();
        assert!(request.starts_with(
            "GET /api/dashboard/summary?start_date=2024-01-01&end_date=2024-01-31&product_id=3 "
        ));
    }

    #[tokio::test]
    async fn test_non_ok_status_is_a_failure() {
        let (base_url, _server) =
            serve_once("500 Internal Server Error", "application/json", r#"{"detail": "boom"}"#)
                .await;
        let api = HttpDashboardApi::new(&base_url);

        match api.brief().await {
            Err(FetchError::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_content_type_is_a_failure() {
        let (base_url, _server) = serve_once("200 OK", "text/html", "<html></html>").await;
        let api = HttpDashboardApi::new(&base_url);

        let err = api.feedback_report().await.unwrap_err();
        assert!(matches!(err, FetchError::ContentType { ref content_type, .. } if content_type == "text/html"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_decode_failure() {
        let (base_url, _server) = serve_once("200 OK", "application/json", "{not json").await;
        let api = HttpDashboardApi::new(&base_url);

        let err = api.last_imports().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_missing_fields_are_tolerated() {
        let (base_url, _server) = serve_once("200 OK", "application/json", "{}").await;
        let api = HttpDashboardApi::new(&base_url);

        let report = api.feedback_report().await.unwrap();
        assert!(report.feedback_analysis.is_empty());
        assert!(report.overall_proposals.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let api = HttpDashboardApi::new(&base_url);
        let err = api.is_analyzing().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_import_posts_multipart_fields() {
        let (base_url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"status": "success", "imported_count": 5, "batch_id": "stub-batch-001"}"#,
        )
        .await;
        let api = HttpDashboardApi::new(&base_url);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "text\nGreat product").unwrap();
        drop(file);

        let receipt = api.import_file(&path, &ImportOptions::default()).await.unwrap();
        assert_eq!(receipt.imported_count, Some(5));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/reviews/import "));
        assert!(request.contains("name=\"file\"; filename=\"reviews.csv\""));
        assert!(request.contains("name=\"source\"\r\n\r\ncsv"));
        assert!(request.contains("name=\"delimiter\"\r\n\r\n,"));
        assert!(request.contains("name=\"encoding\"\r\n\r\nutf-8"));
        assert!(request.contains(r#"{"original_filename":"reviews.csv"}"#));
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let api = HttpDashboardApi::new("http://127.0.0.1:9");
        let err = api
            .import_file(Path::new("/definitely/not/here.csv"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::File { .. }));
    }

    #[test]
    fn test_json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), BODY_EXCERPT_LEN + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }
}
