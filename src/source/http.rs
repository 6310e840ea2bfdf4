//! HTTP observation source.
//!
//! Fetches the observation array from a `/heatmap-observations`-style
//! endpoint, passing the search options as query parameters.

use super::{parse_payload, SearchOptions};
use crate::error::SourceError;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Client for an observation endpoint.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout_seconds: u64,
    show_progress: bool,
}

impl HttpSource {
    /// Create a client for the given endpoint URL.
    pub fn new(url: &str, timeout_seconds: u64, show_progress: bool) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self::with_client(client, url, timeout_seconds, show_progress))
    }

    /// Wrap an already configured client.
    pub fn with_client(
        client: reqwest::Client,
        url: &str,
        timeout_seconds: u64,
        show_progress: bool,
    ) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            timeout_seconds,
            show_progress,
        }
    }

    /// Endpoint URL without query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the observation rows matching `options`.
    pub async fn fetch(&self, options: &SearchOptions) -> Result<Vec<Value>, SourceError> {
        let query = options.to_query();
        info!("Fetching observations from {}", self.url);
        debug!("Query parameters: {:?}", query);

        let spinner = self.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
            {
                pb.set_style(style);
            }
            pb.set_message("Fetching observations...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.request(&query).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        let rows = result?;
        info!("Fetched {} observation rows", rows.len());
        Ok(rows)
    }

    async fn request(&self, query: &[(&'static str, String)]) -> Result<Vec<Value>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    SourceError::Connect(self.url.clone())
                } else {
                    SourceError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_payload(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_source(url: &str) -> HttpSource {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpSource::with_client(client, url, 5, false)
    }

    /// Serve one canned HTTP response and return the request line.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{}/heatmap-observations", addr), handle)
    }

    #[tokio::test]
    async fn test_fetch_sends_query_and_parses_rows() {
        let body = r#"[{"subnational1_name":"Texas","total_count":3},{"subnational1_name":"Ohio","total_count":"4"}]"#;
        let (url, handle) = serve_once("200 OK", body).await;

        let source = local_source(&url);
        let options = SearchOptions {
            common_name: Some("hawk".to_string()),
            regions: vec!["texas".to_string(), "ohio".to_string()],
            ..SearchOptions::default()
        };
        let rows = source.fetch(&options).await.unwrap();
        assert_eq!(rows.len(), 2);

        let request_line = handle.await.unwrap();
        assert!(request_line.starts_with("GET /heatmap-observations?"));
        assert!(request_line.contains("common_name=hawk"));
        assert!(request_line.contains("subnational1_name=texas%2Cohio"));
    }

    #[tokio::test]
    async fn test_fetch_reports_status_errors() {
        let (url, handle) = serve_once("500 Internal Server Error", "oops").await;

        let source = local_source(&url);
        let err = source.fetch(&SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 500, ref body } if body == "oops"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_array() {
        let (url, handle) = serve_once("200 OK", r#"{"error":"bad"}"#).await;

        let source = local_source(&url);
        let err = source.fetch(&SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotArray));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = local_source(&format!("http://{}/obs/", addr));
        assert!(source.url().ends_with("/obs"));
        let err = source.fetch(&SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::Connect(_)));
    }
}
