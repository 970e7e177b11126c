//! GitHub Gist ledger store.
//!
//! The ledger is one file inside a gist. With a token, `fetch` GETs the gist
//! document and pulls `files.<file_name>.content` out of it. Without one it
//! reads `<raw host>/raw/<gist id>/<file name>` instead, since anonymous API
//! calls are capped at 60 per hour. `replace` PATCHes the whole file content
//! back and always needs a token. The Gist API has no conditional update, so
//! this store is strictly last-writer-wins and does not implement `replace_if`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use echonet_core::error::LedgerError;
use echonet_core::ledger::LedgerStore;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_RAW_URL: &str = "https://gist.githubusercontent.com";

pub struct GistLedgerStore {
    api_url: String,
    raw_url: String,
    gist_id: String,
    file_name: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl GistLedgerStore {
    /// Create a store for `file_name` inside gist `gist_id`.
    ///
    /// `token` is optional for readers of a public gist, who then read the raw
    /// content host. The notary needs one with gist scope.
    pub fn new(
        gist_id: impl Into<String>,
        file_name: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("echonet")
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: DEFAULT_API_URL.into(),
            raw_url: DEFAULT_RAW_URL.into(),
            gist_id: gist_id.into(),
            file_name: file_name.into(),
            token,
            timeout,
            client,
        })
    }

    /// Point at a different API host (GitHub Enterprise, test servers).
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Point tokenless reads at a different raw content host.
    pub fn with_raw_url(mut self, raw_url: &str) -> Self {
        self.raw_url = raw_url.trim_end_matches('/').to_string();
        self
    }

    fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.api_url, self.gist_id)
    }

    fn raw_file_url(&self) -> String {
        format!("{}/raw/{}/{}", self.raw_url, self.gist_id, self.file_name)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github.v3+json");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    fn transport_error(&self, action: &str, e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::Transport(format!(
                "{action} timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            LedgerError::Transport(format!("{action} failed: {e}"))
        }
    }

    async fn send(
        &self,
        action: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LedgerError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(action, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "{action} returned an error status");
            let hint = match status.as_u16() {
                401 | 403 => " (check the gist token and its scope)",
                404 => " (check the gist id)",
                _ => "",
            };
            return Err(LedgerError::Transport(format!(
                "{action} returned status {}{hint}",
                status.as_u16()
            )));
        }
        Ok(response)
    }

    /// Download a raw file body: the tokenless read path, or a file the gist
    /// document reported as truncated.
    async fn fetch_raw(&self, raw_url: &str) -> Result<String, LedgerError> {
        let response = self
            .send("Gist raw download", self.request(reqwest::Method::GET, raw_url))
            .await?;
        response
            .text()
            .await
            .map_err(|e| self.transport_error("Gist raw download", e))
    }
}

#[async_trait]
impl LedgerStore for GistLedgerStore {
    fn name(&self) -> &str {
        "gist"
    }

    async fn fetch(&self) -> Result<String, LedgerError> {
        if self.token.is_none() {
            debug!(gist = %self.gist_id, file = %self.file_name, "Fetching ledger from raw host");
            return self.fetch_raw(&self.raw_file_url()).await;
        }

        let url = self.gist_url();
        debug!(gist = %self.gist_id, file = %self.file_name, "Fetching ledger");

        let response = self
            .send("Gist fetch", self.request(reqwest::Method::GET, &url))
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error("Gist fetch", e))?;

        match extract_file_content(&body, &self.file_name)? {
            FileContent::Inline(content) => Ok(content),
            FileContent::Truncated { raw_url } => {
                debug!(raw_url = %raw_url, "Ledger file truncated in gist document, downloading raw");
                self.fetch_raw(&raw_url).await
            }
        }
    }

    async fn replace(&self, content: &str) -> Result<(), LedgerError> {
        if self.token.is_none() {
            return Err(LedgerError::Transport(
                "Gist update needs a token with gist scope (set ECHONET_GIST_TOKEN)".into(),
            ));
        }

        let url = self.gist_url();
        let mut files = serde_json::Map::new();
        files.insert(
            self.file_name.clone(),
            serde_json::json!({ "content": content }),
        );
        let body = serde_json::json!({ "files": files });

        debug!(gist = %self.gist_id, bytes = content.len(), "Replacing ledger");
        self.send(
            "Gist update",
            self.request(reqwest::Method::PATCH, &url).json(&body),
        )
        .await?;
        Ok(())
    }
}

// --- Gist API types (internal) ---

#[derive(Debug, Deserialize)]
struct GistDocument {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, PartialEq)]
enum FileContent {
    Inline(String),
    Truncated { raw_url: String },
}

fn extract_file_content(body: &str, file_name: &str) -> Result<FileContent, LedgerError> {
    let doc: GistDocument = serde_json::from_str(body)
        .map_err(|e| LedgerError::Format(format!("Gist response is not a gist document: {e}")))?;

    let file = doc.files.get(file_name).ok_or_else(|| {
        LedgerError::Format(format!("Gist does not contain a '{file_name}' file"))
    })?;

    if file.truncated {
        if let Some(raw_url) = &file.raw_url {
            return Ok(FileContent::Truncated {
                raw_url: raw_url.clone(),
            });
        }
    }

    file.content
        .clone()
        .map(FileContent::Inline)
        .ok_or_else(|| LedgerError::Format(format!("Gist file '{file_name}' has no content")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const FILE: &str = "knowledge_graph.metta";

    /// Answer one HTTP request with `body` and hand back the request head.
    async fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (url, handle)
    }

    #[test]
    fn extract_inline_content() {
        let body = r#"{
            "id": "abc123",
            "files": {
                "knowledge_graph.metta": {
                    "filename": "knowledge_graph.metta",
                    "truncated": false,
                    "raw_url": "https://gist.githubusercontent.com/raw/abc123/knowledge_graph.metta",
                    "content": "; EchoNet Shared Knowledge Graph\n"
                }
            }
        }"#;
        assert_eq!(
            extract_file_content(body, FILE).unwrap(),
            FileContent::Inline("; EchoNet Shared Knowledge Graph\n".into())
        );
    }

    #[test]
    fn extract_truncated_content_points_at_raw_url() {
        let body = r#"{"files": {"knowledge_graph.metta": {"truncated": true, "raw_url": "https://raw/kg", "content": "; partial"}}}"#;
        assert_eq!(
            extract_file_content(body, FILE).unwrap(),
            FileContent::Truncated {
                raw_url: "https://raw/kg".into()
            }
        );
    }

    #[test]
    fn missing_file_is_format_error() {
        let body = r#"{"files": {"notes.md": {"content": "hello"}}}"#;
        let err = extract_file_content(body, FILE).unwrap_err();
        assert!(matches!(err, LedgerError::Format(_)));
        assert!(err.to_string().contains(FILE));
    }

    #[test]
    fn missing_content_is_format_error() {
        let body = r#"{"files": {"knowledge_graph.metta": {"truncated": false}}}"#;
        assert!(matches!(
            extract_file_content(body, FILE),
            Err(LedgerError::Format(_))
        ));
    }

    #[test]
    fn non_json_body_is_format_error() {
        assert!(matches!(
            extract_file_content("<html>rate limited</html>", FILE),
            Err(LedgerError::Format(_))
        ));
    }

    #[test]
    fn api_url_is_normalized() {
        let store = GistLedgerStore::new("abc123", FILE, None, Duration::from_secs(10))
            .unwrap()
            .with_api_url("http://localhost:9999/")
            .with_raw_url("http://localhost:9998/");
        assert_eq!(store.gist_url(), "http://localhost:9999/gists/abc123");
        assert_eq!(
            store.raw_file_url(),
            "http://localhost:9998/raw/abc123/knowledge_graph.metta"
        );
        assert_eq!(store.name(), "gist");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let store = GistLedgerStore::new("abc123", FILE, Some("t".into()), Duration::from_secs(2))
            .unwrap()
            .with_api_url("http://127.0.0.1:1");
        assert!(matches!(store.fetch().await, Err(LedgerError::Transport(_))));
        assert!(matches!(store.replace("x").await, Err(LedgerError::Transport(_))));
    }

    #[tokio::test]
    async fn tokenless_fetch_reads_raw_host() {
        let (url, request) = serve_once("; EchoNet Shared Knowledge Graph\n").await;
        let store = GistLedgerStore::new("abc123", FILE, None, Duration::from_secs(5))
            .unwrap()
            .with_api_url("http://127.0.0.1:1")
            .with_raw_url(&url);

        assert_eq!(store.fetch().await.unwrap(), "; EchoNet Shared Knowledge Graph\n");
        let head = request.await.unwrap();
        assert!(head.starts_with("GET /raw/abc123/knowledge_graph.metta "));
        assert!(!head.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn token_fetch_reads_api_document() {
        let (url, request) = serve_once(
            r#"{"files": {"knowledge_graph.metta": {"content": "(location L1 \"x\" 1.0 2.0)\n"}}}"#,
        )
        .await;
        let store = GistLedgerStore::new("abc123", FILE, Some("ghp_t".into()), Duration::from_secs(5))
            .unwrap()
            .with_api_url(&url)
            .with_raw_url("http://127.0.0.1:1");

        assert_eq!(store.fetch().await.unwrap(), "(location L1 \"x\" 1.0 2.0)\n");
        let head = request.await.unwrap();
        assert!(head.starts_with("GET /gists/abc123 "));
        assert!(head.contains("Bearer ghp_t"));
    }

    #[tokio::test]
    async fn tokenless_replace_is_refused() {
        let store = GistLedgerStore::new("abc123", FILE, None, Duration::from_secs(2))
            .unwrap()
            .with_api_url("http://127.0.0.1:1");
        let err = store.replace("x").await.unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn gist_store_has_no_conditional_write() {
        use echonet_core::ledger::LedgerVersion;
        let store = GistLedgerStore::new("abc123", FILE, None, Duration::from_secs(2)).unwrap();
        let result = store.replace_if(&LedgerVersion::of(""), "x").await;
        assert!(matches!(result, Err(LedgerError::Unsupported(_))));
    }
}
