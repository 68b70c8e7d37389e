//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{
    ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy,
};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{CreatedFile, DriveFile, FilesListResponse, UploadMetadata};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload endpoint base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;


/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,parents,trashed";

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Google Drive API connector
///
/// Implements `StorageProvider` for Google Drive API v3 on behalf of one
/// authenticated user.
///
/// # Features
///
/// - Paginated child listing, folders first then by name
/// - Resumable uploads
/// - Streamed downloads via `alt=media`
/// - Exponential backoff on 429/5xx for metadata reads
///
/// Uploads, downloads and deletes are attempted once.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, access_token);
/// let (children, next_page) = connector.list_children("root", 50, None).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,

    /// Backoff for listing and metadata reads
    read_retry: RetryPolicy,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            read_retry: RetryPolicy::default(),
        }
    }

    /// Replace the backoff used for reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    fn request(&self, method: HttpMethod, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(method, url).bearer_token(&self.access_token)
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Convert DriveFile to RemoteFile
    fn convert_file(drive_file: DriveFile) -> RemoteFile {
        let is_folder = drive_file.is_folder();
        RemoteFile {
            id: drive_file.id,
            name: drive_file.name,
            mime_type: drive_file.mime_type,
            size: drive_file.size.and_then(|s| s.parse().ok()),
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            is_folder,
            parent_ids: drive_file.parents,
            trashed: drive_file.trashed,
        }
    }

    /// Drive query selecting the live children of a folder.
    fn children_query(parent_id: &str) -> String {
        let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{}' in parents and trashed = false", escaped)
    }

    /// Execute an idempotent GET, retrying rate limiting (429), server
    /// errors (5xx) and transport failures according to `self.read_retry`.
    #[instrument(skip(self, request, file_id), fields(url = %request.url))]
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        file_id: Option<&str>,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error: BridgeError = match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, attempt, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) if RetryPolicy::is_retryable_status(response.status) => {
                    if response.status == 429 {
                        GoogleDriveError::RateLimitExceeded { attempts: attempt }.into()
                    } else {
                        GoogleDriveError::from_status(response.status, &response.body, file_id)
                            .into()
                    }
                }
                Ok(response) => {
                    warn!(status = response.status, "API request failed");
                    return Err(
                        GoogleDriveError::from_status(response.status, &response.body, file_id)
                            .into(),
                    );
                }
                Err(e) => e,
            };

            let Some(delay) = self.read_retry.delay_after(attempt) else {
                warn!(attempts = attempt, error = %error, "API request gave up");
                return Err(error);
            };
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "API request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Execute a non-idempotent request exactly once.
    async fn execute_once(
        &self,
        request: HttpRequest,
        file_id: Option<&str>,
    ) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            warn!("API request failed: status={}", response.status);
            Err(GoogleDriveError::from_status(response.status, &response.body, file_id).into())
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    #[instrument(skip(self), fields(parent_id = %parent_id))]
    async fn list_children(
        &self,
        parent_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let mut url = format!(
            "{}/files?q={}&pageSize={}&orderBy={}&fields=nextPageToken,files({})",
            DRIVE_API_BASE,
            urlencoding::encode(&Self::children_query(parent_id)),
            page_size.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode("folder,name"),
            FILE_FIELDS
        );

        if let Some(page_token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&page_token)));
        }

        let request = self
            .request(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .timeout(METADATA_TIMEOUT);
        let response = self.execute_with_retry(request, Some(parent_id)).await?;

        let list_response: FilesListResponse = Self::parse(&response, "files list response")?;

        let files: Vec<RemoteFile> = list_response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect();

        debug!("Listed {} children", files.len());

        Ok((files, list_response.next_page_token))
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            FILE_FIELDS
        );

        let request = self
            .request(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .timeout(METADATA_TIMEOUT);
        let response = self.execute_with_retry(request, Some(file_id)).await?;

        let drive_file: DriveFile = Self::parse(&response, "file metadata")?;

        Ok(Self::convert_file(drive_file))
    }

    #[instrument(skip(self, content), fields(parent_id = %parent_id, bytes = content.len()))]
    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
        content: Bytes,
    ) -> Result<String> {
        let metadata = UploadMetadata {
            name,
            parents: vec![parent_id],
            mime_type,
        };
        let content_type = mime_type.unwrap_or("application/octet-stream");

        // Open the resumable session.
        let url = format!(
            "{}/files?uploadType=resumable&fields=id",
            DRIVE_UPLOAD_BASE
        );
        let request = self
            .request(HttpMethod::Post, url)
            .json(&metadata)?
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", content.len().to_string())
            .timeout(METADATA_TIMEOUT);
        let response = self.execute_once(request, Some(parent_id)).await?;

        let session_url = response
            .header("Location")
            .map(str::to_string)
            .ok_or_else(|| {
                GoogleDriveError::UploadFailed("upload session has no location".to_string())
            })?;

        let size = content.len();
        let request = self
            .request(HttpMethod::Put, session_url)
            .header("Content-Type", content_type)
            .body(content)
            .timeout(TRANSFER_TIMEOUT);
        let response = self.execute_once(request, None).await?;

        let created: CreatedFile = Self::parse(&response, "upload response")?;

        info!(file_id = %created.id, bytes = size, "Upload completed");
        Ok(created.id)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn download(&self, file_id: &str) -> Result<ByteStream> {
        let url = format!(
            "{}/files/{}?alt=media",
            DRIVE_API_BASE,
            urlencoding::encode(file_id)
        );

        let request = self
            .request(HttpMethod::Get, url)
            .timeout(TRANSFER_TIMEOUT);
        let response = self.http_client.execute_stream(request).await?;
        if !response.is_success() {
            let response = response.collect().await?;
            warn!("Download refused: status={}", response.status);
            return Err(
                GoogleDriveError::from_status(response.status, &response.body, Some(file_id))
                    .into(),
            );
        }

        info!("Download started");
        Ok(response.body)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn delete(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, urlencoding::encode(file_id));

        let request = self
            .request(HttpMethod::Delete, url)
            .timeout(METADATA_TIMEOUT);
        self.execute_once(request, Some(file_id)).await?;

        info!("Deleted entity");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &'static [u8]) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(body),
        }
    }

    fn connector(mock_http: MockHttpClient) -> GoogleDriveConnector {
        GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string())
    }

    #[test]
    fn test_convert_file() {
        let drive_file = DriveFile {
            id: "file123".to_string(),
            name: "report.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size: Some("1024".to_string()),
            modified_time: Some("2023-01-02T00:00:00.000Z".to_string()),
            parents: vec!["folder1".to_string()],
            trashed: false,
        };

        let remote_file = GoogleDriveConnector::convert_file(drive_file);

        assert_eq!(remote_file.id, "file123");
        assert_eq!(remote_file.size, Some(1024));
        assert_eq!(remote_file.modified_at, Some(1_672_617_600));
        assert_eq!(remote_file.parent_ids, vec!["folder1".to_string()]);
        assert!(!remote_file.is_folder);
    }

    #[test]
    fn test_convert_folder() {
        let drive_folder = DriveFile {
            id: "folder123".to_string(),
            name: "Projects".to_string(),
            mime_type: Some("application/vnd.google-apps.folder".to_string()),
            size: None,
            modified_time: None,
            parents: vec![],
            trashed: false,
        };

        let remote_file = GoogleDriveConnector::convert_file(drive_folder);

        assert!(remote_file.is_folder);
        assert_eq!(remote_file.size, None);
        assert_eq!(remote_file.modified_at, None);
    }

    #[test]
    fn test_children_query_escapes_quotes() {
        assert_eq!(
            GoogleDriveConnector::children_query("root"),
            "'root' in parents and trashed = false"
        );
        assert_eq!(
            GoogleDriveConnector::children_query("a'b"),
            "'a\\'b' in parents and trashed = false"
        );
    }

    #[tokio::test]
    async fn test_list_children_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Get);
            assert!(req.url.contains("orderBy=folder%2Cname"));
            assert!(req.url.contains("pageSize=50"));
            assert_eq!(
                req.headers.get("Authorization"),
                Some(&"Bearer test_token".to_string())
            );
            Ok(response(
                200,
                br#"{
                    "files": [
                        {"id": "d1", "name": "Docs", "mimeType": "application/vnd.google-apps.folder"},
                        {"id": "f1", "name": "notes.txt", "mimeType": "text/plain", "size": "12",
                         "modifiedTime": "2024-01-01T00:00:00.000Z", "parents": ["root"]}
                    ],
                    "nextPageToken": "next_page"
                }"#,
            ))
        });

        let (files, cursor) = connector(mock_http)
            .list_children("root", 50, None)
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].is_folder);
        assert_eq!(files[1].name, "notes.txt");
        assert_eq!(cursor, Some("next_page".to_string()));
    }

    #[tokio::test]
    async fn test_list_children_passes_page_token() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .withf(|req| req.url.contains("pageToken=abc"))
            .times(1)
            .returning(|_| Ok(response(200, br#"{"files": []}"#)));

        let (files, cursor) = connector(mock_http)
            .list_children("root", 50, Some("abc".to_string()))
            .await
            .unwrap();

        assert!(files.is_empty());
        assert_eq!(cursor, None);
    }

    #[tokio::test]
    async fn test_get_metadata_retries_server_errors() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, b"backend error")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, br#"{"id": "file1", "name": "a.txt"}"#)));

        let file = connector(mock_http).get_metadata("file1").await.unwrap();

        assert_eq!(file.name, "a.txt");
    }

    #[tokio::test]
    async fn test_get_metadata_not_found() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, b"File not found")));

        let result = connector(mock_http).get_metadata("missing").await;

        assert!(matches!(result, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_file_resumable() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert_eq!(req.method, HttpMethod::Post);
                assert!(req.url.contains("uploadType=resumable"));
                let metadata: serde_json::Value =
                    serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
                assert_eq!(metadata["name"], "test.txt");
                assert_eq!(metadata["parents"][0], "root");

                let mut headers = HashMap::new();
                headers.insert(
                    "location".to_string(),
                    "https://www.googleapis.com/upload/drive/v3/files?upload_id=xyz".to_string(),
                );
                Ok(HttpResponse {
                    status: 200,
                    headers,
                    body: Bytes::new(),
                })
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert_eq!(req.method, HttpMethod::Put);
                assert!(req.url.ends_with("upload_id=xyz"));
                assert_eq!(req.body.as_deref(), Some(&b"hello"[..]));
                Ok(response(200, br#"{"id": "new-file"}"#))
            });

        let id = connector(mock_http)
            .create_file("root", "test.txt", Some("text/plain"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(id, "new-file");
    }

    #[tokio::test]
    async fn test_create_file_without_location_fails() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, b"")));

        let result = connector(mock_http)
            .create_file("root", "test.txt", None, Bytes::from_static(b"x"))
            .await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_download_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.headers.contains_key("Authorization"));
            assert!(req.url.contains("alt=media"));
            Ok(response(200, &[1, 2, 3, 4, 5]))
        });

        let stream = match connector(mock_http).download("file1").await {
            Ok(stream) => stream,
            Err(e) => panic!("download failed: {}", e),
        };
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();

        assert_eq!(chunks.concat(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_download_is_not_retried() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(500, b"boom")));

        let result = connector(mock_http).download("file1").await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, br#"{"error":{"message":"File not found: gone"}}"#)));

        let result = connector(mock_http).download("gone").await;

        assert!(matches!(result, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_success_and_not_found() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert_eq!(req.method, HttpMethod::Delete);
                Ok(response(204, b""))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(404, b"")));

        let connector = connector(mock_http);

        connector.delete("file1").await.unwrap();
        assert!(matches!(
            connector.delete("file1").await,
            Err(BridgeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_policy_attempts() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(2)
            .returning(|_| Ok(response(429, b"rate limited")));

        let result = connector(mock_http)
            .with_read_retry(RetryPolicy::new(2, Duration::ZERO))
            .list_children("root", 50, None)
            .await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(403, b"forbidden")));

        let result = connector(mock_http).get_metadata("file1").await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }
}
