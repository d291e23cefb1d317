use std::ops::Range;

use async_trait::async_trait;
use intake_core::constants::UPLOAD_CHUNK_BYTES as CHUNK_SIZE;
use intake_core::{
    BackendConfig, DatabaseApi, EmailAddress, IdentificationDocument, IdentityApi, NonEmptyText,
    PhoneNumber, Query, RemoteError, RemoteResult, StorageApi, StoredFile, UniqueId, User,
    UserList,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::AppwriteError;

const PROJECT_HEADER: &str = "X-Appwrite-Project";
const KEY_HEADER: &str = "X-Appwrite-Key";
const UPLOAD_ID_HEADER: &str = "X-Appwrite-ID";

pub struct AppwriteClient {
    base_url: Url,
    http: reqwest::Client,
}

impl AppwriteClient {
    /// Build a client for the configured endpoint and project, authenticated with a server
    /// API key. Every request is bounded by the configured request timeout.
    pub fn new(cfg: &BackendConfig, api_key: &str) -> Result<Self, AppwriteError> {
        if cfg.endpoint().cannot_be_a_base() {
            return Err(AppwriteError::InvalidEndpoint(cfg.endpoint().to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            PROJECT_HEADER,
            HeaderValue::from_str(cfg.project_id()).map_err(|_| AppwriteError::InvalidProjectId)?,
        );

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppwriteError::InvalidApiKey);
        }
        let mut key = HeaderValue::from_str(api_key).map_err(|_| AppwriteError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            base_url: cfg.endpoint().clone(),
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        endpoint_url(&self.base_url, segments)
    }

    async fn upload_chunk(
        &self,
        url: &Url,
        file_id: &str,
        document: &IdentificationDocument,
        range: Range<usize>,
        upload_id: Option<&str>,
    ) -> RemoteResult<StoredFile> {
        let total = document.len();
        let part = Part::bytes(document.content()[range.clone()].to_vec())
            .file_name(document.file_name().to_string())
            .mime_str(document.media_type())
            .map_err(transport)?;
        let form = Form::new()
            .text("fileId", file_id.to_string())
            .part("file", part);

        let mut req = self.http.post(url.clone()).multipart(form);
        if total > CHUNK_SIZE {
            req = req.header(reqwest::header::CONTENT_RANGE, content_range(&range, total));
        }
        if let Some(upload_id) = upload_id {
            req = req.header(UPLOAD_ID_HEADER, upload_id);
        }

        let response = req.send().await.map_err(transport)?;
        read_json(response).await
    }
}

#[async_trait]
impl IdentityApi for AppwriteClient {
    async fn create(
        &self,
        id: &UniqueId,
        email: &EmailAddress,
        phone: &PhoneNumber,
        name: &NonEmptyText,
    ) -> RemoteResult<User> {
        let url = self.url(&["users"])?;
        debug!(user_id = %id, url = %url, "creating user");

        let body = CreateUserBody {
            user_id: id.as_str(),
            email: email.as_str(),
            phone: phone.as_str(),
            name: name.as_str(),
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        read_json(response).await
    }

    async fn list(&self, queries: &[Query]) -> RemoteResult<UserList> {
        let mut url = self.url(&["users"])?;
        {
            let mut pairs = url.query_pairs_mut();
            for query in queries {
                pairs.append_pair("queries[]", &query_param(query));
            }
        }
        debug!(queries = queries.len(), "listing users");

        let response = self.http.get(url).send().await.map_err(transport)?;
        let users: UserList = read_json(response).await?;
        debug!(total = users.total, "listed users");
        Ok(users)
    }

    async fn get(&self, user_id: &str) -> RemoteResult<User> {
        let url = self.url(&["users", user_id])?;
        debug!(user_id, "fetching user");

        let response = self.http.get(url).send().await.map_err(transport)?;
        read_json(response).await
    }
}

#[async_trait]
impl StorageApi for AppwriteClient {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &UniqueId,
        document: &IdentificationDocument,
    ) -> RemoteResult<StoredFile> {
        let url = self.url(&["storage", "buckets", bucket_id, "files"])?;
        let ranges = chunk_ranges(document.len(), CHUNK_SIZE);
        debug!(
            file_id = %file_id,
            bytes = document.len(),
            chunks = ranges.len(),
            "uploading file"
        );

        let mut stored: Option<StoredFile> = None;
        for range in ranges {
            let upload_id = stored.as_ref().map(|f| f.id.clone());
            let file = self
                .upload_chunk(&url, file_id.as_str(), document, range, upload_id.as_deref())
                .await?;
            stored = Some(file);
        }

        stored.ok_or_else(|| RemoteError::Decode("upload produced no response".into()))
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> RemoteResult<()> {
        let url = self.url(&["storage", "buckets", bucket_id, "files", file_id])?;

        let response = self.http.delete(url).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            info!(file_id, "deleted file");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(error_from_response(status, &body))
        }
    }
}

#[async_trait]
impl DatabaseApi for AppwriteClient {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &UniqueId,
        data: Value,
    ) -> RemoteResult<Value> {
        let url = self.url(&[
            "databases",
            database_id,
            "collections",
            collection_id,
            "documents",
        ])?;
        debug!(document_id = %document_id, collection_id, "creating document");

        let body = CreateDocumentBody {
            document_id: document_id.as_str(),
            data: &data,
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        read_json(response).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody<'a> {
    user_id: &'a str,
    email: &'a str,
    phone: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentBody<'a> {
    document_id: &'a str,
    data: &'a Value,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn endpoint_url(base: &Url, segments: &[&str]) -> RemoteResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::Transport(format!("endpoint {base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// JSON query syntax understood by the list endpoints.
fn query_param(query: &Query) -> String {
    match query {
        Query::Equal { attribute, values } => serde_json::json!({
            "method": "equal",
            "attribute": attribute,
            "values": values,
        })
        .to_string(),
    }
}

fn chunk_ranges(total: usize, chunk: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(chunk.max(1))
        .map(|start| start..(start + chunk).min(total))
        .collect()
}

fn content_range(range: &Range<usize>, total: usize) -> String {
    format!("bytes {}-{}/{}", range.start, range.end.saturating_sub(1), total)
}

fn transport(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Transport(format!("request timed out: {e}"))
    } else {
        RemoteError::Transport(e.to_string())
    }
}

fn error_from_response(status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::CONFLICT => RemoteError::Conflict(message),
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        status => RemoteError::Service {
            code: status.as_u16(),
            message,
        },
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg(endpoint: &str) -> BackendConfig {
        BackendConfig::new(endpoint, "proj", "db", "patients", "bucket", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn builds_urls_under_endpoint() {
        let client = AppwriteClient::new(&cfg("https://cloud.appwrite.io/v1"), "key").unwrap();
        assert_eq!(
            client.url(&["users", "abc"]).unwrap().as_str(),
            "https://cloud.appwrite.io/v1/users/abc"
        );

        let client = AppwriteClient::new(&cfg("https://cloud.appwrite.io/v1/"), "key").unwrap();
        assert_eq!(
            client
                .url(&["storage", "buckets", "bucket", "files"])
                .unwrap()
                .as_str(),
            "https://cloud.appwrite.io/v1/storage/buckets/bucket/files"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let base = Url::parse("https://cloud.appwrite.io/v1").unwrap();
        let url = endpoint_url(&base, &["users", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://cloud.appwrite.io/v1/users/a%2Fb");
    }

    #[test]
    fn rejects_empty_api_key() {
        let err = AppwriteClient::new(&cfg("https://cloud.appwrite.io/v1"), "  ")
            .err()
            .unwrap();
        assert!(matches!(err, AppwriteError::InvalidApiKey));
    }

    #[test]
    fn equal_query_is_json() {
        let query = Query::equal("email", ["john@x.com".to_string()]);
        let parsed: Value = serde_json::from_str(&query_param(&query)).unwrap();

        assert_eq!(
            parsed,
            serde_json::json!({
                "method": "equal",
                "attribute": "email",
                "values": ["john@x.com"],
            })
        );
    }

    #[test]
    fn status_codes_map_to_remote_errors() {
        let body = r#"{"message":"A user with the same id, email, or phone already exists in this project.","code":409,"type":"user_already_exists"}"#;
        match error_from_response(StatusCode::CONFLICT, body) {
            RemoteError::Conflict(message) => assert!(message.starts_with("A user with")),
            other => panic!("expected Conflict, got {other:?}"),
        }

        assert!(error_from_response(StatusCode::NOT_FOUND, "").is_not_found());

        assert_eq!(
            error_from_response(StatusCode::BAD_GATEWAY, "upstream down\n"),
            RemoteError::Service {
                code: 502,
                message: "upstream down".into()
            }
        );
    }

    #[test]
    fn large_uploads_are_chunked() {
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(4, 4), vec![0..4]);
        assert_eq!(content_range(&(4..8), 10), "bytes 4-7/10");

        let ranges = chunk_ranges(CHUNK_SIZE * 2 + 1, CHUNK_SIZE);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2], CHUNK_SIZE * 2..CHUNK_SIZE * 2 + 1);
    }

    #[test]
    fn request_bodies_use_remote_field_names() {
        let body = CreateUserBody {
            user_id: "u1",
            email: "john@x.com",
            phone: "+254712345678",
            name: "John Doe",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["userId"], "u1");
        assert!(json.get("password").is_none());

        let data = serde_json::json!({ "name": "John Doe" });
        let body = CreateDocumentBody {
            document_id: "d1",
            data: &data,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["documentId"], "d1");
        assert_eq!(json["data"]["name"], "John Doe");
    }

    mod wire {
        use super::cfg;
        use super::super::*;
        use serde_json::json;
        use wiremock::matchers::{body_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

        fn client(server: &MockServer) -> AppwriteClient {
            AppwriteClient::new(&cfg(&format!("{}/v1", server.uri())), "secret-key").unwrap()
        }

        fn john() -> (EmailAddress, PhoneNumber, NonEmptyText) {
            (
                EmailAddress::parse("john@x.com").unwrap(),
                PhoneNumber::parse("+254712345678").unwrap(),
                NonEmptyText::new("John Doe").unwrap(),
            )
        }

        fn user_json(id: &str) -> Value {
            json!({
                "$id": id,
                "name": "John Doe",
                "email": "john@x.com",
                "phone": "+254712345678",
                "status": true
            })
        }

        #[tokio::test]
        async fn create_user_sends_credentials_and_body() {
            let server = MockServer::start().await;
            let id = UniqueId::new();
            Mock::given(method("POST"))
                .and(path("/v1/users"))
                .and(header("X-Appwrite-Project", "proj"))
                .and(header("X-Appwrite-Key", "secret-key"))
                .and(body_json(json!({
                    "userId": id.as_str(),
                    "email": "john@x.com",
                    "phone": "+254712345678",
                    "name": "John Doe"
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(user_json(id.as_str())))
                .expect(1)
                .mount(&server)
                .await;

            let (email, phone, name) = john();
            let user = client(&server)
                .create(&id, &email, &phone, &name)
                .await
                .unwrap();

            assert_eq!(user.id, id.as_str());
            assert_eq!(user.email, "john@x.com");
        }

        #[tokio::test]
        async fn duplicate_user_is_conflict() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/users"))
                .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                    "message": "A user with the same id, email, or phone already exists in this project.",
                    "code": 409,
                    "type": "user_already_exists"
                })))
                .mount(&server)
                .await;

            let (email, phone, name) = john();
            let err = client(&server)
                .create(&UniqueId::new(), &email, &phone, &name)
                .await
                .unwrap_err();

            assert!(err.is_conflict(), "{err:?}");
        }

        #[tokio::test]
        async fn list_sends_queries_as_json() {
            let server = MockServer::start().await;
            let query = Query::equal("email", ["john@x.com".to_string()]);
            Mock::given(method("GET"))
                .and(path("/v1/users"))
                .and(query_param("queries[]", query_param_value(&query)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "total": 1,
                    "users": [user_json("u1")]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let users = client(&server).list(&[query]).await.unwrap();

            assert_eq!(users.total, 1);
            assert_eq!(users.users[0].id, "u1");
        }

        fn query_param_value(query: &Query) -> String {
            super::super::query_param(query)
        }

        #[tokio::test]
        async fn get_user_maps_404_to_not_found() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/users/u1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/v1/users/nobody"))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "message": "User with the requested ID could not be found.",
                    "code": 404,
                    "type": "user_not_found"
                })))
                .mount(&server)
                .await;

            let client = client(&server);
            assert_eq!(client.get("u1").await.unwrap().name, "John Doe");

            match client.get("nobody").await.unwrap_err() {
                RemoteError::NotFound(message) => assert!(message.starts_with("User with")),
                other => panic!("expected NotFound, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn small_upload_is_one_multipart_request() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/storage/buckets/bucket/files"))
                .and(header("X-Appwrite-Project", "proj"))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "$id": "file-1",
                    "bucketId": "bucket",
                    "name": "id.png"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let document = IdentificationDocument::new("id.png", PNG.to_vec()).unwrap();
            let file_id = UniqueId::new();
            let stored = client(&server)
                .create_file("bucket", &file_id, &document)
                .await
                .unwrap();
            assert_eq!(stored.id, "file-1");

            let requests = server.received_requests().await.unwrap();
            let request = &requests[0];
            assert!(request.headers.get("content-range").is_none());
            assert!(request.headers.get("x-appwrite-id").is_none());

            let body = String::from_utf8_lossy(&request.body);
            assert!(body.contains("name=\"fileId\""), "{body}");
            assert!(body.contains(file_id.as_str()));
            assert!(body.contains("name=\"file\"; filename=\"id.png\""));
            assert!(body.contains("image/png"));
        }

        #[tokio::test]
        async fn large_upload_sends_ranged_chunks() {
            let server = MockServer::start().await;
            let mut content = PNG.to_vec();
            content.resize(CHUNK_SIZE + 10, 0);
            let total = content.len();

            Mock::given(method("POST"))
                .and(path("/v1/storage/buckets/bucket/files"))
                .and(header(
                    "Content-Range",
                    format!("bytes 0-{}/{total}", CHUNK_SIZE - 1).as_str(),
                ))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "$id": "file-1",
                    "chunksUploaded": 1
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/v1/storage/buckets/bucket/files"))
                .and(header(
                    "Content-Range",
                    format!("bytes {CHUNK_SIZE}-{}/{total}", total - 1).as_str(),
                ))
                .and(header("X-Appwrite-ID", "file-1"))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "$id": "file-1",
                    "chunksUploaded": 2
                })))
                .expect(1)
                .mount(&server)
                .await;

            let document = IdentificationDocument::new("scan.png", content).unwrap();
            let stored = client(&server)
                .create_file("bucket", &UniqueId::new(), &document)
                .await
                .unwrap();

            assert_eq!(stored.id, "file-1");
            let requests = server.received_requests().await.unwrap();
            assert_eq!(requests.len(), 2);
            assert!(requests[0].headers.get("x-appwrite-id").is_none());
        }

        #[tokio::test]
        async fn delete_file_maps_status() {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .and(path("/v1/storage/buckets/bucket/files/file-1"))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/v1/storage/buckets/bucket/files/gone"))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "message": "The requested file could not be found.",
                    "code": 404
                })))
                .mount(&server)
                .await;

            let client = client(&server);
            client.delete_file("bucket", "file-1").await.unwrap();
            assert!(client
                .delete_file("bucket", "gone")
                .await
                .unwrap_err()
                .is_not_found());
        }

        #[tokio::test]
        async fn create_document_posts_id_and_data() {
            let server = MockServer::start().await;
            let id = UniqueId::new();
            let data = json!({ "userId": "u1", "identificationDocumentId": null });
            Mock::given(method("POST"))
                .and(path("/v1/databases/db/collections/patients/documents"))
                .and(header("X-Appwrite-Key", "secret-key"))
                .and(body_json(json!({ "documentId": id.as_str(), "data": data })))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "$id": id.as_str(),
                    "$collectionId": "patients",
                    "userId": "u1"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let stored = client(&server)
                .create_document("db", "patients", &id, data.clone())
                .await
                .unwrap();

            assert_eq!(stored["$id"], id.as_str());
        }

        #[tokio::test]
        async fn server_error_keeps_status_and_message() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/databases/db/collections/patients/documents"))
                .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                    "message": "Server Error",
                    "code": 500
                })))
                .mount(&server)
                .await;

            let err = client(&server)
                .create_document("db", "patients", &UniqueId::new(), json!({}))
                .await
                .unwrap_err();

            assert_eq!(
                err,
                RemoteError::Service {
                    code: 500,
                    message: "Server Error".into()
                }
            );
        }
    }
}
