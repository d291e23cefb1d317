//! Process-local backend.
//!
//! [`InMemoryBackend`] implements all three remote APIs over in-process maps. It behaves like
//! the hosted service where the provisioning service cares (duplicate emails conflict, unknown
//! ids are not found) and supports injected failures and latency. Binaries use it when
//! `INTAKE_BACKEND=memory`; tests use it everywhere.

use crate::backend::{DatabaseApi, IdentityApi, RemoteError, RemoteResult, StorageApi};
use crate::document::{IdentificationDocument, StoredFile};
use crate::user::{Query, User, UserList};
use async_trait::async_trait;
use intake_types::{EmailAddress, NonEmptyText, PhoneNumber};
use intake_uuid::UniqueId;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A file held by [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryFile {
    pub bucket_id: String,
    pub id: String,
    pub name: String,
    pub media_type: &'static str,
    pub size: usize,
}

#[derive(Default)]
struct Faults {
    create_user: Option<RemoteError>,
    get_user: Option<RemoteError>,
    upload: Option<RemoteError>,
    delete_file: Option<RemoteError>,
    create_document: Option<RemoteError>,
    hide_listing: bool,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    // Insertion order is kept so listings are stable.
    users: Mutex<Vec<User>>,
    files: Mutex<Vec<MemoryFile>>,
    documents: Mutex<HashMap<(String, String), BTreeMap<String, Value>>>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- failure injection ----

    pub fn fail_user_creation(&self, error: RemoteError) {
        lock(&self.faults).create_user = Some(error);
    }

    pub fn fail_user_lookup(&self, error: RemoteError) {
        lock(&self.faults).get_user = Some(error);
    }

    pub fn fail_file_upload(&self, error: RemoteError) {
        lock(&self.faults).upload = Some(error);
    }

    pub fn fail_file_deletion(&self, error: RemoteError) {
        lock(&self.faults).delete_file = Some(error);
    }

    pub fn fail_document_creation(&self, error: RemoteError) {
        lock(&self.faults).create_document = Some(error);
    }

    /// Make user listings come back empty, as if the lookup index lagged behind.
    pub fn hide_users_from_listing(&self, hide: bool) {
        lock(&self.faults).hide_listing = hide;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.faults).latency = Some(latency);
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    // ---- inspection ----

    /// Number of remote calls received, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        lock(&self.users).len()
    }

    pub fn stored_files(&self) -> Vec<MemoryFile> {
        lock(&self.files).clone()
    }

    /// Documents in a collection, in id order.
    pub fn stored_documents(&self, database_id: &str, collection_id: &str) -> Vec<Value> {
        lock(&self.documents)
            .get(&(database_id.to_string(), collection_id.to_string()))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Count the call, wait out any latency, then report an injected fault if one is set.
    async fn enter(&self, fault: impl FnOnce(&Faults) -> Option<RemoteError>) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (latency, error) = {
            let faults = lock(&self.faults);
            (faults.latency, fault(&faults))
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityApi for InMemoryBackend {
    async fn create(
        &self,
        id: &UniqueId,
        email: &EmailAddress,
        phone: &PhoneNumber,
        name: &NonEmptyText,
    ) -> RemoteResult<User> {
        self.enter(|f| f.create_user.clone()).await?;

        let mut users = lock(&self.users);
        let taken = users
            .iter()
            .any(|u| u.id == id.as_str() || u.email == email.as_str() || u.phone == phone.as_str());
        if taken {
            return Err(RemoteError::Conflict(
                "A user with the same id, email, or phone already exists in this project.".into(),
            ));
        }

        let user = User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list(&self, queries: &[Query]) -> RemoteResult<UserList> {
        let hide = {
            self.enter(|_| None).await?;
            lock(&self.faults).hide_listing
        };
        if hide {
            return Ok(UserList::default());
        }

        let users: Vec<User> = lock(&self.users)
            .iter()
            .filter(|u| queries.iter().all(|q| q.matches(u)))
            .cloned()
            .collect();

        Ok(UserList {
            total: users.len() as u64,
            users,
        })
    }

    async fn get(&self, user_id: &str) -> RemoteResult<User> {
        self.enter(|f| f.get_user.clone()).await?;

        lock(&self.users)
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("user {user_id}")))
    }
}

#[async_trait]
impl StorageApi for InMemoryBackend {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &UniqueId,
        document: &IdentificationDocument,
    ) -> RemoteResult<StoredFile> {
        self.enter(|f| f.upload.clone()).await?;

        let mut files = lock(&self.files);
        if files
            .iter()
            .any(|f| f.bucket_id == bucket_id && f.id == file_id.as_str())
        {
            return Err(RemoteError::Conflict(format!("file {file_id}")));
        }

        files.push(MemoryFile {
            bucket_id: bucket_id.to_string(),
            id: file_id.to_string(),
            name: document.file_name().to_string(),
            media_type: document.media_type(),
            size: document.len(),
        });

        Ok(StoredFile {
            id: file_id.to_string(),
            bucket_id: bucket_id.to_string(),
            name: document.file_name().to_string(),
        })
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> RemoteResult<()> {
        self.enter(|f| f.delete_file.clone()).await?;

        let mut files = lock(&self.files);
        let before = files.len();
        files.retain(|f| !(f.bucket_id == bucket_id && f.id == file_id));

        if files.len() == before {
            Err(RemoteError::NotFound(format!("file {file_id}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DatabaseApi for InMemoryBackend {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &UniqueId,
        data: Value,
    ) -> RemoteResult<Value> {
        self.enter(|f| f.create_document.clone()).await?;

        let Value::Object(mut fields) = data else {
            return Err(RemoteError::Service {
                code: 400,
                message: "document data must be an object".into(),
            });
        };

        let mut documents = lock(&self.documents);
        let collection = documents
            .entry((database_id.to_string(), collection_id.to_string()))
            .or_default();
        if collection.contains_key(document_id.as_str()) {
            return Err(RemoteError::Conflict(format!("document {document_id}")));
        }

        fields.insert("$id".into(), Value::String(document_id.to_string()));
        fields.insert("$databaseId".into(), Value::String(database_id.to_string()));
        fields.insert(
            "$collectionId".into(),
            Value::String(collection_id.to_string()),
        );
        let stored = Value::Object(fields);
        collection.insert(document_id.to_string(), stored.clone());

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::PDF;

    fn john() -> (EmailAddress, PhoneNumber, NonEmptyText) {
        (
            EmailAddress::parse("john@x.com").unwrap(),
            PhoneNumber::parse("+254712345678").unwrap(),
            NonEmptyText::new("John Doe").unwrap(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let backend = InMemoryBackend::new();
        let (email, phone, name) = john();

        backend
            .create(&UniqueId::new(), &email, &phone, &name)
            .await
            .unwrap();
        let err = backend
            .create(&UniqueId::new(), &email, &phone, &name)
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let backend = InMemoryBackend::new();
        let (email, phone, name) = john();
        backend
            .create(&UniqueId::new(), &email, &phone, &name)
            .await
            .unwrap();

        let hit = backend
            .list(&[Query::equal("email", ["john@x.com".to_string()])])
            .await
            .unwrap();
        assert_eq!(hit.total, 1);

        let miss = backend
            .list(&[Query::equal("email", ["jane@x.com".to_string()])])
            .await
            .unwrap();
        assert!(miss.users.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn files_can_be_deleted_once() {
        let backend = InMemoryBackend::new();
        let doc = IdentificationDocument::new("id.pdf", PDF.to_vec()).unwrap();
        let id = UniqueId::new();

        let stored = backend.create_file("bucket", &id, &doc).await.unwrap();
        assert_eq!(stored.id, id.as_str());
        assert_eq!(backend.stored_files()[0].media_type, "application/pdf");

        backend.delete_file("bucket", id.as_str()).await.unwrap();
        assert!(backend.delete_file("bucket", id.as_str()).await.is_err());
        assert!(backend.stored_files().is_empty());
    }

    #[tokio::test]
    async fn create_document_adds_system_attributes() {
        let backend = InMemoryBackend::new();
        let id = UniqueId::new();

        let stored = backend
            .create_document("db", "patients", &id, serde_json::json!({ "name": "John" }))
            .await
            .unwrap();

        assert_eq!(stored["$id"], id.as_str());
        assert_eq!(stored["name"], "John");
        assert_eq!(backend.stored_documents("db", "patients").len(), 1);
    }

    #[tokio::test]
    async fn injected_faults_count_as_calls() {
        let backend = InMemoryBackend::new();
        backend.fail_user_lookup(RemoteError::Transport("down".into()));

        assert!(backend.get("anyone").await.is_err());
        assert_eq!(backend.call_count(), 1);

        backend.clear_faults();
        assert!(backend.get("anyone").await.unwrap_err().is_not_found());
    }
}
