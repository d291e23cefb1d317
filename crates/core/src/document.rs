//! Identification documents attached to a registration.
//!
//! The registration form accepts one scanned identification document. Bytes are checked here
//! before any upload: the file must be non-empty, no larger than
//! [`MAX_DOCUMENT_BYTES`](crate::constants::MAX_DOCUMENT_BYTES), and sniff as an image or a PDF.
//! Detection uses the content, not the filename.

use crate::constants::{MAX_DOCUMENT_BYTES, UPLOAD_CHUNK_BYTES};
use intake_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// A document exactly as the uploader supplied it.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for DocumentUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.content.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("file name is required")]
    MissingFileName,
    #[error("file is empty")]
    Empty,
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("file must be an image or a PDF")]
    UnsupportedType,
}

/// A checked identification document, ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentificationDocument {
    file_name: NonEmptyText,
    media_type: &'static str,
    content: Vec<u8>,
}

impl IdentificationDocument {
    pub fn new(file_name: &str, content: Vec<u8>) -> Result<Self, DocumentError> {
        // Only the final path component is kept; browsers and CLIs both hand over full paths.
        let base_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name);
        let file_name = NonEmptyText::new(base_name).map_err(|_| DocumentError::MissingFileName)?;

        if content.is_empty() {
            return Err(DocumentError::Empty);
        }
        if content.len() > MAX_DOCUMENT_BYTES {
            return Err(DocumentError::TooLarge {
                size: content.len(),
                limit: MAX_DOCUMENT_BYTES,
            });
        }

        let media_type = infer::get(&content)
            .filter(|kind| {
                kind.matcher_type() == infer::MatcherType::Image || kind.mime_type() == "application/pdf"
            })
            .map(|kind| kind.mime_type())
            .ok_or(DocumentError::UnsupportedType)?;

        Ok(Self {
            file_name,
            media_type,
            content,
        })
    }

    pub fn file_name(&self) -> &str {
        self.file_name.as_str()
    }

    /// Detected MIME type, e.g. `image/png`.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of upload requests needed at [`UPLOAD_CHUNK_BYTES`] per request.
    pub fn chunk_count(&self) -> usize {
        self.content.len().div_ceil(UPLOAD_CHUNK_BYTES).max(1)
    }
}

impl TryFrom<DocumentUpload> for IdentificationDocument {
    type Error = DocumentError;

    fn try_from(upload: DocumentUpload) -> Result<Self, Self::Error> {
        IdentificationDocument::new(&upload.file_name, upload.content)
    }
}

impl std::fmt::Debug for IdentificationDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentificationDocument")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("len", &self.content.len())
            .finish()
    }
}

/// A file the storage service accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "bucketId", default)]
    pub bucket_id: String,
    #[serde(default)]
    pub name: String,
}

/// Reference to an uploaded document as recorded on the patient record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub url: String,
}
