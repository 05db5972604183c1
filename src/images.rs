//! Image storage collaborator.
//!
//! Report photos are not stored in the database; they are pushed to an
//! external object store which hands back a public URL. This module defines
//! the seam ([`ImageStore`]) and the production HTTP implementation.
//!
//! Upload failure is deliberately non-fatal for report submission: a report
//! without a photo is still actionable, so the flow degrades rather than
//! aborts (see [`crate::submission`]).

use std::future::Future;

use chrono::Utc;
use tracing::debug;

use crate::error::StoreError;
use crate::model::ImageAttachment;

/// Seam for pushing report photos to an object store.
pub trait ImageStore {
    /// Upload the attachment and return its public URL.
    fn upload(
        &self,
        attachment: &ImageAttachment,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

/// Client for an HTTP object store that accepts `PUT <base>/<key>` and serves
/// the object back at the same URL.
#[derive(Clone)]
pub struct HttpImageStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageStore {
    /// Create a new image store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the object store, without a trailing slash.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the object key for an attachment.
    ///
    /// Keys are prefixed with the upload second so that two reporters
    /// attaching `dog.jpg` do not collide, and the filename is URL-encoded so
    /// spaces and unicode survive the path.
    fn object_key(filename: &str) -> String {
        format!(
            "reports/{}-{}",
            Utc::now().timestamp(),
            urlencoding::encode(filename)
        )
    }
}

impl ImageStore for HttpImageStore {
    async fn upload(&self, attachment: &ImageAttachment) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.base_url, Self::object_key(&attachment.filename));

        debug!(url = %url, bytes = attachment.bytes.len(), "Uploading report image");

        let response = self
            .client
            .put(&url)
            .body(attachment.bytes.clone())
            .send()
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Upload(format!(
                "object store returned {}",
                response.status()
            )));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_encodes_filename() {
        let key = HttpImageStore::object_key("injured dog.jpg");
        assert!(key.starts_with("reports/"));
        assert!(key.ends_with("injured%20dog.jpg"));
        assert!(!key.contains(' '));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = HttpImageStore::new("https://img.example/");
        assert_eq!(store.base_url, "https://img.example");
    }
}
