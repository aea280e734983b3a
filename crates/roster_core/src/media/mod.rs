//! Optional remote image storage.
//!
//! # Responsibility
//! - Define the uploader contract used to turn image bytes into a URL.
//! - Store the resulting URL as an ordinary text field.
//! - Hold the process-wide uploader installed by the host, if any.
//!
//! # Invariants
//! - A missing uploader or a failed upload leaves the field absent and never
//!   blocks the surrounding write.
//! - Reconciliation never depends on an uploader being configured.

use crate::model::record::{FieldValue, Record};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, OnceLock};

static INSTALLED: OnceLock<Arc<dyn ImageUploader + Send + Sync>> = OnceLock::new();

/// Upload failure reported by an uploader implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Payload rejected before upload (empty body, unsupported type).
    Rejected(String),
    /// Remote backend failed.
    Backend(String),
    /// `install_uploader` was called a second time.
    AlreadyInstalled,
}

impl Display for UploadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "image rejected: {reason}"),
            Self::Backend(reason) => write!(f, "image backend failed: {reason}"),
            Self::AlreadyInstalled => write!(f, "an image uploader is already installed"),
        }
    }
}

impl Error for UploadError {}

/// Remote blob storage that returns a retrievable URL for an image.
pub trait ImageUploader {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, UploadError>;
}

/// Installs the uploader used by host entry points; allowed once per process.
pub fn install_uploader(
    uploader: Arc<dyn ImageUploader + Send + Sync>,
) -> Result<(), UploadError> {
    INSTALLED
        .set(uploader)
        .map_err(|_| UploadError::AlreadyInstalled)?;
    info!("event=image_uploader_install module=media status=ok");
    Ok(())
}

/// Uploader installed by the host, if any.
pub fn installed_uploader() -> Option<&'static dyn ImageUploader> {
    INSTALLED
        .get()
        .map(|uploader| uploader.as_ref() as &dyn ImageUploader)
}

/// Uploads an image and stores its URL under `field`.
///
/// Returns whether a URL was stored. Without an uploader, or on failure, the
/// field is removed so the record reads as "no image".
pub fn attach_image(
    uploader: Option<&dyn ImageUploader>,
    record: &mut Record,
    field: &str,
    file_name: &str,
    bytes: &[u8],
) -> bool {
    let Some(uploader) = uploader else {
        info!("event=image_attach module=media status=skipped reason=no_uploader");
        record.fields.remove(field);
        return false;
    };

    if bytes.is_empty() {
        warn!("event=image_attach module=media status=error error_code=empty_payload");
        record.fields.remove(field);
        return false;
    }

    match uploader.upload(file_name, bytes) {
        Ok(url) if !url.trim().is_empty() => {
            record
                .fields
                .insert(field.to_string(), FieldValue::Text(url.trim().to_string()));
            info!(
                "event=image_attach module=media status=ok bytes={}",
                bytes.len()
            );
            true
        }
        Ok(_) => {
            warn!("event=image_attach module=media status=error error_code=empty_url");
            record.fields.remove(field);
            false
        }
        Err(err) => {
            warn!("event=image_attach module=media status=error error={err}");
            record.fields.remove(field);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{attach_image, install_uploader, installed_uploader, ImageUploader, UploadError};
    use crate::model::record::Record;
    use std::sync::Arc;

    struct FixedUploader(Result<String, UploadError>);

    impl ImageUploader for FixedUploader {
        fn upload(&self, _file_name: &str, _bytes: &[u8]) -> Result<String, UploadError> {
            self.0.clone()
        }
    }

    #[test]
    fn stores_url_from_uploader() {
        let uploader = FixedUploader(Ok("https://cdn.example/logo.png".to_string()));
        let mut record = Record::new();
        assert!(attach_image(Some(&uploader), &mut record, "logoUrl", "logo.png", b"png"));
        assert_eq!(
            record.text("logoUrl").as_deref(),
            Some("https://cdn.example/logo.png")
        );
    }

    #[test]
    fn missing_uploader_means_no_image() {
        let mut record = Record::new().field("logoUrl", "stale");
        assert!(!attach_image(None, &mut record, "logoUrl", "logo.png", b"png"));
        assert!(record.get("logoUrl").is_none());
    }

    #[test]
    fn backend_failure_means_no_image() {
        let uploader = FixedUploader(Err(UploadError::Backend("503".to_string())));
        let mut record = Record::new();
        assert!(!attach_image(Some(&uploader), &mut record, "photoUrl", "p.jpg", b"jpg"));
        assert!(record.get("photoUrl").is_none());
    }

    #[test]
    fn uploader_installs_once_and_is_then_visible() {
        let uploader = FixedUploader(Ok("https://cdn.example/a.png".to_string()));
        install_uploader(Arc::new(uploader)).unwrap();
        let again = FixedUploader(Ok("https://cdn.example/b.png".to_string()));
        assert_eq!(
            install_uploader(Arc::new(again)),
            Err(UploadError::AlreadyInstalled)
        );

        let mut record = Record::new();
        assert!(attach_image(
            installed_uploader(),
            &mut record,
            "logoUrl",
            "a.png",
            b"png"
        ));
        assert_eq!(
            record.text("logoUrl").as_deref(),
            Some("https://cdn.example/a.png")
        );
    }
}
