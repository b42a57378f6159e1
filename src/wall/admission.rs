//! Admission control for submissions.
//!
//! A load-shedding gate, not a queue: when every slot is taken the caller
//! gets [`Error::Capacity`] immediately and is expected to retry later.
//! Slots are semaphore permits released on drop, so no return path can
//! leak one.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use super::normalize::{InlineImage, decode_inline_image, estimated_decoded_len};
use super::types::RawEntry;
use crate::error::{Error, Result};

/// Held for the duration of one submission.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Bounds concurrent submissions and validates payloads.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    limit: usize,
    max_image_bytes: usize,
}

impl AdmissionController {
    pub fn new(limit: usize, max_image_bytes: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            max_image_bytes,
        }
    }

    /// Takes a slot without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] when the limit is reached.
    pub fn try_admit(&self) -> Result<AdmissionPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(Error::Capacity {
                in_flight: self.in_flight(),
                limit: self.limit,
            }),
            Err(TryAcquireError::Closed) => Err(Error::ShuttingDown),
        }
    }

    /// Number of submissions currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.semaphore.available_permits())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Validates a submission and decodes its image, if any.
    ///
    /// Size is checked against the encoded length first, so oversized
    /// payloads are refused without decoding them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a missing or non-string id, an
    /// unsupported or undecodable image, or an image over the size limit.
    pub fn validate(&self, raw: &RawEntry) -> Result<Option<InlineImage>> {
        if raw.id.is_null() {
            return Err(Error::validation("id is required"));
        }
        if raw.id().is_none() {
            return Err(Error::validation("id must be a non-empty string"));
        }

        let Some(encoded) = raw.inline_image() else {
            return Ok(None);
        };

        // Base64 overhead means the estimate may exceed the real size by two bytes
        if estimated_decoded_len(encoded) > self.max_image_bytes + 2 {
            return Err(self.too_large());
        }

        let image = decode_inline_image(encoded)?;
        if image.bytes.len() > self.max_image_bytes {
            return Err(self.too_large());
        }
        Ok(Some(image))
    }

    fn too_large(&self) -> Error {
        Error::validation(format!(
            "image exceeds limit of {} bytes",
            self.max_image_bytes
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEntry {
        serde_json::from_value(value).unwrap()
    }

    fn jpeg(len: usize) -> String {
        format!("data:image/jpeg;base64,{}", BASE64.encode(vec![0xFFu8; len]))
    }

    #[test]
    fn test_admit_until_limit() {
        let admission = AdmissionController::new(2, 1024);

        let first = admission.try_admit().unwrap();
        let _second = admission.try_admit().unwrap();
        assert_eq!(admission.in_flight(), 2);

        let busy = admission.try_admit();
        assert!(matches!(
            busy,
            Err(Error::Capacity {
                in_flight: 2,
                limit: 2
            })
        ));

        drop(first);
        assert_eq!(admission.in_flight(), 1);
        assert!(admission.try_admit().is_ok());
    }

    #[test]
    fn test_permit_released_on_early_return() {
        let admission = AdmissionController::new(1, 1024);

        fn failing_operation(admission: &AdmissionController) -> Result<()> {
            let _permit = admission.try_admit()?;
            Err(Error::validation("fails after admission"))
        }

        for _ in 0..5 {
            assert!(failing_operation(&admission).is_err());
            assert_eq!(admission.in_flight(), 0);
        }
    }

    #[test]
    fn test_permit_released_on_panic() {
        let admission = AdmissionController::new(1, 1024);

        let cloned = admission.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _permit = cloned.try_admit().unwrap();
            panic!("operation blew up");
        }));

        assert!(result.is_err());
        assert_eq!(admission.in_flight(), 0);
    }

    #[test]
    fn test_validate_requires_string_id() {
        let admission = AdmissionController::new(1, 1024);

        assert!(matches!(
            admission.validate(&raw(json!({"caption": "x"}))),
            Err(Error::Validation(msg)) if msg.contains("required")
        ));
        assert!(admission.validate(&raw(json!({"id": 5}))).is_err());
        assert!(admission.validate(&raw(json!({"id": "  "}))).is_err());
        assert_eq!(admission.validate(&raw(json!({"id": "ok"}))).unwrap(), None);
    }

    #[test]
    fn test_validate_size_limit() {
        let admission = AdmissionController::new(1, 1000);

        let image = admission
            .validate(&raw(json!({"id": "a", "image": jpeg(1000)})))
            .unwrap()
            .unwrap();
        assert_eq!(image.bytes.len(), 1000);

        let err = admission
            .validate(&raw(json!({"id": "b", "image": jpeg(1001)})))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));

        let err = admission
            .validate(&raw(json!({"id": "c", "image": jpeg(50_000)})))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_validate_rejects_unsupported_encoding() {
        let admission = AdmissionController::new(1, 1024);
        let result = admission.validate(&raw(json!({"id": "a", "image": "data:image/png;hex,ff00"})));
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
