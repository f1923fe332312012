//! Object URLs for encoded blobs
//!
//! A `BlobRegistry` is scoped to one execution context: a URL it hands out
//! resolves only through that same registry. `ObjectUrl` owns a URL and
//! revokes it when dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Binary payload behind an object URL
#[derive(Debug, Clone)]
pub struct Blob {
    pub data: Arc<Vec<u8>>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: Arc::new(data),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-context object URL table
pub trait BlobRegistry: Send + Sync {
    /// Register a blob and return its URL
    fn create(&self, blob: Blob) -> String;

    /// Dereference a URL created by this registry
    fn fetch(&self, url: &str) -> Option<Blob>;

    /// Release a URL; unknown URLs are ignored
    fn revoke(&self, url: &str);
}

/// In-memory registry handing out `blob:<origin>/<uuid>` URLs
pub struct MemoryBlobRegistry {
    origin: String,
    blobs: Mutex<HashMap<String, Blob>>,
}

impl MemoryBlobRegistry {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// Number of URLs not yet revoked
    pub fn live_count(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }
}

impl BlobRegistry for MemoryBlobRegistry {
    fn create(&self, blob: Blob) -> String {
        let url = format!("blob:{}/{}", self.origin, uuid::Uuid::new_v4());
        debug!("Created object URL {} ({} bytes)", url, blob.len());
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(url.clone(), blob);
        }
        url
    }

    fn fetch(&self, url: &str) -> Option<Blob> {
        self.blobs.lock().ok()?.get(url).cloned()
    }

    fn revoke(&self, url: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            if blobs.remove(url).is_some() {
                debug!("Revoked object URL {}", url);
            }
        }
    }
}

/// An owned object URL, revoked on drop
pub struct ObjectUrl {
    url: String,
    registry: Arc<dyn BlobRegistry>,
}

impl ObjectUrl {
    pub fn create(registry: Arc<dyn BlobRegistry>, blob: Blob) -> Self {
        let url = registry.create(blob);
        Self { url, registry }
    }

    /// Take ownership of a URL created elsewhere in this context
    pub fn adopt(registry: Arc<dyn BlobRegistry>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            registry,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn fetch(&self) -> Option<Blob> {
        self.registry.fetch(&self.url)
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}
