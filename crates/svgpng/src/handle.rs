//! Revocable object handles.
//!
//! An [`ObjectStore`] plays the role of a blob-URL registry: bytes are
//! registered under an opaque URL and stay resolvable until the owning
//! [`ObjectUrl`] is released. Release is idempotent and also happens on drop,
//! so a handle can never leak past its owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

const URL_SCHEME: &str = "blob:svgpng/";

#[derive(Debug, Clone)]
struct StoredObject {
    mime: String,
    data: Arc<[u8]>,
}

type Registry = Mutex<HashMap<String, StoredObject>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, StoredObject>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of live object URLs.
#[derive(Clone, Default)]
pub struct ObjectStore {
    inner: Arc<Registry>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `data` and returns the handle that owns the registration.
    pub fn create_url(&self, data: Arc<[u8]>, mime: &str) -> ObjectUrl {
        let url = format!("{}{}", URL_SCHEME, uuid::Uuid::new_v4());
        lock(&self.inner).insert(
            url.clone(),
            StoredObject {
                mime: mime.to_string(),
                data,
            },
        );
        tracing::trace!(%url, mime, "object url created");

        ObjectUrl {
            url,
            mime: mime.to_string(),
            registry: Arc::downgrade(&self.inner),
            released: false,
        }
    }

    /// Looks up the bytes behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        lock(&self.inner).get(url).map(|o| Arc::clone(&o.data))
    }

    /// Returns the MIME type a live URL was registered with.
    pub fn mime_type(&self, url: &str) -> Option<String> {
        lock(&self.inner).get(url).map(|o| o.mime.clone())
    }

    /// Number of registrations that have not been released yet.
    pub fn live_count(&self) -> usize {
        lock(&self.inner).len()
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("live", &self.live_count())
            .finish()
    }
}

/// Exclusive owner of one registration in an [`ObjectStore`].
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    mime: String,
    registry: Weak<Registry>,
    released: bool,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Reads the registered bytes, or `None` once released.
    pub fn data(&self) -> Option<Arc<[u8]>> {
        if self.released {
            return None;
        }
        let registry = self.registry.upgrade()?;
        let data = lock(&registry).get(&self.url).map(|o| Arc::clone(&o.data));
        data
    }

    /// Revokes the registration. Calling this more than once is harmless.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.url);
            tracing::trace!(url = %self.url, "object url released");
        }
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(data: &[u8]) -> Arc<[u8]> {
        Arc::from(data.to_vec())
    }

    #[test]
    fn test_create_and_resolve() {
        let store = ObjectStore::new();
        let url = store.create_url(bytes(b"abc"), "image/png");

        assert!(url.as_str().starts_with("blob:svgpng/"));
        assert_eq!(url.mime_type(), "image/png");
        assert_eq!(store.resolve(url.as_str()).as_deref(), Some(&b"abc"[..]));
        assert_eq!(store.mime_type(url.as_str()).as_deref(), Some("image/png"));
        assert_eq!(url.data().as_deref(), Some(&b"abc"[..]));
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = ObjectStore::new();
        let mut url = store.create_url(bytes(b"x"), "image/svg+xml");
        let key = url.as_str().to_string();

        url.release();
        url.release();

        assert!(url.is_released());
        assert!(url.data().is_none());
        assert!(store.resolve(&key).is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let store = ObjectStore::new();
        {
            let _a = store.create_url(bytes(b"1"), "image/png");
            let _b = store.create_url(bytes(b"2"), "image/png");
            assert_eq!(store.live_count(), 2);
        }
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_release_after_store_dropped() {
        let store = ObjectStore::new();
        let mut url = store.create_url(bytes(b"1"), "image/png");
        drop(store);

        assert!(url.data().is_none());
        url.release();
        assert!(url.is_released());
    }

    #[test]
    fn test_urls_are_unique() {
        let store = ObjectStore::new();
        let a = store.create_url(bytes(b"1"), "image/png");
        let b = store.create_url(bytes(b"1"), "image/png");
        assert_ne!(a.as_str(), b.as_str());
    }
}
