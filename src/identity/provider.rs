//! Certificate selection for incoming TLS handshakes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustls::sign::CertifiedKey;
use tracing::debug;

use super::{synthesize, IdentityError, SelfSignedIdentity};

/// Supplies the certificate presented for a handshake.
///
/// `server_name` is the SNI sent by the client, if any.
pub trait CertificateProvider: fmt::Debug + Send + Sync {
    fn certificate_for(&self, server_name: Option<&str>)
        -> Result<Arc<CertifiedKey>, IdentityError>;
}

/// One certificate generated at startup and reused for the process lifetime,
/// whatever name the client asks for.
#[derive(Debug, Clone)]
pub struct StaticCertificate {
    identity: SelfSignedIdentity,
}

impl StaticCertificate {
    /// Synthesizes the process-wide identity for `common_name`.
    pub fn generate(common_name: &str) -> Result<Self, IdentityError> {
        Ok(Self {
            identity: synthesize(common_name)?,
        })
    }
}

impl CertificateProvider for StaticCertificate {
    fn certificate_for(
        &self,
        _server_name: Option<&str>,
    ) -> Result<Arc<CertifiedKey>, IdentityError> {
        Ok(self.identity.certified_key())
    }
}

/// Synthesizes a certificate per requested SNI name on first use.
///
/// At most `capacity` names are kept. Once full, the name cached longest ago
/// is evicted and regenerated if a client asks for it again. Clients that
/// send no SNI get the certificate for `fallback_name`.
pub struct PerNameCertificates {
    fallback_name: String,
    capacity: usize,
    cache: DashMap<String, Arc<CertifiedKey>>,
    insertion_order: Mutex<VecDeque<String>>,
}

impl PerNameCertificates {
    pub fn new(fallback_name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            fallback_name: fallback_name.into(),
            capacity,
            cache: DashMap::with_capacity(capacity),
            insertion_order: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Number of names with a generated certificate.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a newly cached name and drop the oldest ones beyond capacity.
    fn admit(&self, name: String) {
        let mut order = self
            .insertion_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        order.push_back(name);
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.cache.remove(&oldest);
                debug!(server_name = %oldest, "evicted cached certificate");
            }
        }
    }
}

impl fmt::Debug for PerNameCertificates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerNameCertificates")
            .field("fallback_name", &self.fallback_name)
            .field("capacity", &self.capacity)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl CertificateProvider for PerNameCertificates {
    fn certificate_for(
        &self,
        server_name: Option<&str>,
    ) -> Result<Arc<CertifiedKey>, IdentityError> {
        let name = server_name
            .unwrap_or(&self.fallback_name)
            .to_ascii_lowercase();

        if let Some(key) = self.cache.get(&name) {
            return Ok(Arc::clone(key.value()));
        }

        // Generated outside the map lock; a concurrent handshake for the same
        // name may generate twice, the first insert wins.
        let key = synthesize(&name)?.certified_key();
        let key = match self.cache.entry(name.clone()) {
            Entry::Occupied(existing) => return Ok(Arc::clone(existing.get())),
            Entry::Vacant(slot) => Arc::clone(slot.insert(key).value()),
        };
        // The shard guard is released before eviction touches the map.
        self.admit(name);
        debug!(cached = self.cache.len(), "cached certificate for new server name");
        Ok(key)
    }
}
