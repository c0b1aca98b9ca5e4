use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use dns_types::protocol::types::DomainName;

/// A convenience wrapper around a `Cache` which lets it be shared
/// between threads.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `Cache` object.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<Mutex<Cache>>,
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

impl SharedCache {
    /// Make a new, empty, shared cache.
    pub fn new() -> Self {
        SharedCache {
            cache: Arc::new(Mutex::new(Cache::new())),
        }
    }

    /// Get the cached address set for a name, if any.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn get(&self, name: &DomainName) -> Option<HashSet<Ipv4Addr>> {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).get(name)
    }

    /// Add an address to the cached set for a name.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn insert(&self, name: &DomainName, address: Ipv4Addr) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert(name, address);
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Caching of name-server and answer address records gathered while
/// walking the DNS hierarchy.
///
/// This does not honour TTLs: an entry, once learned, lives for the
/// lifetime of the cache.  That's fine for a single `dnsq` invocation,
/// which creates a fresh cache and throws it away when the process
/// exits.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: HashMap<DomainName, HashSet<Ipv4Addr>>,
}

impl Cache {
    /// Create a new, empty, cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get the cached address set for a name, if any.
    pub fn get(&self, name: &DomainName) -> Option<HashSet<Ipv4Addr>> {
        self.entries.get(name).cloned()
    }

    /// Add an address to the cached set for a name, creating the
    /// entry if it doesn't already exist.
    pub fn insert(&mut self, name: &DomainName, address: Ipv4Addr) {
        self.entries.entry(name.clone()).or_default().insert(address);
    }
}
