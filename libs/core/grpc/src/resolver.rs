//! Logical target resolution for client channels.
//!
//! A target names a resolver scheme and its entry list:
//! `address://host1:port1,host2:port2`. For the built-in
//! [`AddressResolver`] the entries are the final backend set; nothing is
//! re-resolved through DNS. Additional resolvers can claim other schemes
//! through the [`ResolverRegistry`]; availability and priority decide which
//! one serves a target when several claim its scheme.

use std::fmt;
use std::sync::Arc;

use crate::error::{GrpcError, GrpcResult};

/// Scheme literal claimed by the built-in [`AddressResolver`].
pub const ADDRESS_SCHEME: &str = "address";

/// A single backend endpoint.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BackendAddr {
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` entry. IPv6 hosts use the bracket form,
    /// e.g. `[::1]:50051`.
    pub fn parse(entry: &str) -> GrpcResult<Self> {
        let (host, port) = entry
            .rsplit_once(':')
            .ok_or_else(|| GrpcError::InvalidAddress(entry.to_string()))?;
        if host.is_empty() {
            return Err(GrpcError::InvalidAddress(entry.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| GrpcError::InvalidAddress(entry.to_string()))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// URI for this backend under the given transport scheme.
    pub(crate) fn uri(&self, scheme: &str) -> String {
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolved backend membership for one target.
///
/// Entries keep the order they were supplied in; duplicates are dropped,
/// keeping the first occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressSet {
    target: String,
    entries: Vec<BackendAddr>,
}

impl AddressSet {
    pub fn new(target: impl Into<String>, addrs: impl IntoIterator<Item = BackendAddr>) -> Self {
        let mut entries: Vec<BackendAddr> = Vec::new();
        for addr in addrs {
            if !entries.contains(&addr) {
                entries.push(addr);
            }
        }
        Self {
            target: target.into(),
            entries,
        }
    }

    /// The target string this set was resolved from.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn entries(&self) -> &[BackendAddr] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Membership delta from `self` to `next`: `(added, removed)`.
    pub fn diff(&self, next: &AddressSet) -> (Vec<BackendAddr>, Vec<BackendAddr>) {
        let added = next
            .entries
            .iter()
            .filter(|addr| !self.entries.contains(addr))
            .cloned()
            .collect();
        let removed = self
            .entries
            .iter()
            .filter(|addr| !next.entries.contains(addr))
            .cloned()
            .collect();
        (added, removed)
    }
}

/// Maps a logical target string to a concrete, possibly time-varying set of
/// backend addresses.
pub trait NameResolver: Send + Sync {
    /// Scheme this resolver claims, e.g. `"address"`.
    fn scheme(&self) -> &str;

    /// Whether the resolver can currently serve lookups.
    fn is_available(&self) -> bool {
        true
    }

    /// Tie-breaker when several available resolvers claim one scheme.
    fn priority(&self) -> u8;

    fn resolve(&self, target: &str) -> GrpcResult<AddressSet>;
}

/// Resolver for `address://` targets: the entry list after the scheme is the
/// final backend set, taken verbatim from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressResolver;

impl NameResolver for AddressResolver {
    fn scheme(&self) -> &str {
        ADDRESS_SCHEME
    }

    fn priority(&self) -> u8 {
        5
    }

    fn resolve(&self, target: &str) -> GrpcResult<AddressSet> {
        let entries = target
            .strip_prefix(ADDRESS_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| GrpcError::InvalidTarget(target.to_string()))?;

        let mut addrs = Vec::new();
        for entry in entries.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            addrs.push(BackendAddr::parse(entry)?);
        }
        if addrs.is_empty() {
            return Err(GrpcError::InvalidTarget(format!(
                "{target}: no backend addresses"
            )));
        }
        Ok(AddressSet::new(target, addrs))
    }
}

/// Routes a target to the highest-priority available resolver claiming its
/// scheme.
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn NameResolver>>,
}

impl ResolverRegistry {
    /// A registry with the built-in [`AddressResolver`] pre-registered.
    pub fn new() -> Self {
        Self {
            resolvers: vec![Arc::new(AddressResolver)],
        }
    }

    pub fn register(&mut self, resolver: Arc<dyn NameResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolve(&self, target: &str) -> GrpcResult<AddressSet> {
        let scheme = target
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| GrpcError::InvalidTarget(target.to_string()))?;

        let resolver = self
            .resolvers
            .iter()
            .filter(|r| r.scheme() == scheme && r.is_available())
            .max_by_key(|r| r.priority())
            .ok_or_else(|| GrpcError::UnsupportedScheme(scheme.to_string()))?;

        resolver.resolve(target)
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schemes: Vec<&str> = self.resolvers.iter().map(|r| r.scheme()).collect();
        f.debug_struct("ResolverRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}
