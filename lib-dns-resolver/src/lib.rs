#![warn(clippy::pedantic)]
// Sometimes a redundant else is clearer
#![allow(clippy::redundant_else)]
// Don't care enough to fix
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod cache;
pub mod error;
pub mod iterative;
pub mod resolve;
pub mod roothints;
pub mod transport;

use std::collections::HashSet;
use std::net::Ipv4Addr;

use self::cache::SharedCache;
use self::error::ResolutionError;

/// Maximum recursion depth for the referral walk, shared between the
/// top-level host and every nameserver name it has to chase down
/// along the way.
///
/// This protects against a maliciously- or badly-configured upstream
/// nameserver returning an endless chain of referrals.
pub const RECURSION_LIMIT: usize = 32;

/// Resolve a host name to its `A` record address set, walking the DNS
/// hierarchy from the root hints.
///
/// `host` is canonicalized by appending a trailing dot if absent, so
/// both `"example.com"` and `"example.com."` are accepted.
///
/// # Errors
///
/// See [`ResolutionError`].
pub async fn resolve(
    cache: &SharedCache,
    host: &str,
) -> Result<HashSet<Ipv4Addr>, ResolutionError> {
    iterative::recursive_resolve(RECURSION_LIMIT, cache, host).await
}
