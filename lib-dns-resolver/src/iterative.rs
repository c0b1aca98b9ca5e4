//! Iterative resolution (C6): walk the delegation chain from the root
//! hints through referrals, consulting and populating the cache,
//! until a final answer or a definite error is reached.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};

use async_recursion::async_recursion;

use dns_types::protocol::types::{
    DomainName, QueryClass, QueryType, Question, RecordClass, RecordType, RecordTypeWithData,
};

use crate::cache::SharedCache;
use crate::error::ResolutionError;
use crate::resolve::{resolve_one_on_port, Sections};
use crate::roothints::ROOT_HINTS;

#[cfg(not(test))]
const DNS_PORT: u16 = 53;
// Tests can't bind to port 53 without root, so they use a fixed
// unprivileged port across a handful of distinct loopback addresses
// instead - this constant stands in for "the DNS port" throughout the
// walk in both cases.
#[cfg(test)]
const DNS_PORT: u16 = 8053;

fn root_hint_servers() -> Vec<SocketAddr> {
    ROOT_HINTS
        .iter()
        .map(|&ip| SocketAddr::from((ip, DNS_PORT)))
        .collect()
}

/// Resolve `host` as an `A` record, starting from the root hints.
///
/// `host` is canonicalized by appending a trailing dot if it is
/// absent, so both `"example.com"` and `"example.com."` name the same
/// lookup.
///
/// # Errors
///
/// Returns `Malformed` if `host` is not a well-formed domain name, a
/// fatal `ResolutionError` if some server gave a definitive error for
/// the query, or `NoServers` if every candidate was exhausted without
/// an answer.
pub async fn recursive_resolve(
    recursion_limit: usize,
    cache: &SharedCache,
    host: &str,
) -> Result<HashSet<Ipv4Addr>, ResolutionError> {
    let host = canonicalize(host).ok_or(ResolutionError::Malformed)?;
    walk(recursion_limit, cache, &host, &root_hint_servers()).await
}

/// Append a trailing dot if `host` doesn't already have one, then
/// parse it as a domain name.
fn canonicalize(host: &str) -> Option<DomainName> {
    if host.ends_with('.') {
        DomainName::from_dotted_string(host)
    } else {
        DomainName::from_dotted_string(&format!("{host}."))
    }
}

#[async_recursion]
async fn walk(
    recursion_limit: usize,
    cache: &SharedCache,
    host: &DomainName,
    candidates: &[SocketAddr],
) -> Result<HashSet<Ipv4Addr>, ResolutionError> {
    if recursion_limit == 0 {
        tracing::debug!(%host, "hit recursion limit");
        return Err(ResolutionError::RecursionLimit);
    }

    if let Some(addresses) = cache.get(host) {
        tracing::trace!(%host, "cache hit");
        return Ok(addresses);
    }

    let question = Question {
        name: host.clone(),
        qtype: QueryType::Record(RecordType::A),
        qclass: QueryClass::Record(RecordClass::IN),
    };

    let mut last_recoverable = ResolutionError::NoServers;

    for &server in candidates {
        let (ip, port) = match server {
            SocketAddr::V4(v4) => (*v4.ip(), v4.port()),
            SocketAddr::V6(_) => continue,
        };

        let sections = match resolve_one_on_port(ip, port, &question).await {
            Ok(sections) => sections,
            Err(error) if error.is_fatal() => {
                tracing::debug!(%server, %host, %error, "fatal error, aborting walk");
                return Err(error);
            }
            Err(error) => {
                tracing::trace!(%server, %host, %error, "recoverable error, trying next server");
                last_recoverable = error;
                continue;
            }
        };

        match interpret(recursion_limit, cache, host, &sections).await {
            Ok(Some(outcome)) => return Ok(outcome),
            Ok(None) => last_recoverable = ResolutionError::NoServers,
            Err(error) => return Err(error),
        }
    }

    tracing::trace!(%host, "out of candidates");
    Err(last_recoverable)
}

/// Interpret one server's response: terminate on SOA, populate the
/// cache from glue, return an answer set if one is present, or chase
/// a referral. Returns `Ok(None)` when this response yielded nothing
/// usable and the caller should move on to the next candidate server.
async fn interpret(
    recursion_limit: usize,
    cache: &SharedCache,
    host: &DomainName,
    sections: &Sections,
) -> Result<Option<HashSet<Ipv4Addr>>, ResolutionError> {
    if sections
        .authority
        .iter()
        .any(|rr| matches!(rr.rtype_with_data, RecordTypeWithData::SOA { .. }))
    {
        tracing::trace!(%host, "authoritative negative response");
        return Ok(Some(HashSet::new()));
    }

    for rr in &sections.additional {
        if let RecordTypeWithData::A { address } = rr.rtype_with_data {
            cache.insert(&rr.name, address);
        }
    }

    let answers: HashSet<Ipv4Addr> = sections
        .answers
        .iter()
        .filter_map(|rr| match rr.rtype_with_data {
            RecordTypeWithData::A { address } if rr.name == *host => Some(address),
            _ => None,
        })
        .collect();
    if !answers.is_empty() {
        tracing::trace!(%host, "got answer");
        return Ok(Some(answers));
    }

    let ns_names: Vec<DomainName> = sections
        .authority
        .iter()
        .filter_map(|rr| match &rr.rtype_with_data {
            RecordTypeWithData::NS { nsdname } => Some(nsdname.clone()),
            _ => None,
        })
        .collect();
    if ns_names.is_empty() {
        tracing::trace!(%host, "no usable referral in response");
        return Ok(None);
    }

    let mut next_candidates = HashSet::new();
    for ns_name in ns_names {
        match walk(recursion_limit - 1, cache, &ns_name, &root_hint_servers()).await {
            Ok(addresses) => next_candidates.extend(addresses),
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                tracing::trace!(%ns_name, %error, "could not resolve referred nameserver");
            }
        }
    }
    if next_candidates.is_empty() {
        return Ok(None);
    }

    let next_candidates: Vec<SocketAddr> = next_candidates
        .into_iter()
        .map(|ip| SocketAddr::from((ip, DNS_PORT)))
        .collect();
    walk(recursion_limit - 1, cache, host, &next_candidates)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::net::UdpSocket;

    use dns_types::protocol::types::test_util::{a_record, domain, soa_record};
    use dns_types::protocol::types::{Message, Rcode};

    use super::*;

    /// Bind a loopback UDP responder on `ip` that answers every
    /// request with `respond`.
    fn spawn_responder<F>(ip: Ipv4Addr, respond: F) -> SocketAddr
    where
        F: Fn(Message) -> Message + Send + Sync + 'static,
    {
        let sock = std::net::UdpSocket::bind((ip, DNS_PORT)).unwrap();
        sock.set_nonblocking(true).unwrap();
        let addr = sock.local_addr().unwrap();
        let sock = UdpSocket::from_std(sock).unwrap();
        tokio::spawn(async move {
            loop {
                let mut buf = [0u8; 4096];
                let Ok((size, peer)) = sock.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(request) = Message::from_octets(&buf[..size]) else {
                    continue;
                };
                let response = respond(request);
                if let Ok(bytes) = response.to_octets() {
                    let _ = sock.send_to(&bytes, peer).await;
                }
            }
        });
        addr
    }

    /// Bind a loopback socket on `ip` that replies with one garbage
    /// (non-DNS) datagram to the first request it gets.
    fn spawn_garbage_responder(ip: Ipv4Addr) -> SocketAddr {
        let sock = std::net::UdpSocket::bind((ip, DNS_PORT)).unwrap();
        sock.set_nonblocking(true).unwrap();
        let addr = sock.local_addr().unwrap();
        let sock = UdpSocket::from_std(sock).unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            if let Ok((_, peer)) = sock.recv_from(&mut buf).await {
                let _ = sock.send_to(b"not a dns message", peer).await;
            }
        });
        addr
    }

    #[test]
    fn cache_hit_short_circuits_resolution() {
        let cache = SharedCache::new();
        let name = domain("example.com.");
        cache.insert(&name, Ipv4Addr::new(93, 184, 216, 34));

        let got = cache.get(&name).unwrap();
        assert_eq!(1, got.len());
        assert!(got.contains(&Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[tokio::test]
    async fn recursion_limit_of_zero_is_an_immediate_error() {
        let cache = SharedCache::new();
        let host = domain("example.com.");
        assert_eq!(
            Err(ResolutionError::RecursionLimit),
            walk(0, &cache, &host, &root_hint_servers()).await
        );
    }

    #[test]
    fn canonicalize_appends_a_missing_trailing_dot() {
        assert_eq!(Some(domain("example.com.")), canonicalize("example.com"));
        assert_eq!(Some(domain("example.com.")), canonicalize("example.com."));
    }

    #[test]
    fn canonicalize_rejects_a_malformed_host() {
        assert_eq!(None, canonicalize("a..b"));
    }

    #[tokio::test]
    async fn recursive_resolve_accepts_a_host_without_a_trailing_dot() {
        let cache = SharedCache::new();
        assert_eq!(
            Err(ResolutionError::RecursionLimit),
            recursive_resolve(0, &cache, "example.com").await
        );
    }

    #[tokio::test]
    async fn recursive_resolve_rejects_a_malformed_host() {
        let cache = SharedCache::new();
        assert_eq!(
            Err(ResolutionError::Malformed),
            recursive_resolve(10, &cache, "a..b").await
        );
    }

    #[tokio::test]
    async fn direct_answer_from_first_server() {
        let host = domain("example.com.");
        let addr = spawn_responder(Ipv4Addr::new(127, 0, 0, 1), {
            let host = host.clone();
            move |request| {
                let mut response =
                    Message::query(request.header.id, request.questions[0].clone());
                response.header.is_response = true;
                response.answers =
                    vec![a_record(&host.to_dotted_string(), Ipv4Addr::new(93, 184, 216, 34))];
                response
            }
        });

        let cache = SharedCache::new();
        let result = walk(10, &cache, &host, &[addr]).await.unwrap();

        assert_eq!(HashSet::from([Ipv4Addr::new(93, 184, 216, 34)]), result);
    }

    #[tokio::test]
    async fn soa_in_authority_terminates_with_empty_set() {
        let host = domain("nonexistent.example.com.");
        let addr = spawn_responder(Ipv4Addr::new(127, 0, 0, 2), move |request| {
            let mut response = Message::query(request.header.id, request.questions[0].clone());
            response.header.is_response = true;
            response.authority = vec![soa_record("example.com.")];
            response
        });

        let cache = SharedCache::new();
        let result = walk(10, &cache, &host, &[addr]).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn fatal_rcode_aborts_the_whole_walk() {
        let host = domain("nonexistent.invalid.");
        let addr = spawn_responder(Ipv4Addr::new(127, 0, 0, 3), move |request| {
            let mut response = Message::query(request.header.id, request.questions[0].clone());
            response.header.is_response = true;
            response.header.rcode = Rcode::NameError;
            response
        });

        let cache = SharedCache::new();
        let result = walk(10, &cache, &host, &[addr]).await;

        assert_eq!(Err(ResolutionError::NxDomain), result);
    }

    #[tokio::test]
    async fn moves_on_to_the_next_server_after_a_malformed_response() {
        let host = domain("example.com.");
        let bad = spawn_garbage_responder(Ipv4Addr::new(127, 0, 0, 4));
        let good = spawn_responder(Ipv4Addr::new(127, 0, 0, 5), {
            let host = host.clone();
            move |request| {
                let mut response =
                    Message::query(request.header.id, request.questions[0].clone());
                response.header.is_response = true;
                response.answers =
                    vec![a_record(&host.to_dotted_string(), Ipv4Addr::new(1, 1, 1, 1))];
                response
            }
        });

        let cache = SharedCache::new();
        let result = walk(10, &cache, &host, &[bad, good]).await.unwrap();

        assert_eq!(HashSet::from([Ipv4Addr::new(1, 1, 1, 1)]), result);
    }

    #[tokio::test]
    async fn follows_a_referral_using_glue_from_additional_section() {
        let host = domain("www.example.com.");
        let final_server = spawn_responder(Ipv4Addr::new(127, 0, 0, 6), {
            let host = host.clone();
            move |request| {
                let mut response =
                    Message::query(request.header.id, request.questions[0].clone());
                response.header.is_response = true;
                response.answers =
                    vec![a_record(&host.to_dotted_string(), Ipv4Addr::new(2, 2, 2, 2))];
                response
            }
        });
        let final_ip = match final_server {
            SocketAddr::V4(v4) => *v4.ip(),
            SocketAddr::V6(_) => unreachable!(),
        };

        let root = spawn_responder(Ipv4Addr::new(127, 0, 0, 7), {
            move |request| {
                let mut response =
                    Message::query(request.header.id, request.questions[0].clone());
                response.header.is_response = true;
                response.authority =
                    vec![dns_types::protocol::types::test_util::ns_record(
                        "example.com.",
                        "ns1.example.com.",
                    )];
                response.additional =
                    vec![a_record("ns1.example.com.", final_ip)];
                response
            }
        });

        let cache = SharedCache::new();
        let result = walk(10, &cache, &host, &[root]).await.unwrap();

        assert_eq!(HashSet::from([Ipv4Addr::new(2, 2, 2, 2)]), result);
    }
}
