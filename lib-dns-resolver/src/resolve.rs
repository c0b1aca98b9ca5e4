//! Single-server resolution (C5): ask one nameserver one question,
//! validate the reply, and classify it.

use std::net::Ipv4Addr;

use rand::Rng;

use dns_types::protocol::types::{Message, Question, ResourceRecord};

use crate::error::ResolutionError;
use crate::transport;

/// The three record sections of a response that answered its query
/// (RCODE NOERROR, id matched, not truncated).
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Sections {
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

/// Ask `server` the given `question` on the standard DNS port.
///
/// # Errors
///
/// Returns the mapped RCODE error if the server gave a definitive
/// negative answer, or a transport/codec error if the exchange could
/// not be completed or the response could not be trusted.
pub async fn resolve_one(
    server: Ipv4Addr,
    question: &Question,
) -> Result<Sections, ResolutionError> {
    resolve_one_on_port(server, 53, question).await
}

/// Like `resolve_one`, but to an arbitrary port - used by the
/// iterative resolver's tests to talk to loopback responders without
/// root privileges.
pub(crate) async fn resolve_one_on_port(
    server: Ipv4Addr,
    port: u16,
    question: &Question,
) -> Result<Sections, ResolutionError> {
    let id = rand::thread_rng().gen();
    let request = Message::query(id, question.clone());

    let request_bytes = request.to_octets().map_err(|error| {
        tracing::warn!(?error, "could not serialise query");
        ResolutionError::Malformed
    })?;

    let response_bytes = transport::exchange_to_port(server, port, &request_bytes).await?;

    let response = Message::from_octets(&response_bytes).map_err(|error| {
        tracing::debug!(%server, ?error, "could not parse response");
        ResolutionError::Malformed
    })?;

    if response.header.id != id {
        tracing::debug!(%server, expected = %id, actual = %response.header.id, "response id mismatch");
        return Err(ResolutionError::Malformed);
    }
    if !response.header.is_response {
        tracing::debug!(%server, "response QR bit not set");
        return Err(ResolutionError::Malformed);
    }
    if response.header.is_truncated {
        tracing::debug!(%server, "response truncated");
        return Err(ResolutionError::Truncated);
    }

    if let Some(error) = ResolutionError::from_rcode(response.header.rcode) {
        return Err(error);
    }

    Ok(Sections {
        answers: response.answers,
        authority: response.authority,
        additional: response.additional,
    })
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::net::UdpSocket;

    use super::*;
    use dns_types::protocol::types::test_util::{a_record, domain};
    use dns_types::protocol::types::{QueryClass, QueryType, Rcode, RecordClass, RecordType};

    fn question() -> Question {
        Question {
            name: domain("example.com."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        }
    }

    /// Bind a loopback UDP socket, answer exactly one request with
    /// `respond`, and return the port it's listening on.
    async fn spawn_responder<F>(respond: F) -> u16
    where
        F: FnOnce(Message) -> Message + Send + 'static,
    {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = sock.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let (size, peer) = sock.recv_from(&mut buf).await.unwrap();
            let request = Message::from_octets(&buf[..size]).unwrap();
            let response = respond(request);
            let bytes = response.to_octets().unwrap();
            sock.send_to(&bytes, peer).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn resolve_one_returns_answer() {
        let q = question();
        let port = spawn_responder({
            let q = q.clone();
            move |request| {
                let mut response = Message::query(request.header.id, q.clone());
                response.header.is_response = true;
                response.answers =
                    vec![a_record("example.com.", Ipv4Addr::new(93, 184, 216, 34))];
                response
            }
        })
        .await;

        let sections = resolve_one_on_port(Ipv4Addr::new(127, 0, 0, 1), port, &q)
            .await
            .unwrap();
        assert_eq!(
            vec![a_record("example.com.", Ipv4Addr::new(93, 184, 216, 34))],
            sections.answers
        );
    }

    #[tokio::test]
    async fn resolve_one_surfaces_rcode_as_error() {
        let q = question();
        let port = spawn_responder({
            let q = q.clone();
            move |request| {
                let mut response = Message::query(request.header.id, q.clone());
                response.header.is_response = true;
                response.header.rcode = Rcode::NameError;
                response
            }
        })
        .await;

        assert_eq!(
            Err(ResolutionError::NxDomain),
            resolve_one_on_port(Ipv4Addr::new(127, 0, 0, 1), port, &q).await
        );
    }

    #[tokio::test]
    async fn resolve_one_rejects_mismatched_id() {
        let q = question();
        let port = spawn_responder({
            let q = q.clone();
            move |request| {
                let mut response = Message::query(request.header.id.wrapping_add(1), q.clone());
                response.header.is_response = true;
                response
            }
        })
        .await;

        assert_eq!(
            Err(ResolutionError::Malformed),
            resolve_one_on_port(Ipv4Addr::new(127, 0, 0, 1), port, &q).await
        );
    }

    #[tokio::test]
    async fn resolve_one_rejects_truncated_response() {
        let q = question();
        let port = spawn_responder({
            let q = q.clone();
            move |request| {
                let mut response = Message::query(request.header.id, q.clone());
                response.header.is_response = true;
                response.header.is_truncated = true;
                response
            }
        })
        .await;

        assert_eq!(
            Err(ResolutionError::Truncated),
            resolve_one_on_port(Ipv4Addr::new(127, 0, 0, 1), port, &q).await
        );
    }

    #[test]
    fn question_has_expected_shape() {
        let q = question();
        assert_eq!(QueryType::Record(RecordType::A), q.qtype);
        assert_eq!(QueryClass::Record(RecordClass::IN), q.qclass);
    }
}
