//! The error kinds a resolution attempt can fail with, and their
//! fatal/recoverable classification for the iterative walk.

use dns_types::protocol::types::Rcode;

/// An error arising from resolving a single query, either against one
/// server (`resolve_one`) or while walking the whole delegation chain
/// (`recursive_resolve`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResolutionError {
    /// The server gave a definitive negative or erroneous answer for
    /// the query.  Fatal: the walk must abort rather than try another
    /// server, because the answer is about the query itself rather
    /// than about the server's reachability.
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    YxDomain,
    XrrSet,
    NotAuth,
    NotZone,
    /// No response arrived within the per-attempt timeout. Recoverable.
    Timeout,
    /// The outbound datagram could not be sent. Recoverable.
    SendFailed,
    /// The response had TC=1 set. Recoverable (no TCP retry).
    Truncated,
    /// The response could not be decoded, or its id did not match the
    /// outstanding query. Recoverable.
    Malformed,
    /// The shared recursion-depth budget was exhausted while chasing
    /// a referral or resolving a nameserver's address. Recoverable at
    /// the point it's raised - it just means that branch of the walk
    /// contributes nothing further.
    RecursionLimit,
    /// Every candidate server was tried without producing an answer.
    NoServers,
}

impl ResolutionError {
    /// Fatal errors abort the whole walk immediately with the first
    /// fatal value observed. Recoverable errors move on to the next
    /// candidate server.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            ResolutionError::Timeout
                | ResolutionError::SendFailed
                | ResolutionError::Truncated
                | ResolutionError::Malformed
                | ResolutionError::RecursionLimit
                | ResolutionError::NoServers
        )
    }

    /// Map a response's RCODE to an error, or `None` on NOERROR.
    pub fn from_rcode(rcode: Rcode) -> Option<Self> {
        match rcode {
            Rcode::NoError => None,
            Rcode::FormatError => Some(ResolutionError::FormErr),
            Rcode::ServerFailure => Some(ResolutionError::ServFail),
            Rcode::NameError => Some(ResolutionError::NxDomain),
            Rcode::NotImplemented => Some(ResolutionError::NotImp),
            Rcode::Refused => Some(ResolutionError::Refused),
            Rcode::YXDomain => Some(ResolutionError::YxDomain),
            Rcode::XRRSet => Some(ResolutionError::XrrSet),
            Rcode::NotAuth => Some(ResolutionError::NotAuth),
            Rcode::NotZone => Some(ResolutionError::NotZone),
            Rcode::Reserved(_) => Some(ResolutionError::ServFail),
        }
    }
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolutionError::FormErr => write!(f, "formerr"),
            ResolutionError::ServFail => write!(f, "servfail"),
            ResolutionError::NxDomain => write!(f, "nxdomain"),
            ResolutionError::NotImp => write!(f, "notimp"),
            ResolutionError::Refused => write!(f, "refused"),
            ResolutionError::YxDomain => write!(f, "yxdomain"),
            ResolutionError::XrrSet => write!(f, "xrrset"),
            ResolutionError::NotAuth => write!(f, "notauth"),
            ResolutionError::NotZone => write!(f, "notzone"),
            ResolutionError::Timeout => write!(f, "timed out"),
            ResolutionError::SendFailed => write!(f, "could not send query"),
            ResolutionError::Truncated => write!(f, "response was truncated"),
            ResolutionError::Malformed => write!(f, "response was malformed"),
            ResolutionError::RecursionLimit => write!(f, "hit the recursion limit"),
            ResolutionError::NoServers => write!(f, "no servers were able to answer"),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
