//! Network-filter crate: SSRF protection for outbound proxy fetches.
//!
//! The guard checks a target's scheme, resolves its host, and refuses any
//! target whose addresses fall in a blocked range (loopback, private,
//! link-local, unspecified, and their IPv6 counterparts).
//!
//! DNS rebinding between the check and the actual connect is a known
//! residual risk: the fetcher reconnects by hostname, so a resolver that
//! answers differently the second time is not caught here.

pub mod error;
pub mod guard;
pub mod ranges;

pub use {
    error::{Rejection, Result},
    guard::{HostResolver, SsrfGuard, SystemResolver, ValidatedUrl},
    ranges::is_blocked_ip,
};
