//! HTTP surface of the proxy.
//!
//! `GET|POST <proxy_path>?url=<target>` fetches the target through the SSRF
//! guard and upstream fetcher, rewrites successful HTML so every reference
//! comes back through the proxy, and relays everything else unchanged.

pub mod error;
pub mod handler;
pub mod server;
pub mod state;
pub mod target;

pub use {
    error::ProxyError,
    server::{build_proxy_app, start_proxy},
    state::ProxyState,
};
