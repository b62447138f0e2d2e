//! microserve - minimal HTTP/1.1 keep-alive server runtime
//!
//! Accepts TCP connections and runs each one as a persistent session that
//! reads a request, hands it to an async [`Handler`](server::Handler),
//! writes the response and decides whether to continue.

pub mod config;
pub mod echo;
pub mod http;
pub mod server;
