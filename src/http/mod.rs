//! HTTP/1.1 message model and codec.
//!
//! # Architecture
//!
//! - **`headers`**: Ordered, case-insensitive header multimap
//! - **`request`**: Request representation, method/version parsing and keep-alive negotiation
//! - **`response`**: Response representation with builder pattern and payload framing
//! - **`parser`**: Incremental request parser over a byte buffer (Content-Length and chunked bodies)
//! - **`reader`**: Pulls whole requests off an async stream under a size limit
//! - **`writer`**: Serializes and writes responses to an async stream
//!
//! The connection lifecycle that drives these lives in [`crate::server`].

pub mod headers;
pub mod parser;
pub mod reader;
pub mod request;
pub mod response;
pub mod writer;

pub use headers::HeaderMap;
pub use reader::{MAX_REQUEST_SIZE, ReadError, RequestReader};
pub use request::{Method, Request, RequestBuilder, Version};
pub use response::{Response, ResponseBuilder, StatusCode};
