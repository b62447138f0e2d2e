use crate::http::headers::HeaderMap;
use crate::http::request::Version;

/// HTTP status codes supported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 100 Continue
    Continue,
    /// 200 OK
    Ok,
    /// 204 No Content
    NoContent,
    /// 304 Not Modified
    NotModified,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use microserve::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Continue => 100,
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::NotModified => 304,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Continue => "Continue",
            StatusCode::Ok => "OK",
            StatusCode::NoContent => "No Content",
            StatusCode::NotModified => "Not Modified",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Statuses that never carry a message body (1xx, 204, 304).
    pub fn is_bodiless(&self) -> bool {
        let code = self.as_u16();
        (100..200).contains(&code) || code == 204 || code == 304
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// `keep_alive` is owned by the session: whatever a handler stores there is
/// replaced with the request's negotiated value before the response is
/// written.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub keep_alive: bool,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new HTTP/1.1 response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// Framing headers are not computed here; see [`Response::prepare_payload`].
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            version: self.version,
            headers: self.headers,
            body: self.body,
            keep_alive: true,
        }
    }
}

impl Response {
    /// Creates an empty response for the given status and version.
    pub fn new(status: StatusCode, version: Version) -> Self {
        ResponseBuilder::new(status).version(version).build()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Computes payload framing from the buffered body.
    ///
    /// The body is always fully buffered, so any `Transfer-Encoding` a
    /// handler set is dropped in favour of an exact `Content-Length`.
    /// Bodiless statuses lose both the header and the body.
    pub fn prepare_payload(&mut self) {
        self.headers.remove("Transfer-Encoding");

        if self.status.is_bodiless() {
            self.body.clear();
            self.headers.remove("Content-Length");
        } else {
            self.headers
                .insert("Content-Length", self.body.len().to_string());
        }
    }

    /// Sets the keep-alive flag, discarding any `Connection` header the
    /// handler wrote. The writer emits the header from the flag.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.headers.remove("Connection");
        self.keep_alive = keep_alive;
    }

    /// True when the connection has to end after this response is written.
    pub fn need_eof(&self) -> bool {
        if !self.keep_alive {
            return true;
        }

        if self.status.is_bodiless() {
            return false;
        }

        let framed = self
            .headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .is_some_and(|len| len == self.body.len());

        !framed
    }
}
