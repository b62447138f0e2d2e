use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidVersion,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunk,
    /// The message is, or has declared itself to be, larger than the limit.
    TooLarge,
    Incomplete,
}

/// How the body of a request is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// Exactly this many bytes follow the head (0 when nothing was declared).
    Length(usize),
    Chunked,
}

/// Request line and headers, parsed before any of the body is needed.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    /// Bytes taken by the head, blank line included.
    pub len: usize,
    pub framing: BodyFraming,
}

impl RequestHead {
    pub fn into_request(self, body: Vec<u8>) -> Request {
        Request {
            method: self.method,
            target: self.target,
            version: self.version,
            headers: self.headers,
            body,
        }
    }
}

/// Parses one request from the front of `buf` with no size limit.
///
/// On success returns the request and the number of bytes it occupied, so
/// the caller can keep whatever follows for the next request.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse_http_request_limited(buf, usize::MAX)
}

/// Parses one request, failing with [`ParseError::TooLarge`] as soon as the
/// head or the declared message size goes past `limit` bytes.
pub fn parse_http_request_limited(
    buf: &[u8],
    limit: usize,
) -> Result<(Request, usize), ParseError> {
    let headers_end = match find_headers_end(buf, 0) {
        Some(end) => end,
        None => return Err(incomplete(buf.len(), limit)),
    };
    let head = parse_head(buf, headers_end, limit)?;

    let body_bytes = &buf[head.len..];
    let body_limit = limit - head.len;

    match head.framing {
        BodyFraming::Length(len) => {
            if body_bytes.len() < len {
                return Err(ParseError::Incomplete);
            }
            let consumed = head.len + len;
            Ok((head.into_request(body_bytes[..len].to_vec()), consumed))
        }
        BodyFraming::Chunked => {
            let mut decoder = ChunkedDecoder::default();
            let consumed = head.len + decoder.decode(body_bytes, body_limit)?;
            Ok((head.into_request(decoder.into_body()), consumed))
        }
    }
}

/// Finds the `\r\n\r\n` that ends the head, looking no earlier than `from`.
///
/// Returns the offset of the separator itself, so the head is
/// `headers_end + 4` bytes long.
pub fn find_headers_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| from + i)
}

/// Parses the request line and headers of a head ending at `headers_end`
/// and works out how its body is framed.
///
/// A declared `Content-Length` that cannot fit under `limit` together with
/// the head is rejected here, before any of the body arrives.
pub fn parse_head(buf: &[u8], headers_end: usize, limit: usize) -> Result<RequestHead, ParseError> {
    let head_len = headers_end + 4;
    if head_len > limit {
        return Err(ParseError::TooLarge);
    }

    let headers_str = std::str::from_utf8(&buf[..headers_end])
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let version = Version::parse(version_str).ok_or(ParseError::InvalidVersion)?;

    // Headers
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        if key.is_empty() || key.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    // Body framing
    let chunked = is_chunked(&headers)?;
    let content_length = declared_content_length(&headers)?;

    let framing = match (chunked, content_length) {
        (true, Some(_)) => return Err(ParseError::InvalidRequest),
        (true, None) => BodyFraming::Chunked,
        (false, len) => BodyFraming::Length(len.unwrap_or(0)),
    };

    if let BodyFraming::Length(len) = framing {
        if len > limit - head_len {
            return Err(ParseError::TooLarge);
        }
    }

    Ok(RequestHead {
        method,
        target: target.to_string(),
        version,
        headers,
        len: head_len,
        framing,
    })
}

fn incomplete(buffered: usize, limit: usize) -> ParseError {
    if buffered > limit {
        ParseError::TooLarge
    } else {
        ParseError::Incomplete
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Chunked must be the final transfer coding; any other coding leaves the
/// request without a usable length.
fn is_chunked(headers: &HeaderMap) -> Result<bool, ParseError> {
    let last = headers
        .get_all("Transfer-Encoding")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last();

    match last {
        None => Ok(false),
        Some(coding) if coding.eq_ignore_ascii_case("chunked") => Ok(true),
        Some(_) => Err(ParseError::InvalidRequest),
    }
}

/// Every Content-Length value (including comma-joined repeats) has to
/// agree.
fn declared_content_length(headers: &HeaderMap) -> Result<Option<usize>, ParseError> {
    let mut declared = None;

    for value in headers.get_all("Content-Length").flat_map(|v| v.split(',')) {
        let len = value
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?;

        match declared {
            Some(prev) if prev != len => return Err(ParseError::InvalidContentLength),
            _ => declared = Some(len),
        }
    }

    Ok(declared)
}

#[derive(Debug, Clone, Copy, Default)]
enum ChunkState {
    #[default]
    Size,
    Data(usize),
    Trailers,
}

/// Decodes a chunked body that may arrive over several reads.
///
/// Each call to [`decode`](Self::decode) must see the same chunked section
/// as the previous one, possibly with more bytes appended. Work already
/// done is kept between calls, so nothing is decoded or searched twice.
#[derive(Debug, Default)]
pub struct ChunkedDecoder {
    body: Vec<u8>,
    /// Offset of the first byte not yet decoded.
    pos: usize,
    /// Line searches resume here.
    scanned: usize,
    state: ChunkState,
}

impl ChunkedDecoder {
    /// Decodes as much of `buf` as is available. Returns the length of the
    /// whole chunked section once its last trailer line is in, or
    /// [`ParseError::Incomplete`] when more bytes are needed.
    ///
    /// Chunk extensions are ignored and trailers are skipped.
    pub fn decode(&mut self, buf: &[u8], limit: usize) -> Result<usize, ParseError> {
        loop {
            match self.state {
                ChunkState::Size => {
                    let line_end = self.find_line(buf, limit)?;
                    let line = std::str::from_utf8(&buf[self.pos..line_end])
                        .map_err(|_| ParseError::InvalidChunk)?;
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    let size =
                        usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;

                    self.pos = line_end + 2;
                    self.state = if size == 0 {
                        ChunkState::Trailers
                    } else {
                        ChunkState::Data(size)
                    };
                }

                ChunkState::Data(size) => {
                    let data_end = self.pos.checked_add(size).ok_or(ParseError::TooLarge)?;
                    if data_end > limit {
                        return Err(ParseError::TooLarge);
                    }
                    if buf.len() < data_end + 2 {
                        return Err(ParseError::Incomplete);
                    }
                    if &buf[data_end..data_end + 2] != b"\r\n" {
                        return Err(ParseError::InvalidChunk);
                    }

                    self.body.extend_from_slice(&buf[self.pos..data_end]);
                    self.pos = data_end + 2;
                    self.state = ChunkState::Size;
                }

                ChunkState::Trailers => {
                    let end = self.find_line(buf, limit)?;
                    let last = end == self.pos;
                    self.pos = end + 2;
                    if last {
                        return Ok(self.pos);
                    }
                }
            }
        }
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    fn find_line(&mut self, buf: &[u8], limit: usize) -> Result<usize, ParseError> {
        let from = self.scanned.max(self.pos);
        match find_crlf(&buf[from..]) {
            Some(i) => Ok(from + i),
            None => {
                // A trailing '\r' may still pair with the next byte
                self.scanned = buf.len().saturating_sub(1).max(self.pos);
                Err(incomplete(buf.len(), limit))
            }
        }
    }
}
