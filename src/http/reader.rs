use std::fmt;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::parser::{
    BodyFraming, ChunkedDecoder, ParseError, RequestHead, find_headers_end, parse_head,
};
use crate::http::request::Request;

/// Largest request (head plus body) a session will buffer.
pub const MAX_REQUEST_SIZE: usize = 1_000_000;

const READ_CHUNK: usize = 8192;

#[derive(Debug)]
pub enum ReadError {
    /// The peer closed the stream before sending any byte of a new request.
    EndOfStream,
    /// The peer closed the stream in the middle of a request.
    PartialMessage,
    TooLarge,
    Parse(ParseError),
    Io(std::io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::EndOfStream => write!(f, "end of stream"),
            ReadError::PartialMessage => write!(f, "stream closed mid-request"),
            ReadError::TooLarge => write!(f, "request exceeds size limit"),
            ReadError::Parse(e) => write!(f, "HTTP parse error: {:?}", e),
            ReadError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        ReadError::Io(e)
    }
}

impl From<ParseError> for ReadError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::TooLarge => ReadError::TooLarge,
            e => ReadError::Parse(e),
        }
    }
}

/// Reads whole requests off a byte stream.
///
/// Bytes received past the end of one request stay buffered and form the
/// start of the next, so pipelined requests are served in order.
///
/// Progress on a request is kept across reads: the head is searched for
/// only in bytes not yet looked at and parsed once, and a chunked body is
/// decoded as it arrives. A request trickling in over many small reads
/// costs time linear in its size.
pub struct RequestReader {
    buffer: BytesMut,
    limit: usize,
    /// How much of the buffer the head search has already covered.
    scanned: usize,
    head: Option<RequestHead>,
    chunked: ChunkedDecoder,
}

impl Default for RequestReader {
    fn default() -> Self {
        Self::new(MAX_REQUEST_SIZE)
    }
}

impl RequestReader {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CHUNK),
            limit,
            scanned: 0,
            head: None,
            chunked: ChunkedDecoder::default(),
        }
    }

    /// Reads the next request, returning it with the number of bytes it
    /// took up on the wire.
    pub async fn read_request<S>(&mut self, stream: &mut S) -> Result<(Request, usize), ReadError>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            // Try parsing whatever we already have
            if !self.buffer.is_empty() {
                if let Some(parsed) = self.try_parse()? {
                    return Ok(parsed);
                }
            }

            // Read more data
            self.buffer.reserve(READ_CHUNK);
            let n = stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    ReadError::EndOfStream
                } else {
                    ReadError::PartialMessage
                });
            }
        }
    }

    fn try_parse(&mut self) -> Result<Option<(Request, usize)>, ReadError> {
        if self.head.is_none() {
            // The separator may straddle the previous end of the buffer
            let from = self.scanned.saturating_sub(3);
            match find_headers_end(&self.buffer, from) {
                Some(end) => self.head = Some(parse_head(&self.buffer, end, self.limit)?),
                None => {
                    self.scanned = self.buffer.len();
                    if self.buffer.len() > self.limit {
                        return Err(ReadError::TooLarge);
                    }
                    return Ok(None);
                }
            }
        }

        let Some(head) = &self.head else {
            return Ok(None);
        };
        let section = &self.buffer[head.len..];

        let (body, body_len) = match head.framing {
            BodyFraming::Length(len) => {
                if section.len() < len {
                    return Ok(None);
                }
                (section[..len].to_vec(), len)
            }
            BodyFraming::Chunked => match self.chunked.decode(section, self.limit - head.len) {
                Ok(used) => (std::mem::take(&mut self.chunked).into_body(), used),
                Err(ParseError::Incomplete) => return Ok(None),
                Err(e) => return Err(e.into()),
            },
        };

        let consumed = head.len + body_len;
        let request = self.head.take().map(|head| head.into_request(body));

        self.buffer.advance(consumed);
        self.scanned = 0;

        Ok(request.map(|request| (request, consumed)))
    }
}
