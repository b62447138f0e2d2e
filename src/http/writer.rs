use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::request::Version;
use crate::http::response::Response;

/// Serializes a response, emitting the `Connection` header from its
/// keep-alive flag wherever the version default would say otherwise.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in resp.headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    match (resp.version, resp.keep_alive) {
        (Version::Http11, false) => buf.extend_from_slice(b"Connection: close\r\n"),
        (Version::Http10, true) => buf.extend_from_slice(b"Connection: keep-alive\r\n"),
        _ => {}
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    /// Total size of the serialized response.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes whatever is left of the response, returning once every byte
    /// has been handed to the stream.
    pub async fn write_to_stream<S>(&mut self, stream: &mut S) -> anyhow::Result<usize>
    where
        S: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;

        Ok(self.written)
    }
}
