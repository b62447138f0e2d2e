//! Minimal HTTP client used by the session and server tests.

#![allow(dead_code)]

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug)]
pub struct TestResponse {
    pub status_line: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

pub struct Client<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, raw: &[u8]) {
        self.stream.write_all(raw).await.unwrap();
    }

    /// Sends without failing when the server has already hung up.
    pub async fn try_send(&mut self, raw: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(raw).await
    }

    pub async fn finish(&mut self) {
        self.stream.shutdown().await.unwrap();
    }

    /// Reads one Content-Length framed response. `None` means the server
    /// closed the connection without sending anything more.
    pub async fn response(&mut self) -> Option<TestResponse> {
        loop {
            if let Some(resp) = self.try_parse() {
                return Some(resp);
            }

            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                assert!(self.buf.is_empty(), "connection closed mid-response");
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// True when the server has closed its side and sent nothing further.
    pub async fn is_closed(&mut self) -> bool {
        self.response().await.is_none()
    }

    fn try_parse(&mut self) -> Option<TestResponse> {
        let end = self.buf.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = std::str::from_utf8(&self.buf[..end]).unwrap().to_string();
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap().to_string();
        let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();

        let headers: Vec<(String, String)> = lines
            .map(|line| {
                let (k, v) = line.split_once(':').unwrap();
                (k.trim().to_string(), v.trim().to_string())
            })
            .collect();

        let len = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .map(|(_, v)| v.parse::<usize>().unwrap())
            .unwrap_or(0);

        if self.buf.len() < end + 4 + len {
            return None;
        }

        let body = self.buf[end + 4..end + 4 + len].to_vec();
        self.buf.drain(..end + 4 + len);

        Some(TestResponse {
            status_line,
            status,
            headers,
            body,
        })
    }
}

pub fn post(target: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {} HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{}",
        target,
        body.len(),
        body
    )
    .into_bytes()
}

pub fn get(target: &str) -> Vec<u8> {
    format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", target).into_bytes()
}
