//! Runs the real binary and checks how it reacts to termination signals.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

struct Server {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl Server {
    fn start(port: &str) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_microserve"))
            .env("PORT", port)
            .env_remove("MICROSERVE_CONFIG")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        // Keep draining stdout so logging never blocks the server
        let stdout = child.stdout.take().unwrap();
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self { child, lines }
    }

    /// Blocks until a log line containing `needle` shows up.
    fn wait_for(&self, needle: &str) -> String {
        let deadline = Instant::now() + WAIT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(left) {
                Ok(line) if line.contains(needle) => return line,
                Ok(_) => {}
                Err(_) => panic!("server never logged {:?}", needle),
            }
        }
    }

    /// Port the server bound to, taken from its listening line.
    fn port(&self) -> u16 {
        let line = self.wait_for("Listening");
        let at = line.find("0.0.0.0:").expect("listening line carries the address") + 8;
        line[at..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap()
    }

    fn signal(&self, name: &str) {
        let status = Command::new("kill")
            .arg(format!("-{}", name))
            .arg(self.child.id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    fn exit_code(mut self) -> Option<i32> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.code();
            }
            if Instant::now() > deadline {
                let _ = self.child.kill();
                panic!("server did not exit");
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

fn get_hello(port: u16) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    stream.write_all(b"GET /hi HTTP/1.1\r\n\r\n").unwrap();

    let mut buf = [0u8; 1024];
    let mut received = String::new();
    while !received.ends_with(r#"{"hello": "/hi"}"#) {
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "connection closed early");
        received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
    }
    (stream, received)
}

#[test]
fn test_sigterm_exits_cleanly_with_open_session() {
    let server = Server::start("0");
    let port = server.port();

    // Keep-alive session left open across the shutdown
    let (_open, response) = get_hello(port);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    server.signal("TERM");
    assert!(server.wait_for("Shutdown signal received").contains("SIGTERM"));
    assert_eq!(server.exit_code(), Some(0));
}

#[test]
fn test_sigint_exits_cleanly() {
    let server = Server::start("0");
    server.wait_for("Listening");

    server.signal("INT");
    assert!(server.wait_for("Shutdown signal received").contains("SIGINT"));
    assert_eq!(server.exit_code(), Some(0));
}

#[test]
fn test_invalid_port_exits_with_failure() {
    let server = Server::start("notaport");
    server.wait_for("Invalid configuration");

    // exit(-1) surfaces as 255
    assert_eq!(server.exit_code(), Some(255));
}
