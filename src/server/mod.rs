//! Connection lifecycle.
//!
//! ```text
//!   Runner ── binds ──▶ Listener ── spawns per connection ──▶ Session
//!                                                               │
//!        ┌──────────────────────────────────────────────────────┘
//!        ▼
//!   Reading ──▶ Dispatching ──▶ Writing ──┬─ keep-alive ──▶ Reading
//!      │                                  └─ need EOF ───▶ HalfClosed ──▶ Closed
//!      ├─ peer EOF ─────────────────────────────────────▶ HalfClosed
//!      └─ parse / size / I/O error ──────────────────────────────────────▶ Closed
//! ```

pub mod handler;
pub mod listener;
pub mod runner;
pub mod session;
pub mod stats;

pub use handler::Handler;
pub use listener::Listener;
pub use runner::{ShutdownSignals, run, run_with_reporter, serve};
pub use session::Session;
pub use stats::{NoReporter, Reporter, SessionStats};
