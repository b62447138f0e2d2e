use microserve::config::Config;
use microserve::echo::echo;
use microserve::server::{self, SessionStats};
use tracing::Level;

fn main() {
    let config = Config::load();
    let level = config
        .as_ref()
        .ok()
        .and_then(|cfg| cfg.logging.level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            std::process::exit(-1);
        }
    };

    let status = if config.server.stats {
        server::run_with_reporter(&config.server, echo, |stats: &SessionStats| {
            tracing::info!(
                id = stats.id,
                peer = ?stats.peer,
                requests = stats.requests,
                bytes_read = stats.bytes_read,
                bytes_written = stats.bytes_written,
                duration = ?stats.duration(),
                "Session finished"
            );
        })
    } else {
        server::run(&config.server, echo)
    };

    std::process::exit(status);
}
