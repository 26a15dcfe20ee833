use env_logger::{Env, Target};
use log::SetLoggerError;
use std::io::Write;

/// Default filter for a verbosity count from `-v` flags. `RUST_LOG` wins.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn format_log_line(timestamp_ms: u64, level: log::Level, message: &str) -> String {
    format!(
        "{} [{}] {}",
        timestamp_ms,
        level.as_str(),
        message.replace('\n', "\\n")
    )
}

pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(verbosity)));
    builder.target(Target::Stderr);
    builder.format(|buf, record| {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let message = record.args().to_string();
        writeln!(buf, "{}", format_log_line(timestamp_ms, record.level(), &message))
    });
    builder.try_init()
}

pub fn write_fallback_line(message: &str) {
    eprintln!("[taskboard.log_bridge] {}", message);
}
