//! CLI flag surface (A2), parsed with `clap`'s derive API.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "whisper-server", version, about = "Local Whisper speech-to-text server")]
pub struct CliArgs {
    /// Bind host.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Configured Whisper model id (e.g. `whisper-base`, `base`).
    #[arg(long)]
    pub model: Option<String>,

    /// Default transcription language (`auto` to detect).
    #[arg(long)]
    pub language: Option<String>,

    /// Per-request timeout, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum number of in-flight transcriptions.
    #[arg(long = "max-concurrent")]
    pub max_concurrent: Option<usize>,

    /// Maximum time a request may wait for an admission slot, in seconds.
    #[arg(long = "queue-wait")]
    pub queue_wait: Option<u64>,

    /// Maximum accepted upload size, in megabytes.
    #[arg(long = "max-file-size-mb")]
    pub max_file_size_mb: Option<u64>,

    /// Inference device: auto, cpu, or gpu.
    #[arg(long)]
    pub device: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Explicit config file path (highest-precedence file source).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Download the given model id and exit, without starting the server.
    #[arg(long)]
    pub download: Option<String>,
}

impl CliArgs {
    /// Project the flags the user actually set into a flat JSON object, so
    /// merging this as a config layer never clobbers unset fields.
    pub fn as_overrides(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        macro_rules! put {
            ($field:expr, $key:literal) => {
                if let Some(v) = &$field {
                    map.insert($key.to_string(), serde_json::json!(v));
                }
            };
        }
        put!(self.host, "host");
        put!(self.port, "port");
        put!(self.model, "modelId");
        put!(self.language, "language");
        put!(self.timeout, "requestTimeoutSec");
        put!(self.max_concurrent, "maxConcurrent");
        put!(self.queue_wait, "queueWaitSec");
        put!(self.max_file_size_mb, "maxFileSizeMb");
        put!(self.device, "device");
        put!(self.log_level, "logLevel");
        serde_json::Value::Object(map)
    }
}
