use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use line_transducer::TransducerConfig;
use relay_pipe::PipeOptions;

use crate::error::RelayError;

#[derive(Parser)]
#[command(name = "metric-relay", about = "Прокси graphite-строк с фильтрацией и aggregate")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Принимать соединения и проксировать их в collector
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "METRIC_RELAY_CONFIG")]
    pub config: String,

    /// Адрес для входящих соединений, напр. 0.0.0.0:2003
    #[arg(long, env = "METRIC_RELAY_LISTEN")]
    pub listen: Option<String>,

    /// Адрес collector'а, напр. localhost:2008
    #[arg(long, env = "METRIC_RELAY_UPSTREAM")]
    pub upstream: Option<String>,

    /// Обслужить одно соединение и завершиться
    #[arg(long, env = "METRIC_RELAY_ONCE")]
    pub once: bool,

    /// Отражать трафик в лог (target relay::traffic, debug)
    #[arg(long, env = "METRIC_RELAY_DISPLAY")]
    pub display: bool,

    /// Вставлять сегмент с последним значением в path пересылаемых записей
    #[arg(long, env = "METRIC_RELAY_REWRITE_PATHS")]
    pub rewrite_paths: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    pub listen: Option<String>,
    pub upstream: Option<String>,
    pub once: Option<bool>,
    pub display: Option<bool>,
    pub shutdown_grace_ms: Option<u64>,
    pub read_buffer: Option<usize>,
    #[serde(default)]
    pub transducer: TransducerConfig,
}

impl RelayConfig {
    pub fn load(path: &str) -> Result<Self, RelayError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| RelayError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub listen: String,
    pub upstream: String,
    pub once: bool,
    pub shutdown_grace: Duration,
    pub pipe: PipeOptions,
    pub transducer: TransducerConfig,
}

impl Effective {
    pub fn new(args: &ServeArgs) -> Result<Self, RelayError> {
        let cfg = match RelayConfig::load(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                tracing::debug!(config = %args.config, "config file not found, using defaults");
                RelayConfig::default()
            }
        };

        let mut transducer = cfg.transducer;
        transducer.rewrite_path_segments |= args.rewrite_paths;
        transducer.validate()?;

        let read_buffer = cfg.read_buffer.unwrap_or(4096);
        if read_buffer == 0 {
            return Err(RelayError::Config { context: "validate", detail: "read_buffer must be > 0".into() });
        }

        Ok(Self {
            listen: args.listen.clone().or(cfg.listen).unwrap_or_else(|| "0.0.0.0:2003".into()),
            upstream: args.upstream.clone().or(cfg.upstream).unwrap_or_else(|| "localhost:2008".into()),
            once: args.once || cfg.once.unwrap_or(false),
            shutdown_grace: Duration::from_millis(cfg.shutdown_grace_ms.unwrap_or(2000)),
            pipe: PipeOptions {
                read_buffer,
                display: args.display || cfg.display.unwrap_or(false),
            },
            transducer,
        })
    }
}
