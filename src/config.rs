use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use serde::Deserialize;

use crate::error::{DnsError, Result};

const DEFAULT_BIND: &str = "127.0.0.1:2053";
const DEFAULT_TIMEOUT_MS: u64 = 2000;
const DEFAULT_LOG_LEVEL: &str = "INFO";

/// How replies to a split multi-question query are put back together.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Strip each reply's header and concatenate the rest.
    Splice,
    /// Parse each reply and write questions then answers afresh.
    Reencode,
}

#[derive(Parser, Debug, Default)]
#[command(name = "easyforward", version, about = "Forwards DNS queries to an upstream resolver")]
pub struct Cli {
    /// Upstream resolver in the form <ip>:<port>
    #[arg(short = 'r', long, value_name = "ADDR")]
    pub resolver: Option<String>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on [default: 127.0.0.1:2053]
    #[arg(short = 'b', long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Upstream read deadline in milliseconds [default: 2000]
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Reassembly of multi-question queries [default: reencode]
    #[arg(long, value_enum)]
    pub merge: Option<MergeStrategy>,

    /// Log level [default: INFO]
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind: Option<String>,
    resolver: Option<String>,
    upstream_timeout_ms: Option<u64>,
    merge_strategy: Option<MergeStrategy>,
    log_level: Option<String>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| DnsError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        FileConfig::from_toml(&text)
    }

    fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DnsError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub resolver: SocketAddr,
    pub upstream_timeout: Duration,
    pub merge_strategy: MergeStrategy,
    pub log_level: LevelFilter,
}

impl Config {
    /// Command line beats config file beats defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Config::merge(cli, file)
    }

    fn merge(cli: &Cli, file: FileConfig) -> Result<Self> {
        let resolver = cli
            .resolver
            .clone()
            .or(file.resolver)
            .ok_or_else(|| DnsError::Config("no resolver given, use --resolver <ip:port>".into()))?;
        let bind = cli
            .bind
            .clone()
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let timeout_ms = cli
            .timeout_ms
            .or(file.upstream_timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(DnsError::Config("upstream timeout must be greater than zero".into()));
        }
        let log_level = cli
            .log_level
            .clone()
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Config {
            bind: parse_addr("bind", &bind)?,
            resolver: parse_addr("resolver", &resolver)?,
            upstream_timeout: Duration::from_millis(timeout_ms),
            merge_strategy: cli
                .merge
                .or(file.merge_strategy)
                .unwrap_or(MergeStrategy::Reencode),
            log_level: LevelFilter::from_str(&log_level)
                .map_err(|_| DnsError::Config(format!("unknown log level {:?}", log_level)))?,
        })
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|_| DnsError::Config(format!("{} {:?} is not an <ip>:<port> address", key, value)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use log::LevelFilter;

    use crate::config::{Cli, Config, FileConfig, MergeStrategy};
    use crate::error::DnsError;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["easyforward"];
        argv.extend(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn should_use_defaults_when_call_load_given_only_resolver() {
        let config = Config::load(&cli(&["--resolver", "8.8.8.8:53"])).unwrap();

        assert_eq!("8.8.8.8:53".parse::<std::net::SocketAddr>().unwrap(), config.resolver);
        assert_eq!("127.0.0.1:2053".parse::<std::net::SocketAddr>().unwrap(), config.bind);
        assert_eq!(Duration::from_millis(2000), config.upstream_timeout);
        assert_eq!(MergeStrategy::Reencode, config.merge_strategy);
        assert_eq!(LevelFilter::Info, config.log_level);
    }

    #[test]
    fn should_return_config_error_when_call_load_given_no_resolver() {
        let result = Config::load(&cli(&[]));

        assert!(matches!(result, Err(DnsError::Config(_))));
    }

    #[test]
    fn should_return_config_error_when_call_load_given_resolver_without_port() {
        let result = Config::load(&cli(&["--resolver", "8.8.8.8"]));

        assert!(matches!(result, Err(DnsError::Config(_))));
    }

    #[test]
    fn should_prefer_command_line_when_call_merge_given_file_and_flags() {
        let file = FileConfig::from_toml(
            r#"
            bind = "0.0.0.0:53"
            resolver = "1.1.1.1:53"
            upstream_timeout_ms = 500
            merge_strategy = "splice"
            log_level = "debug"
            "#,
        )
        .unwrap();
        let flags = cli(&["--resolver", "9.9.9.9:53", "--merge", "reencode"]);

        let config = Config::merge(&flags, file).unwrap();

        assert_eq!("9.9.9.9:53".parse::<std::net::SocketAddr>().unwrap(), config.resolver);
        assert_eq!("0.0.0.0:53".parse::<std::net::SocketAddr>().unwrap(), config.bind);
        assert_eq!(Duration::from_millis(500), config.upstream_timeout);
        assert_eq!(MergeStrategy::Reencode, config.merge_strategy);
        assert_eq!(LevelFilter::Debug, config.log_level);
    }

    #[test]
    fn should_return_config_error_when_call_from_toml_given_unknown_key() {
        let result = FileConfig::from_toml("servers = [\"8.8.8.8:53\"]");

        assert!(matches!(result, Err(DnsError::Config(_))));
    }

    #[test]
    fn should_return_config_error_when_call_load_given_zero_timeout_or_bad_level() {
        let zero = Config::load(&cli(&["-r", "8.8.8.8:53", "--timeout-ms", "0"]));
        let level = Config::load(&cli(&["-r", "8.8.8.8:53", "--log-level", "loud"]));

        assert!(matches!(zero, Err(DnsError::Config(_))));
        assert!(matches!(level, Err(DnsError::Config(_))));
    }

    #[test]
    fn should_return_config_error_when_call_load_given_missing_file() {
        let path = std::env::temp_dir().join("easyforward-no-such-config.toml");
        let path = path.to_string_lossy().into_owned();

        let result = Config::load(&cli(&["--resolver", "8.8.8.8:53", "--config", &path]));

        match result {
            Err(DnsError::Config(message)) => assert!(message.contains("cannot read")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
