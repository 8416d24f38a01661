use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::{IgnoreRules, TrackingRules, UnregisterPolicy};
use crate::cli::RunArgs;
use crate::export::DocFormat;
use crate::registry::NodeFilter;
use crate::upstream::DEFAULT_TIMEOUT;

pub const CONFIG_FILENAME: &str = ".autodoc-proxy.toml";

pub const DEFAULT_MASTER_URI: &str = "http://localhost:11311";
pub const DEFAULT_PROXY_PORT: u16 = 33133;
pub const DEFAULT_BIND: &str = "0.0.0.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub master_uri: Option<String>,
    pub proxy_port: Option<u16>,
    pub bind: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub doc_format: Option<DocFormat>,
    pub unregister: Option<UnregisterPolicy>,
    pub upstream_timeout_secs: Option<u64>,
    pub nodes: Vec<String>,
    pub ignore: IgnoreRules,
}

impl Config {
    /// Explicit path, else `./.autodoc-proxy.toml`, else the user config dir,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return load_config_from_path(path);
        }
        if Path::new(CONFIG_FILENAME).exists() {
            return load_config_from_path(CONFIG_FILENAME);
        }
        match user_config_path() {
            Some(path) if path.exists() => load_config_from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}

/// `~/.config/autodoc-proxy/config.toml` on Linux.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autodoc-proxy").join("config.toml"))
}

/// Fully resolved settings for a proxy run. CLI flags win over the config
/// file, which wins over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub master_uri: String,
    pub listen: SocketAddr,
    pub output_dir: PathBuf,
    pub format: DocFormat,
    pub nodes: NodeFilter,
    pub rules: TrackingRules,
    pub upstream_timeout: Duration,
    pub check_master: bool,
}

impl Settings {
    pub fn resolve(args: &RunArgs, config: Config) -> Result<Self> {
        let master_uri = args
            .master_uri
            .clone()
            .or(config.master_uri)
            .unwrap_or_else(|| DEFAULT_MASTER_URI.to_string());
        let port = args
            .proxy_port
            .or(config.proxy_port)
            .unwrap_or(DEFAULT_PROXY_PORT);
        let bind = args
            .bind
            .clone()
            .or(config.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        // Accept both `::` and the bracketed `[::]` form for IPv6
        let ip: IpAddr = bind
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .with_context(|| format!("Invalid bind address {}", bind))?;
        let listen = SocketAddr::new(ip, port);

        if points_at_self(&master_uri, port) {
            bail!(
                "master URI {} points at the proxy itself; set --master-uri to the real master",
                master_uri
            );
        }

        let output_dir = match args.output_dir.clone().or(config.output_dir) {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };

        let nodes = if args.nodes.is_empty() {
            NodeFilter::new(&config.nodes)
        } else {
            NodeFilter::new(&args.nodes)
        };

        let timeout_secs = args.upstream_timeout.or(config.upstream_timeout_secs);

        Ok(Self {
            master_uri,
            listen,
            output_dir,
            format: args.doc_format.or(config.doc_format).unwrap_or_default(),
            nodes,
            rules: TrackingRules {
                unregister: args.unregister.or(config.unregister).unwrap_or_default(),
                ignore: config.ignore,
            },
            upstream_timeout: timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT),
            check_master: !args.skip_master_check,
        })
    }
}

fn points_at_self(master_uri: &str, port: u16) -> bool {
    let authority = master_uri
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(master_uri)
        .trim_end_matches('/');
    ["localhost", "127.0.0.1", "0.0.0.0", "[::1]", "[::]"]
        .iter()
        .any(|host| authority == format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ignore, IgnoreRules::default());
    }

    #[test]
    fn test_load_config_not_found() {
        let result = load_config_from_path("/nonexistent/.autodoc-proxy.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_string() {
        let toml = r#"
master_uri = "http://robot:11311"
proxy_port = 40000
doc_format = "html"
unregister = "retain"
nodes = ["talker"]

[ignore]
parameters = ["/run_id"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.master_uri.as_deref(), Some("http://robot:11311"));
        assert_eq!(config.proxy_port, Some(40000));
        assert_eq!(config.doc_format, Some(DocFormat::Html));
        assert_eq!(config.unregister, Some(UnregisterPolicy::Retain));
        assert_eq!(config.ignore.parameters, vec!["/run_id".to_string()]);
        assert_eq!(config.ignore.published_topics, vec!["/rosout".to_string()]);
    }

    #[test]
    fn test_save_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = Config {
            master_uri: Some(DEFAULT_MASTER_URI.to_string()),
            proxy_port: Some(DEFAULT_PROXY_PORT),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(load_config_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            master_uri: Some("http://robot:11311".to_string()),
            proxy_port: Some(40000),
            doc_format: Some(DocFormat::Html),
            nodes: vec!["from_config".to_string()],
            ..Config::default()
        };
        let args = RunArgs {
            proxy_port: Some(40001),
            nodes: vec!["talker".to_string()],
            output_dir: Some(PathBuf::from("/tmp")),
            ..RunArgs::default()
        };

        let settings = Settings::resolve(&args, config).unwrap();
        assert_eq!(settings.master_uri, "http://robot:11311");
        assert_eq!(settings.listen.port(), 40001);
        assert_eq!(settings.format, DocFormat::Html);
        assert!(settings.nodes.matches("/talker"));
        assert!(!settings.nodes.matches("/from_config"));
        assert_eq!(settings.upstream_timeout, DEFAULT_TIMEOUT);
        assert!(settings.check_master);
    }

    #[test]
    fn test_defaults() {
        let args = RunArgs {
            output_dir: Some(PathBuf::from("/tmp")),
            ..RunArgs::default()
        };
        let settings = Settings::resolve(&args, Config::default()).unwrap();
        assert_eq!(settings.master_uri, DEFAULT_MASTER_URI);
        assert_eq!(settings.listen.port(), DEFAULT_PROXY_PORT);
        assert_eq!(settings.format, DocFormat::Markdown);
        assert_eq!(settings.rules.unregister, UnregisterPolicy::Remove);
        assert!(settings.nodes.is_empty());
    }

    #[test]
    fn test_ipv6_bind() {
        for bind in ["::", "[::1]"] {
            let args = RunArgs {
                bind: Some(bind.to_string()),
                proxy_port: Some(40002),
                output_dir: Some(PathBuf::from("/tmp")),
                ..RunArgs::default()
            };
            let settings = Settings::resolve(&args, Config::default()).unwrap();
            assert!(settings.listen.is_ipv6(), "{} should bind IPv6", bind);
            assert_eq!(settings.listen.port(), 40002);
        }

        let args = RunArgs {
            bind: Some("not-an-ip".to_string()),
            output_dir: Some(PathBuf::from("/tmp")),
            ..RunArgs::default()
        };
        assert!(Settings::resolve(&args, Config::default()).is_err());
    }

    #[test]
    fn test_rejects_master_pointing_at_proxy() {
        let args = RunArgs {
            master_uri: Some("http://localhost:33133/".to_string()),
            output_dir: Some(PathBuf::from("/tmp")),
            ..RunArgs::default()
        };
        let err = Settings::resolve(&args, Config::default()).unwrap_err();
        assert!(err.to_string().contains("points at the proxy itself"));
    }
}
