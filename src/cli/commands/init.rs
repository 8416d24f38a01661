use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::config::{Config, CONFIG_FILENAME, DEFAULT_MASTER_URI, DEFAULT_PROXY_PORT};
use crate::cli::InitArgs;

pub fn execute_init(args: InitArgs) -> Result<()> {
    init_at(Path::new(CONFIG_FILENAME), args)
}

fn init_at(path: &Path, args: InitArgs) -> Result<()> {
    // Check if config already exists
    if path.exists() && !args.force {
        bail!("{} already exists. Use --force to overwrite.", path.display());
    }

    let master_uri = args
        .master_uri
        .unwrap_or_else(|| DEFAULT_MASTER_URI.to_string());
    let proxy_port = args.proxy_port.unwrap_or(DEFAULT_PROXY_PORT);

    let config = Config {
        master_uri: Some(master_uri.clone()),
        proxy_port: Some(proxy_port),
        ..Config::default()
    };

    config.save(path)?;

    eprintln!("Created {}", path.display());
    eprintln!("  master_uri: {}", master_uri);
    eprintln!("  proxy_port: {}", proxy_port);
    eprintln!();
    eprintln!(
        "Next: autodoc-proxy run, then start nodes with ROS_MASTER_URI=http://localhost:{}",
        proxy_port
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::load_config_from_path;
    use tempfile::TempDir;

    fn args(force: bool) -> InitArgs {
        InitArgs {
            master_uri: Some("http://robot:11311".to_string()),
            proxy_port: None,
            force,
        }
    }

    #[test]
    fn writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        init_at(&path, args(false)).unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.master_uri.as_deref(), Some("http://robot:11311"));
        assert_eq!(config.proxy_port, Some(DEFAULT_PROXY_PORT));
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "proxy_port = 1\n").unwrap();

        let err = init_at(&path, args(false)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "proxy_port = 1\n");

        init_at(&path, args(true)).unwrap();
        assert_eq!(
            load_config_from_path(&path).unwrap().proxy_port,
            Some(DEFAULT_PROXY_PORT)
        );
    }
}
