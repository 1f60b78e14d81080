use std::{
    fs,
    path::{Path, PathBuf},
};

use {
    directories::ProjectDirs,
    tracing::{debug, info},
};

use crate::{
    error::{ConfigError, Result},
    schema::WayfarerConfig,
};

pub const CONFIG_FILE_NAME: &str = "wayfarer.toml";

/// Load, discover and validate the configuration.
///
/// An explicit path must exist. Without one, `wayfarer.toml` in the working
/// directory is tried, then the per-user config directory, then built-in
/// defaults.
pub fn load(explicit: Option<&Path>) -> Result<WayfarerConfig> {
    let config = match discover(explicit, Path::new("."), user_config_dir().as_deref())? {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            load_file(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            WayfarerConfig::default()
        },
    };
    config.validate()?;
    Ok(config)
}

pub fn load_file(path: &Path) -> Result<WayfarerConfig> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&data)
}

pub fn parse_str(data: &str) -> Result<WayfarerConfig> {
    Ok(toml::from_str(data)?)
}

fn user_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "wayfarer").map(|dirs| dirs.config_dir().to_path_buf())
}

fn discover(
    explicit: Option<&Path>,
    working_dir: &Path,
    user_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(Some(path.to_path_buf()))
        } else {
            Err(ConfigError::NotFound(path.to_path_buf()))
        };
    }
    let mut candidates = std::iter::once(working_dir.join(CONFIG_FILE_NAME))
        .chain(user_dir.map(|dir| dir.join(CONFIG_FILE_NAME)));
    Ok(candidates.find(|path| path.is_file()))
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::io::Write, tempfile::NamedTempFile};

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse_str("").unwrap(), WayfarerConfig::default());
    }

    #[test]
    fn full_file() {
        let config = parse_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 9000
            proxy_path = "/p"
            public_url = "https://proxy.example/"

            [upstream]
            timeout_secs = 5
            max_redirects = 3
            user_agent = "test-agent"
            forward_user_agent = false

            [ssrf]
            allowlist = ["10.1.0.0/16", "fd00::/8"]
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.server.public_url.unwrap().as_str(),
            "https://proxy.example/"
        );
        assert_eq!(config.upstream.max_redirects, 3);
        assert_eq!(config.upstream.connect_timeout_secs, 10);
        assert_eq!(config.upstream.user_agent.as_deref(), Some("test-agent"));
        assert!(!config.upstream.forward_user_agent);
        assert_eq!(config.ssrf.allowlist.len(), 2);
    }

    #[test]
    fn bad_toml_and_bad_cidr_fail() {
        assert!(matches!(parse_str("port = [1"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_str("[ssrf]\nallowlist = [\"not-a-net\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 5000").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn explicit_file_must_exist() {
        let err = load(Some(Path::new("/nonexistent/wayfarer.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn explicit_file_is_validated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\ntimeout_secs = 0").unwrap();
        assert!(matches!(
            load(Some(file.path())),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn discovery_order() {
        let work = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();

        assert_eq!(discover(None, work.path(), Some(user.path())).unwrap(), None);

        let user_file = user.path().join(CONFIG_FILE_NAME);
        fs::write(&user_file, "").unwrap();
        assert_eq!(
            discover(None, work.path(), Some(user.path())).unwrap(),
            Some(user_file)
        );

        let work_file = work.path().join(CONFIG_FILE_NAME);
        fs::write(&work_file, "").unwrap();
        assert_eq!(
            discover(None, work.path(), Some(user.path())).unwrap(),
            Some(work_file.clone())
        );

        let explicit = work.path().join("other.toml");
        fs::write(&explicit, "").unwrap();
        assert_eq!(
            discover(Some(explicit.as_path()), work.path(), Some(user.path())).unwrap(),
            Some(explicit)
        );
    }
}
