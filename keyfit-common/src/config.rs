//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(config) = load_config_toml() {
        if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Load the shared KeyFit TOML config, if one exists.
///
/// Looked up at `<platform config dir>/keyfit/config.toml`, with
/// `/etc/keyfit/config.toml` as a system-wide fallback on Linux.
pub fn load_config_toml() -> Option<toml::Value> {
    let path = find_config_file().ok()?;
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<toml::Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unparseable config file");
            None
        }
    }
}

fn find_config_file() -> Result<PathBuf> {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("keyfit").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/keyfit/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder (`~/.local/share/keyfit` on Linux and
/// the platform equivalents elsewhere).
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("keyfit"))
        .unwrap_or_else(|| PathBuf::from("./keyfit_data"))
}

/// Path of the shared SQLite database inside the root folder.
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("keyfit.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let root = resolve_root_folder(Some(Path::new("/tmp/keyfit-cli")), "KEYFIT_TEST_UNSET_VAR");
        assert_eq!(root, PathBuf::from("/tmp/keyfit-cli"));
    }

    #[test]
    fn database_path_is_under_root() {
        let db = database_path(Path::new("/data/keyfit"));
        assert_eq!(db, PathBuf::from("/data/keyfit/keyfit.db"));
    }
}
