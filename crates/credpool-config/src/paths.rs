use std::path::PathBuf;

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "credpool";

const CONFIG_FILE_NAME: &str = "config.toml";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Config directory: `~/.config/credpool`.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path to the config file, if a home directory can be determined.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// State directory holding the persisted pool, cursor and usage records.
///
/// Prefers the XDG state dir (`~/.local/state/credpool`), then the
/// data-local dir on platforms without one (macOS), then the temp dir
/// when no home directory exists (e.g. bare containers).
pub fn state_dir() -> PathBuf {
    if let Some(dirs) = project_dirs() {
        return dirs
            .state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf();
    }
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_mentions_app_name() {
        let dir = state_dir();
        assert!(
            dir.to_string_lossy().contains(APP_NAME),
            "state dir should be app-scoped: {}",
            dir.display()
        );
    }

    #[test]
    fn test_config_path_file_name() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
        }
    }
}
