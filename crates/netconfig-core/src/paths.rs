use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const NETCONFIG_DIR: &str = ".netconfig";
pub const CONFIG_FILE: &str = ".netconfig/config.yaml";
pub const DEFAULT_REGISTRY_FILE: &str = ".netconfig/pending.redb";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
pub const DEFAULT_DEVICES_DIR: &str = "devices";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn netconfig_dir(root: &Path) -> PathBuf {
    root.join(NETCONFIG_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured path: absolute paths are kept, relative ones are
/// taken from the project root.
pub fn under_root(root: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Walk upward from `start` looking for a directory that contains `.netconfig/`.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| netconfig_dir(dir).is_dir())
        .map(Path::to_path_buf)
}
