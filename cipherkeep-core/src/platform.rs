//! Platform-specific locations for client state.

use std::path::PathBuf;

/// Get the platform-specific config directory
///
/// Returns:
/// - Windows: %APPDATA%\CipherKeep
/// - macOS: ~/Library/Application Support/CipherKeep
/// - Linux/Other: ~/.config/CipherKeep
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("CipherKeep")
}

/// Default location of the CLI session and item cache.
pub fn get_client_state_path() -> PathBuf {
    get_config_dir().join("client-state.json")
}

/// Ensure the config directory exists, creating it if necessary
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = get_config_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get current platform as a string
pub fn get_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}
