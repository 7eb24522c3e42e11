// Platform paths
// Selects the per-OS config and data directories at compile time.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Returns the platform-specific configuration directory.
///
/// - **Linux**: `~/.config/eigo-browser` (or `$XDG_CONFIG_HOME/eigo-browser`)
/// - **macOS**: `~/Library/Application Support/EigoBrowser`
/// - **Windows**: `%APPDATA%/EigoBrowser`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Returns the platform-specific data directory, where the session database lives.
///
/// - **Linux**: `~/.local/share/eigo-browser` (or `$XDG_DATA_HOME/eigo-browser`)
/// - **macOS**: `~/Library/Application Support/EigoBrowser`
/// - **Windows**: `%APPDATA%/EigoBrowser`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}
