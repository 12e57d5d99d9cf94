//! Locating the external executables the app drives (`yt-dlp`, `ffmpeg`).
//!
//! A copy embedded under `assets/` at build time wins; it is unpacked once
//! into the temp directory. Otherwise the bare name is returned and the OS
//! resolves it through `PATH` when the process is spawned.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::PathBuf,
};

use once_cell::sync::OnceCell;
use rust_embed::RustEmbed;
use tracing::{debug, warn};

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

static TOOLS_DIR: OnceCell<PathBuf> = OnceCell::new();

/// External programs the app shells out to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
}

impl Tool {
    /// Executable name for the current platform
    pub fn binary_name(self) -> &'static str {
        match (self, cfg!(target_os = "windows")) {
            (Tool::YtDlp, true) => "yt-dlp.exe",
            (Tool::YtDlp, false) => "yt-dlp",
            (Tool::Ffmpeg, true) => "ffmpeg.exe",
            (Tool::Ffmpeg, false) => "ffmpeg",
        }
    }

    /// The copy found on `PATH`, ignoring any bundled one
    pub fn system(self) -> PathBuf {
        PathBuf::from(self.binary_name())
    }

    /// Bundled copy if there is one, else the `PATH` name.
    pub fn locate(self) -> PathBuf {
        let bin = self.binary_name();
        match bundled(bin) {
            Ok(Some(path)) => {
                debug!(tool = bin, path = %path.display(), "using bundled tool");
                path
            }
            Ok(None) => self.system(),
            Err(e) => {
                warn!(tool = bin, error = %e, "could not unpack bundled tool, falling back to PATH");
                self.system()
            }
        }
    }
}

fn bundled(bin: &str) -> io::Result<Option<PathBuf>> {
    let Some(data) = Asset::get(bin) else {
        return Ok(None);
    };
    let dir = TOOLS_DIR.get_or_try_init(|| {
        let dir = std::env::temp_dir().join("yt-grab-tools");
        fs::create_dir_all(&dir)?;
        Ok::<_, io::Error>(dir)
    })?;
    let path = dir.join(bin);
    let stale = fs::metadata(&path)
        .map(|m| m.len() != data.data.len() as u64)
        .unwrap_or(true);
    if stale {
        let mut f = File::create(&path)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(Some(path))
}

/// A `tokio` command that does not flash a console window on Windows.
pub fn command(program: impl AsRef<std::ffi::OsStr>) -> tokio::process::Command {
    #[allow(unused_mut)]
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names_match_platform() {
        let name = Tool::Ffmpeg.binary_name();
        if cfg!(target_os = "windows") {
            assert_eq!(name, "ffmpeg.exe");
        } else {
            assert_eq!(name, "ffmpeg");
        }
        assert_eq!(Tool::YtDlp.system(), PathBuf::from(Tool::YtDlp.binary_name()));
    }

    #[test]
    fn unbundled_tool_resolves_to_path_name() {
        // assets/ only ships a README in source checkouts
        if Asset::get(Tool::YtDlp.binary_name()).is_none() {
            assert_eq!(Tool::YtDlp.locate(), Tool::YtDlp.system());
        }
    }
}
