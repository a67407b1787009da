//! Поиск внешних инструментов и проверка их версий

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result as AnyResult};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

static FFMPEG_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ffmpeg version (\d+\.\d+(?:\.\d+)?)").unwrap());

/// Минимальная поддерживаемая версия ffmpeg
fn ffmpeg_min_version() -> Version {
    Version::new(4, 0, 0)
}

/// Найти исполняемый файл в PATH
pub fn check_command_in_path(name: &str) -> AnyResult<PathBuf> {
    which::which(name).with_context(|| format!("{} not found in PATH", name))
}

/// Найти ffmpeg и убедиться, что версия не ниже минимальной
pub fn find_ffmpeg() -> AnyResult<PathBuf> {
    let path = check_command_in_path("ffmpeg")?;
    let version = check_ffmpeg_version(&path)?;
    if version < ffmpeg_min_version() {
        return Err(anyhow!(
            "ffmpeg {} is too old, {} or newer is required",
            version,
            ffmpeg_min_version()
        ));
    }
    log::debug!("using ffmpeg {} at {}", version, path.display());
    Ok(path)
}

/// Определить версию ffmpeg
fn check_ffmpeg_version(path: &Path) -> AnyResult<Version> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .context("Failed to execute ffmpeg")?;

    if !output.status.success() {
        return Err(anyhow!("ffmpeg -version exited with {}", output.status));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    if let Some(caps) = FFMPEG_VERSION_RE.captures(&version_str) {
        let version = caps.get(1).map_or("", |m| m.as_str());
        let parts: Vec<&str> = version.split('.').collect();
        let normalized = match parts.len() {
            1 => format!("{}.0.0", parts[0]),
            2 => format!("{}.{}.0", parts[0], parts[1]),
            _ => version.to_string(),
        };
        Ok(Version::parse(&normalized)?)
    } else {
        // Сборки из git не печатают семвер; считаем их достаточно свежими
        log::debug!("could not parse ffmpeg version, assuming recent build");
        Ok(ffmpeg_min_version())
    }
}
