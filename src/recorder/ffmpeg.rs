//! FFmpeg discovery and encoder capability probing.
//!
//! Locates the ffmpeg binary across standard installation locations before
//! falling back to a PATH search, and parses `ffmpeg -encoders` output to
//! answer format support queries during negotiation.

use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::format::{FormatSupport, MediaFormat};

/// Locates the ffmpeg binary on the system.
///
/// Checks platform-standard install locations first, then falls back to a
/// PATH search. Running inside sparse environments (launchers, IDE shells)
/// often means PATH alone is not enough.
///
/// # Errors
/// - If ffmpeg cannot be found anywhere
pub fn find_ffmpeg() -> Result<PathBuf> {
    find_tool("ffmpeg")
}

/// Locates a media tool binary (ffmpeg, ffplay) on the system.
pub fn find_tool(name: &str) -> Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from(format!("/opt/homebrew/bin/{name}")),
            PathBuf::from(format!("/usr/local/bin/{name}")),
            PathBuf::from(format!("/usr/bin/{name}")),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from(format!("/usr/bin/{name}")),
            PathBuf::from(format!("/usr/local/bin/{name}")),
            PathBuf::from(format!("/snap/bin/{name}")),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(format!("C:\\ffmpeg\\bin\\{name}.exe")),
            PathBuf::from(format!("C:\\Program Files\\ffmpeg\\bin\\{name}.exe")),
        ]
    } else {
        vec![]
    };

    for path in candidates {
        if path.exists() {
            tracing::debug!("Found {name} at: {}", path.display());
            return Ok(path);
        }
    }

    let path = find_in_path(name)?;
    tracing::debug!("Found {name} in PATH at: {}", path.display());
    Ok(path)
}

/// Searches for a binary in the system PATH via `which`/`where`.
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = std::process::Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        let path = PathBuf::from(path_str.lines().next().unwrap_or("").trim());
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }

    Err(anyhow!(
        "{binary_name} not found. Please install ffmpeg:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html"
    ))
}

/// Encoder support table built from `ffmpeg -encoders` output.
pub struct FfmpegSupport {
    encoders: HashSet<String>,
}

impl FfmpegSupport {
    /// Probes the given ffmpeg binary for its available encoders.
    ///
    /// # Errors
    /// - If ffmpeg cannot be executed
    /// - If its encoder listing cannot be parsed
    pub fn detect(ffmpeg: &Path) -> Result<Self> {
        let output = std::process::Command::new(ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
            .map_err(|e| anyhow!("Failed to run {} -encoders: {e}", ffmpeg.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg -encoders exited with status {}",
                output.status.code().unwrap_or(-1)
            ));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let support = Self::parse(&listing)?;
        tracing::debug!("ffmpeg reports {} encoders", support.encoders.len());
        Ok(support)
    }

    /// Parses the tabular encoder listing into a name set.
    fn parse(listing: &str) -> Result<Self> {
        // Lines look like: " V....D libvpx-vp9    libvpx VP9 (codec vp9)".
        // The codec-name character class keeps legend rows (" V..... = Video")
        // out of the set.
        let row = Regex::new(r"(?m)^\s*[AVS][A-Z.]{5}\s+([A-Za-z0-9_-]+)")?;
        let encoders = row
            .captures_iter(listing)
            .map(|cap| cap[1].to_string())
            .collect();
        Ok(Self { encoders })
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

impl FormatSupport for FfmpegSupport {
    fn supports(&self, format: &MediaFormat) -> bool {
        let video_ok = format.video_codec.is_none_or(|c| self.has_encoder(c));
        let audio_ok = format.audio_codec.is_none_or(|c| self.has_encoder(c));
        video_ok && audio_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::format::FORMAT_CANDIDATES;

    const SAMPLE_LISTING: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus
 A....D pcm_s16le            PCM signed 16-bit little-endian
";

    #[test]
    fn parses_encoder_names_from_listing() {
        let support = FfmpegSupport::parse(SAMPLE_LISTING).unwrap();
        assert!(support.has_encoder("libvpx-vp9"));
        assert!(support.has_encoder("libopus"));
        assert!(!support.has_encoder("libx264"));
    }

    #[test]
    fn header_lines_are_not_encoders() {
        let support = FfmpegSupport::parse(SAMPLE_LISTING).unwrap();
        assert!(!support.has_encoder("="));
        assert!(!support.has_encoder("Video"));
        assert!(!support.has_encoder("Audio"));
    }

    #[test]
    fn support_requires_both_codecs() {
        let support = FfmpegSupport::parse(SAMPLE_LISTING).unwrap();
        let vp9 = &FORMAT_CANDIDATES[0];
        let webm = &FORMAT_CANDIDATES[2]; // needs libvorbis, absent above
        assert!(support.supports(vp9));
        assert!(!support.supports(webm));
    }
}
