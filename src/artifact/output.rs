//! Playback and save surface for published artifacts.
//!
//! Playback pipes the artifact bytes into ffplay; failures are non-fatal, the
//! user can still save the file. Saving writes the blob under a timestamped
//! filename in the configured output directory.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

use super::{Artifact, ArtifactStore};
use crate::recorder::find_tool;

/// The assembled artifact failed to play. Logged, never fatal.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("artifact reference is no longer live")]
    RevokedReference,
    #[error("no playback tool available: {0}")]
    NoPlayer(String),
    #[error("playback process failed: {0}")]
    Process(String),
}

/// Suggested filename for a saved recording, timestamped to the millisecond.
pub fn suggested_filename(extension: &str) -> String {
    format!("recorded-video-{}.{extension}", Utc::now().timestamp_millis())
}

/// Plays an artifact by piping its bytes into ffplay.
///
/// # Errors
/// - [`PlaybackError::RevokedReference`] if the reference no longer resolves
/// - [`PlaybackError::NoPlayer`] if ffplay is not installed
/// - [`PlaybackError::Process`] if ffplay cannot be driven
pub fn play_artifact(store: &ArtifactStore, artifact: &Artifact) -> Result<(), PlaybackError> {
    let blob = store
        .resolve(artifact.reference())
        .ok_or(PlaybackError::RevokedReference)?;

    let ffplay = find_tool("ffplay").map_err(|e| PlaybackError::NoPlayer(e.to_string()))?;

    let mut child = std::process::Command::new(&ffplay)
        .args(["-hide_banner", "-loglevel", "error", "-autoexit", "-i", "pipe:0"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| PlaybackError::Process(format!("failed to spawn ffplay: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| PlaybackError::Process("ffplay stdin not captured".to_string()))?;

    let bytes = std::sync::Arc::clone(&blob);
    // Feed and reap off-thread so the TUI loop keeps running during playback.
    std::thread::spawn(move || {
        if let Err(e) = stdin.write_all(&bytes) {
            tracing::warn!("Playback pipe write failed: {e}");
        }
        drop(stdin);
        match child.wait() {
            Ok(status) if !status.success() => {
                tracing::warn!("ffplay exited with status {status}");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to reap ffplay: {e}"),
        }
    });

    tracing::info!(
        "Playback started: {} ({} bytes)",
        artifact.reference(),
        artifact.size()
    );
    Ok(())
}

/// Saves an artifact to the output directory under a timestamped filename.
///
/// # Errors
/// - If the artifact reference is no longer live
/// - If the output directory cannot be created or the file written
pub fn save_artifact(
    store: &ArtifactStore,
    artifact: &Artifact,
    directory: &Path,
    extension: &str,
) -> Result<PathBuf> {
    let blob = store
        .resolve(artifact.reference())
        .ok_or_else(|| anyhow!("Artifact reference is no longer live"))?;

    std::fs::create_dir_all(directory)
        .map_err(|e| anyhow!("Failed to create output directory: {e}"))?;

    let path = directory.join(suggested_filename(extension));
    std::fs::write(&path, blob.as_slice())
        .map_err(|e| anyhow!("Failed to write {}: {e}", path.display()))?;

    tracing::info!("Recording saved: {} ({} bytes)", path.display(), blob.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Fragment;

    #[test]
    fn suggested_filename_embeds_timestamp_and_extension() {
        let name = suggested_filename("webm");
        assert!(name.starts_with("recorded-video-"));
        assert!(name.ends_with(".webm"));

        let millis: &str = name
            .strip_prefix("recorded-video-")
            .unwrap()
            .strip_suffix(".webm")
            .unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn save_writes_the_full_blob() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![
            Fragment::new(vec![1, 2, 3], "video/webm"),
            Fragment::new(vec![4, 5], "video/webm"),
        ]);

        let path = save_artifact(&store, &artifact, dir.path(), "webm").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn save_fails_for_revoked_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![Fragment::new(vec![9], "video/webm")]);
        store.revoke_all();

        assert!(save_artifact(&store, &artifact, dir.path(), "webm").is_err());
    }

    #[test]
    fn play_fails_for_revoked_reference() {
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![Fragment::new(vec![9], "video/webm")]);
        store.revoke_all();

        match play_artifact(&store, &artifact) {
            Err(PlaybackError::RevokedReference) => {}
            other => panic!("expected RevokedReference, got {other:?}"),
        }
    }
}
