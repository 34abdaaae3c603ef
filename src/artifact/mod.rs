//! Recording artifact assembly and revocable references.
//!
//! On a completed recording the buffered fragments are concatenated, in
//! order, into one immutable blob tagged with the MIME type of the first
//! fragment. The blob is published under a revocable reference issued by the
//! session-owned store; publishing revokes any previous reference, so at most
//! one reference is live per session at any time. A revoked reference simply
//! stops resolving.

pub mod output;

pub use output::{play_artifact, save_artifact, suggested_filename, PlaybackError};

use std::collections::HashMap;
use std::sync::Arc;

use crate::recorder::Fragment;

/// Revocable handle to a published artifact blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The finalized, playable/saveable recording.
#[derive(Debug, Clone)]
pub struct Artifact {
    reference: ArtifactRef,
    mime: String,
    size: usize,
}

impl Artifact {
    pub fn reference(&self) -> &ArtifactRef {
        &self.reference
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Session-owned registry of published artifact blobs.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    entries: HashMap<ArtifactRef, Arc<Vec<u8>>>,
    next_id: u64,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles the fragments into one blob and publishes it, revoking every
    /// previously issued reference first.
    ///
    /// Callers must hand in a non-empty fragment sequence; an empty completed
    /// recording produces no artifact and never reaches this point.
    pub fn publish(&mut self, fragments: Vec<Fragment>) -> Artifact {
        debug_assert!(!fragments.is_empty());

        self.revoke_all();

        let mime = fragments
            .first()
            .map(|f| f.mime.clone())
            .unwrap_or_default();
        let mut blob = Vec::with_capacity(fragments.iter().map(Fragment::len).sum());
        for fragment in &fragments {
            blob.extend_from_slice(&fragment.data);
        }

        self.next_id += 1;
        let reference = ArtifactRef(format!("mem://recording/{}", self.next_id));
        let size = blob.len();
        self.entries.insert(reference.clone(), Arc::new(blob));

        tracing::info!(
            "Artifact published: {} ({} bytes, {})",
            reference,
            size,
            mime
        );
        Artifact {
            reference,
            mime,
            size,
        }
    }

    /// Resolves a reference to its blob, if it is still live.
    pub fn resolve(&self, reference: &ArtifactRef) -> Option<Arc<Vec<u8>>> {
        self.entries.get(reference).cloned()
    }

    /// Revokes a single reference. Resolving it afterward yields nothing.
    pub fn revoke(&mut self, reference: &ArtifactRef) {
        if self.entries.remove(reference).is_some() {
            tracing::debug!("Artifact reference revoked: {reference}");
        }
    }

    /// Revokes every live reference. Called on replacement and on teardown.
    pub fn revoke_all(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!("Revoking {} artifact reference(s)", self.entries.len());
            self.entries.clear();
        }
    }

    /// Number of currently live references.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(data: &[u8], mime: &str) -> Fragment {
        Fragment::new(data.to_vec(), mime)
    }

    #[test]
    fn blob_concatenates_fragments_in_order() {
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![
            fragment(b"aaa", "video/webm"),
            fragment(b"bb", "video/webm"),
            fragment(b"c", "video/webm"),
        ]);

        assert_eq!(artifact.size(), 6);
        let blob = store.resolve(artifact.reference()).unwrap();
        assert_eq!(blob.as_slice(), b"aaabbc");
    }

    #[test]
    fn mime_comes_from_first_fragment() {
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![
            fragment(b"x", "video/webm;codecs=vp9,opus"),
            fragment(b"y", "video/webm"),
        ]);
        assert_eq!(artifact.mime(), "video/webm;codecs=vp9,opus");
    }

    #[test]
    fn blob_size_is_sum_of_fragment_sizes() {
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![
            fragment(&[0; 10], "video/webm"),
            fragment(&[0; 20], "video/webm"),
            fragment(&[0; 15], "video/webm"),
        ]);
        assert_eq!(artifact.size(), 45);
    }

    #[test]
    fn publishing_revokes_the_previous_reference() {
        let mut store = ArtifactStore::new();
        let first = store.publish(vec![fragment(b"one", "video/webm")]);
        assert!(store.resolve(first.reference()).is_some());

        let second = store.publish(vec![fragment(b"two", "video/webm")]);
        assert!(store.resolve(first.reference()).is_none());
        assert!(store.resolve(second.reference()).is_some());
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn revoked_reference_stops_resolving() {
        let mut store = ArtifactStore::new();
        let artifact = store.publish(vec![fragment(b"data", "video/webm")]);
        let reference = artifact.reference().clone();

        store.revoke(&reference);
        assert!(store.resolve(&reference).is_none());
        assert_eq!(store.live_count(), 0);

        // Revoking again is harmless.
        store.revoke(&reference);
    }

    #[test]
    fn at_most_one_live_reference() {
        let mut store = ArtifactStore::new();
        for i in 0..5 {
            store.publish(vec![fragment(&[i], "video/webm")]);
            assert_eq!(store.live_count(), 1);
        }
    }
}
