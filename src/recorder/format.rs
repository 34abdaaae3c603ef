//! Recording format negotiation.
//!
//! Candidate formats are ordered from the preferred modern codec pairing down
//! to progressively less specific fallbacks; the first one the runtime
//! supports wins. Support is probed against the encoding subsystem, not
//! assumed.

use thiserror::Error;

/// A candidate recording format.
#[derive(Debug, PartialEq, Eq)]
pub struct MediaFormat {
    /// Short identifier used in logs and error messages.
    pub id: &'static str,
    /// MIME type tagged onto fragments and the assembled artifact.
    pub mime: &'static str,
    /// File extension used for saved recordings.
    pub extension: &'static str,
    /// Container format name understood by the muxer.
    pub container: &'static str,
    /// Video encoder name, if the format carries video.
    pub video_codec: Option<&'static str>,
    /// Audio encoder name, if the format carries audio.
    pub audio_codec: Option<&'static str>,
    /// Extra muxer arguments required for streamed output.
    pub extra_args: &'static [&'static str],
}

/// Ordered preference list. The audio-only WAV entry is the degraded last
/// resort for hosts without a usable video encoder.
pub const FORMAT_CANDIDATES: &[MediaFormat] = &[
    MediaFormat {
        id: "webm-vp9-opus",
        mime: "video/webm;codecs=vp9,opus",
        extension: "webm",
        container: "webm",
        video_codec: Some("libvpx-vp9"),
        audio_codec: Some("libopus"),
        extra_args: &[],
    },
    MediaFormat {
        id: "webm-vp8-opus",
        mime: "video/webm;codecs=vp8,opus",
        extension: "webm",
        container: "webm",
        video_codec: Some("libvpx"),
        audio_codec: Some("libopus"),
        extra_args: &[],
    },
    MediaFormat {
        id: "webm",
        mime: "video/webm",
        extension: "webm",
        container: "webm",
        video_codec: Some("libvpx"),
        audio_codec: Some("libvorbis"),
        extra_args: &[],
    },
    MediaFormat {
        id: "mp4",
        mime: "video/mp4",
        extension: "mp4",
        container: "mp4",
        video_codec: Some("libx264"),
        audio_codec: Some("aac"),
        // mp4 cannot seek back over a pipe; fragment the stream instead.
        extra_args: &["-movflags", "frag_keyframe+empty_moov"],
    },
    MediaFormat {
        id: "wav-audio-only",
        mime: "audio/wav",
        extension: "wav",
        container: "wav",
        video_codec: None,
        audio_codec: Some("pcm_s16le"),
        extra_args: &[],
    },
];

/// No candidate format is supported by the runtime. Fatal to recording
/// capability for the session; the rest of the UI remains usable.
#[derive(Debug, Error)]
#[error("no supported recording format among candidates: {candidates}")]
pub struct UnsupportedFormatError {
    pub candidates: String,
}

/// Runtime capability check for a candidate format.
pub trait FormatSupport {
    fn supports(&self, format: &MediaFormat) -> bool;
}

/// Picks the first supported format from the ordered candidate list.
///
/// # Errors
/// - [`UnsupportedFormatError`] if no candidate is supported
pub fn negotiate<S: FormatSupport>(support: &S) -> Result<&'static MediaFormat, UnsupportedFormatError> {
    for candidate in FORMAT_CANDIDATES {
        if support.supports(candidate) {
            tracing::info!("Using recording format: {}", candidate.id);
            return Ok(candidate);
        }
    }
    Err(UnsupportedFormatError {
        candidates: FORMAT_CANDIDATES
            .iter()
            .map(|f| f.id)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSupport(&'static [&'static str]);

    impl FormatSupport for FixedSupport {
        fn supports(&self, format: &MediaFormat) -> bool {
            self.0.contains(&format.id)
        }
    }

    #[test]
    fn first_supported_candidate_wins() {
        let support = FixedSupport(&["webm-vp8-opus", "mp4"]);
        let format = negotiate(&support).unwrap();
        assert_eq!(format.id, "webm-vp8-opus");
    }

    #[test]
    fn preference_order_is_respected() {
        let support = FixedSupport(&["mp4", "webm-vp9-opus"]);
        let format = negotiate(&support).unwrap();
        assert_eq!(format.id, "webm-vp9-opus");
    }

    #[test]
    fn no_support_yields_unsupported_format_error() {
        let support = FixedSupport(&[]);
        let err = negotiate(&support).unwrap_err();
        assert!(err.candidates.contains("webm-vp9-opus"));
        assert!(err.candidates.contains("wav-audio-only"));
    }

    #[test]
    fn wav_fallback_is_last() {
        let support = FixedSupport(&["wav-audio-only"]);
        let format = negotiate(&support).unwrap();
        assert_eq!(format.mime, "audio/wav");
        assert!(format.video_codec.is_none());
    }
}
