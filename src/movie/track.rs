// SPDX-License-Identifier: GPL-2.0-or-later

use crate::codec::{AudioCodec, VideoCodec};
use bytes::Bytes;
use mp4::Rotation;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Key,
    Delta,
}

// Timestamp and duration are in the track's timescale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: u64,
    pub duration: u64,
    pub size: u32,
    pub kind: SampleKind,
}

impl Sample {
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.kind == SampleKind::Key
    }
}

// Run of `sample_count` samples sharing `sample_delta`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

// Run of chunks starting at the 1-based `first_chunk` sharing `samples_per_chunk`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
}

// Chunk already written to the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    // Absolute file offset.
    pub offset: u64,
    pub size: u64,
    pub sample_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub rotation: Rotation,
    pub codec: VideoCodec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    pub number_of_channels: u16,
    pub sample_rate: u32,
    pub codec: AudioCodec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackInfo {
    Video(VideoInfo),
    Audio(AudioInfo),
}

/// Snapshot of a track supplied by the muxer.
///
/// Box construction only reads the snapshot. `time_to_sample_table` and
/// `compactly_coded_chunk_table` are already run-length compacted and
/// `finalized_chunks` holds only the chunks written so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: u32,
    pub timescale: u32,
    pub info: TrackInfo,
    pub samples: Vec<Sample>,
    pub time_to_sample_table: Vec<SttsEntry>,
    pub compactly_coded_chunk_table: Vec<StscEntry>,
    pub finalized_chunks: Vec<Chunk>,
    pub codec_private: Option<Bytes>,
}

impl Track {
    // End of the last sample in the track's timescale, zero without samples.
    #[must_use]
    pub fn end_timestamp(&self) -> u64 {
        self.samples
            .last()
            .map_or(0, |s| s.timestamp.saturating_add(s.duration))
    }

    // Track duration converted to `timescale`.
    #[must_use]
    pub fn duration_in(&self, timescale: u32) -> u64 {
        mp4::rescale(self.end_timestamp(), self.timescale, timescale)
    }

    #[must_use]
    pub fn is_video(&self) -> bool {
        matches!(self.info, TrackInfo::Video(_))
    }

    #[must_use]
    pub fn is_audio(&self) -> bool {
        matches!(self.info, TrackInfo::Audio(_))
    }

    #[must_use]
    pub fn holds_hevc(&self) -> bool {
        matches!(
            self.info,
            TrackInfo::Video(VideoInfo {
                codec: VideoCodec::Hevc,
                ..
            })
        )
    }

    #[must_use]
    pub fn all_key_frames(&self) -> bool {
        self.samples.iter().all(Sample::is_key)
    }
}
