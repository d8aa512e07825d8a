// SPDX-License-Identifier: GPL-2.0-or-later

pub mod codec;
pub mod header;
pub mod sample_table;
pub mod track;

#[cfg(test)]
mod test;

pub use codec::{AudioCodec, VideoCodec};
pub use track::{
    AudioInfo, Chunk, Sample, SampleKind, StscEntry, SttsEntry, Track, TrackInfo, VideoInfo,
};

use bytes::BufMut;
use mp4::{BufMutExt, Mp4Box};
use serde::Deserialize;

// Timescale of movie level durations, mvhd and tkhd.
pub const GLOBAL_TIMESCALE: u32 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MovieConfig {
    // Seconds since 1904-01-01, see `mp4::mp4_time_from_unix`.
    pub creation_time: u64,

    // Reserve a 64 bit size field in the mdat header so
    // media data larger than 4 GiB can be patched in later.
    pub reserve_large_mdat: bool,
}

#[must_use]
pub fn ftyp(holds_hevc: bool) -> Mp4Box {
    Mp4Box::with_contents(mp4::TYPE_FTYP, |buf| {
        buf.put_fourcc(*b"isom"); // Major brand.
        buf.put_u32(0); // Minor version.
        if holds_hevc {
            buf.put_fourcc(*b"iso4");
            buf.put_fourcc(*b"hvc1");
        } else {
            buf.put_fourcc(*b"isom");
            buf.put_fourcc(*b"avc1");
            buf.put_fourcc(*b"mp41");
        }
    })
}

// Media data placeholder, the serializer writes the header
// and the muxer patches the size once the samples are written.
#[must_use]
pub fn mdat(reserve_large_size: bool) -> Mp4Box {
    Mp4Box::new(mp4::TYPE_MDAT).with_large_size(reserve_large_size)
}

// Reserved space of exactly `size` bytes including the header.
#[must_use]
pub fn free(size: u64) -> Mp4Box {
    Mp4Box::new(mp4::TYPE_FREE).with_size(size)
}

/*
   moov
   - mvhd
   - trak (one per track)
*/

#[must_use]
pub fn moov(tracks: &[Track], creation_time: u64) -> Mp4Box {
    Mp4Box::new(mp4::TYPE_MOOV)
        .with_child(header::mvhd(tracks, creation_time))
        .with_children(tracks.iter().map(|t| header::trak(t, creation_time)))
}

// File level boxes in order: ftyp, mdat placeholder, moov.
#[must_use]
pub fn file_boxes(tracks: &[Track], config: &MovieConfig) -> [Mp4Box; 3] {
    let holds_hevc = tracks.iter().any(Track::holds_hevc);
    [
        ftyp(holds_hevc),
        mdat(config.reserve_large_mdat),
        moov(tracks, config.creation_time),
    ]
}
