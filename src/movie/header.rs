// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{
    sample_table::stbl,
    track::{Track, TrackInfo},
    GLOBAL_TIMESCALE,
};
use bytes::{BufMut, BytesMut};
use mp4::{BufMutExt, Mp4Box, IDENTITY_MATRIX};

// Packed ISO-639-2/T code of "und".
const LANGUAGE_UNDETERMINED: u16 = 0x55c4;

const HANDLER_COMPONENT_TYPE: [u8; 4] = *b"mhlr";
const HANDLER_NAME: &str = "MovieHandler";

// Track enabled and in movie.
const TKHD_FLAGS: u32 = 0x0000_0003;

// 14496-12_2015 8.2.2.2
// Version 1 is only needed when a time or duration exceeds 32 bits.
fn version_for(values: &[u64]) -> u8 {
    u8::from(values.iter().any(|v| u32::try_from(*v).is_err()))
}

fn put_u32_or_u64(buf: &mut BytesMut, version: u8, v: u64) {
    if version == 0 {
        buf.put_u32(u32::try_from(v).unwrap_or(u32::MAX));
    } else {
        buf.put_u64(v);
    }
}

// Movie header. The duration is the longest track in the global timescale.
#[must_use]
pub fn mvhd(tracks: &[Track], creation_time: u64) -> Mp4Box {
    let duration = tracks
        .iter()
        .filter(|t| !t.samples.is_empty())
        .map(|t| t.duration_in(GLOBAL_TIMESCALE))
        .max()
        .unwrap_or(0);
    let next_track_id = tracks
        .iter()
        .map(|t| t.id)
        .max()
        .unwrap_or(0)
        .saturating_add(1);

    let version = version_for(&[creation_time, duration]);
    Mp4Box::full(mp4::TYPE_MVHD, version, 0, |buf| {
        put_u32_or_u64(buf, version, creation_time); // Creation time.
        put_u32_or_u64(buf, version, creation_time); // Modification time.
        buf.put_u32(GLOBAL_TIMESCALE);
        put_u32_or_u64(buf, version, duration);
        buf.put_fixed_16_16(1); // Rate.
        buf.put_fixed_8_8(1); // Volume.
        buf.put_zeros(10); // Reserved.
        buf.put_matrix(&IDENTITY_MATRIX);
        buf.put_zeros(24); // Pre-defined.
        buf.put_u32(next_track_id);
    })
}

/*
   trak
   - tkhd
   - mdia
     - mdhd
     - hdlr
     - minf
*/

#[must_use]
pub fn trak(track: &Track, creation_time: u64) -> Mp4Box {
    log::trace!(
        "trak: id={} samples={} chunks={}",
        track.id,
        track.samples.len(),
        track.finalized_chunks.len(),
    );
    Mp4Box::new(mp4::TYPE_TRAK)
        .with_children([tkhd(track, creation_time), mdia(track, creation_time)])
}

// Track header. The duration is in the global timescale.
#[must_use]
pub fn tkhd(track: &Track, creation_time: u64) -> Mp4Box {
    let duration = track.duration_in(GLOBAL_TIMESCALE);
    let (volume, matrix, width, height) = match track.info {
        TrackInfo::Video(v) => (
            0,
            v.rotation.matrix(),
            u32::from(v.width),
            u32::from(v.height),
        ),
        TrackInfo::Audio(_) => (1, IDENTITY_MATRIX, 0, 0),
    };

    let version = version_for(&[creation_time, duration]);
    Mp4Box::full(
        mp4::TYPE_TKHD,
        version,
        TKHD_FLAGS,
        |buf| {
            put_u32_or_u64(buf, version, creation_time); // Creation time.
            put_u32_or_u64(buf, version, creation_time); // Modification time.
            buf.put_u32(track.id);
            buf.put_u32(0); // Reserved.
            put_u32_or_u64(buf, version, duration);
            buf.put_zeros(8); // Reserved.
            buf.put_u16(0); // Layer.
            buf.put_u16(0); // Alternate group.
            buf.put_fixed_8_8(volume);
            buf.put_u16(0); // Reserved.
            buf.put_matrix(&matrix);
            buf.put_fixed_16_16(width);
            buf.put_fixed_16_16(height);
        },
    )
}

#[must_use]
pub fn mdia(track: &Track, creation_time: u64) -> Mp4Box {
    let handler = match track.info {
        TrackInfo::Video(_) => *b"vide",
        TrackInfo::Audio(_) => *b"soun",
    };
    Mp4Box::new(mp4::TYPE_MDIA).with_children([
        mdhd(track, creation_time),
        hdlr(handler),
        minf(track),
    ])
}

// Media header. The duration is in the track's own timescale.
#[must_use]
pub fn mdhd(track: &Track, creation_time: u64) -> Mp4Box {
    let duration = track.end_timestamp();
    let version = version_for(&[creation_time, duration]);
    Mp4Box::full(mp4::TYPE_MDHD, version, 0, |buf| {
        put_u32_or_u64(buf, version, creation_time); // Creation time.
        put_u32_or_u64(buf, version, creation_time); // Modification time.
        buf.put_u32(track.timescale);
        put_u32_or_u64(buf, version, duration);
        buf.put_u16(LANGUAGE_UNDETERMINED);
        buf.put_u16(0); // Quality.
    })
}

#[must_use]
pub fn hdlr(component_subtype: [u8; 4]) -> Mp4Box {
    Mp4Box::full(mp4::TYPE_HDLR, 0, 0, |buf| {
        buf.put_fourcc(HANDLER_COMPONENT_TYPE);
        buf.put_fourcc(component_subtype);
        buf.put_u32(0); // Component manufacturer.
        buf.put_u32(0); // Component flags.
        buf.put_u32(0); // Component flags mask.
        buf.put_slice(HANDLER_NAME.as_bytes());
        buf.put_u8(0);
    })
}

/*
   minf
   - vmhd / smhd
   - dinf
     - dref
       - url
   - stbl
*/

#[must_use]
pub fn minf(track: &Track) -> Mp4Box {
    let media_header = match track.info {
        TrackInfo::Video(_) => vmhd(),
        TrackInfo::Audio(_) => smhd(),
    };
    Mp4Box::new(mp4::TYPE_MINF).with_children([media_header, dinf(), stbl(track)])
}

#[must_use]
pub fn vmhd() -> Mp4Box {
    Mp4Box::full(mp4::TYPE_VMHD, 0, 1, |buf| {
        buf.put_u16(0); // Graphics mode.
        buf.put_zeros(6); // Opcolor.
    })
}

#[must_use]
pub fn smhd() -> Mp4Box {
    Mp4Box::full(mp4::TYPE_SMHD, 0, 0, |buf| {
        buf.put_u16(0); // Balance.
        buf.put_u16(0); // Reserved.
    })
}

#[must_use]
pub fn dinf() -> Mp4Box {
    Mp4Box::new(mp4::TYPE_DINF).with_child(dref())
}

#[must_use]
pub fn dref() -> Mp4Box {
    Mp4Box::full(mp4::TYPE_DREF, 0, 0, |buf| buf.put_u32(1)).with_child(url())
}

// Flag 1, the media data is in the same file.
#[must_use]
pub fn url() -> Mp4Box {
    Mp4Box::full(mp4::TYPE_URL, 0, 1, |_| {})
}
