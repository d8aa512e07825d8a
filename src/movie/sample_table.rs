// SPDX-License-Identifier: GPL-2.0-or-later

use crate::track::{AudioInfo, Track, TrackInfo, VideoInfo};
use bytes::BufMut;
use mp4::{BufMutExt, Mp4Box};

// Offsets at or above this need the 64 bit chunk offset box.
const CO64_THRESHOLD: u64 = 1 << 32;

// 72 dpi as 16.16 fixed point.
const RESOLUTION_72_DPI: u32 = 0x0048_0000;

const VIDEO_DEPTH: u16 = 0x0018;

const AUDIO_SAMPLE_SIZE: u16 = 16;

/*
   stbl
   - stsd
     - avc1 / hvc1 / vp09 / av01 / mp4a / Opus
       - avcC / hvcC / vpcC / av1C / esds / dOps
   - stts
   - stss (omitted if every sample is a key frame)
   - stsc
   - stsz
   - stco / co64
*/

#[must_use]
pub fn stbl(track: &Track) -> Mp4Box {
    Mp4Box::new(mp4::TYPE_STBL)
        .with_child(stsd(track))
        .with_child(stts(track))
        .with_children(stss(track))
        .with_child(stsc(track))
        .with_child(stsz(track))
        .with_child(chunk_offsets(track))
}

// Sample description with exactly one entry.
#[must_use]
pub fn stsd(track: &Track) -> Mp4Box {
    let entry = match &track.info {
        TrackInfo::Video(info) => video_sample_entry(track, info),
        TrackInfo::Audio(info) => sound_sample_entry(track, info),
    };
    Mp4Box::full(mp4::TYPE_STSD, 0, 0, |buf| buf.put_u32(1)).with_child(entry)
}

fn put_sample_entry(buf: &mut impl BufMut) {
    buf.put_zeros(6); // Reserved.
    buf.put_u16(1); // Data reference index.
}

#[must_use]
pub fn video_sample_entry(track: &Track, info: &VideoInfo) -> Mp4Box {
    Mp4Box::with_contents(info.codec.sample_entry_type(), |buf| {
        put_sample_entry(buf);
        buf.put_u16(0); // Pre-defined.
        buf.put_u16(0); // Reserved.
        buf.put_zeros(12); // Pre-defined.
        buf.put_u16(info.width);
        buf.put_u16(info.height);
        buf.put_u32(RESOLUTION_72_DPI); // Horizontal resolution.
        buf.put_u32(RESOLUTION_72_DPI); // Vertical resolution.
        buf.put_u32(0); // Reserved.
        buf.put_u16(1); // Frame count.
        buf.put_zeros(32); // Compressor name.
        buf.put_u16(VIDEO_DEPTH);
        buf.put_i16(-1); // Pre-defined.
    })
    .with_children(info.codec.config_box(track.codec_private.as_ref()))
}

#[must_use]
pub fn sound_sample_entry(track: &Track, info: &AudioInfo) -> Mp4Box {
    Mp4Box::with_contents(info.codec.sample_entry_type(), |buf| {
        put_sample_entry(buf);
        buf.put_u16(0); // Version.
        buf.put_u16(0); // Revision level.
        buf.put_u32(0); // Vendor.
        buf.put_u16(info.number_of_channels);
        buf.put_u16(AUDIO_SAMPLE_SIZE);
        buf.put_u16(0); // Compression ID.
        buf.put_u16(0); // Packet size.
        buf.put_fixed_16_16(info.sample_rate);
    })
    .with_child(info.codec.config_box(info, track.codec_private.as_ref()))
}

// Time to sample, copied from the compacted table.
#[must_use]
pub fn stts(track: &Track) -> Mp4Box {
    Mp4Box::full(mp4::TYPE_STTS, 0, 0, |buf| {
        buf.put_count(track.time_to_sample_table.len());
        for entry in &track.time_to_sample_table {
            buf.put_u32(entry.sample_count);
            buf.put_u32(entry.sample_delta);
        }
    })
}

// Sync samples. None when every sample is a key frame,
// a missing stss box means that all samples are sync samples.
#[must_use]
pub fn stss(track: &Track) -> Option<Mp4Box> {
    if track.all_key_frames() {
        return None;
    }
    let key_samples: Vec<u32> = track
        .samples
        .iter()
        .zip(1_u32..)
        .filter(|(sample, _)| sample.is_key())
        .map(|(_, number)| number)
        .collect();

    Some(Mp4Box::full(mp4::TYPE_STSS, 0, 0, |buf| {
        buf.put_count(key_samples.len());
        for number in key_samples {
            buf.put_u32(number);
        }
    }))
}

// Sample to chunk, copied from the compacted table.
#[must_use]
pub fn stsc(track: &Track) -> Mp4Box {
    Mp4Box::full(mp4::TYPE_STSC, 0, 0, |buf| {
        buf.put_count(track.compactly_coded_chunk_table.len());
        for entry in &track.compactly_coded_chunk_table {
            buf.put_u32(entry.first_chunk);
            buf.put_u32(entry.samples_per_chunk);
            buf.put_u32(1); // Sample description index.
        }
    })
}

#[must_use]
pub fn stsz(track: &Track) -> Mp4Box {
    Mp4Box::full(mp4::TYPE_STSZ, 0, 0, |buf| {
        buf.put_u32(0); // Sample size, 0 means the sizes are in the table.
        buf.put_count(track.samples.len());
        for sample in &track.samples {
            buf.put_u32(sample.size);
        }
    })
}

// Chunk offsets of the finalized chunks. Uses co64 if the last
// offset does not fit in 32 bits, the table is never mixed width.
#[must_use]
pub fn chunk_offsets(track: &Track) -> Mp4Box {
    let chunks = &track.finalized_chunks;
    let needs_co64 = chunks.last().is_some_and(|c| c.offset >= CO64_THRESHOLD);
    if needs_co64 {
        log::debug!(
            "track {}: chunk offsets exceed 32 bits, using co64",
            track.id
        );
        return Mp4Box::full(mp4::TYPE_CO64, 0, 0, |buf| {
            buf.put_count(chunks.len());
            for chunk in chunks {
                buf.put_u64(chunk.offset);
            }
        });
    }

    Mp4Box::full(mp4::TYPE_STCO, 0, 0, |buf| {
        buf.put_count(chunks.len());
        for chunk in chunks {
            buf.put_u32(u32::try_from(chunk.offset).unwrap_or(u32::MAX));
        }
    })
}
