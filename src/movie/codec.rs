// SPDX-License-Identifier: GPL-2.0-or-later

use crate::track::AudioInfo;
use bytes::{BufMut, Bytes};
use mp4::{BoxType, BufMutExt, Mp4Box};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Avc,
    Hevc,
    Vp9,
    Av1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
}

impl VideoCodec {
    // Type of the visual sample entry.
    #[must_use]
    pub const fn sample_entry_type(self) -> BoxType {
        match self {
            Self::Avc => mp4::TYPE_AVC1,
            Self::Hevc => mp4::TYPE_HVC1,
            Self::Vp9 => mp4::TYPE_VP09,
            Self::Av1 => mp4::TYPE_AV01,
        }
    }

    // Type of the decoder configuration box.
    #[must_use]
    pub const fn config_box_type(self) -> BoxType {
        match self {
            Self::Avc => mp4::TYPE_AVCC,
            Self::Hevc => mp4::TYPE_HVCC,
            Self::Vp9 => mp4::TYPE_VPCC,
            Self::Av1 => mp4::TYPE_AV1C,
        }
    }

    // Decoder configuration box holding the codec private data verbatim.
    // Returns None without codec private data, the box is then left out.
    #[must_use]
    pub fn config_box(self, codec_private: Option<&Bytes>) -> Option<Mp4Box> {
        let Some(codec_private) = codec_private else {
            log::debug!(
                "{:?}: no codec private data, omitting {}",
                self,
                String::from_utf8_lossy(&self.config_box_type()),
            );
            return None;
        };
        Some(Mp4Box::from_bytes(
            self.config_box_type(),
            codec_private.clone(),
        ))
    }
}

impl AudioCodec {
    // Type of the audio sample entry.
    #[must_use]
    pub const fn sample_entry_type(self) -> BoxType {
        match self {
            Self::Aac => mp4::TYPE_MP4A,
            Self::Opus => mp4::TYPE_OPUS,
        }
    }

    #[must_use]
    pub fn config_box(self, info: &AudioInfo, codec_private: Option<&Bytes>) -> Mp4Box {
        match self {
            Self::Aac => {
                let asc = codec_private.map_or(&[][..], |v| &v[..]);
                if asc.is_empty() {
                    log::warn!("aac: no audio specific config");
                }
                esds(asc)
            }
            Self::Opus => dops(info),
        }
    }
}

// 14496-1 descriptor tags.
const ES_DESCR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCR_TAG: u8 = 0x04;
const DEC_SPECIFIC_INFO_TAG: u8 = 0x05;
const SL_CONFIG_DESCR_TAG: u8 = 0x06;

// Object type indication of 14496-3 audio.
const OBJECT_TYPE_MPEG4_AUDIO: u8 = 0x40;

// Stream type 5 (audio) in the upper six bits, reserved bit set.
const STREAM_TYPE_AUDIO: u8 = 0x15;

const AAC_BITRATE: u32 = 0x0001_fc17;

// Descriptor tag followed by a 4 byte expandable size.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
fn put_descriptor_header(buf: &mut impl BufMut, tag: u8, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX) & 0x0fff_ffff;
    buf.put_u8(tag);
    buf.put_u8(0x80 | (len >> 21) as u8 & 0x7f);
    buf.put_u8(0x80 | (len >> 14) as u8 & 0x7f);
    buf.put_u8(0x80 | (len >> 7) as u8 & 0x7f);
    buf.put_u8(len as u8 & 0x7f);
}

// Elementary stream descriptor box wrapping the audio specific config.
#[must_use]
pub fn esds(audio_specific_config: &[u8]) -> Mp4Box {
    let asc_len = audio_specific_config.len();
    Mp4Box::full(mp4::TYPE_ESDS, 0, 0, |buf| {
        put_descriptor_header(buf, ES_DESCR_TAG, 0x20 + asc_len);
        buf.put_u16(1); // ES_ID.
        buf.put_u8(0); // Flags.

        put_descriptor_header(buf, DECODER_CONFIG_DESCR_TAG, 0x12 + asc_len);
        buf.put_u8(OBJECT_TYPE_MPEG4_AUDIO);
        buf.put_u8(STREAM_TYPE_AUDIO);
        buf.put_u24(0); // Buffer size.
        buf.put_u32(AAC_BITRATE); // Max bitrate.
        buf.put_u32(AAC_BITRATE); // Avg bitrate.

        put_descriptor_header(buf, DEC_SPECIFIC_INFO_TAG, asc_len);
        buf.put_slice(audio_specific_config);

        put_descriptor_header(buf, SL_CONFIG_DESCR_TAG, 1);
        buf.put_u8(0x02); // Predefined, reserved for MP4 files.
    })
}

// Pre-skip of 80ms at 48kHz.
const OPUS_PRE_SKIP: u16 = 3840;

// Opus specific box, single stream channel mapping only.
#[must_use]
pub fn dops(info: &AudioInfo) -> Mp4Box {
    Mp4Box::with_contents(mp4::TYPE_DOPS, |buf| {
        buf.put_u8(0); // Version.
        buf.put_u8(u8::try_from(info.number_of_channels).unwrap_or(u8::MAX));
        buf.put_u16(OPUS_PRE_SKIP);
        buf.put_u32(info.sample_rate);
        buf.put_i16(0); // Output gain.
        buf.put_u8(0); // Channel mapping family.
    })
}
