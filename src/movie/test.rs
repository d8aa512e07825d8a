#![allow(clippy::unwrap_used)]

use crate::*;
use bytes::Bytes;
use mp4::{Rotation, IDENTITY_MATRIX};
use pretty_assertions::assert_eq;
use pretty_hex::pretty_hex;
use test_case::test_case;

fn video_track(id: u32) -> Track {
    Track {
        id,
        timescale: 90000,
        info: TrackInfo::Video(VideoInfo {
            width: 650,
            height: 450,
            rotation: Rotation::Deg0,
            codec: VideoCodec::Avc,
        }),
        samples: vec![
            Sample {
                timestamp: 0,
                duration: 3000,
                size: 2,
                kind: SampleKind::Key,
            },
            Sample {
                timestamp: 3000,
                duration: 3000,
                size: 3,
                kind: SampleKind::Delta,
            },
            Sample {
                timestamp: 6000,
                duration: 3000,
                size: 4,
                kind: SampleKind::Delta,
            },
        ],
        time_to_sample_table: vec![SttsEntry {
            sample_count: 3,
            sample_delta: 3000,
        }],
        compactly_coded_chunk_table: vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 3,
        }],
        finalized_chunks: vec![Chunk {
            offset: 0x30,
            size: 9,
            sample_count: 3,
        }],
        codec_private: Some(Bytes::from_static(&[1, 0x64, 0])),
    }
}

fn audio_track(id: u32) -> Track {
    Track {
        id,
        timescale: 48000,
        info: TrackInfo::Audio(AudioInfo {
            number_of_channels: 2,
            sample_rate: 48000,
            codec: AudioCodec::Opus,
        }),
        samples: vec![Sample {
            timestamp: 0,
            duration: 960,
            size: 100,
            kind: SampleKind::Key,
        }],
        time_to_sample_table: vec![SttsEntry {
            sample_count: 1,
            sample_delta: 960,
        }],
        compactly_coded_chunk_table: vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 1,
        }],
        finalized_chunks: vec![Chunk {
            offset: 0x40,
            size: 100,
            sample_count: 1,
        }],
        codec_private: None,
    }
}

fn empty_track(id: u32) -> Track {
    Track {
        samples: Vec::new(),
        time_to_sample_table: Vec::new(),
        compactly_coded_chunk_table: Vec::new(),
        finalized_chunks: Vec::new(),
        ..video_track(id)
    }
}

// Reads the big-endian u32 at `pos` of the box contents.
fn read_u32(b: &Mp4Box, pos: usize) -> u32 {
    u32::from_be_bytes(b.contents()[pos..pos + 4].try_into().unwrap())
}

#[test]
#[allow(clippy::too_many_lines)]
fn test_moov() {
    let moov = moov(&[video_track(1)], 0);

    let want = vec![
        0, 0, 2, 0x62, b'm', b'o', b'o', b'v', //
        0, 0, 0, 0x6c, b'm', b'v', b'h', b'd', //
        0, 0, 0, 0, // Fullbox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 0, 3, 0xe8, // Timescale.
        0, 0, 0, 0x64, // Duration.
        0, 1, 0, 0, // Rate.
        1, 0, // Volume.
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Reserved.
        0, 1, 0, 0, 0, 0, 0, 0, 0, // Matrix.
        0, 0, 0, 0, 0, 0, 0, 0, 1, //
        0, 0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0x40, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, // Pre-defined.
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 2, // Next track ID.
        //
        /* Video trak */
        0, 0, 1, 0xee, b't', b'r', b'a', b'k', //
        0, 0, 0, 0x5c, b't', b'k', b'h', b'd', //
        0, 0, 0, 3, // Fullbox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 0, 0, 1, // Track ID.
        0, 0, 0, 0, // Reserved0.
        0, 0, 0, 0x64, // Duration.
        0, 0, 0, 0, 0, 0, 0, 0, // Reserved1.
        0, 0, // Layer.
        0, 0, // Alternate group.
        0, 0, // Volume.
        0, 0, // Reserved2.
        0, 1, 0, 0, 0, 0, 0, 0, 0, // Matrix.
        0, 0, 0, 0, 0, 0, 0, 0, 1, //
        0, 0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0x40, 0, 0, 0, //
        2, 0x8a, 0, 0, // Width.
        1, 0xc2, 0, 0, // Height.
        0, 0, 1, 0x8a, b'm', b'd', b'i', b'a', //
        0, 0, 0, 0x20, b'm', b'd', b'h', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 1, 0x5f, 0x90, // Time scale.
        0, 0, 0x23, 0x28, // Duration.
        0x55, 0xc4, // Language.
        0, 0, // Quality.
        0, 0, 0, 0x2d, b'h', b'd', b'l', b'r', //
        0, 0, 0, 0, // FullBox.
        b'm', b'h', b'l', b'r', // Component type.
        b'v', b'i', b'd', b'e', // Component subtype.
        0, 0, 0, 0, // Manufacturer.
        0, 0, 0, 0, // Flags.
        0, 0, 0, 0, // Flags mask.
        b'M', b'o', b'v', b'i', b'e', b'H', b'a', b'n', b'd', b'l', b'e', b'r', 0, //
        0, 0, 1, 0x35, b'm', b'i', b'n', b'f', //
        0, 0, 0, 0x14, b'v', b'm', b'h', b'd', //
        0, 0, 0, 1, // FullBox.
        0, 0, // Graphics mode.
        0, 0, 0, 0, 0, 0, // OpColor.
        0, 0, 0, 0x24, b'd', b'i', b'n', b'f', //
        0, 0, 0, 0x1c, b'd', b'r', b'e', b'f', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 0xc, b'u', b'r', b'l', b' ', //
        0, 0, 0, 1, // FullBox.
        0, 0, 0, 0xf5, b's', b't', b'b', b'l', //
        0, 0, 0, 0x71, b's', b't', b's', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 0x61, b'a', b'v', b'c', b'1', //
        0, 0, 0, 0, 0, 0, // Reserved.
        0, 1, // Data reference index.
        0, 0, // Predefined.
        0, 0, // Reserved.
        0, 0, 0, 0, // Predefined2.
        0, 0, 0, 0, //
        0, 0, 0, 0, //
        2, 0x8a, // Width.
        1, 0xc2, // Height.
        0, 0x48, 0, 0, // Horizresolution
        0, 0x48, 0, 0, // Vertresolution
        0, 0, 0, 0, // Reserved2.
        0, 1, // Frame count.
        0, 0, 0, 0, 0, 0, 0, 0, // Compressor name.
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0x18, // Depth.
        0xff, 0xff, // Predefined3.
        0, 0, 0, 0x0b, b'a', b'v', b'c', b'C', //
        1, 0x64, 0, // Codec private.
        0, 0, 0, 0x18, b's', b't', b't', b's', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 3, // Entry1 sample count.
        0, 0, 0x0b, 0xb8, // Entry1 sample delta.
        0, 0, 0, 0x14, b's', b't', b's', b's', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, // Entry1.
        0, 0, 0, 0x1c, b's', b't', b's', b'c', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, // Entry1 first chunk.
        0, 0, 0, 3, // Entry1 samples per chunk.
        0, 0, 0, 1, // Entry1 sample description index.
        0, 0, 0, 0x20, b's', b't', b's', b'z', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Sample size.
        0, 0, 0, 3, // Sample count.
        0, 0, 0, 2, // Entry1 size.
        0, 0, 0, 3, // Entry2 size.
        0, 0, 0, 4, // Entry3 size.
        0, 0, 0, 0x14, b's', b't', b'c', b'o', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 0x30, // Chunk offset1.
    ];

    assert_eq!(610, moov.size());
    assert_eq!(pretty_hex(&want), pretty_hex(&moov.to_vec().unwrap()));
}

#[test]
fn test_moov_children() {
    let tracks = [video_track(1), audio_track(2)];
    let moov = moov(&tracks, 0);
    let types: Vec<mp4::BoxType> = moov.children.iter().map(|c| c.box_type).collect();
    assert_eq!(vec![*b"mvhd", *b"trak", *b"trak"], types);

    let audio = &moov.children[2];
    let minf = audio.find(&[*b"mdia", *b"minf"]).unwrap();
    assert_eq!(*b"smhd", minf.children[0].box_type);
    let hdlr = audio.find(&[*b"mdia", *b"hdlr"]).unwrap();
    assert_eq!(b"soun", &hdlr.contents()[8..12]);
    let entry = minf
        .find(&[*b"stbl", *b"stsd", *b"Opus", *b"dOps"])
        .unwrap();
    assert_eq!(11, entry.contents().len());
}

#[test_case(&[1, 3, 2], 4; "unordered")]
#[test_case(&[7], 8; "single")]
#[test_case(&[1, 1], 2; "colliding")]
fn test_mvhd_next_track_id(ids: &[u32], want: u32) {
    let tracks: Vec<Track> = ids.iter().map(|id| video_track(*id)).collect();
    let mvhd = header::mvhd(&tracks, 0);
    assert_eq!(want, read_u32(&mvhd, 96));
}

#[test]
fn test_mvhd_duration() {
    // 9000 / 90000 = 100ms and 960 / 48000 = 20ms.
    let mut audio = audio_track(2);
    audio.samples[0].timestamp = 48000;
    // (48000 + 960) / 48000 = 1020ms.
    let tracks = [video_track(1), audio, empty_track(3)];
    let mvhd = header::mvhd(&tracks, 0);
    assert_eq!(1020, read_u32(&mvhd, 16));
}

#[test]
fn test_mvhd_duration_no_samples() {
    let mvhd = header::mvhd(&[empty_track(1)], 0);
    assert_eq!(0, read_u32(&mvhd, 16));
    assert_eq!(2, read_u32(&mvhd, 96));
}

#[test]
fn test_mvhd_version_1() {
    let creation_time = u64::from(u32::MAX) + 1;
    let mvhd = header::mvhd(&[video_track(1)], creation_time);
    assert_eq!(1, mvhd.contents()[0]);
    assert_eq!(112, mvhd.contents().len());
    assert_eq!(
        creation_time.to_be_bytes(),
        mvhd.contents()[4..12]
    );
}

#[test]
fn test_tkhd_duration_and_volume() {
    let tkhd = header::tkhd(&video_track(1), 0);
    assert_eq!(84, tkhd.contents().len());
    assert_eq!(3, read_u32(&tkhd, 0)); // Version and flags.
    assert_eq!(100, read_u32(&tkhd, 20));
    assert_eq!(&[0_u8, 0], &tkhd.contents()[36..38]); // Volume.

    let tkhd = header::tkhd(&audio_track(2), 0);
    assert_eq!(2, read_u32(&tkhd, 12));
    assert_eq!(20, read_u32(&tkhd, 20));
    assert_eq!(&[1_u8, 0], &tkhd.contents()[36..38]);
    assert_eq!(0, read_u32(&tkhd, 76)); // Width.
    assert_eq!(0, read_u32(&tkhd, 80)); // Height.
}

#[test_case(Rotation::Deg0; "0")]
#[test_case(Rotation::Deg90; "90")]
#[test_case(Rotation::Deg180; "180")]
#[test_case(Rotation::Deg270; "270")]
fn test_tkhd_rotation(rotation: Rotation) {
    let mut track = video_track(1);
    let TrackInfo::Video(info) = &mut track.info else {
        unreachable!()
    };
    info.rotation = rotation;

    let tkhd = header::tkhd(&track, 0);
    let matrix: Vec<i32> = tkhd.contents()[40..76]
        .chunks_exact(4)
        .map(|v| i32::from_be_bytes(v.try_into().unwrap()))
        .collect();
    assert_eq!(rotation.matrix().to_vec(), matrix);
    if rotation == Rotation::Deg0 {
        assert_eq!(IDENTITY_MATRIX.to_vec(), matrix);
    }
}

#[test]
fn test_mdhd_local_timescale() {
    let mdhd = header::mdhd(&audio_track(1), 0);
    assert_eq!(48000, read_u32(&mdhd, 12));
    assert_eq!(960, read_u32(&mdhd, 16));
    assert_eq!(&[0x55_u8, 0xc4, 0, 0], &mdhd.contents()[20..24]);
}

#[test_case(
        false,
        &[
            0, 0, 0, 0x1c, b'f', b't', b'y', b'p', //
            b'i', b's', b'o', b'm', // Major brand.
            0, 0, 0, 0, // Minor version.
            b'i', b's', b'o', b'm', // Compatible brands.
            b'a', b'v', b'c', b'1', //
            b'm', b'p', b'4', b'1', //
        ]; "avc"
    )]
#[test_case(
        true,
        &[
            0, 0, 0, 0x18, b'f', b't', b'y', b'p', //
            b'i', b's', b'o', b'm', // Major brand.
            0, 0, 0, 0, // Minor version.
            b'i', b's', b'o', b'4', // Compatible brands.
            b'h', b'v', b'c', b'1', //
        ]; "hevc"
    )]
fn test_ftyp(holds_hevc: bool, want: &[u8]) {
    assert_eq!(want, ftyp(holds_hevc).to_vec().unwrap());
}

#[test]
fn test_mdat() {
    assert_eq!(b"\0\0\0\x08mdat".to_vec(), mdat(false).to_vec().unwrap());
    let large = mdat(true);
    assert!(large.large_size);
    assert_eq!(
        b"\0\0\0\x01mdat\0\0\0\0\0\0\0\x10".to_vec(),
        large.to_vec().unwrap()
    );
}

#[test]
fn test_free() {
    let free = free(64);
    assert_eq!(64, free.size());
    let buf = free.to_vec().unwrap();
    assert_eq!(64, buf.len());
    assert_eq!(b"\0\0\0\x40free", &buf[..8]);
    assert!(buf[8..].iter().all(|v| *v == 0));
}

#[test]
fn test_file_boxes() {
    let mut hevc = video_track(2);
    hevc.info = TrackInfo::Video(VideoInfo {
        width: 1920,
        height: 1080,
        rotation: Rotation::Deg0,
        codec: VideoCodec::Hevc,
    });
    let config = MovieConfig {
        creation_time: 5,
        reserve_large_mdat: true,
    };

    let [ftyp_box, mdat_box, moov_box] = file_boxes(&[audio_track(1), hevc], &config);
    assert_eq!(ftyp(true), ftyp_box);
    assert_eq!(mdat(true), mdat_box);
    assert_eq!(*b"moov", moov_box.box_type);
    assert_eq!(5, read_u32(&moov_box.children[0], 4));

    let [ftyp_box, ..] = file_boxes(&[audio_track(1)], &MovieConfig::default());
    assert_eq!(ftyp(false), ftyp_box);
}

#[test]
fn test_movie_config_deserialize() {
    let config: MovieConfig =
        serde_json::from_str(r#"{"creationTime": 3786825600, "reserveLargeMdat": true}"#)
            .unwrap();
    assert_eq!(
        MovieConfig {
            creation_time: 3_786_825_600,
            reserve_large_mdat: true,
        },
        config
    );
    let config: MovieConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(MovieConfig::default(), config);
}

#[test]
fn test_track_info_deserialize() {
    let info: TrackInfo = serde_json::from_str(
        r#"{"type": "video", "width": 1280, "height": 720, "rotation": 90, "codec": "av1"}"#,
    )
    .unwrap();
    assert_eq!(
        TrackInfo::Video(VideoInfo {
            width: 1280,
            height: 720,
            rotation: Rotation::Deg90,
            codec: VideoCodec::Av1,
        }),
        info
    );

    let info: TrackInfo = serde_json::from_str(
        r#"{"type": "audio", "numberOfChannels": 1, "sampleRate": 44100, "codec": "aac"}"#,
    )
    .unwrap();
    assert_eq!(
        TrackInfo::Audio(AudioInfo {
            number_of_channels: 1,
            sample_rate: 44100,
            codec: AudioCodec::Aac,
        }),
        info
    );

    assert!(serde_json::from_str::<TrackInfo>(
        r#"{"type": "video", "width": 1, "height": 1, "rotation": 45, "codec": "avc"}"#,
    )
    .is_err());
}
