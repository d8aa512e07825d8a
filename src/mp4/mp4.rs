// SPDX-License-Identifier: GPL-2.0-or-later

mod fields;

#[cfg(test)]
mod test;

pub use fields::{
    mp4_time_from_unix, rescale, BufMutExt, InvalidRotationError, Matrix, Rotation,
    FIXED_16_16_ONE, FIXED_2_30_ONE, IDENTITY_MATRIX, MP4_EPOCH_OFFSET,
};

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{Read, Write};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

// Mpeg box type.
pub type BoxType = [u8; 4];

pub const TYPE_AV01: BoxType = *b"av01";
pub const TYPE_AV1C: BoxType = *b"av1C";
pub const TYPE_AVC1: BoxType = *b"avc1";
pub const TYPE_AVCC: BoxType = *b"avcC";
pub const TYPE_CO64: BoxType = *b"co64";
pub const TYPE_DINF: BoxType = *b"dinf";
pub const TYPE_DOPS: BoxType = *b"dOps";
pub const TYPE_DREF: BoxType = *b"dref";
pub const TYPE_ESDS: BoxType = *b"esds";
pub const TYPE_FREE: BoxType = *b"free";
pub const TYPE_FTYP: BoxType = *b"ftyp";
pub const TYPE_HDLR: BoxType = *b"hdlr";
pub const TYPE_HVC1: BoxType = *b"hvc1";
pub const TYPE_HVCC: BoxType = *b"hvcC";
pub const TYPE_MDAT: BoxType = *b"mdat";
pub const TYPE_MDHD: BoxType = *b"mdhd";
pub const TYPE_MDIA: BoxType = *b"mdia";
pub const TYPE_MINF: BoxType = *b"minf";
pub const TYPE_MOOV: BoxType = *b"moov";
pub const TYPE_MP4A: BoxType = *b"mp4a";
pub const TYPE_MVHD: BoxType = *b"mvhd";
pub const TYPE_OPUS: BoxType = *b"Opus";
pub const TYPE_SMHD: BoxType = *b"smhd";
pub const TYPE_STBL: BoxType = *b"stbl";
pub const TYPE_STCO: BoxType = *b"stco";
pub const TYPE_STSC: BoxType = *b"stsc";
pub const TYPE_STSD: BoxType = *b"stsd";
pub const TYPE_STSS: BoxType = *b"stss";
pub const TYPE_STSZ: BoxType = *b"stsz";
pub const TYPE_STTS: BoxType = *b"stts";
pub const TYPE_TKHD: BoxType = *b"tkhd";
pub const TYPE_TRAK: BoxType = *b"trak";
pub const TYPE_URL: BoxType = *b"url ";
pub const TYPE_VMHD: BoxType = *b"vmhd";
pub const TYPE_VP09: BoxType = *b"vp09";
pub const TYPE_VPCC: BoxType = *b"vpcC";

// Size of a box header with a 32 bit size field.
pub const HEADER_SIZE: u64 = 8;

// Size of a box header with the 64 bit size field.
pub const LARGE_HEADER_SIZE: u64 = 16;

#[derive(Debug, Error)]
pub enum Mp4Error {
    #[error("write: {0}")]
    Write(#[from] std::io::Error),

    #[error("from int: {0} {1}")]
    FromInt(String, std::num::TryFromIntError),

    #[error("size override of {box_type:?} is {size} bytes but {required} are needed")]
    SizeOverride {
        box_type: BoxType,
        size: u64,
        required: u64,
    },
}

/// Node of a box tree.
///
/// The serialized box is the header followed by `contents`
/// and then each of the `children` in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mp4Box {
    pub box_type: BoxType,
    pub contents: Option<Bytes>,
    pub children: Vec<Mp4Box>,

    // Total size of the box, overrides the computed size.
    // The space after the contents and children is zero padded.
    pub size: Option<u64>,

    // Reserve a 64 bit size field regardless of the actual size.
    pub large_size: bool,
}

impl Mp4Box {
    // Box without contents, typically a container.
    #[must_use]
    pub fn new(box_type: BoxType) -> Self {
        Self {
            box_type,
            ..Default::default()
        }
    }

    // Box with contents written by `write`.
    pub fn with_contents(box_type: BoxType, write: impl FnOnce(&mut BytesMut)) -> Self {
        let mut buf = BytesMut::new();
        write(&mut buf);
        Self::from_bytes(box_type, buf)
    }

    // Box with contents copied verbatim.
    pub fn from_bytes(box_type: BoxType, contents: impl Into<Bytes>) -> Self {
        Self {
            box_type,
            contents: Some(contents.into()),
            ..Default::default()
        }
    }

    // Full box, the version and 24 bit flags precede the contents.
    pub fn full(
        box_type: BoxType,
        version: u8,
        flags: u32,
        write: impl FnOnce(&mut BytesMut),
    ) -> Self {
        Self::with_contents(box_type, |buf| {
            buf.put_u8(version);
            buf.put_u24(flags);
            write(buf);
        })
    }

    #[must_use]
    pub fn with_child(mut self, child: Mp4Box) -> Self {
        self.children.push(child);
        self
    }

    // Appends children in order. Absent `Option` children are skipped.
    #[must_use]
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Mp4Box>,
    {
        self.children.extend(children);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_large_size(mut self, large_size: bool) -> Self {
        self.large_size = large_size;
        self
    }

    // Contents or an empty slice.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        self.contents.as_deref().unwrap_or_default()
    }

    // First direct child with the given type.
    #[must_use]
    pub fn child(&self, box_type: BoxType) -> Option<&Mp4Box> {
        self.children.iter().find(|c| c.box_type == box_type)
    }

    // Follows a path of box types down the tree.
    #[must_use]
    pub fn find(&self, path: &[BoxType]) -> Option<&Mp4Box> {
        path.iter()
            .try_fold(self, |node, box_type| node.child(*box_type))
    }

    #[must_use]
    pub fn header_size(&self) -> u64 {
        if self.large_size {
            LARGE_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }

    // Size of the header, contents and children without the override.
    fn computed_size(&self) -> u64 {
        let contents = u64::try_from(self.contents().len()).unwrap_or(u64::MAX);
        self.children
            .iter()
            .fold(self.header_size().saturating_add(contents), |total, c| {
                total.saturating_add(c.size())
            })
    }

    // Size returns the total size of the box including children.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.unwrap_or_else(|| self.computed_size())
    }

    // Marshal box including children.
    pub fn marshal(&self, w: &mut impl Write) -> Result<(), Mp4Error> {
        self.marshal_dyn(w)
    }

    fn marshal_dyn(&self, w: &mut dyn Write) -> Result<(), Mp4Error> {
        let size = self.size();
        let required = self.computed_size();
        if size < required {
            return Err(Mp4Error::SizeOverride {
                box_type: self.box_type,
                size,
                required,
            });
        }

        self.write_header(w, size)?;
        w.write_all(self.contents())?;
        for child in &self.children {
            child.marshal_dyn(w)?;
        }

        // Zero padding for size overrides.
        let padding = size - required;
        if padding != 0 {
            std::io::copy(&mut std::io::repeat(0).take(padding), w)?;
        }
        Ok(())
    }

    fn write_header(&self, w: &mut dyn Write, size: u64) -> Result<(), Mp4Error> {
        if self.large_size {
            w.write_all(&1_u32.to_be_bytes())?;
            w.write_all(&self.box_type)?;
            w.write_all(&size.to_be_bytes())?;
        } else {
            let size = u32::try_from(size).map_err(|e| {
                Mp4Error::FromInt(
                    format!("size of '{}'", String::from_utf8_lossy(&self.box_type)),
                    e,
                )
            })?;
            w.write_all(&size.to_be_bytes())?;
            w.write_all(&self.box_type)?;
        }
        Ok(())
    }

    // Marshal box including children into a new buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>, Mp4Error> {
        let capacity = usize::try_from(self.size())
            .map_err(|e| Mp4Error::FromInt("box size".to_owned(), e))?;
        let mut buf = Vec::with_capacity(capacity);
        self.marshal(&mut buf)?;
        Ok(buf)
    }

    // Marshal box including children to an async writer.
    // The tree is marshaled in memory first and written in one call.
    pub async fn marshal_async<W>(&self, w: &mut W) -> Result<(), Mp4Error>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.to_vec()?;
        w.write_all(&buf).await?;
        Ok(())
    }
}

// Marshals boxes back to back.
pub fn marshal_boxes(w: &mut impl Write, boxes: &[Mp4Box]) -> Result<u64, Mp4Error> {
    let mut total: u64 = 0;
    for b in boxes {
        b.marshal(w)?;
        total = total.saturating_add(b.size());
    }
    Ok(total)
}
