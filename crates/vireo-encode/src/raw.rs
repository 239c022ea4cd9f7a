//! Raw Frame Assembly
//!
//! Maps a chunked source bitmap plus a crop rectangle to the contiguous raw
//! frame the codec consumes. Two copy strategies exist:
//!
//! - **Line copy** when the stream stride differs from the bitmap stride
//!   (the crop excludes columns): each row is copied individually, leaving
//!   out the pixels to the left and right of the crop.
//! - **Chunk copy** when the strides match: whole chunks are copied
//!   back to back. The encoder prefers wrapping the chunks zero-copy and
//!   only falls back to this for the tail that exceeds the codec's
//!   per-buffer memory limit.
//!
//! Rows are never reordered, even for bottom-up bitmaps; `top_down` only
//! changes how many rows are skipped at the start of the data.
//!
//! Chunks are expected to hold whole rows: a chunk whose length is not a
//! multiple of the bitmap stride cannot be walked row by row and rejects
//! the frame (multi-chunk bitmaps only).

use crate::bitmap::{CropRect, SourceBitmap};
use crate::error::{EncodeError, Result};

/// Byte layout of the encoder-visible frame for a bitmap/crop pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Bytes per row in the encoder-visible frame
    pub stream_stride: u32,
    /// Rows in the encoder-visible frame
    pub height: u32,
    /// Source rows skipped before the first visible row
    pub skip_lines: u32,
    /// Byte offset of the first visible row in the chunk sequence
    pub chunk_offset: usize,
    /// Total frame length in bytes
    pub frame_len: usize,
}

impl FrameLayout {
    /// Compute the layout for a bitmap and crop rectangle
    #[must_use]
    pub fn of(bitmap: &SourceBitmap, crop: &CropRect) -> Self {
        let stream_stride = crop.width() * bitmap.format.bytes_per_pixel();
        let height = crop.height();
        let skip_lines = if bitmap.top_down {
            crop.top
        } else {
            bitmap.height - crop.bottom
        };
        Self {
            stream_stride,
            height,
            skip_lines,
            chunk_offset: skip_lines as usize * bitmap.stride as usize,
            frame_len: stream_stride as usize * height as usize,
        }
    }
}

/// Materialize the cropped frame as one contiguous buffer
///
/// Picks the copy strategy from the stride relation. Returns
/// [`EncodeError::InvalidCrop`] for rectangles outside the bitmap and the
/// padding/truncation errors of the underlying copy.
pub fn materialize(bitmap: &SourceBitmap, crop: &CropRect) -> Result<Vec<u8>> {
    if !crop.contained_in(bitmap) {
        return Err(EncodeError::InvalidCrop {
            left: crop.left,
            top: crop.top,
            right: crop.right,
            bottom: crop.bottom,
            width: bitmap.width,
            height: bitmap.height,
        });
    }
    let layout = FrameLayout::of(bitmap, crop);
    if layout.stream_stride == bitmap.stride {
        chunk_copy(bitmap, 0, layout.chunk_offset, layout.frame_len)
    } else {
        line_copy(bitmap, crop)
    }
}

/// Copy the cropped frame row by row
///
/// Used when the crop excludes columns, so each row contributes only
/// `stream_stride` of its `bitmap.stride` bytes.
pub fn line_copy(bitmap: &SourceBitmap, crop: &CropRect) -> Result<Vec<u8>> {
    let layout = FrameLayout::of(bitmap, crop);
    let stream_stride = layout.stream_stride as usize;
    let stride = bitmap.stride as usize;
    let count = bitmap.chunks.len();

    let mut dst = Vec::with_capacity(layout.frame_len);
    let mut chunk_offset =
        layout.chunk_offset + crop.left as usize * bitmap.format.bytes_per_pixel() as usize;
    let mut chunk_index = 0;

    for _ in 0..layout.height {
        // We may have to move forward by more than one chunk the first
        // time around.
        loop {
            let Some(chunk) = bitmap.chunks.get(chunk_index) else {
                return Err(EncodeError::TruncatedBitmap {
                    missing: layout.frame_len - dst.len(),
                });
            };
            if chunk_offset < chunk.len() {
                break;
            }
            if count > 1 && chunk.len() % stride != 0 {
                return Err(EncodeError::PaddedChunk { index: chunk_index, count });
            }
            chunk_offset -= chunk.len();
            chunk_index += 1;
        }

        let chunk = &bitmap.chunks[chunk_index];
        if chunk_offset + stream_stride > chunk.len() {
            // The row runs off the end of the chunk, so the chunk does not
            // hold whole rows.
            return Err(EncodeError::PaddedChunk { index: chunk_index, count });
        }
        dst.extend_from_slice(&chunk.data[chunk_offset..chunk_offset + stream_stride]);
        chunk_offset += stride;
    }

    debug_assert_eq!(dst.len(), layout.frame_len);
    Ok(dst)
}

/// Copy `len` bytes starting at a chunk position, chunk by chunk
///
/// Used when the strides match, so the frame is a contiguous byte range of
/// the chunk sequence. The encoder also calls this for the spill tail of
/// the zero-copy path.
pub fn chunk_copy(
    bitmap: &SourceBitmap,
    chunk_index: usize,
    chunk_offset: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let stride = bitmap.stride as usize;
    let count = bitmap.chunks.len();

    let mut dst = Vec::with_capacity(len);
    let mut remaining = len;
    let mut chunk_offset = chunk_offset;

    for (index, chunk) in bitmap.chunks.iter().enumerate().skip(chunk_index) {
        if remaining == 0 {
            break;
        }
        if count > 1 && chunk.len() % stride != 0 {
            return Err(EncodeError::PaddedChunk { index, count });
        }
        if chunk_offset >= chunk.len() {
            chunk_offset -= chunk.len();
            continue;
        }

        let take = (chunk.len() - chunk_offset).min(remaining);
        dst.extend_from_slice(&chunk.data[chunk_offset..chunk_offset + take]);
        remaining -= take;
        chunk_offset = 0;
    }

    if remaining > 0 {
        return Err(EncodeError::TruncatedBitmap { missing: remaining });
    }
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::{BitmapChunk, PixelFormat};
    use bytes::Bytes;

    /// Bitmap whose byte at offset `i` is `i % 251`, split into `splits`
    /// chunks of whole rows.
    fn patterned_bitmap(width: u32, height: u32, splits: &[u32], top_down: bool) -> SourceBitmap {
        let stride = width * 4;
        let data: Vec<u8> = (0..(stride * height) as usize)
            .map(|i| (i % 251) as u8)
            .collect();

        let mut chunks = Vec::new();
        let mut row = 0;
        for &rows in splits {
            let start = (row * stride) as usize;
            let end = ((row + rows) * stride) as usize;
            chunks.push(BitmapChunk::new(Bytes::copy_from_slice(&data[start..end])));
            row += rows;
        }
        assert_eq!(row, height);

        SourceBitmap {
            format: PixelFormat::XRgb32,
            width,
            height,
            stride,
            top_down,
            chunks,
        }
    }

    fn reference_rows(bitmap: &SourceBitmap, crop: &CropRect) -> Vec<u8> {
        let layout = FrameLayout::of(bitmap, crop);
        let flat: Vec<u8> = bitmap
            .chunks
            .iter()
            .flat_map(|c| c.data.iter().copied())
            .collect();
        let mut expected = Vec::new();
        let left = crop.left as usize * 4;
        for line in 0..layout.height as usize {
            let start = (layout.skip_lines as usize + line) * bitmap.stride as usize + left;
            expected.extend_from_slice(&flat[start..start + layout.stream_stride as usize]);
        }
        expected
    }

    #[test]
    fn test_layout_full_frame() {
        let bitmap = patterned_bitmap(16, 8, &[8], true);
        let crop = CropRect::new(0, 0, 16, 8);
        let layout = FrameLayout::of(&bitmap, &crop);
        assert_eq!(layout.stream_stride, bitmap.stride);
        assert_eq!(layout.skip_lines, 0);
        assert_eq!(layout.frame_len, (16 * 4 * 8) as usize);
    }

    #[test]
    fn test_layout_bottom_up() {
        let bitmap = patterned_bitmap(16, 8, &[8], false);
        // Bottom-up: skipping starts from the unneeded rows at the end of
        // the image, which sit at the start of the data.
        let crop = CropRect::new(0, 2, 16, 6);
        let layout = FrameLayout::of(&bitmap, &crop);
        assert_eq!(layout.skip_lines, 2);
    }

    #[test]
    fn test_aligned_copy_matches_rows() {
        let bitmap = patterned_bitmap(16, 8, &[3, 3, 2], true);
        let crop = CropRect::new(0, 2, 16, 7);
        let out = materialize(&bitmap, &crop).unwrap();
        assert_eq!(out, reference_rows(&bitmap, &crop));
    }

    #[test]
    fn test_line_copy_matches_rows() {
        let bitmap = patterned_bitmap(16, 8, &[4, 4], true);
        let crop = CropRect::new(2, 1, 10, 7);
        let out = materialize(&bitmap, &crop).unwrap();
        assert_eq!(out.len(), (8 * 4 * 6) as usize);
        assert_eq!(out, reference_rows(&bitmap, &crop));
    }

    #[test]
    fn test_line_copy_across_chunks() {
        // Crop rows span all three chunks.
        let bitmap = patterned_bitmap(16, 9, &[2, 3, 4], true);
        let crop = CropRect::new(4, 0, 12, 9);
        let out = materialize(&bitmap, &crop).unwrap();
        assert_eq!(out, reference_rows(&bitmap, &crop));
    }

    #[test]
    fn test_bottom_up_rows_not_reordered() {
        let bitmap = patterned_bitmap(16, 8, &[8], false);
        let crop = CropRect::new(0, 0, 16, 8);
        let out = materialize(&bitmap, &crop).unwrap();
        // Full-frame bottom-up copy is byte-identical to the source data.
        assert_eq!(out, reference_rows(&bitmap, &crop));
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_padded_chunk_rejected() {
        let mut bitmap = patterned_bitmap(16, 8, &[4, 4], true);
        // Lop 7 bytes off the first chunk: no longer a whole number of rows.
        let truncated = bitmap.chunks[0].data.slice(0..bitmap.chunks[0].len() - 7);
        bitmap.chunks[0] = BitmapChunk::new(truncated);

        let crop = CropRect::new(2, 0, 10, 8);
        let err = materialize(&bitmap, &crop).unwrap_err();
        assert!(matches!(err, EncodeError::PaddedChunk { index: 0, count: 2 }));
    }

    #[test]
    fn test_truncated_bitmap_rejected() {
        let mut bitmap = patterned_bitmap(16, 8, &[4, 4], true);
        bitmap.chunks.pop();

        let crop = CropRect::new(0, 0, 16, 8);
        let err = materialize(&bitmap, &crop).unwrap_err();
        assert!(matches!(err, EncodeError::TruncatedBitmap { .. }));
    }

    #[test]
    fn test_crop_outside_bitmap_rejected() {
        let bitmap = patterned_bitmap(16, 8, &[8], true);
        let crop = CropRect::new(0, 0, 17, 8);
        assert!(matches!(
            materialize(&bitmap, &crop),
            Err(EncodeError::InvalidCrop { .. })
        ));
    }

    #[test]
    fn test_chunk_copy_spill_tail() {
        // The zero-copy spill: copy the tail starting mid-sequence.
        let bitmap = patterned_bitmap(16, 8, &[4, 4], true);
        let stride = bitmap.stride as usize;
        let out = chunk_copy(&bitmap, 1, stride, 2 * stride).unwrap();
        assert_eq!(out, reference_rows(&bitmap, &CropRect::new(0, 5, 16, 7)));
    }
}
