// hic/block.rs

use std::io::Read;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::binary_buffer::BinaryBuffer;
use crate::error::{HicdexError, Result};

/// Location of one compressed block in the file body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub position: i64,
    pub size: i32,
}

/// One decoded matrix cell, in chromosome-relative bin coordinates:
/// `x` runs along the chrom1 axis, `y` along chrom2.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockRecord {
    pub x: i32,
    pub y: i32,
    pub count: f32,
}

/// Inflate and decode one block payload (versions 8 and 9).
pub fn decode_block(compressed: &[u8], version: i32) -> Result<Vec<BlockRecord>> {
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| HicdexError::FormatError(format!("corrupt block payload: {e}")))?;
    let mut buf = BinaryBuffer::from_vec(raw);

    let n_records = buf.get_i32()?.max(0) as usize;
    let mut records = Vec::with_capacity(n_records);

    let x_offset = buf.get_i32()?;
    let y_offset = buf.get_i32()?;
    let short_counts = buf.get_u8()? == 0;
    let (short_x, short_y) = if version > 8 {
        (buf.get_u8()? == 0, buf.get_u8()? == 0)
    } else {
        (true, true)
    };

    let encoding = buf.get_u8()?;
    match encoding {
        // list of rows
        1 => {
            let row_count = if short_y {
                i32::from(buf.get_i16()?)
            } else {
                buf.get_i32()?
            };
            for _ in 0..row_count {
                let y = if short_y {
                    y_offset + i32::from(buf.get_i16()?)
                } else {
                    y_offset + buf.get_i32()?
                };
                let col_count = if short_x {
                    i32::from(buf.get_i16()?)
                } else {
                    buf.get_i32()?
                };
                for _ in 0..col_count {
                    let x = if short_x {
                        x_offset + i32::from(buf.get_i16()?)
                    } else {
                        x_offset + buf.get_i32()?
                    };
                    let count = if short_counts {
                        f32::from(buf.get_i16()?)
                    } else {
                        buf.get_f32()?
                    };
                    records.push(BlockRecord { x, y, count });
                }
            }
        }
        // dense grid
        2 => {
            let n_points = buf.get_i32()?;
            let width = i32::from(buf.get_i16()?);
            for i in 0..n_points {
                let row = i / width;
                let col = i - row * width;
                let x = x_offset + col;
                let y = y_offset + row;
                if short_counts {
                    let c = buf.get_i16()?;
                    if c != i16::MIN {
                        records.push(BlockRecord {
                            x,
                            y,
                            count: f32::from(c),
                        });
                    }
                } else {
                    let count = buf.get_f32()?;
                    if !count.is_nan() {
                        records.push(BlockRecord { x, y, count });
                    }
                }
            }
        }
        other => {
            return Err(HicdexError::FormatError(format!(
                "unknown block encoding {other}"
            )));
        }
    }
    Ok(records)
}

/// Encode one block as a version-8, list-of-rows payload with float
/// counts, then deflate it. `records` must be sorted by (y, x) and fit
/// one block (relative coordinates below `i16::MAX`).
pub fn encode_block(records: &[BlockRecord], compression_level: u32) -> Result<Vec<u8>> {
    let x_offset = records.iter().map(|r| r.x).min().unwrap_or(0);
    let y_offset = records.iter().map(|r| r.y).min().unwrap_or(0);

    let mut buf = BinaryBuffer::new();
    buf.put_i32(records.len() as i32);
    buf.put_i32(x_offset);
    buf.put_i32(y_offset);
    buf.put_u8(1); // float counts
    buf.put_u8(1); // encoding: list of rows

    let mut rows: Vec<(i32, Vec<&BlockRecord>)> = Vec::new();
    for record in records {
        match rows.last_mut() {
            Some((y, row)) if *y == record.y => row.push(record),
            _ => rows.push((record.y, vec![record])),
        }
    }
    buf.put_i16(rows.len() as i16);
    for (y, row) in &rows {
        let rel_y = y - y_offset;
        debug_assert!(rel_y <= i32::from(i16::MAX));
        buf.put_i16(rel_y as i16);
        buf.put_i16(row.len() as i16);
        for record in row {
            let rel_x = record.x - x_offset;
            debug_assert!(rel_x <= i32::from(i16::MAX));
            buf.put_i16(rel_x as i16);
            buf.put_f32(record.count);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(compression_level.min(9)));
    std::io::Write::write_all(&mut encoder, buf.as_slice())?;
    Ok(encoder.finish()?)
}

/// Candidate block numbers for a query rectangle under version-8 grid
/// addressing. Ranges are half-open, chromosome-relative bin ids;
/// `range1` runs along the chrom1 (x) axis. Intra-chromosomal queries
/// include the transposed rectangle.
pub fn grid_blocks(
    range1: (u64, u64),
    range2: (u64, u64),
    block_bin_count: i32,
    block_column_count: i32,
    intra: bool,
) -> Vec<i32> {
    if range1.0 >= range1.1 || range2.0 >= range2.1 || block_bin_count <= 0 {
        return Vec::new();
    }
    let bbc = block_bin_count as u64;
    let col1 = (range1.0 / bbc) as i32;
    let col2 = ((range1.1 - 1) / bbc) as i32;
    let row1 = (range2.0 / bbc) as i32;
    let row2 = ((range2.1 - 1) / bbc) as i32;

    let mut blocks = Vec::new();
    for row in row1..=row2 {
        for col in col1..=col2 {
            blocks.push(row * block_column_count + col);
        }
    }
    if intra {
        for row in col1..=col2 {
            for col in row1..=row2 {
                blocks.push(row * block_column_count + col);
            }
        }
    }
    blocks.sort_unstable();
    blocks.dedup();
    blocks
}

/// Candidate block numbers for an intra-chromosomal query under the
/// version-9 diagonal addressing scheme (depth along the anti-diagonal,
/// position along the diagonal).
pub fn diagonal_blocks(
    range1: (u64, u64),
    range2: (u64, u64),
    block_bin_count: i32,
    block_column_count: i32,
) -> Vec<i32> {
    if range1.0 >= range1.1 || range2.0 >= range2.1 || block_bin_count <= 0 {
        return Vec::new();
    }
    let bbc = f64::from(block_bin_count);
    let (x0, x1) = (range1.0 as f64, (range1.1 - 1) as f64);
    let (y0, y1) = (range2.0 as f64, (range2.1 - 1) as f64);

    let lower_pad = ((x0 + y0) / 2.0 / bbc) as i32;
    let higher_pad = ((x1 + y1) / 2.0 / bbc) as i32 + 1;
    let nearer = (1.0 + (x0 - y1).abs() / std::f64::consts::SQRT_2 / bbc).log2() as i32;
    let further = (1.0 + (x1 - y0).abs() / std::f64::consts::SQRT_2 / bbc).log2() as i32;

    let mut nearer_depth = nearer.min(further);
    if (x0 > y1 && x1 < y0) || (x1 > y0 && x0 < y1) {
        // the rectangle straddles the diagonal
        nearer_depth = 0;
    }
    let further_depth = nearer.max(further) + 1;

    let mut blocks = Vec::new();
    for depth in nearer_depth..=further_depth {
        for pad in lower_pad..=higher_pad {
            blocks.push(depth * block_column_count + pad);
        }
    }
    blocks.sort_unstable();
    blocks.dedup();
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_records() -> Vec<BlockRecord> {
        vec![
            BlockRecord {
                x: 10,
                y: 3,
                count: 1.0,
            },
            BlockRecord {
                x: 12,
                y: 3,
                count: 2.5,
            },
            BlockRecord {
                x: 4,
                y: 7,
                count: 4.0,
            },
        ]
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut records = make_records();
        records.sort_by_key(|r| (r.y, r.x));

        let compressed = encode_block(&records, 6).unwrap();
        let decoded = decode_block(&compressed, 8).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_block(b"not zlib at all", 8).is_err());
    }

    #[test]
    fn test_grid_blocks_cover_query() {
        // 10-bin blocks, 4 block columns
        let blocks = grid_blocks((5, 25), (5, 15), 10, 4, false);
        // cols 0..=2, rows 0..=1
        assert_eq!(blocks, vec![0, 1, 2, 4, 5, 6]);

        // intra adds the transposed rectangle
        let blocks = grid_blocks((15, 25), (0, 5), 10, 4, true);
        assert!(blocks.contains(&1)); // row 0, col 1 (direct)
        assert!(blocks.contains(&4)); // row 1, col 0 (transposed)
    }

    #[test]
    fn test_grid_blocks_empty_query() {
        assert!(grid_blocks((5, 5), (0, 10), 10, 4, false).is_empty());
    }

    #[test]
    fn test_diagonal_blocks_on_diagonal_query() {
        let blocks = diagonal_blocks((0, 100), (0, 100), 10, 16);
        // a diagonal query always includes depth 0 pads
        assert!(blocks.contains(&0));
        assert!(!blocks.is_empty());
        for w in blocks.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn test_diagonal_blocks_off_diagonal_query() {
        // far off-diagonal rectangle: depth > 0 blocks only
        let blocks = diagonal_blocks((900, 1000), (0, 100), 10, 16);
        assert!(!blocks.is_empty());
    }
}
