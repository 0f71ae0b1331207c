// hic/writer.rs

use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::bounded;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::block::{self, BlockRecord};
use super::header::Header;
use super::{Unit, WRITE_VERSION};
use crate::binary_buffer::{BinaryBuffer, WriteLeExt};
use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, ThinPixel};
use crate::reference::{Chromosome, Reference, ALL_CHROM_NAME};
use crate::tmpdir::TmpDir;
use crate::transformers::{check_bin_tables, PixelMerger};

#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// zlib level for block payloads (flate2 tops out at 9).
    pub compression_level: u32,
    /// Worker threads compressing blocks.
    pub threads: usize,
    /// Pixels buffered per chromosome pair before spilling to disk.
    pub chunk_size: usize,
    /// Bins per block edge.
    pub block_bin_count: i32,
    pub genome_id: String,
    /// Parent directory for the scratch spill files; defaults to the
    /// output file's directory.
    pub tmp_dir: Option<PathBuf>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: 9,
            threads: num_cpus::get(),
            chunk_size: 256 * 1024,
            block_bin_count: 1000,
            genome_id: "unknown".to_string(),
            tmp_dir: None,
        }
    }
}

// One chromosome-relative matrix cell at the base resolution.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct SpillRecord {
    x: u32,
    y: u32,
    count: f32,
}

#[derive(Debug)]
struct Spill {
    path: PathBuf,
    file: std::fs::File,
    buffer: Vec<SpillRecord>,
    records: u64,
}

impl Spill {
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let frame = bincode::serialize(&self.buffer)?;
        let compressed = zstd::encode_all(&frame[..], SPILL_COMPRESSION_LEVEL)?;
        self.file.write_all(&(compressed.len() as u64).to_le_bytes())?;
        self.file.write_all(&compressed)?;
        self.records += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn load(mut self) -> Result<Vec<SpillRecord>> {
        self.flush()?;
        self.file.flush()?;
        drop(self.file);

        let mut records = Vec::with_capacity(self.records as usize);
        let mut file = std::fs::File::open(&self.path)?;
        loop {
            let mut len = [0u8; 8];
            match file.read_exact(&mut len) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let mut compressed = vec![0u8; u64::from_le_bytes(len) as usize];
            file.read_exact(&mut compressed)?;
            let frame = zstd::decode_all(&compressed[..])?;
            let chunk: Vec<SpillRecord> = bincode::deserialize(&frame)?;
            records.extend(chunk);
        }
        Ok(records)
    }
}

const SPILL_COMPRESSION_LEVEL: i32 = 3;

/// Streams pixels into per-chromosome-pair spill files, then packs them
/// into a version-8 .hic file. Nothing appears at the target path until
/// `serialize` succeeds.
#[derive(Debug)]
pub struct Writer {
    path: PathBuf,
    reference: Reference,
    resolutions: Vec<u32>,
    base_bins: BinTable,
    options: WriterOptions,
    tmpdir: TmpDir,
    spills: FxHashMap<(u32, u32), Spill>,
}

impl Writer {
    /// `resolutions` are BP bin sizes; pixels added later must be binned
    /// at the smallest one.
    pub fn new(
        path: impl AsRef<Path>,
        reference: Reference,
        resolutions: Vec<u32>,
        options: WriterOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut resolutions = resolutions;
        resolutions.sort_unstable();
        resolutions.dedup();
        if resolutions.is_empty() || resolutions[0] == 0 {
            return Err(HicdexError::OutOfRange(
                "at least one nonzero resolution is required".into(),
            ));
        }
        let reference = reference.without_all()?;
        let base_bins = BinTable::new(reference.clone(), resolutions[0])?;

        let tmp_parent = options
            .tmp_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let tmpdir = TmpDir::new_in(&tmp_parent, ".hicdex-hic-")?;

        Ok(Self {
            path,
            reference,
            resolutions,
            base_bins,
            options,
            tmpdir,
            spills: FxHashMap::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }

    pub fn bins(&self) -> &BinTable {
        &self.base_bins
    }

    /// Route base-resolution pixels into their chromosome-pair spill
    /// files. Zero counts are dropped; malformed pixels are rejected.
    pub fn add_pixels<N, I>(&mut self, pixels: I) -> Result<()>
    where
        N: Count,
        I: IntoIterator<Item = ThinPixel<N>>,
    {
        let nbins = self.base_bins.size();
        for p in pixels {
            if p.count.is_zero() {
                continue;
            }
            if p.bin1_id >= nbins || p.bin2_id >= nbins {
                return Err(HicdexError::InvalidPixel(format!(
                    "({}, {}) falls outside the bin table ({nbins} bins)",
                    p.bin1_id, p.bin2_id
                )));
            }
            if p.bin1_id > p.bin2_id {
                return Err(HicdexError::InvalidPixel(format!(
                    "({}, {}) is below the diagonal (storage is symmetric-upper)",
                    p.bin1_id, p.bin2_id
                )));
            }
            let c1 = self.base_bins.chrom_id(p.bin1_id)?;
            let c2 = self.base_bins.chrom_id(p.bin2_id)?;
            let x = (p.bin1_id - self.base_bins.chrom_bin_offset(c1)?) as u32;
            let y = (p.bin2_id - self.base_bins.chrom_bin_offset(c2)?) as u32;

            let spill = match self.spills.entry((c1, c2)) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let path = self.tmpdir.child(format!("pair_{c1}_{c2}.bin"));
                    let file = std::fs::File::create(&path)?;
                    e.insert(Spill {
                        path,
                        file,
                        buffer: Vec::with_capacity(self.options.chunk_size),
                        records: 0,
                    })
                }
            };
            spill.buffer.push(SpillRecord {
                x,
                y,
                count: p.count.to_f64() as f32,
            });
            if spill.buffer.len() >= self.options.chunk_size {
                spill.flush()?;
            }
        }
        Ok(())
    }

    /// Sort, block, compress and write everything, then atomically move
    /// the finished file into place.
    pub fn serialize(mut self) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "out.hic".to_string());
        let tmp_path = self.tmpdir.child(format!("{file_name}.partial"));

        let result = self.write_to(&tmp_path);
        match result {
            Ok(()) => {
                // the scratch dir lives next to the output, so the
                // rename stays on one filesystem
                std::fs::rename(&tmp_path, &self.path)?;
                info!("wrote {}", self.path.display());
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn write_to(&mut self, tmp_path: &Path) -> Result<()> {
        let mut out = BufWriter::new(std::fs::File::create(tmp_path)?);

        let header = Header {
            version: WRITE_VERSION,
            master_index_offset: 0, // patched below
            genome_id: self.options.genome_id.clone(),
            nvi_position: 0,
            nvi_length: 0,
            attributes: vec![(
                "software".to_string(),
                format!("hicdex-{}", env!("CARGO_PKG_VERSION")),
            )],
            chromosomes: self.file_chromosomes(),
            resolutions: self.resolutions.clone(),
        };
        header.write(&mut out)?;

        let mut pairs: Vec<(u32, u32)> = self.spills.keys().copied().collect();
        pairs.sort_unstable();

        let mut master_entries: Vec<(String, i64, i32)> = Vec::new();
        let mut expected = ExpectedAccumulator::new(&self.resolutions);

        for pair in pairs {
            let spill = self.spills.remove(&pair).unwrap();
            let entry = self.write_pair(&mut out, pair, spill, &mut expected)?;
            master_entries.push(entry);
        }

        // footer: master index + expected value vectors
        let master_offset = out.stream_position()?;
        let mut footer = BinaryBuffer::new();
        footer.put_i32(master_entries.len() as i32);
        for (key, position, size) in &master_entries {
            footer.put_cstring(key);
            footer.put_i64(*position);
            footer.put_i32(*size);
        }
        expected.serialize(&mut footer, &self.reference);
        footer.put_i32(0); // normalized expected value vectors
        footer.put_i32(0); // normalization vectors
        out.write_i32_le(footer.len() as i32)?;
        out.write_all(footer.as_slice())?;

        out.seek(SeekFrom::Start(Header::MASTER_OFFSET_POSITION))?;
        out.write_i64_le(master_offset as i64)?;
        out.flush()?;
        Ok(())
    }

    // .hic convention: the synthetic whole-genome chromosome first.
    fn file_chromosomes(&self) -> Vec<Chromosome> {
        let all_size = (self.reference.genome_size() / 1000).max(1) as u32;
        let mut chroms = vec![Chromosome::new(0, ALL_CHROM_NAME, all_size)];
        for c in self.reference.iter() {
            chroms.push(Chromosome::new(c.id() + 1, c.name(), c.size()));
        }
        chroms
    }

    fn write_pair(
        &self,
        out: &mut (impl Write + Seek),
        (c1, c2): (u32, u32),
        spill: Spill,
        expected: &mut ExpectedAccumulator,
    ) -> Result<(String, i64, i32)> {
        let mut records = spill.load()?;
        records.par_sort_unstable_by_key(|r| (r.x, r.y));
        dedup_sum(&mut records);
        debug!(
            "hic writer: pair ({c1}, {c2}) holds {} cells at the base resolution",
            records.len()
        );

        let base_res = u64::from(self.resolutions[0]);
        let chrom1 = self.reference.at(c1)?.clone();
        let intra = c1 == c2;

        struct Zoom {
            resolution: u32,
            sum: f64,
            block_bin_count: i32,
            block_column_count: i32,
            blocks: Vec<(i32, i64, i32)>, // number, position, size
        }
        let mut zooms = Vec::with_capacity(self.resolutions.len());

        for &res in &self.resolutions {
            // aggregate base cells into this resolution
            let mut cells: FxHashMap<(u32, u32), f64> = FxHashMap::default();
            for r in &records {
                let x = ((u64::from(r.x) * base_res) / u64::from(res)) as u32;
                let y = ((u64::from(r.y) * base_res) / u64::from(res)) as u32;
                *cells.entry((x, y)).or_insert(0.0) += f64::from(r.count);
            }

            let mut sum = 0.0;
            let bbc = self.options.block_bin_count;
            let nbins1 = u64::from(chrom1.size()).div_ceil(u64::from(res));
            let block_column_count = (nbins1 / bbc as u64) as i32 + 1;

            // group cells into blocks, rows sorted for the encoder
            let mut grouped: FxHashMap<i32, Vec<BlockRecord>> = FxHashMap::default();
            for (&(x, y), &count) in &cells {
                sum += count;
                if intra {
                    expected.record(res, x.abs_diff(y), count);
                }
                let block_number =
                    (y as i32 / bbc) * block_column_count + (x as i32 / bbc);
                grouped.entry(block_number).or_default().push(BlockRecord {
                    x: x as i32,
                    y: y as i32,
                    count: count as f32,
                });
            }
            let mut blocks: Vec<(i32, Vec<BlockRecord>)> = grouped.into_iter().collect();
            for (_, block) in &mut blocks {
                block.sort_unstable_by_key(|r| (r.y, r.x));
            }
            blocks.sort_unstable_by_key(|(number, _)| *number);

            let compressed = compress_blocks(
                blocks,
                self.options.compression_level,
                self.options.threads,
            )?;

            let mut index = Vec::with_capacity(compressed.len());
            for (number, payload) in compressed {
                let position = out.stream_position()? as i64;
                out.write_all(&payload)?;
                index.push((number, position, payload.len() as i32));
            }
            zooms.push(Zoom {
                resolution: res,
                sum,
                block_bin_count: bbc,
                block_column_count,
                blocks: index,
            });
        }

        // the matrix record follows this pair's blocks
        let record_position = out.stream_position()? as i64;
        let mut buf = BinaryBuffer::new();
        buf.put_i32(c1 as i32 + 1); // file ids are shifted by "All"
        buf.put_i32(c2 as i32 + 1);
        buf.put_i32(zooms.len() as i32);
        for (zoom_index, zoom) in zooms.iter().enumerate() {
            buf.put_cstring(Unit::Bp.as_str());
            buf.put_i32(zoom_index as i32);
            buf.put_f32(zoom.sum as f32);
            buf.put_f32(0.0); // occupied cell count
            buf.put_f32(0.0); // stddev
            buf.put_f32(0.0); // 95th percentile
            buf.put_i32(zoom.resolution as i32);
            buf.put_i32(zoom.block_bin_count);
            buf.put_i32(zoom.block_column_count);
            buf.put_i32(zoom.blocks.len() as i32);
            for (number, position, size) in &zoom.blocks {
                buf.put_i32(*number);
                buf.put_i64(*position);
                buf.put_i32(*size);
            }
        }
        out.write_all(buf.as_slice())?;

        Ok((
            format!("{}_{}", c1 + 1, c2 + 1),
            record_position,
            buf.len() as i32,
        ))
    }
}

fn dedup_sum(records: &mut Vec<SpillRecord>) {
    let mut write = 0usize;
    for read in 0..records.len() {
        if write > 0
            && records[write - 1].x == records[read].x
            && records[write - 1].y == records[read].y
        {
            records[write - 1].count += records[read].count;
        } else {
            records[write] = records[read];
            write += 1;
        }
    }
    records.truncate(write);
}

/// Compress blocks on a bounded worker pool; the bounded queues give
/// backpressure against the producer. Output order is restored by block
/// number so the file layout stays deterministic.
fn compress_blocks(
    blocks: Vec<(i32, Vec<BlockRecord>)>,
    level: u32,
    threads: usize,
) -> Result<Vec<(i32, Vec<u8>)>> {
    let threads = threads.max(1);
    if threads == 1 || blocks.len() <= 1 {
        let mut out = Vec::with_capacity(blocks.len());
        for (number, records) in blocks {
            out.push((number, block::encode_block(&records, level)?));
        }
        return Ok(out);
    }

    let (task_tx, task_rx) = bounded::<(i32, Vec<BlockRecord>)>(threads * 2);
    let (result_tx, result_rx) = bounded::<(i32, Result<Vec<u8>>)>(threads * 2);
    let mut results = Vec::with_capacity(blocks.len());

    std::thread::scope(|scope| {
        for _ in 0..threads {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (number, records) in task_rx.iter() {
                    let encoded = block::encode_block(&records, level);
                    if result_tx.send((number, encoded)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);
        scope.spawn(move || {
            for item in blocks {
                if task_tx.send(item).is_err() {
                    break;
                }
            }
        });
        for item in result_rx.iter() {
            results.push(item);
        }
    });

    let mut out = Vec::with_capacity(results.len());
    for (number, encoded) in results {
        out.push((number, encoded?));
    }
    out.sort_unstable_by_key(|(number, _)| *number);
    Ok(out)
}

// Per-distance cis sums, folded into genome-wide expected-value vectors
// at footer time.
#[derive(Debug)]
struct ExpectedAccumulator {
    resolutions: Vec<u32>,
    sums: FxHashMap<u32, Vec<f64>>,
}

impl ExpectedAccumulator {
    fn new(resolutions: &[u32]) -> Self {
        Self {
            resolutions: resolutions.to_vec(),
            sums: FxHashMap::default(),
        }
    }

    fn record(&mut self, resolution: u32, distance: u32, count: f64) {
        let sums = self.sums.entry(resolution).or_default();
        let d = distance as usize;
        if sums.len() <= d {
            sums.resize(d + 1, 0.0);
        }
        sums[d] += count;
    }

    fn serialize(&self, buf: &mut BinaryBuffer, chroms: &Reference) {
        buf.put_i32(self.resolutions.len() as i32);
        for &res in &self.resolutions {
            let max_bins = chroms
                .iter()
                .map(|c| u64::from(c.size()).div_ceil(u64::from(res)))
                .max()
                .unwrap_or(0) as usize;
            let sums = self.sums.get(&res).cloned().unwrap_or_default();

            buf.put_cstring(Unit::Bp.as_str());
            buf.put_i32(res as i32);
            buf.put_i32(max_bins as i32);
            for d in 0..max_bins {
                // number of loci at this distance across all chromosomes
                let loci: u64 = chroms
                    .iter()
                    .map(|c| {
                        let nbins = u64::from(c.size()).div_ceil(u64::from(res));
                        nbins.saturating_sub(d as u64)
                    })
                    .sum();
                let sum = sums.get(d).copied().unwrap_or(0.0);
                let value = if loci > 0 { sum / loci as f64 } else { 0.0 };
                buf.put_f64(value);
            }
            buf.put_i32(0); // per-chromosome scale factors
        }
    }
}

/// Merge several .hic files defined over the same reference into one
/// output at a single resolution; counts at equal coordinates add up.
pub fn merge_hics(
    inputs: &[&Path],
    output: impl AsRef<Path>,
    resolution: u32,
    options: WriterOptions,
) -> Result<()> {
    if inputs.is_empty() {
        return Err(HicdexError::StringError("nothing to merge".into()));
    }
    let files: Vec<super::File> = inputs
        .iter()
        .map(super::File::open)
        .collect::<Result<_>>()?;
    let tables = files
        .iter()
        .map(|f| f.bins(resolution))
        .collect::<Result<Vec<_>>>()?;
    check_bin_tables(&tables)?;

    let selectors = files
        .iter()
        .map(|f| f.fetch(resolution))
        .collect::<Result<Vec<_>>>()?;
    let iters: Vec<_> = selectors.iter().map(|s| s.iter::<f64>(true)).collect();
    let merger = PixelMerger::new(iters)?;

    let mut writer = Writer::new(
        output,
        files[0].reference().clone(),
        vec![resolution],
        options,
    )?;
    const CHUNK: usize = 1 << 18;
    let mut buf = Vec::with_capacity(CHUNK);
    for pixel in merger {
        buf.push(pixel?);
        if buf.len() == CHUNK {
            writer.add_pixels(buf.drain(..))?;
        }
    }
    writer.add_pixels(buf)?;
    writer.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_bin_table, test_pixels, TestDir};

    fn write_test_hic(dir: &TestDir, name: &str, resolutions: Vec<u32>) -> PathBuf {
        let path = dir.path().join(name);
        let bins = test_bin_table();
        let mut writer = Writer::new(
            &path,
            bins.reference().clone(),
            resolutions,
            WriterOptions {
                threads: 2,
                ..WriterOptions::default()
            },
        )
        .unwrap();
        writer.add_pixels(test_pixels()).unwrap();
        writer.serialize().unwrap();
        path
    }

    #[test]
    fn test_round_trip_base_resolution() {
        let dir = TestDir::new("hic_round_trip").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);

        let file = super::super::File::open(&path).unwrap();
        assert_eq!(file.version(), 8);
        assert_eq!(file.resolutions(), vec![100]);
        assert_eq!(file.reference().len(), 2);

        let pixels = file.fetch(100).unwrap().read_all::<i32>().unwrap();
        assert_eq!(pixels, test_pixels());
    }

    #[test]
    fn test_sorted_iteration_is_strictly_increasing() {
        let dir = TestDir::new("hic_sorted_iteration").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);
        let file = super::super::File::open(&path).unwrap();

        let pixels = file.fetch(100).unwrap().read_all::<f64>().unwrap();
        for w in pixels.windows(2) {
            assert!(w[0].coords() < w[1].coords());
        }
    }

    #[test]
    fn test_unsorted_iteration_same_set() {
        let dir = TestDir::new("hic_unsorted_iteration").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);
        let file = super::super::File::open(&path).unwrap();

        let sel = file.fetch_query(100, "chr1").unwrap();
        let mut unsorted = sel
            .iter::<i32>(false)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        unsorted.sort_by(ThinPixel::cmp_coords);
        let sorted = sel.read_all::<i32>().unwrap();
        assert_eq!(unsorted, sorted);
    }

    #[test]
    fn test_cis_and_rectangle_queries() {
        let dir = TestDir::new("hic_queries").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);
        let file = super::super::File::open(&path).unwrap();

        let expected: Vec<_> = test_pixels()
            .into_iter()
            .filter(|p| (2..5).contains(&p.bin1_id) && (2..5).contains(&p.bin2_id))
            .collect();
        let got = file
            .fetch_query(100, "chr1:200-500")
            .unwrap()
            .read_all::<i32>()
            .unwrap();
        assert_eq!(got, expected);

        // trans rectangle
        let expected: Vec<_> = test_pixels()
            .into_iter()
            .filter(|p| p.bin1_id < 10 && p.bin2_id >= 10)
            .collect();
        let got = file
            .fetch2(100, "chr1", "chr2")
            .unwrap()
            .read_all::<i32>()
            .unwrap();
        assert_eq!(got, expected);

        // empty query
        let got = file
            .fetch_query(100, "chr1:500-500")
            .unwrap()
            .read_all::<i32>()
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_coarser_resolution_matches_aggregation() {
        let dir = TestDir::new("hic_multi_resolution").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100, 200]);
        let file = super::super::File::open(&path).unwrap();
        assert_eq!(file.resolutions(), vec![100, 200]);

        let bins = std::sync::Arc::new(test_bin_table());
        let coarse: Vec<_> = crate::transformers::CoarsenPixels::new(
            test_pixels().into_iter().map(Ok),
            bins,
            2,
        )
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

        let got = file.fetch(200).unwrap().read_all::<i32>().unwrap();
        assert_eq!(got, coarse);
    }

    #[test]
    fn test_expected_values_present() {
        let dir = TestDir::new("hic_expected_values").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);
        let file = super::super::File::open(&path).unwrap();

        let expected = file.expected_values(100).unwrap();
        // vector spans the longest chromosome (chr1: 10 bins)
        assert_eq!(expected.len(), 10);
        assert!(expected[0] > 0.0);
    }

    #[test]
    fn test_unknown_resolution_and_normalization() {
        let dir = TestDir::new("hic_not_found").unwrap();
        let path = write_test_hic(&dir, "test.hic", vec![100]);
        let file = super::super::File::open(&path).unwrap();

        assert!(matches!(
            file.fetch(42),
            Err(HicdexError::NotFound(_))
        ));
        assert!(matches!(
            file.fetch_normalized(100, "chr1", "chr1", "KR"),
            Err(HicdexError::NotFound(_))
        ));
    }

    #[test]
    fn test_merge_two_copies_doubles_counts() {
        let dir = TestDir::new("hic_merge").unwrap();
        let a = write_test_hic(&dir, "a.hic", vec![100]);
        let b = write_test_hic(&dir, "b.hic", vec![100]);
        let merged_path = dir.path().join("merged.hic");

        merge_hics(
            &[a.as_path(), b.as_path()],
            &merged_path,
            100,
            WriterOptions::default(),
        )
        .unwrap();

        let merged = super::super::File::open(&merged_path).unwrap();
        let pixels = merged.fetch(100).unwrap().read_all::<i32>().unwrap();
        let original = test_pixels();
        assert_eq!(pixels.len(), original.len());
        for (m, p) in pixels.iter().zip(&original) {
            assert_eq!(m.coords(), p.coords());
            assert_eq!(m.count, 2 * p.count);
        }
    }

    #[test]
    fn test_nothing_published_until_serialize() {
        let dir = TestDir::new("hic_atomic_publish").unwrap();
        let path = dir.path().join("never.hic");
        {
            let bins = test_bin_table();
            let mut writer = Writer::new(
                &path,
                bins.reference().clone(),
                vec![100],
                WriterOptions::default(),
            )
            .unwrap();
            writer.add_pixels(test_pixels()).unwrap();
            // dropped without serialize()
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_writer_rejects_bad_pixels() {
        let dir = TestDir::new("hic_writer_validation").unwrap();
        let bins = test_bin_table();
        let mut writer = Writer::new(
            dir.path().join("bad.hic"),
            bins.reference().clone(),
            vec![100],
            WriterOptions::default(),
        )
        .unwrap();

        assert!(writer.add_pixels([ThinPixel::new(3u64, 1u64, 1i32)]).is_err());
        assert!(writer
            .add_pixels([ThinPixel::new(0u64, 99u64, 1i32)])
            .is_err());
        // zero counts are silently dropped
        writer.add_pixels([ThinPixel::new(0u64, 1u64, 0i32)]).unwrap();
    }
}
