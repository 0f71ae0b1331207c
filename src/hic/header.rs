// hic/header.rs

use std::io::{Read, Seek, Write};

use super::{MAGIC, SUPPORTED_VERSIONS, WRITE_VERSION};
use crate::binary_buffer::{ReadLeExt, WriteLeExt};
use crate::error::{HicdexError, Result};
use crate::reference::{Chromosome, Reference};

/// The master header at the top of a .hic file.
///
/// `chromosomes` preserves the file's own ordering and indices (the
/// synthetic "All" chromosome included, wherever the producer put it);
/// [`Header::reference`] strips it for bin-table use.
#[derive(Clone, Debug)]
pub struct Header {
    pub version: i32,
    pub master_index_offset: i64,
    pub genome_id: String,
    /// Normalized-expected-vector section position and length (v9).
    pub nvi_position: i64,
    pub nvi_length: i64,
    pub attributes: Vec<(String, String)>,
    pub chromosomes: Vec<Chromosome>,
    pub resolutions: Vec<u32>,
}

impl Header {
    pub fn read(reader: &mut (impl Read + Seek)) -> Result<Self> {
        let magic = reader.read_cstring_le()?;
        if magic != MAGIC {
            return Err(HicdexError::FormatError(format!(
                "not a .hic file (magic \"{magic}\")"
            )));
        }
        let version = reader.read_i32_le()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(HicdexError::FormatError(format!(
                "unsupported .hic version {version} (supported: {SUPPORTED_VERSIONS:?})"
            )));
        }
        let master_index_offset = reader.read_i64_le()?;
        let genome_id = reader.read_cstring_le()?;
        let (nvi_position, nvi_length) = if version > 8 {
            (reader.read_i64_le()?, reader.read_i64_le()?)
        } else {
            (0, 0)
        };

        let n_attributes = reader.read_i32_le()?;
        let mut attributes = Vec::with_capacity(n_attributes.max(0) as usize);
        for _ in 0..n_attributes {
            let key = reader.read_cstring_le()?;
            let value = reader.read_cstring_le()?;
            attributes.push((key, value));
        }

        let n_chroms = reader.read_i32_le()?;
        let mut chromosomes = Vec::with_capacity(n_chroms.max(0) as usize);
        for i in 0..n_chroms {
            let name = reader.read_cstring_le()?;
            let length = if version > 8 {
                reader.read_i64_le()?
            } else {
                i64::from(reader.read_i32_le()?)
            };
            let length = u32::try_from(length).map_err(|_| {
                HicdexError::FormatError(format!(
                    "chromosome \"{name}\" has an out-of-range size ({length})"
                ))
            })?;
            chromosomes.push(Chromosome::new(i as u32, name, length.max(1)));
        }

        let n_resolutions = reader.read_i32_le()?;
        let mut resolutions = Vec::with_capacity(n_resolutions.max(0) as usize);
        for _ in 0..n_resolutions {
            resolutions.push(reader.read_i32_le()? as u32);
        }

        Ok(Self {
            version,
            master_index_offset,
            genome_id,
            nvi_position,
            nvi_length,
            attributes,
            chromosomes,
            resolutions,
        })
    }

    /// Serialize a version-8 header. The master index offset is usually
    /// a placeholder patched once the footer position is known; see
    /// [`Header::MASTER_OFFSET_POSITION`].
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_cstring_le(MAGIC)?;
        writer.write_i32_le(WRITE_VERSION)?;
        writer.write_i64_le(self.master_index_offset)?;
        writer.write_cstring_le(&self.genome_id)?;
        writer.write_i32_le(self.attributes.len() as i32)?;
        for (key, value) in &self.attributes {
            writer.write_cstring_le(key)?;
            writer.write_cstring_le(value)?;
        }
        writer.write_i32_le(self.chromosomes.len() as i32)?;
        for chrom in &self.chromosomes {
            writer.write_cstring_le(chrom.name())?;
            writer.write_i32_le(chrom.size() as i32)?;
        }
        writer.write_i32_le(self.resolutions.len() as i32)?;
        for res in &self.resolutions {
            writer.write_i32_le(*res as i32)?;
        }
        // no fragment-resolution table
        writer.write_i32_le(0)?;
        Ok(())
    }

    /// Byte offset of the master-index-offset field, for patching.
    pub const MASTER_OFFSET_POSITION: u64 = (MAGIC.len() + 1 + 4) as u64;

    /// The chromosomes usable for binning: file order, "All" removed.
    pub fn reference(&self) -> Result<Reference> {
        Reference::from_chrom_sizes(
            self.chromosomes
                .iter()
                .filter(|c| !c.is_all())
                .map(|c| (c.name().to_string(), c.size())),
        )
    }

    /// File index of a chromosome by name.
    pub fn file_id(&self, name: &str) -> Result<u32> {
        self.chromosomes
            .iter()
            .find(|c| c.name() == name)
            .map(Chromosome::id)
            .ok_or_else(|| HicdexError::NotFound(format!("chromosome \"{name}\"")))
    }

    pub fn chromosome(&self, file_id: u32) -> Result<&Chromosome> {
        self.chromosomes
            .get(file_id as usize)
            .ok_or_else(|| HicdexError::OutOfRange(format!("chromosome id {file_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_header() -> Header {
        Header {
            version: 8,
            master_index_offset: 123_456,
            genome_id: "hg38".to_string(),
            nvi_position: 0,
            nvi_length: 0,
            attributes: vec![("software".to_string(), "hicdex".to_string())],
            chromosomes: vec![
                Chromosome::new(0, "All", 1_600),
                Chromosome::new(1, "chr1", 1_000_000),
                Chromosome::new(2, "chr2", 600_000),
            ],
            resolutions: vec![10_000, 100_000],
        }
    }

    #[test]
    fn test_write_read_round_trip() {
        let header = make_header();
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();

        let read = Header::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read.version, 8);
        assert_eq!(read.master_index_offset, 123_456);
        assert_eq!(read.genome_id, "hg38");
        assert_eq!(read.attributes, header.attributes);
        assert_eq!(read.chromosomes.len(), 3);
        assert_eq!(read.chromosomes[1].name(), "chr1");
        assert_eq!(read.resolutions, vec![10_000, 100_000]);
    }

    #[test]
    fn test_reference_strips_all() {
        let header = make_header();
        let chroms = header.reference().unwrap();
        assert_eq!(chroms.len(), 2);
        assert_eq!(chroms.get_id("chr1").unwrap(), 0);
        assert!(!chroms.has_all());

        assert_eq!(header.file_id("chr2").unwrap(), 2);
        assert!(header.file_id("chrX").is_err());
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BAM\0");
        assert!(matches!(
            Header::read(&mut Cursor::new(bytes)),
            Err(HicdexError::FormatError(_))
        ));

        let mut header = make_header();
        header.version = 8;
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        // corrupt the version field (follows "HIC\0")
        bytes[4..8].copy_from_slice(&7i32.to_le_bytes());
        assert!(matches!(
            Header::read(&mut Cursor::new(bytes)),
            Err(HicdexError::FormatError(_))
        ));
    }

    #[test]
    fn test_master_offset_position() {
        let header = make_header();
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        let pos = Header::MASTER_OFFSET_POSITION as usize;
        let field = i64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap());
        assert_eq!(field, 123_456);
    }
}
