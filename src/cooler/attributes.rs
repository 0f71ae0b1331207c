// cooler/attributes.rs

use std::time::{SystemTime, UNIX_EPOCH};

use hdf5::types::{TypeDescriptor, VarLenUnicode};
use hdf5::Location;

use super::{COOL_FORMAT, FORMAT_VERSION};
use crate::error::{HicdexError, Result};

/// `sum` / `cis` attributes are integers on raw-count files and doubles
/// on float-count files.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SumValue {
    Int(i64),
    Float(f64),
}

impl SumValue {
    pub fn to_f64(self) -> f64 {
        match self {
            SumValue::Int(v) => v as f64,
            SumValue::Float(v) => v,
        }
    }
}

/// The root attribute block of one cooler group.
#[derive(Clone, Debug)]
pub struct Attributes {
    pub format: String,
    pub format_version: u32,
    pub bin_size: u32,
    pub bin_type: String,
    pub nbins: u64,
    pub nchroms: u32,
    pub nnz: u64,
    pub storage_mode: String,
    pub assembly: Option<String>,
    pub creation_date: Option<String>,
    pub generated_by: Option<String>,
    pub metadata: Option<String>,
    pub sum: Option<SumValue>,
    pub cis: Option<SumValue>,
}

impl Attributes {
    pub fn new(bin_size: u32, nbins: u64, nchroms: u32) -> Self {
        Self {
            format: COOL_FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            bin_size,
            bin_type: "fixed".to_string(),
            nbins,
            nchroms,
            nnz: 0,
            storage_mode: "symmetric-upper".to_string(),
            assembly: None,
            creation_date: Some(iso8601_now()),
            generated_by: Some(format!("hicdex-{}", env!("CARGO_PKG_VERSION"))),
            metadata: None,
            sum: Some(SumValue::Int(0)),
            cis: Some(SumValue::Int(0)),
        }
    }

    /// Read and check the mandatory attributes of a cooler root group.
    pub fn read(root: &Location) -> Result<Self> {
        let format = require_str(root, "format")?;
        if format != COOL_FORMAT {
            return Err(HicdexError::FormatError(format!(
                "\"{}\" is not a cooler group (format=\"{format}\")",
                root.name()
            )));
        }
        let format_version = require_uint(root, "format-version")? as u32;
        let bin_type = get_str(root, "bin-type")?.unwrap_or_else(|| "fixed".to_string());
        let bin_size = match require_uint(root, "bin-size") {
            Ok(v) => v as u32,
            Err(e) if bin_type == "fixed" => return Err(e),
            // variable-bin tables carry bin-type instead of bin-size
            Err(_) => 0,
        };
        let storage_mode =
            get_str(root, "storage-mode")?.unwrap_or_else(|| "symmetric-upper".to_string());
        if storage_mode != "symmetric-upper" {
            return Err(HicdexError::FormatError(format!(
                "unsupported storage-mode \"{storage_mode}\""
            )));
        }
        Ok(Self {
            format,
            format_version,
            bin_size,
            bin_type,
            nbins: require_uint(root, "nbins")?,
            nchroms: require_uint(root, "nchroms")? as u32,
            nnz: require_uint(root, "nnz")?,
            storage_mode,
            assembly: get_str(root, "assembly")?,
            creation_date: get_str(root, "creation-date")?,
            generated_by: get_str(root, "generated-by")?,
            metadata: get_str(root, "metadata")?,
            sum: get_sum(root, "sum")?,
            cis: get_sum(root, "cis")?,
        })
    }

    /// Write every attribute onto `root`, overwriting existing values.
    pub fn write(&self, root: &Location) -> Result<()> {
        put_str(root, "format", &self.format)?;
        put_uint(root, "format-version", u64::from(self.format_version))?;
        put_uint(root, "bin-size", u64::from(self.bin_size))?;
        put_str(root, "bin-type", &self.bin_type)?;
        put_uint(root, "nbins", self.nbins)?;
        put_uint(root, "nchroms", u64::from(self.nchroms))?;
        put_uint(root, "nnz", self.nnz)?;
        put_str(root, "storage-mode", &self.storage_mode)?;
        if let Some(v) = &self.assembly {
            put_str(root, "assembly", v)?;
        }
        if let Some(v) = &self.creation_date {
            put_str(root, "creation-date", v)?;
        }
        if let Some(v) = &self.generated_by {
            put_str(root, "generated-by", v)?;
        }
        if let Some(v) = &self.metadata {
            put_str(root, "metadata", v)?;
        }
        if let Some(v) = self.sum {
            put_sum(root, "sum", v)?;
        }
        if let Some(v) = self.cis {
            put_sum(root, "cis", v)?;
        }
        Ok(())
    }
}

// --- scalar attribute helpers ---

pub(crate) fn put_str(loc: &Location, name: &str, value: &str) -> Result<()> {
    let v: VarLenUnicode = value
        .parse()
        .map_err(|e| HicdexError::StringError(format!("invalid attribute string: {e}")))?;
    let attr = match loc.attr(name) {
        Ok(attr) => attr,
        Err(_) => loc.new_attr::<VarLenUnicode>().create(name)?,
    };
    attr.write_scalar(&v)?;
    Ok(())
}

pub(crate) fn put_uint(loc: &Location, name: &str, value: u64) -> Result<()> {
    let attr = match loc.attr(name) {
        Ok(attr) => attr,
        Err(_) => loc.new_attr::<u64>().create(name)?,
    };
    attr.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn put_int(loc: &Location, name: &str, value: i64) -> Result<()> {
    let attr = match loc.attr(name) {
        Ok(attr) => attr,
        Err(_) => loc.new_attr::<i64>().create(name)?,
    };
    attr.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn put_f64(loc: &Location, name: &str, value: f64) -> Result<()> {
    let attr = match loc.attr(name) {
        Ok(attr) => attr,
        Err(_) => loc.new_attr::<f64>().create(name)?,
    };
    attr.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn put_bool(loc: &Location, name: &str, value: bool) -> Result<()> {
    put_uint(loc, name, u64::from(value))
}

pub(crate) fn has_attr(loc: &Location, name: &str) -> bool {
    loc.attr(name).is_ok()
}

pub(crate) fn get_str(loc: &Location, name: &str) -> Result<Option<String>> {
    let Ok(attr) = loc.attr(name) else {
        return Ok(None);
    };
    // Accept both variable- and fixed-length string flavors
    if let Ok(v) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(Some(v.as_str().to_string()));
    }
    let v = attr.read_scalar::<hdf5::types::VarLenAscii>()?;
    Ok(Some(v.as_str().to_string()))
}

pub(crate) fn get_uint(loc: &Location, name: &str) -> Result<Option<u64>> {
    let Ok(attr) = loc.attr(name) else {
        return Ok(None);
    };
    if let Ok(v) = attr.read_scalar::<u64>() {
        return Ok(Some(v));
    }
    let v = attr.read_scalar::<i64>()?;
    u64::try_from(v)
        .map(Some)
        .map_err(|_| HicdexError::FormatError(format!("attribute \"{name}\" is negative")))
}

pub(crate) fn get_bool(loc: &Location, name: &str) -> Result<Option<bool>> {
    Ok(get_uint(loc, name)?.map(|v| v != 0))
}

fn require_str(loc: &Location, name: &str) -> Result<String> {
    get_str(loc, name)?.ok_or_else(|| missing_attr(loc, name))
}

fn require_uint(loc: &Location, name: &str) -> Result<u64> {
    get_uint(loc, name)?.ok_or_else(|| missing_attr(loc, name))
}

fn missing_attr(loc: &Location, name: &str) -> HicdexError {
    HicdexError::FormatError(format!(
        "missing required attribute \"{name}\" on \"{}\"",
        loc.name()
    ))
}

fn get_sum(loc: &Location, name: &str) -> Result<Option<SumValue>> {
    let Ok(attr) = loc.attr(name) else {
        return Ok(None);
    };
    let descriptor = attr.dtype()?.to_descriptor()?;
    match descriptor {
        TypeDescriptor::Float(_) => Ok(Some(SumValue::Float(attr.read_scalar::<f64>()?))),
        _ => Ok(Some(SumValue::Int(attr.read_scalar::<i64>()?))),
    }
}

fn put_sum(loc: &Location, name: &str, value: SumValue) -> Result<()> {
    match value {
        SumValue::Int(v) => put_int(loc, name, v),
        SumValue::Float(v) => put_f64(loc, name, v),
    }
}

// --- ISO-8601 timestamps without a calendar dependency ---

fn iso8601_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

// Days-since-epoch to (year, month, day), Gregorian calendar.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
        // leap day
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
    }

    #[test]
    fn test_attribute_round_trip() {
        let dir = TestDir::new("attributes_round_trip").unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();

        let mut attrs = Attributes::new(10_000, 321, 3);
        attrs.assembly = Some("hg38".to_string());
        attrs.nnz = 42;
        attrs.sum = Some(SumValue::Int(1000));
        attrs.write(&file).unwrap();

        let read = Attributes::read(&file).unwrap();
        assert_eq!(read.format, COOL_FORMAT);
        assert_eq!(read.format_version, FORMAT_VERSION);
        assert_eq!(read.bin_size, 10_000);
        assert_eq!(read.nbins, 321);
        assert_eq!(read.nchroms, 3);
        assert_eq!(read.nnz, 42);
        assert_eq!(read.assembly.as_deref(), Some("hg38"));
        assert_eq!(read.sum, Some(SumValue::Int(1000)));
    }

    #[test]
    fn test_rewrite_updates_in_place() {
        let dir = TestDir::new("attributes_rewrite").unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();

        let mut attrs = Attributes::new(5_000, 10, 1);
        attrs.write(&file).unwrap();
        attrs.nnz = 99;
        attrs.sum = Some(SumValue::Int(2000));
        attrs.write(&file).unwrap();

        let read = Attributes::read(&file).unwrap();
        assert_eq!(read.nnz, 99);
        assert_eq!(read.sum, Some(SumValue::Int(2000)));
    }

    #[test]
    fn test_missing_format_is_an_error() {
        let dir = TestDir::new("attributes_missing").unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        assert!(matches!(
            Attributes::read(&file),
            Err(HicdexError::FormatError(_))
        ));
    }
}
