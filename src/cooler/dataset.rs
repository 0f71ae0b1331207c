// cooler/dataset.rs

use std::marker::PhantomData;
use std::ops::Range;

use hdf5::{Group, H5Type};
use ndarray::s;

use super::{CHUNK_BYTES, COMPRESSION_LEVEL, MIN_PREFETCH_BYTES};
use crate::error::{HicdexError, Result};

/// A strongly-typed view over one chunked, compressed 1-D HDF5 dataset.
///
/// Cloning clones the underlying HDF5 handle, not the data; clones see
/// appends made through any other handle to the same dataset.
#[derive(Clone, Debug)]
pub struct Dataset<T: H5Type> {
    inner: hdf5::Dataset,
    name: String,
    buffer_bytes: usize,
    _marker: PhantomData<T>,
}

impl<T: H5Type + Clone> Dataset<T> {
    /// Open an existing dataset under `parent`.
    pub fn open(parent: &Group, name: &str, buffer_bytes: usize) -> Result<Self> {
        let inner = parent.dataset(name).map_err(|_| {
            HicdexError::FormatError(format!(
                "missing dataset \"{}/{name}\"",
                parent.name()
            ))
        })?;
        Ok(Self {
            inner,
            name: name.to_string(),
            buffer_bytes,
            _marker: PhantomData,
        })
    }

    /// Create an empty, unlimited, chunked + deflate-compressed dataset.
    pub fn create(parent: &Group, name: &str, buffer_bytes: usize) -> Result<Self> {
        let chunk = (CHUNK_BYTES / std::mem::size_of::<T>()).max(1);
        let inner = parent
            .new_dataset::<T>()
            .chunk(chunk)
            .deflate(COMPRESSION_LEVEL)
            .shape(0..)
            .create(name)?;
        Ok(Self {
            inner,
            name: name.to_string(),
            buffer_bytes,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &hdf5::Dataset {
        &self.inner
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_all(&self) -> Result<Vec<T>> {
        Ok(self.inner.read_raw::<T>()?)
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<Vec<T>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        if range.end > self.len() {
            return Err(HicdexError::OutOfRange(format!(
                "slice {range:?} exceeds dataset \"{}\" (len {})",
                self.name,
                self.len()
            )));
        }
        let arr = self
            .inner
            .read_slice_1d::<T, _>(s![range.start..range.end])?;
        Ok(arr.to_vec())
    }

    pub fn read_at(&self, i: usize) -> Result<T> {
        let mut v = self.read_slice(i..i + 1)?;
        Ok(v.pop().unwrap())
    }

    /// Grow the dataset and write `data` at its tail.
    pub fn append(&self, data: &[T]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let n = self.len();
        self.inner.resize(n + data.len())?;
        self.inner.write_slice(data, s![n..n + data.len()])?;
        Ok(())
    }

    pub fn resize(&self, new_len: usize) -> Result<()> {
        Ok(self.inner.resize(new_len)?)
    }

    /// Write `data` over an existing region.
    pub fn write_slice(&self, data: &[T], start: usize) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if start + data.len() > self.len() {
            return Err(HicdexError::OutOfRange(format!(
                "write of {} elements at {start} exceeds dataset \"{}\" (len {})",
                data.len(),
                self.name,
                self.len()
            )));
        }
        self.inner.write_slice(data, s![start..start + data.len()])?;
        Ok(())
    }

    /// Forward iterator over `range` with buffered, chunk-sized reads.
    pub fn iter_range(&self, range: Range<usize>) -> DatasetIter<'_, T> {
        let prefetch = self
            .buffer_bytes
            .max(MIN_PREFETCH_BYTES)
            .checked_div(std::mem::size_of::<T>().max(1))
            .unwrap_or(1)
            .max(1);
        DatasetIter {
            ds: self,
            pos: range.start,
            end: range.end.min(self.len()),
            buf: Vec::new(),
            buf_start: 0,
            prefetch,
        }
    }

    pub fn iter(&self) -> DatasetIter<'_, T> {
        self.iter_range(0..self.len())
    }
}

/// Buffered forward iterator over a [`Dataset`]. Repositioning with
/// [`DatasetIter::seek`] is free until the next element is pulled.
#[derive(Debug)]
pub struct DatasetIter<'a, T: H5Type + Clone> {
    ds: &'a Dataset<T>,
    pos: usize,
    end: usize,
    buf: Vec<T>,
    buf_start: usize,
    prefetch: usize,
}

impl<T: H5Type + Clone> DatasetIter<'_, T> {
    /// Move the cursor without performing any I/O.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn buffered(&self, pos: usize) -> bool {
        pos >= self.buf_start && pos < self.buf_start + self.buf.len()
    }
}

impl<T: H5Type + Clone> Iterator for DatasetIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        if !self.buffered(self.pos) {
            let slab_end = (self.pos + self.prefetch).min(self.end);
            match self.ds.read_slice(self.pos..slab_end) {
                Ok(buf) => {
                    self.buf = buf;
                    self.buf_start = self.pos;
                }
                Err(e) => {
                    self.pos = self.end;
                    return Some(Err(e));
                }
            }
        }
        let item = self.buf[self.pos - self.buf_start].clone();
        self.pos += 1;
        Some(Ok(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.pos);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    fn make_file(dir: &TestDir) -> hdf5::File {
        hdf5::File::create(dir.path().join("datasets.h5")).unwrap()
    }

    #[test]
    fn test_create_append_read() {
        let dir = TestDir::new("dataset_create_append_read").unwrap();
        let file = make_file(&dir);

        let ds = Dataset::<u64>::create(&file, "values", 1 << 20).unwrap();
        assert!(ds.is_empty());

        ds.append(&[1, 2, 3]).unwrap();
        ds.append(&[4, 5]).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.read_all().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(ds.read_slice(1..4).unwrap(), vec![2, 3, 4]);
        assert_eq!(ds.read_at(4).unwrap(), 5);

        assert!(ds.read_slice(3..6).is_err());
    }

    #[test]
    fn test_reopen() {
        let dir = TestDir::new("dataset_reopen").unwrap();
        {
            let file = make_file(&dir);
            let ds = Dataset::<i32>::create(&file, "values", 1 << 20).unwrap();
            ds.append(&[-1, 0, 1]).unwrap();
        }
        let file = hdf5::File::open(dir.path().join("datasets.h5")).unwrap();
        let ds = Dataset::<i32>::open(&file, "values", 1 << 20).unwrap();
        assert_eq!(ds.read_all().unwrap(), vec![-1, 0, 1]);

        assert!(matches!(
            Dataset::<i32>::open(&file, "nope", 1 << 20),
            Err(HicdexError::FormatError(_))
        ));
    }

    #[test]
    fn test_iterator_buffers_sequentially() {
        let dir = TestDir::new("dataset_iteration").unwrap();
        let file = make_file(&dir);
        let ds = Dataset::<u64>::create(&file, "values", 1 << 20).unwrap();
        let values: Vec<u64> = (0..10_000).collect();
        ds.append(&values).unwrap();

        let collected: Result<Vec<u64>> = ds.iter().collect();
        assert_eq!(collected.unwrap(), values);

        let collected: Result<Vec<u64>> = ds.iter_range(100..200).collect();
        assert_eq!(collected.unwrap(), values[100..200].to_vec());
    }

    #[test]
    fn test_iterator_seek_without_io() {
        let dir = TestDir::new("dataset_seek").unwrap();
        let file = make_file(&dir);
        let ds = Dataset::<u64>::create(&file, "values", 1 << 20).unwrap();
        ds.append(&(0..100u64).collect::<Vec<_>>()).unwrap();

        let mut it = ds.iter();
        it.seek(42);
        assert_eq!(it.position(), 42);
        assert_eq!(it.next().unwrap().unwrap(), 42);

        // within the buffered slab the cursor is re-served from memory
        it.seek(60);
        assert_eq!(it.next().unwrap().unwrap(), 60);

        // seeking backwards is also free until the next pull
        it.seek(10);
        assert_eq!(it.position(), 10);
        assert_eq!(it.next().unwrap().unwrap(), 10);
    }

    #[test]
    fn test_write_slice_overwrites() {
        let dir = TestDir::new("dataset_write_slice").unwrap();
        let file = make_file(&dir);
        let ds = Dataset::<f64>::create(&file, "values", 1 << 20).unwrap();
        ds.append(&[0.0; 6]).unwrap();
        ds.write_slice(&[1.5, 2.5], 2).unwrap();
        assert_eq!(ds.read_all().unwrap(), vec![0.0, 0.0, 1.5, 2.5, 0.0, 0.0]);

        assert!(ds.write_slice(&[9.0], 6).is_err());
    }
}
