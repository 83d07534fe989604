use bytes::Bytes;

pub mod record_file;
pub mod record_scan;

/// A single fixed-size record read out of a record file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn record_size(&self) -> usize {
        self.data.len()
    }
}
