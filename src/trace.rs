//! Reading and writing binary branch traces.
//!
//! A trace is a flat array of little-endian records:
//!
//! | offset | size | field                      |
//! |--------|------|----------------------------|
//! | 0      | 8    | program counter            |
//! | 8      | 8    | target address             |
//! | 16     | 4    | [`BranchFlags`]            |
//! | 20     | 4    | padding                    |

use std::path::Path;

use crate::branch::*;
use crate::error::TraceError;

/// Size of a single record [in bytes].
pub const RECORD_SIZE: usize = 24;

fn read_u64(b: &[u8]) -> u64 {
    let mut x = [0u8; 8];
    x.copy_from_slice(b);
    u64::from_le_bytes(x)
}

fn read_u32(b: &[u8]) -> u32 {
    let mut x = [0u8; 4];
    x.copy_from_slice(b);
    u32::from_le_bytes(x)
}

/// A sequence of trace files which are read one at a time.
pub struct BinaryTraceSet {
    /// A list of filenames
    pub files: Vec<String>,

    pub cur: usize,
}
impl BinaryTraceSet {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            cur: 0,
        }
    }

    pub fn new_from_slice(strings: &[String]) -> Self {
        Self {
            files: strings.to_vec(),
            cur: 0,
        }
    }

    pub fn add_file(&mut self, s: impl ToString) {
        self.files.push(s.to_string());
    }
}
impl Iterator for BinaryTraceSet {
    type Item = Result<BinaryTrace, TraceError>;
    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files.get(self.cur)?;
        self.cur += 1;
        Some(BinaryTrace::from_file(path))
    }
}

/// A list of branch records.
pub struct BinaryTrace {
    pub name: String,
    records: Vec<BranchRecord>,
}
impl BinaryTrace {
    /// Read a [BinaryTrace] from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(name, &data)
    }

    /// Parse a [BinaryTrace] from the contents of a trace file.
    pub fn from_bytes(name: impl ToString, data: &[u8])
        -> Result<Self, TraceError>
    {
        if data.len() % RECORD_SIZE != 0 {
            return Err(TraceError::Truncated { len: data.len() });
        }
        let mut records = Vec::with_capacity(data.len() / RECORD_SIZE);
        for (index, chunk) in data.chunks_exact(RECORD_SIZE).enumerate() {
            let pc  = read_u64(&chunk[0..8]) as usize;
            let tgt = read_u64(&chunk[8..16]) as usize;
            let flags = BranchFlags(read_u32(&chunk[16..20]));
            let kind = flags.kind()
                .map_err(|_| TraceError::InvalidFlags { index, flags: flags.0 })?;
            records.push(BranchRecord::new(pc, tgt, kind, flags.is_taken().into()));
        }
        Ok(Self { name: name.to_string(), records })
    }

    /// Encode some records in the trace file format.
    pub fn encode(records: &[BranchRecord]) -> Vec<u8> {
        let mut data = Vec::with_capacity(records.len() * RECORD_SIZE);
        for r in records {
            data.extend_from_slice(&(r.pc as u64).to_le_bytes());
            data.extend_from_slice(&(r.tgt as u64).to_le_bytes());
            data.extend_from_slice(&r.flags().0.to_le_bytes());
            data.extend_from_slice(&[0; 4]);
        }
        data
    }

    /// Return the number of records
    pub fn num_entries(&self) -> usize { self.records.len() }

    pub fn name(&self) -> &str { &self.name }

    /// Return a truncated slice of records
    pub fn as_slice_trunc(&self, limit: usize) -> &[BranchRecord] {
        &self.records[..limit.min(self.records.len())]
    }

    /// Return a slice of records.
    pub fn as_slice(&self) -> &[BranchRecord] {
        &self.records
    }
}
