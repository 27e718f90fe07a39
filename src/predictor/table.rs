//! Types for implementing a table of predictors.

use crate::error::ConfigError;

/// Interface to a table of predictors.
pub trait PredictorTable: Sized {
    /// The type of input to the table used to form an index.
    type Input<'a>;

    /// The type of an index into the table.
    type Index;

    /// The type of entry in the table.
    type Entry;

    /// Returns the number of entries in the table.
    fn size(&self) -> usize;

    /// Given some input, return the corresponding index into the table.
    fn get_index(&self, input: Self::Input<'_>) -> Self::Index;

    /// Returns a reference to an entry in the table.
    fn get_entry(&self, idx: Self::Index) -> &Self::Entry;

    /// Returns a mutable reference to an entry in the table.
    fn get_entry_mut(&mut self, idx: Self::Index) -> &mut Self::Entry;

    /// Returns a bitmask corresponding to the number of entries in the table.
    fn index_mask(&self) -> usize {
        assert!(self.size().is_power_of_two());
        self.size() - 1
    }
}

/// A table of models indexed by the program counter.
///
/// The low 'addr_shift' bits of the program counter (which are fixed by
/// instruction alignment) are discarded before masking. Branches whose
/// addresses differ by a multiple of `size << addr_shift` always share an
/// entry.
#[derive(Clone, Debug)]
pub struct PerceptronTable<M> {
    /// Table of models
    data: Vec<M>,

    /// Number of low program counter bits to discard
    addr_shift: u32,
}
impl<M> PerceptronTable<M> {
    /// Create a table with 'size' entries, each built with 'f'.
    pub fn build_with<F>(size: usize, addr_shift: u32, mut f: F)
        -> Result<Self, ConfigError>
        where F: FnMut() -> Result<M, ConfigError>
    {
        if !size.is_power_of_two() {
            return Err(ConfigError::TableSize { size });
        }
        if addr_shift >= usize::BITS {
            return Err(ConfigError::AddrShift { shift: addr_shift });
        }
        let data = (0..size).map(|_| f()).collect::<Result<Vec<M>, _>>()?;
        Ok(Self { data, addr_shift })
    }

    pub fn addr_shift(&self) -> u32 { self.addr_shift }

    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut M> {
        self.data.iter_mut()
    }
}

impl<M> PredictorTable for PerceptronTable<M> {
    type Input<'a> = usize;
    type Index = usize;
    type Entry = M;

    fn size(&self) -> usize { self.data.len() }

    fn get_index(&self, pc: usize) -> usize {
        (pc >> self.addr_shift) & self.index_mask()
    }

    fn get_entry(&self, idx: usize) -> &M {
        let index = idx & self.index_mask();
        &self.data[index]
    }

    fn get_entry_mut(&mut self, idx: usize) -> &mut M {
        let index = idx & self.index_mask();
        &mut self.data[index]
    }
}
