//! Address and name lookups.
//!
//! Symbol tables are not sorted by address, and building an index would
//! need the allocator, which is off limits in a crash handler. Every lookup
//! is therefore a linear scan of the mapped table: O(n) per address, paid
//! for the handful of addresses a single report resolves.

use super::symtab::{SymbolEntry, SymtabReader};
use super::Image;
use crate::error::{MachOError, Result};
use crate::task::Task;
use tracing::trace;

impl<M: AsRef<[u8]>> SymtabReader<M> {
    /// The section symbol with the greatest value not above the link-time
    /// address `pc`. Ties keep the first entry scanned.
    ///
    /// Candidates are ranked by their stored value, without the thumb bit,
    /// so an even `pc` at the start of a thumb function resolves to it.
    pub fn find_best_symbol(&self, pc: u64) -> Option<SymbolEntry> {
        let mut best: Option<SymbolEntry> = None;
        for table in self.scan_tables() {
            for entry in self.entries(table) {
                if !entry.is_section_symbol() || entry.n_value > pc {
                    continue;
                }
                if best.map_or(true, |b| b.n_value < entry.n_value) {
                    best = Some(entry);
                }
            }
        }
        best
    }

    /// The first section symbol named exactly `name`.
    pub fn find_symbol_named(&self, name: &str) -> Option<SymbolEntry> {
        self.scan_tables()
            .flat_map(|table| self.entries(table))
            .filter(SymbolEntry::is_section_symbol)
            .find(|entry| {
                self.symbol_name_bytes(entry.n_strx)
                    .map_or(false, |n| n == name.as_bytes())
            })
    }

    /// Resolve runtime `pc` in `image` and hand the runtime symbol address
    /// and name to `found`.
    fn resolve<T, F>(&self, image: &Image<'_, T>, pc: u64, found: F) -> Result<()>
    where
        T: Task<Mapping = M>,
        F: FnOnce(u64, &str),
    {
        let link_pc = image
            .unslide_address(pc)
            .ok_or(MachOError::NotFound("address below image"))?;
        let entry = self
            .find_best_symbol(link_pc)
            .ok_or(MachOError::NotFound("symbol"))?;
        let name = self.symbol_name(entry.n_strx)?;
        let address = image
            .slide_address(entry.normalized_value)
            .ok_or(MachOError::MalformedInput("symbol address overflows"))?;

        trace!(
            pc = %format_args!("{:#x}", pc),
            address = %format_args!("{:#x}", address),
            symbol = name,
            "Resolved address"
        );
        found(address, name);
        Ok(())
    }
}

impl<'t, T: Task> Image<'t, T> {
    /// Find the symbol preceding runtime address `pc` and pass its runtime
    /// address and name to `found`, exactly once on success.
    ///
    /// The name borrows the mapped string table and is only valid for the
    /// duration of the callback; copy it to keep it.
    pub fn find_symbol_by_pc<F>(&self, pc: u64, found: F) -> Result<()>
    where
        F: FnOnce(u64, &str),
    {
        let reader = self.symtab_reader()?;
        reader.resolve(self, pc, found)
    }

    /// Runtime address of the first section symbol named `name`.
    pub fn find_symbol_by_name(&self, name: &str) -> Result<u64> {
        let reader = self.symtab_reader()?;
        let entry = reader
            .find_symbol_named(name)
            .ok_or(MachOError::NotFound("symbol"))?;
        self.slide_address(entry.normalized_value)
            .ok_or(MachOError::MalformedInput("symbol address overflows"))
    }

    /// Resolve a batch of runtime addresses against one mapping of the
    /// symbol table.
    ///
    /// `found` is called once per address, in order, with either the
    /// symbol's runtime address and name or the reason the lookup failed.
    /// Addresses outside `__TEXT` are reported as not found without a scan.
    /// Only a failure to open the symbol table aborts the batch.
    pub fn find_symbols_by_pc<F>(&self, pcs: &[u64], mut found: F) -> Result<()>
    where
        F: FnMut(u64, Result<(u64, &str)>),
    {
        let reader = self.symtab_reader()?;
        for &pc in pcs {
            if !self.contains_address(pc) {
                found(pc, Err(MachOError::NotFound("address outside __TEXT")));
                continue;
            }
            if let Err(e) = reader.resolve(self, pc, |address, name| found(pc, Ok((address, name)))) {
                found(pc, Err(e));
            }
        }
        Ok(())
    }
}
