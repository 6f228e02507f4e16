//! Symbol table reader.
//!
//! The reader maps `__LINKEDIT` once and locates the `nlist` array and the
//! string table inside it using the file offsets from `LC_SYMTAB`. When
//! `LC_DYSYMTAB` is present the array is also split into its global
//! (externally defined) and local ranges.
//!
//! Entries are decoded one at a time into [`SymbolEntry`]; nothing is
//! copied out of the mapping in bulk.

use super::byteorder::{ByteOrder, ByteOrderRead};
use super::segment::MappedSegment;
use super::types::*;
use super::Image;
use crate::error::{MachOError, Result};
use crate::task::Task;
use tracing::debug;

/// A range of `nlist` entries inside the mapped `__LINKEDIT` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTable {
    offset: usize,
    count: u32,
}

impl SymbolTable {
    /// Number of entries.
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Global and local ranges from a two-level namespace image. Either both
/// exist or neither does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSymbolTables {
    pub global: SymbolTable,
    pub local: SymbolTable,
}

/// A 32/64-bit neutral symbol table entry in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Index into the string table.
    pub n_strx: u32,
    /// Symbol type.
    pub n_type: u8,
    /// Section number.
    pub n_sect: u8,
    /// Descriptor bits.
    pub n_desc: u16,
    /// Value as stored in the table.
    pub n_value: u64,
    /// Value with the bit flags the table omits, such as the ARM thumb bit.
    pub normalized_value: u64,
}

impl SymbolEntry {
    /// Defined in a section and not a debugging entry.
    pub fn is_section_symbol(&self) -> bool {
        self.n_type & N_STAB == 0 && self.n_type & N_TYPE == N_SECT
    }
}

/// Reads symbols out of an image's `__LINKEDIT` segment.
#[derive(Debug)]
pub struct SymtabReader<M> {
    linkedit: MappedSegment<M>,
    symtab: SymbolTable,
    split: Option<SplitSymbolTables>,
    strings_offset: usize,
    strings_size: usize,
    byteorder: ByteOrder,
    m64: bool,
    cpu_type: u32,
}

impl<M: AsRef<[u8]>> SymtabReader<M> {
    /// Locate and map the symbol and string tables of `image`.
    pub fn new<T: Task<Mapping = M>>(image: &Image<'_, T>) -> Result<Self> {
        let symtab_cmd = image
            .find_command(LC_SYMTAB)
            .and_then(|c| c.symtab())
            .ok_or(MachOError::NotFound("LC_SYMTAB"))?;
        let dysymtab_cmd = image.find_command(LC_DYSYMTAB).and_then(|c| c.dysymtab());

        if symtab_cmd.nsyms > image.limits().max_symbols {
            debug!(
                nsyms = symtab_cmd.nsyms,
                limit = image.limits().max_symbols,
                "Symbol table exceeds configured limits"
            );
            return Err(MachOError::MalformedInput("symbol table exceeds limits"));
        }

        let linkedit = image.map_segment(SEG_LINKEDIT)?;

        let entry_size = entry_size(image.is_64());
        let table_len = u64::from(symtab_cmd.nsyms) * entry_size as u64;
        linkedit.file_range(u64::from(symtab_cmd.symoff), table_len)?;
        linkedit.file_range(u64::from(symtab_cmd.stroff), u64::from(symtab_cmd.strsize))?;

        // file_range validated both offsets against the mapping.
        let symoff = (u64::from(symtab_cmd.symoff) - linkedit.fileoff) as usize;
        let stroff = (u64::from(symtab_cmd.stroff) - linkedit.fileoff) as usize;

        let symtab = SymbolTable {
            offset: symoff,
            count: symtab_cmd.nsyms,
        };

        let split = match dysymtab_cmd {
            Some(dysym) => {
                let sub_table = |first: u32, count: u32| -> Result<SymbolTable> {
                    first
                        .checked_add(count)
                        .filter(|&end| end <= symtab_cmd.nsyms)
                        .ok_or(MachOError::MalformedInput("dysymtab range exceeds symtab"))?;
                    Ok(SymbolTable {
                        offset: symoff + first as usize * entry_size,
                        count,
                    })
                };
                Some(SplitSymbolTables {
                    global: sub_table(dysym.iextdefsym, dysym.nextdefsym)?,
                    local: sub_table(dysym.ilocalsym, dysym.nlocalsym)?,
                })
            }
            None => None,
        };

        Ok(Self {
            linkedit,
            symtab,
            split,
            strings_offset: stroff,
            strings_size: symtab_cmd.strsize as usize,
            byteorder: image.byteorder(),
            m64: image.is_64(),
            cpu_type: image.cpu_type(),
        })
    }

    /// The combined symbol table.
    pub fn symtab(&self) -> SymbolTable {
        self.symtab
    }

    /// Global and local sub-tables, when the image provides them.
    pub fn split(&self) -> Option<SplitSymbolTables> {
        self.split
    }

    /// Tables a full scan should visit: global then local when split,
    /// otherwise the combined table.
    pub fn scan_tables(&self) -> impl Iterator<Item = SymbolTable> {
        let tables = match self.split {
            Some(split) => [Some(split.global), Some(split.local)],
            None => [Some(self.symtab), None],
        };
        tables.into_iter().flatten()
    }

    /// The mapped `__LINKEDIT` segment.
    pub fn linkedit(&self) -> &MappedSegment<M> {
        &self.linkedit
    }

    pub fn string_table_size(&self) -> usize {
        self.strings_size
    }

    /// Decode entry `index` of `table`.
    pub fn read(&self, table: SymbolTable, index: u32) -> Result<SymbolEntry> {
        if index >= table.count {
            return Err(MachOError::InvalidArgument("symbol index out of range"));
        }
        let size = entry_size(self.m64);
        let start = table.offset + index as usize * size;
        let data = self
            .linkedit
            .mobj
            .bytes()
            .get(start..start + size)
            .ok_or(MachOError::MalformedInput("symbol entry outside __LINKEDIT"))?;

        let order = self.byteorder;
        let n_desc = data.read_u16(6, order)?;
        let n_value = data.read_addr(8, order, self.m64)?;

        let mut normalized_value = n_value;
        if self.cpu_type == CPU_TYPE_ARM && n_desc & N_ARM_THUMB_DEF != 0 {
            normalized_value |= 1;
        }

        Ok(SymbolEntry {
            n_strx: data.read_u32(0, order)?,
            n_type: data.read_u8(4)?,
            n_sect: data.read_u8(5)?,
            n_desc,
            n_value,
            normalized_value,
        })
    }

    /// Decoded entries of `table`, skipping any that fail to decode.
    pub fn entries(&self, table: SymbolTable) -> impl Iterator<Item = SymbolEntry> + '_ {
        (0..table.count).filter_map(move |i| self.read(table, i).ok())
    }

    /// Raw bytes of the NUL-terminated name at `n_strx`.
    pub fn symbol_name_bytes(&self, n_strx: u32) -> Result<&[u8]> {
        let n_strx = n_strx as usize;
        if n_strx >= self.strings_size {
            return Err(MachOError::InvalidArgument("string index out of range"));
        }
        let strings = self
            .linkedit
            .mobj
            .bytes()
            .get(self.strings_offset..self.strings_offset + self.strings_size)
            .ok_or(MachOError::Internal("string table outside __LINKEDIT"))?;
        let tail = &strings[n_strx..];
        let end = memchr::memchr(0, tail)
            .ok_or(MachOError::MalformedInput("unterminated symbol name"))?;
        Ok(&tail[..end])
    }

    /// The name at `n_strx`. Borrowed from the mapped string table.
    pub fn symbol_name(&self, n_strx: u32) -> Result<&str> {
        std::str::from_utf8(self.symbol_name_bytes(n_strx)?)
            .map_err(|_| MachOError::MalformedInput("symbol name is not UTF-8"))
    }
}

fn entry_size(m64: bool) -> usize {
    if m64 {
        NLIST_64_SIZE
    } else {
        NLIST_SIZE
    }
}

impl<'t, T: Task> Image<'t, T> {
    /// Open a symbol table reader over this image.
    pub fn symtab_reader(&self) -> Result<SymtabReader<T::Mapping>> {
        SymtabReader::new(self)
    }
}
