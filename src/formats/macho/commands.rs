//! Load command walking and typed command views

use super::byteorder::{ByteOrder, ByteOrderRead};
use super::types::*;
use crate::error::{MachOError, Result};

/// One load command inside the mapped command region.
#[derive(Debug, Clone, Copy)]
pub struct LoadCommand<'a> {
    /// Command type, byte-order corrected.
    pub cmd: u32,
    /// Command size in bytes, byte-order corrected.
    pub cmdsize: u32,
    /// The full command, including its `load_command` prefix.
    pub data: &'a [u8],
    order: ByteOrder,
    m64: bool,
}

impl<'a> LoadCommand<'a> {
    /// View this command as a segment command of the image's width.
    pub fn segment(&self) -> Option<SegmentCommand<'a>> {
        let expected = if self.m64 { LC_SEGMENT_64 } else { LC_SEGMENT };
        if self.cmd != expected {
            return None;
        }
        SegmentCommand::parse(self.data, self.order, self.m64).ok()
    }

    /// View this command as `LC_SYMTAB`.
    pub fn symtab(&self) -> Option<SymtabCommand> {
        if self.cmd != LC_SYMTAB {
            return None;
        }
        SymtabCommand::parse(self.data, self.order).ok()
    }

    /// View this command as `LC_DYSYMTAB`.
    pub fn dysymtab(&self) -> Option<DysymtabCommand> {
        if self.cmd != LC_DYSYMTAB {
            return None;
        }
        DysymtabCommand::parse(self.data, self.order).ok()
    }

    /// The 16-byte UUID carried by `LC_UUID`.
    pub fn uuid(&self) -> Option<[u8; 16]> {
        if self.cmd != LC_UUID || self.data.len() < UUID_COMMAND_SIZE {
            return None;
        }
        self.data[8..24].try_into().ok()
    }
}

/// Lazy walk over a command region. Restart by asking the image again.
#[derive(Debug, Clone)]
pub struct LoadCommands<'a> {
    data: &'a [u8],
    offset: usize,
    remaining: u32,
    order: ByteOrder,
    m64: bool,
}

impl<'a> LoadCommands<'a> {
    pub(crate) fn new(data: &'a [u8], ncmds: u32, order: ByteOrder, m64: bool) -> Self {
        Self {
            data,
            offset: 0,
            remaining: ncmds,
            order,
            m64,
        }
    }

    /// Read the command at the cursor, checking it lies inside the region.
    fn read_current(&self) -> Result<LoadCommand<'a>> {
        let cmd = self.data.read_u32(self.offset, self.order)?;
        let cmdsize = self.data.read_u32(self.offset + 4, self.order)?;
        if (cmdsize as usize) < LOAD_COMMAND_SIZE {
            return Err(MachOError::MalformedInput("load command smaller than its header"));
        }
        let end = self
            .offset
            .checked_add(cmdsize as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or(MachOError::MalformedInput("load command exceeds sizeofcmds"))?;
        Ok(LoadCommand {
            cmd,
            cmdsize,
            data: &self.data[self.offset..end],
            order: self.order,
            m64: self.m64,
        })
    }
}

impl<'a> Iterator for LoadCommands<'a> {
    type Item = LoadCommand<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // The region was validated at init; a failure here ends the walk.
        match self.read_current() {
            Ok(command) => {
                self.offset += command.cmdsize as usize;
                self.remaining -= 1;
                Some(command)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// Walk every command once, rejecting any that would run past the region
/// or whose structure does not fit inside its declared size.
pub(crate) fn validate_commands(
    data: &[u8],
    ncmds: u32,
    order: ByteOrder,
    m64: bool,
) -> Result<()> {
    let mut walk = LoadCommands::new(data, ncmds, order, m64);
    while walk.remaining > 0 {
        let command = walk.read_current()?;
        match command.cmd {
            LC_SEGMENT if !m64 => {
                SegmentCommand::parse(command.data, order, m64)?;
            }
            LC_SEGMENT_64 if m64 => {
                SegmentCommand::parse(command.data, order, m64)?;
            }
            LC_SYMTAB => {
                SymtabCommand::parse(command.data, order)?;
            }
            LC_DYSYMTAB => {
                DysymtabCommand::parse(command.data, order)?;
            }
            _ => {}
        }
        walk.offset += command.cmdsize as usize;
        walk.remaining -= 1;
    }
    Ok(())
}

/// `LC_SEGMENT` / `LC_SEGMENT_64`, normalized to 64-bit fields
#[derive(Debug, Clone, Copy)]
pub struct SegmentCommand<'a> {
    pub segname: [u8; NAME_LEN],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
    sections: &'a [u8],
    order: ByteOrder,
    m64: bool,
}

impl<'a> SegmentCommand<'a> {
    fn parse(data: &'a [u8], order: ByteOrder, m64: bool) -> Result<Self> {
        let (header_size, section_size) = if m64 {
            (SEGMENT_COMMAND_64_SIZE, SECTION_64_SIZE)
        } else {
            (SEGMENT_COMMAND_SIZE, SECTION_SIZE)
        };
        if data.len() < header_size {
            return Err(MachOError::MalformedInput("segment command truncated"));
        }

        let mut segname = [0u8; NAME_LEN];
        segname.copy_from_slice(&data[8..8 + NAME_LEN]);

        // Pointer-sized fields are 4 or 8 bytes wide; the tail is 4 words.
        let w = if m64 { 8 } else { 4 };
        let base = 8 + NAME_LEN;
        let vmaddr = data.read_addr(base, order, m64)?;
        let vmsize = data.read_addr(base + w, order, m64)?;
        let fileoff = data.read_addr(base + 2 * w, order, m64)?;
        let filesize = data.read_addr(base + 3 * w, order, m64)?;
        let tail = base + 4 * w;
        let maxprot = data.read_u32(tail, order)?;
        let initprot = data.read_u32(tail + 4, order)?;
        let nsects = data.read_u32(tail + 8, order)?;
        let flags = data.read_u32(tail + 12, order)?;

        let sections_len = (nsects as usize)
            .checked_mul(section_size)
            .filter(|&len| header_size + len <= data.len())
            .ok_or(MachOError::MalformedInput("segment sections exceed cmdsize"))?;

        Ok(Self {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            nsects,
            flags,
            sections: &data[header_size..header_size + sections_len],
            order,
            m64,
        })
    }

    /// Whether this segment is named `name`.
    pub fn is_named(&self, name: &str) -> bool {
        fixed_name_eq(&self.segname, name)
    }

    /// Segment name without padding.
    pub fn name(&self) -> &[u8] {
        fixed_name(&self.segname)
    }

    /// The section headers following this command.
    pub fn sections(&self) -> Sections<'a> {
        Sections {
            data: self.sections,
            order: self.order,
            m64: self.m64,
        }
    }

    /// First section named `sectname` in this segment.
    pub fn find_section(&self, sectname: &str) -> Option<Section> {
        self.sections().find(|s| s.is_named(sectname))
    }
}

/// `struct section` / `struct section_64`, normalized
#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub sectname: [u8; NAME_LEN],
    pub segname: [u8; NAME_LEN],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub flags: u32,
}

impl Section {
    pub fn is_named(&self, name: &str) -> bool {
        fixed_name_eq(&self.sectname, name)
    }

    pub fn name(&self) -> &[u8] {
        fixed_name(&self.sectname)
    }
}

/// Iterator over a segment's section headers.
#[derive(Debug, Clone)]
pub struct Sections<'a> {
    data: &'a [u8],
    order: ByteOrder,
    m64: bool,
}

impl<'a> Iterator for Sections<'a> {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let size = if self.m64 { SECTION_64_SIZE } else { SECTION_SIZE };
        if self.data.len() < size {
            return None;
        }
        let (entry, rest) = self.data.split_at(size);
        self.data = rest;
        parse_section(entry, self.order, self.m64).ok()
    }
}

fn parse_section(data: &[u8], order: ByteOrder, m64: bool) -> Result<Section> {
    let mut sectname = [0u8; NAME_LEN];
    let mut segname = [0u8; NAME_LEN];
    sectname.copy_from_slice(&data[..NAME_LEN]);
    segname.copy_from_slice(&data[NAME_LEN..2 * NAME_LEN]);

    let w = if m64 { 8 } else { 4 };
    let base = 2 * NAME_LEN;
    let addr = data.read_addr(base, order, m64)?;
    let size = data.read_addr(base + w, order, m64)?;
    let tail = base + 2 * w;

    Ok(Section {
        sectname,
        segname,
        addr,
        size,
        offset: data.read_u32(tail, order)?,
        align: data.read_u32(tail + 4, order)?,
        flags: data.read_u32(tail + 16, order)?,
    })
}

/// `LC_SYMTAB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymtabCommand {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

impl SymtabCommand {
    fn parse(data: &[u8], order: ByteOrder) -> Result<Self> {
        if data.len() < SYMTAB_COMMAND_SIZE {
            return Err(MachOError::MalformedInput("symtab command truncated"));
        }
        Ok(Self {
            symoff: data.read_u32(8, order)?,
            nsyms: data.read_u32(12, order)?,
            stroff: data.read_u32(16, order)?,
            strsize: data.read_u32(20, order)?,
        })
    }
}

/// The symbol-index fields of `LC_DYSYMTAB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DysymtabCommand {
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
}

impl DysymtabCommand {
    fn parse(data: &[u8], order: ByteOrder) -> Result<Self> {
        if data.len() < DYSYMTAB_COMMAND_SIZE {
            return Err(MachOError::MalformedInput("dysymtab command truncated"));
        }
        Ok(Self {
            ilocalsym: data.read_u32(8, order)?,
            nlocalsym: data.read_u32(12, order)?,
            iextdefsym: data.read_u32(16, order)?,
            nextdefsym: data.read_u32(20, order)?,
            iundefsym: data.read_u32(24, order)?,
            nundefsym: data.read_u32(28, order)?,
        })
    }
}
