//! On-disk Mach-O layouts and constants

use bitflags::bitflags;

pub use object::macho::{
    CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64, LC_DYSYMTAB, LC_REQ_DYLD,
    LC_SEGMENT, LC_SEGMENT_64, LC_SYMTAB, LC_UUID, MH_BUNDLE, MH_CIGAM, MH_CIGAM_64, MH_CORE,
    MH_DSYM, MH_DYLDLINK, MH_DYLIB, MH_DYLINKER, MH_EXECUTE, MH_KEXT_BUNDLE, MH_MAGIC, MH_MAGIC_64,
    MH_NOUNDEFS, MH_OBJECT, MH_PIE, MH_SUBSECTIONS_VIA_SYMBOLS, MH_TWOLEVEL, N_ARM_THUMB_DEF,
    N_SECT, N_STAB, N_TYPE,
};

/// `struct mach_header`
pub const MACH_HEADER_SIZE: usize = 28;
/// `struct mach_header_64` (adds a reserved word)
pub const MACH_HEADER_64_SIZE: usize = 32;
/// `struct load_command`
pub const LOAD_COMMAND_SIZE: usize = 8;
/// `struct segment_command`
pub const SEGMENT_COMMAND_SIZE: usize = 56;
/// `struct segment_command_64`
pub const SEGMENT_COMMAND_64_SIZE: usize = 72;
/// `struct section`
pub const SECTION_SIZE: usize = 68;
/// `struct section_64`
pub const SECTION_64_SIZE: usize = 80;
/// `struct symtab_command`
pub const SYMTAB_COMMAND_SIZE: usize = 24;
/// `struct dysymtab_command`
pub const DYSYMTAB_COMMAND_SIZE: usize = 80;
/// `struct uuid_command`
pub const UUID_COMMAND_SIZE: usize = 24;
/// `struct nlist`
pub const NLIST_SIZE: usize = 12;
/// `struct nlist_64`
pub const NLIST_64_SIZE: usize = 16;

/// Length of segment and section names.
pub const NAME_LEN: usize = 16;

pub const SEG_TEXT: &str = "__TEXT";
pub const SEG_LINKEDIT: &str = "__LINKEDIT";

/// The fixed Mach-O header as found in the target, before byte-swapping.
///
/// The 32-bit and 64-bit headers share these fields; the 64-bit reserved
/// word is accounted for in the image's header size only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

impl MachHeader {
    /// Copy the header out of `data` without byte-swapping.
    pub fn from_raw(data: &[u8; MACH_HEADER_SIZE]) -> Self {
        let word = |i: usize| u32::from_ne_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Self {
            magic: word(0),
            cputype: word(4),
            cpusubtype: word(8),
            filetype: word(12),
            ncmds: word(16),
            sizeofcmds: word(20),
            flags: word(24),
        }
    }
}

/// Mach-O file type (`MH_EXECUTE`, `MH_DYLIB`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Object,
    Execute,
    Core,
    Dylib,
    Dylinker,
    Bundle,
    Dsym,
    KextBundle,
    Other(u32),
}

impl From<u32> for FileType {
    fn from(val: u32) -> Self {
        match val {
            MH_OBJECT => FileType::Object,
            MH_EXECUTE => FileType::Execute,
            MH_CORE => FileType::Core,
            MH_DYLIB => FileType::Dylib,
            MH_DYLINKER => FileType::Dylinker,
            MH_BUNDLE => FileType::Bundle,
            MH_DSYM => FileType::Dsym,
            MH_KEXT_BUNDLE => FileType::KextBundle,
            other => FileType::Other(other),
        }
    }
}

bitflags! {
    /// `mach_header.flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        const NOUNDEFS = MH_NOUNDEFS;
        const DYLDLINK = MH_DYLDLINK;
        const TWOLEVEL = MH_TWOLEVEL;
        const SUBSECTIONS_VIA_SYMBOLS = MH_SUBSECTIONS_VIA_SYMBOLS;
        const PIE = MH_PIE;
        const _ = !0;
    }
}

/// Compare a NUL-padded fixed-width name against `name`.
pub fn fixed_name_eq(field: &[u8], name: &str) -> bool {
    let name = name.as_bytes();
    if name.len() > field.len() {
        return false;
    }
    field[..name.len()] == *name && field[name.len()..].first().map_or(true, |&b| b == 0)
}

/// The bytes of a NUL-padded fixed-width name, without padding.
pub fn fixed_name(field: &[u8]) -> &[u8] {
    let end = memchr::memchr(0, field).unwrap_or(field.len());
    &field[..end]
}
