//! Mach-O image introspection for crash-time symbolication.
//!
//! An [`Image`] describes one binary loaded in a target [`Task`]. It is built
//! from the task and the image's header address, maps only the header and
//! load commands, and hands out further mappings (segments, sections, the
//! symbol table) as separately owned objects.
//!
//! Apart from [`Image::init`], which copies the image name, nothing in this
//! module allocates, locks, or reads target memory except through the task's
//! mapping primitive. Lookups are linear scans over the mapped tables.

pub mod byteorder;
pub mod commands;
pub mod segment;
pub mod symbolicate;
pub mod symtab;
pub mod types;

use crate::config::ImageLimits;
use crate::error::{MachOError, Result};
use crate::task::{MemoryObject, Task};
use byteorder::ByteOrder;
use commands::{validate_commands, LoadCommand, LoadCommands, SegmentCommand};
use tracing::{debug, warn};
use uuid::Uuid;

pub use segment::MappedSegment;
pub use symtab::{SplitSymbolTables, SymbolEntry, SymbolTable, SymtabReader};
pub use types::*;

/// Link-time extent of the `__TEXT` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextSegment {
    vmaddr: u64,
    vmsize: u64,
}

/// A Mach-O image loaded in a target task.
pub struct Image<'t, T: Task> {
    task: &'t T,
    header_addr: u64,
    vmaddr_slide: i64,
    name: String,
    header: MachHeader,
    header_size: u64,
    ncmds: u32,
    load_cmds: MemoryObject<T::Mapping>,
    text: Option<TextSegment>,
    m64: bool,
    byteorder: ByteOrder,
    limits: ImageLimits,
}

impl<'t, T: Task> Image<'t, T> {
    /// Parse the image whose header lives at `header_addr` in `task`.
    ///
    /// Not async-signal-safe: the name is copied. Everything the image
    /// maps is released when it is dropped.
    pub fn init(task: &'t T, name: &str, header_addr: u64) -> Result<Self> {
        Self::init_with_limits(task, name, header_addr, &ImageLimits::default())
    }

    /// Like [`Image::init`], bounding declared sizes by `limits`.
    pub fn init_with_limits(
        task: &'t T,
        name: &str,
        header_addr: u64,
        limits: &ImageLimits,
    ) -> Result<Self> {
        let header = {
            let mobj = task.map(header_addr, MACH_HEADER_SIZE as u64)?;
            let raw: &[u8; MACH_HEADER_SIZE] = mobj
                .bytes()
                .get(..MACH_HEADER_SIZE)
                .and_then(|b| b.try_into().ok())
                .ok_or(MachOError::Internal("header mapping shorter than requested"))?;
            MachHeader::from_raw(raw)
        };

        let (byteorder, m64) = ByteOrder::from_magic(header.magic).ok_or_else(|| {
            debug!(
                header_addr = %format_args!("{:#x}", header_addr),
                magic = %format_args!("{:#x}", header.magic),
                "Unknown Mach-O magic"
            );
            MachOError::MalformedInput("unknown Mach-O magic")
        })?;

        let header_size = if m64 {
            MACH_HEADER_64_SIZE
        } else {
            MACH_HEADER_SIZE
        } as u64;
        let ncmds = byteorder.swap32(header.ncmds);
        let sizeofcmds = byteorder.swap32(header.sizeofcmds);

        if sizeofcmds == 0 || ncmds == 0 {
            return Err(MachOError::MalformedInput("image declares no load commands"));
        }
        if u64::from(sizeofcmds) > limits.max_load_commands_size
            || ncmds > limits.max_load_commands
        {
            warn!(
                ncmds,
                sizeofcmds,
                "Load command region exceeds configured limits"
            );
            return Err(MachOError::MalformedInput("load command region exceeds limits"));
        }

        let cmds_addr = header_addr
            .checked_add(header_size)
            .ok_or(MachOError::MalformedInput("load commands overflow address space"))?;
        let load_cmds = task
            .map(cmds_addr, u64::from(sizeofcmds))
            .map_err(|e| {
                debug!(
                    error = %e,
                    cmds_addr = %format_args!("{:#x}", cmds_addr),
                    sizeofcmds,
                    "Could not map load commands"
                );
                e.into_malformed("sizeofcmds exceeds mapped image")
            })?;
        if load_cmds.len() != u64::from(sizeofcmds) {
            return Err(MachOError::Internal("load command mapping length mismatch"));
        }

        validate_commands(load_cmds.bytes(), ncmds, byteorder, m64)?;

        let text = LoadCommands::new(load_cmds.bytes(), ncmds, byteorder, m64)
            .filter_map(|c| c.segment())
            .find(|seg| seg.is_named(SEG_TEXT))
            .map(|seg| TextSegment {
                vmaddr: seg.vmaddr,
                vmsize: seg.vmsize,
            });

        // __TEXT maps the header; its link address fixes the slide.
        let vmaddr_slide = match text {
            Some(t) => header_addr.wrapping_sub(t.vmaddr) as i64,
            None => {
                debug!(image = name, "Image has no __TEXT segment");
                0
            }
        };

        Ok(Self {
            task,
            header_addr,
            vmaddr_slide,
            name: name.to_owned(),
            header,
            header_size,
            ncmds,
            load_cmds,
            text,
            m64,
            byteorder,
            limits: *limits,
        })
    }

    pub fn task(&self) -> &'t T {
        self.task
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_addr(&self) -> u64 {
        self.header_addr
    }

    /// Difference between the runtime and link-time addresses.
    pub fn vmaddr_slide(&self) -> i64 {
        self.vmaddr_slide
    }

    /// The header as read from the target, before byte-swapping.
    pub fn header(&self) -> &MachHeader {
        &self.header
    }

    /// In-memory header size, including the 64-bit reserved word.
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    pub fn limits(&self) -> &ImageLimits {
        &self.limits
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    pub fn is_64(&self) -> bool {
        self.m64
    }

    pub fn ncmds(&self) -> u32 {
        self.ncmds
    }

    pub fn cpu_type(&self) -> u32 {
        self.byteorder.swap32(self.header.cputype)
    }

    pub fn cpu_subtype(&self) -> u32 {
        self.byteorder.swap32(self.header.cpusubtype)
    }

    pub fn file_type(&self) -> FileType {
        FileType::from(self.byteorder.swap32(self.header.filetype))
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.byteorder.swap32(self.header.flags))
    }

    /// Translate a link-time address to its runtime address.
    pub fn slide_address(&self, vmaddr: u64) -> Option<u64> {
        vmaddr.checked_add_signed(self.vmaddr_slide)
    }

    /// Translate a runtime address back to its link-time address.
    pub fn unslide_address(&self, address: u64) -> Option<u64> {
        address.checked_add_signed(self.vmaddr_slide.checked_neg()?)
    }

    /// Whether `address` falls inside the runtime `__TEXT` range.
    ///
    /// Always false for an image without a `__TEXT` segment.
    pub fn contains_address(&self, address: u64) -> bool {
        let Some(text) = self.text else {
            return false;
        };
        let Some(start) = self.slide_address(text.vmaddr) else {
            return false;
        };
        address >= start && address - start < text.vmsize
    }

    /// All load commands, in order.
    pub fn commands(&self) -> LoadCommands<'_> {
        LoadCommands::new(self.load_cmds.bytes(), self.ncmds, self.byteorder, self.m64)
    }

    /// Load commands of type `cmd`, in order.
    pub fn commands_of_type(&self, cmd: u32) -> impl Iterator<Item = LoadCommand<'_>> + '_ {
        self.commands().filter(move |c| c.cmd == cmd)
    }

    /// First load command of type `cmd`.
    pub fn find_command(&self, cmd: u32) -> Option<LoadCommand<'_>> {
        self.commands_of_type(cmd).next()
    }

    /// First segment command named exactly `segname`.
    pub fn find_segment_command(&self, segname: &str) -> Option<SegmentCommand<'_>> {
        self.commands()
            .filter_map(|c| c.segment())
            .find(|seg| seg.is_named(segname))
    }

    /// The image UUID from `LC_UUID`.
    pub fn uuid(&self) -> Option<Uuid> {
        self.find_command(LC_UUID)
            .and_then(|c| c.uuid())
            .map(Uuid::from_bytes)
    }
}

impl<T: Task> std::fmt::Debug for Image<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("header_addr", &format_args!("{:#x}", self.header_addr))
            .field("vmaddr_slide", &self.vmaddr_slide)
            .field("ncmds", &self.ncmds)
            .field("m64", &self.m64)
            .field("byteorder", &self.byteorder)
            .finish()
    }
}
