//! Segment and section mapping

use super::Image;
use crate::error::{MachOError, Result};
use crate::task::{MemoryObject, Task};
use tracing::debug;

/// A mapped segment, owned by the caller and released on drop
/// independently of the image that produced it.
#[derive(Debug)]
pub struct MappedSegment<M> {
    /// The segment's file-backed bytes at their runtime address.
    pub mobj: MemoryObject<M>,
    /// File offset the segment command declares.
    pub fileoff: u64,
    /// File size the segment command declares.
    pub filesize: u64,
}

impl<M: AsRef<[u8]>> MappedSegment<M> {
    /// Bytes at file offset `fileoff`, which must fall inside this segment.
    pub fn file_range(&self, fileoff: u64, length: u64) -> Result<&[u8]> {
        let offset = fileoff
            .checked_sub(self.fileoff)
            .ok_or(MachOError::MalformedInput("file offset precedes segment"))?;
        self.mobj
            .slice(offset, length)
            .map_err(|e| e.into_malformed("file range exceeds segment"))
    }
}

impl<'t, T: Task> Image<'t, T> {
    /// Map the file-backed range of segment `segname`.
    pub fn map_segment(&self, segname: &str) -> Result<MappedSegment<T::Mapping>> {
        let seg = self
            .find_segment_command(segname)
            .ok_or(MachOError::NotFound("segment"))?;
        let address = self
            .slide_address(seg.vmaddr)
            .ok_or(MachOError::MalformedInput("segment address overflows"))?;

        let mobj = self.task().map(address, seg.filesize).map_err(|e| {
            debug!(
                error = %e,
                segment = segname,
                address = %format_args!("{:#x}", address),
                filesize = seg.filesize,
                "Could not map segment"
            );
            e
        })?;

        Ok(MappedSegment {
            mobj,
            fileoff: seg.fileoff,
            filesize: seg.filesize,
        })
    }

    /// Map section `sectname` of segment `segname`.
    pub fn map_section(&self, segname: &str, sectname: &str) -> Result<MemoryObject<T::Mapping>> {
        let seg = self
            .find_segment_command(segname)
            .ok_or(MachOError::NotFound("segment"))?;
        let sect = seg
            .find_section(sectname)
            .ok_or(MachOError::NotFound("section"))?;
        let address = self
            .slide_address(sect.addr)
            .ok_or(MachOError::MalformedInput("section address overflows"))?;

        self.task().map(address, sect.size).map_err(|e| {
            debug!(
                error = %e,
                segment = segname,
                section = sectname,
                address = %format_args!("{:#x}", address),
                "Could not map section"
            );
            e
        })
    }
}
