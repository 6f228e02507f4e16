//! Access to a target task's address space.
//!
//! The parser never dereferences an address it read from an image. Every
//! range is first handed to a [`Task`], which either produces a locally
//! readable [`MemoryObject`] for it or reports a mapping failure. On a live
//! system the task is backed by a kernel remap primitive; [`SliceTask`]
//! stands in for it with a local buffer.

pub mod snapshot;

use crate::error::{MachOError, Result};
use tracing::trace;

pub use snapshot::{SnapshotError, SnapshotTask};

/// A source of validated memory mappings.
pub trait Task {
    /// Owned mapping handed out by [`Task::map`]. Released on drop.
    type Mapping: AsRef<[u8]>;

    /// Map `length` bytes starting at `address` in the target task.
    ///
    /// Fails with `InvalidArgument` for an empty request and with
    /// `MemoryAccess` when any part of the range is not readable.
    fn map(&self, address: u64, length: u64) -> Result<MemoryObject<Self::Mapping>>;
}

impl<T: Task + ?Sized> Task for &T {
    type Mapping = T::Mapping;

    fn map(&self, address: u64, length: u64) -> Result<MemoryObject<Self::Mapping>> {
        (**self).map(address, length)
    }
}

/// A mapped range of a target task.
#[derive(Debug)]
pub struct MemoryObject<M> {
    address: u64,
    mapping: M,
}

impl<M: AsRef<[u8]>> MemoryObject<M> {
    /// Wrap a mapping whose first byte lives at `address` in the target.
    pub fn new(address: u64, mapping: M) -> Self {
        Self { address, mapping }
    }

    /// Target address of the first mapped byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> u64 {
        self.mapping.as_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.as_ref().is_empty()
    }

    /// The whole mapping.
    pub fn bytes(&self) -> &[u8] {
        self.mapping.as_ref()
    }

    /// Validate `[address + offset, address + offset + length)` against the
    /// mapping and return the local view of it.
    pub fn remap(&self, address: u64, offset: u64, length: u64) -> Result<&[u8]> {
        let fail = MachOError::MemoryAccess {
            address: address.wrapping_add(offset),
            length,
        };
        let start = address
            .checked_add(offset)
            .and_then(|a| a.checked_sub(self.address))
            .ok_or(fail)?;
        let end = start.checked_add(length).ok_or(fail)?;
        if end > self.len() {
            trace!(
                address = %format_args!("{:#x}", address.wrapping_add(offset)),
                length,
                mapped = self.len(),
                "Remap outside of mapped object"
            );
            return Err(fail);
        }
        Ok(&self.bytes()[start as usize..end as usize])
    }

    /// Validate `[offset, offset + length)` relative to the mapping start.
    pub fn slice(&self, offset: u64, length: u64) -> Result<&[u8]> {
        self.remap(self.address, offset, length)
    }
}

/// A task whose address space is a local buffer mapped at `base`.
#[derive(Debug, Clone, Copy)]
pub struct SliceTask<'a> {
    base: u64,
    memory: &'a [u8],
}

impl<'a> SliceTask<'a> {
    pub fn new(base: u64, memory: &'a [u8]) -> Self {
        Self { base, memory }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn memory(&self) -> &'a [u8] {
        self.memory
    }
}

impl<'a> Task for SliceTask<'a> {
    type Mapping = &'a [u8];

    fn map(&self, address: u64, length: u64) -> Result<MemoryObject<&'a [u8]>> {
        if length == 0 {
            return Err(MachOError::InvalidArgument("zero-length mapping"));
        }
        let fail = MachOError::MemoryAccess { address, length };
        let start = address.checked_sub(self.base).ok_or(fail)?;
        let end = start.checked_add(length).ok_or(fail)?;
        if end > self.memory.len() as u64 {
            return Err(fail);
        }
        Ok(MemoryObject::new(
            address,
            &self.memory[start as usize..end as usize],
        ))
    }
}
