//! Byte-order policy for Mach-O field access.
//!
//! An image may be stored in either byte order regardless of the host. The
//! policy is picked once from the header magic, and every multi-byte field
//! the parser reads goes through it.

use super::types::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};
use crate::error::{MachOError, Result};

/// Field accessors for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Fields are stored in host order.
    Native,
    /// Fields are stored in the opposite of host order.
    Swapped,
}

impl ByteOrder {
    /// Select the policy and pointer width for a header magic read in host
    /// order. Returns `None` for an unsupported magic.
    pub fn from_magic(magic: u32) -> Option<(Self, bool)> {
        match magic {
            MH_MAGIC => Some((ByteOrder::Native, false)),
            MH_MAGIC_64 => Some((ByteOrder::Native, true)),
            MH_CIGAM => Some((ByteOrder::Swapped, false)),
            MH_CIGAM_64 => Some((ByteOrder::Swapped, true)),
            _ => None,
        }
    }

    pub fn swap16(self, v: u16) -> u16 {
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }

    pub fn swap32(self, v: u32) -> u32 {
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }

    pub fn swap64(self, v: u64) -> u64 {
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }
}

/// Trait for reading fields through a byte-order policy
pub trait ByteOrderRead {
    fn read_u8(&self, offset: usize) -> Result<u8>;
    fn read_u16(&self, offset: usize, order: ByteOrder) -> Result<u16>;
    fn read_u32(&self, offset: usize, order: ByteOrder) -> Result<u32>;
    fn read_u64(&self, offset: usize, order: ByteOrder) -> Result<u64>;

    /// Read a pointer-sized field: 64-bit when `m64`, otherwise 32-bit.
    fn read_addr(&self, offset: usize, order: ByteOrder, m64: bool) -> Result<u64> {
        if m64 {
            self.read_u64(offset, order)
        } else {
            self.read_u32(offset, order).map(u64::from)
        }
    }
}

fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|b| b.try_into().ok())
        .ok_or(MachOError::Truncated { offset, needed: N })
}

impl ByteOrderRead for [u8] {
    fn read_u8(&self, offset: usize) -> Result<u8> {
        field::<1>(self, offset).map(|b| b[0])
    }

    fn read_u16(&self, offset: usize, order: ByteOrder) -> Result<u16> {
        field(self, offset).map(|b| order.swap16(u16::from_ne_bytes(b)))
    }

    fn read_u32(&self, offset: usize, order: ByteOrder) -> Result<u32> {
        field(self, offset).map(|b| order.swap32(u32::from_ne_bytes(b)))
    }

    fn read_u64(&self, offset: usize, order: ByteOrder) -> Result<u64> {
        field(self, offset).map(|b| order.swap64(u64::from_ne_bytes(b)))
    }
}
