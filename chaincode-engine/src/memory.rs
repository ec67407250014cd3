//! Validated access to guest linear memory.
//!
//! The bridge never touches guest memory through raw offsets.  Every guest
//! pointer and length pair is first wrapped in a `GuestPtr`, whose accessors
//! re-check bounds against the memory instance at every use.  Re-checking
//! matters for the get-state output descriptor in particular, which is
//! recorded at suspension time and dereferenced only at resume time, after
//! the guest has had another chance to run.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use wasmi::{memory_units::Bytes, MemoryRef};

/// A guest pointer and length pair.  Construction only checks the length is
/// positive; bounds are validated against the memory instance on every
/// access, never cached.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct GuestPtr {
    address: u32,
    length: u32,
}

impl GuestPtr {
    /// Wraps a raw address and signed length from a host call.  Returns
    /// `None` for non-positive lengths.
    pub(crate) fn new(address: u32, length: i32) -> Option<Self> {
        if length <= 0 {
            return None;
        }
        Some(GuestPtr {
            address,
            length: length as u32,
        })
    }

    /// Whether the whole region lies within the current bounds of `memory`.
    pub(crate) fn in_bounds(&self, memory: &MemoryRef) -> bool {
        let size: Bytes = memory.current_size().into();
        (self.address as usize)
            .checked_add(self.length as usize)
            .map_or(false, |end| end <= size.0)
    }

    /// Reads the whole region, or `None` if it is out of bounds.
    pub(crate) fn read(&self, memory: &MemoryRef) -> Option<Vec<u8>> {
        if !self.in_bounds(memory) {
            return None;
        }
        memory.get(self.address, self.length as usize).ok()
    }

    /// Overwrites the whole region with `source`, zero-filling first and
    /// truncating `source` so a NUL terminator always fits.  Returns the
    /// number of source bytes written, or `None` if the region is out of
    /// bounds.
    pub(crate) fn write_terminated(&self, memory: &MemoryRef, source: &[u8]) -> Option<usize> {
        if !self.in_bounds(memory) {
            return None;
        }
        let mut region = vec![0u8; self.length as usize];
        let copied = source.len().min(region.len().saturating_sub(1));
        region[..copied].copy_from_slice(&source[..copied]);
        memory.set(self.address, &region).ok()?;
        Some(copied)
    }
}
