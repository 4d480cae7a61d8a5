//! Device-visible memory
//!
//! The ring never touches the platform's DMA machinery directly. Everything that needs a
//! device-visible address goes through [`DmaOps`]: the coherent block holding the descriptors,
//! and the streaming (device-write) mappings of the receive buffers.

use crate::buffer::RxBuffer;
use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;
use embedded_dma::WriteBuffer;

/// Address of a location as seen by the device across the interconnect.
///
/// The descriptor format carries 32 bit addresses, so the platform must hand out mappings below
/// 4 GiB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusAddress(pub u32);

impl BusAddress {
    pub const fn new(address: u32) -> Self {
        BusAddress(address)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Address `offset` bytes past this one.
    pub const fn offset(self, offset: u32) -> Self {
        BusAddress(self.0.wrapping_add(offset))
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// The platform could not establish a device-visible mapping for a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MappingError;

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to map buffer for device access")
    }
}

/// A block of zeroed, cache-coherent memory shared with the device.
#[derive(Debug)]
pub struct CoherentBlock {
    cpu: NonNull<u8>,
    bus: BusAddress,
    layout: Layout,
}

impl CoherentBlock {
    /// Describe a block handed out by a platform allocator.
    ///
    /// # Safety
    /// `cpu` must point to `layout.size()` bytes of zeroed memory aligned to `layout.align()`,
    /// valid until the block is returned through [`DmaOps::free_coherent`], and `bus` must be
    /// the device's view of the same bytes.
    pub unsafe fn new(cpu: NonNull<u8>, bus: BusAddress, layout: Layout) -> Self {
        CoherentBlock { cpu, bus, layout }
    }

    pub fn cpu_ptr(&self) -> *mut u8 {
        self.cpu.as_ptr()
    }

    pub fn bus_address(&self) -> BusAddress {
        self.bus
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

// SAFETY: a `CoherentBlock` is the sole CPU-side handle to its memory and is not `Clone`, so
// moving it moves exclusive ownership. The only other party touching the bytes is the device.
unsafe impl Send for CoherentBlock {}

/// Platform DMA operations the receive ring is built on.
pub trait DmaOps {
    /// Allocate zeroed coherent memory, or `None` when exhausted.
    fn alloc_coherent(&mut self, layout: Layout) -> Option<CoherentBlock>;

    /// Return a block obtained from [`DmaOps::alloc_coherent`].
    ///
    /// # Safety
    /// The device must no longer access the block.
    unsafe fn free_coherent(&mut self, block: CoherentBlock);

    /// Allocate a receive buffer of `capacity` bytes, or `None` when exhausted.
    fn alloc_buffer(&mut self, capacity: usize) -> Option<RxBuffer> {
        RxBuffer::try_with_capacity(capacity)
    }

    /// Map `len` bytes at `cpu` for writing by the device.
    fn map_from_device(&mut self, cpu: *mut u8, len: usize) -> Result<BusAddress, MappingError>;

    /// Release a mapping made by [`DmaOps::map_from_device`]. After this returns the CPU sees
    /// everything the device wrote.
    fn unmap_from_device(&mut self, address: BusAddress, len: usize);

    /// Map the free tail of `buffer` for device writes.
    fn map_buffer(&mut self, buffer: &mut RxBuffer) -> Result<(BusAddress, usize), MappingError> {
        let (cpu, len) = unsafe { buffer.write_buffer() };
        let address = self.map_from_device(cpu, len)?;
        Ok((address, len))
    }
}
