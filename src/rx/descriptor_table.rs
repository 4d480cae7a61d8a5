use super::{RxDescriptor, RxError, RX_DESC_SIZE};
use crate::buffer::RxBuffer;
use crate::dma::{BusAddress, CoherentBlock, DmaOps};
use alloc::vec::Vec;
use core::alloc::Layout;

/// A receive buffer on loan to the device.
pub(crate) struct Binding {
    buffer: RxBuffer,
    bus: BusAddress,
    mapped_len: usize,
}

impl Binding {
    /// Release the device mapping and hand the buffer back to the CPU.
    pub(crate) fn unmap<D: DmaOps>(self, dma: &mut D) -> RxBuffer {
        dma.unmap_from_device(self.bus, self.mapped_len);
        self.buffer
    }
}

/// Software side of one slot. `next` mirrors the descriptor's `next_address`.
struct SlotHandle {
    binding: Option<Binding>,
    next: usize,
}

/// The descriptor ring in coherent memory plus the handle for each slot.
///
/// The two halves are allocated and released together; a table that exists always has both.
pub(crate) struct RxDescriptorTable {
    memory: CoherentBlock,
    slots: Vec<SlotHandle>,
    buffer_size: usize,
    headroom: usize,
}

impl RxDescriptorTable {
    pub(crate) fn allocate<D: DmaOps>(
        dma: &mut D,
        count: usize,
        buffer_size: usize,
        headroom: usize,
    ) -> Result<Self, RxError> {
        let layout = count
            .checked_mul(RX_DESC_SIZE)
            .and_then(|size| Layout::from_size_align(size, core::mem::align_of::<RxDescriptor>()).ok())
            .ok_or(RxError::OutOfMemory)?;

        let memory = match dma.alloc_coherent(layout) {
            Some(memory) => memory,
            None => {
                error!("failed to allocate {} bytes of descriptor memory", layout.size());
                return Err(RxError::OutOfMemory);
            }
        };

        let mut slots = Vec::new();
        if slots.try_reserve_exact(count).is_err() {
            error!("failed to allocate {} slot handles", count);
            unsafe { dma.free_coherent(memory) };
            return Err(RxError::OutOfMemory);
        }
        slots.extend((0..count).map(|i| SlotHandle {
            binding: None,
            next: (i + 1) % count,
        }));

        Ok(RxDescriptorTable {
            memory,
            slots,
            buffer_size,
            headroom,
        })
    }

    /// Bind a buffer to every slot and close the ring, leaving every slot with the device.
    ///
    /// On failure the slots bound so far stay bound; the caller tears the table down.
    pub(crate) fn initialize<D: DmaOps>(&mut self, dma: &mut D) -> Result<(), RxError> {
        for i in 0..self.slots.len() {
            if let Err(e) = self.bind(dma, i) {
                error!("failed to bind buffer for slot {}: {}", i, e);
                return Err(RxError::OutOfMemory);
            }

            let next = self.descriptor_address(self.slots[i].next);
            let descriptor = self.descriptor(i);
            descriptor.link(next);
            descriptor.release_to_device();
        }

        Ok(())
    }

    /// Allocate and map a fresh buffer for slot `index` and point its descriptor at it.
    ///
    /// On failure the descriptor is left exactly as it was.
    pub(crate) fn bind<D: DmaOps>(&mut self, dma: &mut D, index: usize) -> Result<(), RxError> {
        debug_assert!(self.slots[index].binding.is_none());

        // The device may write the full advertised length past the headroom.
        let mut buffer = self
            .buffer_size
            .checked_add(self.headroom)
            .and_then(|capacity| dma.alloc_buffer(capacity))
            .ok_or(RxError::OutOfMemory)?;
        buffer.reserve(self.headroom);
        let (bus, mapped_len) = dma.map_buffer(&mut buffer)?;

        self.descriptor(index).rebind(bus, self.buffer_size as u16);
        self.slots[index].binding = Some(Binding {
            buffer,
            bus,
            mapped_len,
        });

        Ok(())
    }

    pub(crate) fn take_binding(&mut self, index: usize) -> Option<Binding> {
        self.slots[index].binding.take()
    }

    pub(crate) fn is_bound(&self, index: usize) -> bool {
        self.slots[index].binding.is_some()
    }

    pub(crate) fn unbound_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.binding.is_none()).count()
    }

    pub(crate) fn next(&self, index: usize) -> usize {
        self.slots[index].next
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn base_address(&self) -> BusAddress {
        self.memory.bus_address()
    }

    fn descriptor_address(&self, index: usize) -> BusAddress {
        self.base_address().offset((index * RX_DESC_SIZE) as u32)
    }

    pub(crate) fn descriptor(&self, index: usize) -> &RxDescriptor {
        assert!(index < self.slots.len(), "Descriptor index out of range");
        // The block holds `len` zero-initialised descriptors, aligned for `RxDescriptor`, for
        // as long as the table exists.
        unsafe { &*(self.memory.cpu_ptr() as *const RxDescriptor).add(index) }
    }

    /// Unmap and free every bound buffer, then the descriptor memory.
    ///
    /// The device must not be using the ring any more.
    pub(crate) fn teardown<D: DmaOps>(mut self, dma: &mut D) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(binding) = slot.binding.take() {
                debug!("unmapping slot {} buffer at {}", i, binding.bus);
                drop(binding.unmap(dma));
            }
        }

        let RxDescriptorTable { memory, slots, .. } = self;
        drop(slots);
        unsafe { dma.free_coherent(memory) };
    }
}
