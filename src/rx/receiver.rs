use super::descriptor_table::RxDescriptorTable;
use super::frame::{self, DMA_HEADER_LEN, KEY_INDEX_LEN};
use super::{
    decode, Builder, DrainReport, DrainStatus, Ownership, RefillPolicy, RxDescriptor,
    RxDescriptorReader, RxError, RxFlags, RxHost, RxStatus, STATUS_OK,
};
use crate::buffer::RxBuffer;
use crate::chip::SignalProfile;
use crate::dma::{BusAddress, DmaOps};
use crate::ieee80211::MacAddress;

/// What happened to the frame in a filled slot.
enum Consumed {
    Delivered,
    Dropped(RxError),
    /// The slot was quarantined; its frame was consumed by an earlier drain.
    Retried,
}

/// The receive ring of one device.
///
/// Created un-initialised by [`Builder::freeze`]; [`RxRing::init`] allocates the ring and hands
/// every slot to the device, [`RxRing::drain`] consumes what the device filled.
pub struct RxRing<D: DmaOps> {
    dma: D,
    table: Option<RxDescriptorTable>,
    cursor: Option<usize>,
    quarantined: bool,

    ring_size: usize,
    buffer_size: usize,
    headroom: usize,
    refill_policy: RefillPolicy,
    budget: Option<usize>,
    debug_rx: bool,
    dump_probe: bool,

    profile: SignalProfile,
    noise_floor: i8,
}

impl<D: DmaOps> RxRing<D> {
    pub(super) fn new(dma: D, config: Builder) -> Self {
        RxRing {
            dma,
            table: None,
            cursor: None,
            quarantined: false,

            ring_size: config.ring_size(),
            buffer_size: config.buffer_size(),
            headroom: config.headroom(),
            refill_policy: config.refill_policy(),
            budget: config.budget(),
            debug_rx: config.has_debug_rx(),
            dump_probe: config.has_probe_dump(),

            profile: config.chip().signal_profile(),
            noise_floor: 0,
        }
    }

    /// Allocate the ring, bind a buffer to every slot and give them all to the device.
    ///
    /// Any failure, mapping included, is reported as [`RxError::OutOfMemory`] after everything
    /// allocated so far has been released. Does nothing on a ring that is already initialised.
    pub fn init(&mut self) -> Result<(), RxError> {
        if self.table.is_some() {
            return Ok(());
        }

        let mut table =
            RxDescriptorTable::allocate(&mut self.dma, self.ring_size, self.buffer_size, self.headroom)?;

        if let Err(e) = table.initialize(&mut self.dma) {
            table.teardown(&mut self.dma);
            return Err(e);
        }

        info!(
            "rx ring ready: {} slots of {} bytes at {}",
            self.ring_size,
            self.buffer_size,
            table.base_address()
        );
        self.table = Some(table);
        self.cursor = Some(0);
        self.quarantined = false;
        Ok(())
    }

    /// Unmap and free every buffer and the ring itself.
    ///
    /// The device must be quiesced and no drain may be scheduled.
    pub fn deinit(&mut self) {
        self.cursor = None;
        self.quarantined = false;
        if let Some(table) = self.table.take() {
            table.teardown(&mut self.dma);
        }
    }

    /// Consume every filled slot from the cursor on, refilling each one and handing it back to
    /// the device.
    ///
    /// Runs with the receive-ready interrupt masked and the drain scheduled in
    /// [`RxHost::schedule`]. Once the ring is empty the interrupt is unmasked and the schedule
    /// cleared; when the budget runs out or a quarantined slot can't be refilled both are left
    /// as they are for the caller to run the drain again.
    pub fn drain<H: RxHost>(&mut self, host: &mut H) -> DrainReport {
        let mut report = DrainReport {
            delivered: 0,
            dropped: 0,
            status: DrainStatus::Idle,
        };

        if self.cursor.is_none() {
            warn!("rx drain without buffers");
            host.unmask_rx_ready();
            host.schedule().complete();
            return report;
        }

        let mut processed = 0;
        loop {
            if self.budget == Some(processed) {
                if self.cursor_ownership() == Some(Ownership::Filled) {
                    report.status = DrainStatus::Pending;
                    return report;
                }
                break;
            }

            let Some((consumed, refilled)) = self.process_slot(host) else {
                break;
            };
            processed += 1;

            match consumed {
                Consumed::Delivered => report.delivered += 1,
                Consumed::Dropped(_) => report.dropped += 1,
                Consumed::Retried => {}
            }

            if refilled.is_err() {
                report.status = DrainStatus::Stalled;
                return report;
            }
        }

        host.unmask_rx_ready();
        host.schedule().complete();
        report
    }

    /// Consume the slot at the cursor, if the device has filled it.
    ///
    /// `Ok` means a frame was delivered. A dropped frame is reported as its error after the slot
    /// has been refilled. Unlike [`RxRing::drain`] this leaves the interrupt and the schedule
    /// alone.
    pub fn receive<H: RxHost>(&mut self, host: &mut H) -> nb::Result<(), RxError> {
        if self.cursor.is_none() {
            return Err(nb::Error::Other(RxError::NoBuffer));
        }

        match self.process_slot(host) {
            None => Err(nb::Error::WouldBlock),
            Some((Consumed::Delivered, _)) => Ok(()),
            Some((Consumed::Dropped(e), _)) => Err(nb::Error::Other(e)),
            Some((Consumed::Retried, Ok(()))) => self.receive(host),
            Some((Consumed::Retried, Err(e))) => Err(nb::Error::Other(e)),
        }
    }

    fn cursor_ownership(&self) -> Option<Ownership> {
        let table = self.table.as_ref()?;
        Some(table.descriptor(self.cursor?).ownership())
    }

    fn process_slot<H: RxHost>(&mut self, host: &mut H) -> Option<(Consumed, Result<(), RxError>)> {
        let index = self.cursor?;
        let table = self.table.as_mut()?;

        if table.descriptor(index).ownership() != Ownership::Filled {
            return None;
        }

        let consumed = if self.quarantined {
            Consumed::Retried
        } else {
            let fields = table.descriptor(index).read();
            let result = match table.take_binding(index) {
                Some(binding) => {
                    let mut buffer = binding.unmap(&mut self.dma);
                    self.accept(&mut buffer, &fields, host.operating_channel())
                        .map(|status| (buffer, status))
                }
                None => Err(RxError::NoBuffer),
            };

            match result {
                Ok((buffer, status)) => {
                    host.deliver(buffer, status);
                    Consumed::Delivered
                }
                Err(e) => {
                    if self.debug_rx {
                        debug!("dropping frame in slot {}: {}", index, e);
                    }
                    Consumed::Dropped(e)
                }
            }
        };

        Some((consumed, self.refill(index)))
    }

    /// Bind a new buffer to slot `index`, hand it back to the device and move on.
    fn refill(&mut self, index: usize) -> Result<(), RxError> {
        let Some(table) = self.table.as_mut() else {
            return Err(RxError::NoBuffer);
        };

        if let Err(e) = table.bind(&mut self.dma, index) {
            warn!("failed to refill rx slot {}: {}", index, e);
            if self.refill_policy == RefillPolicy::Quarantine {
                self.quarantined = true;
                return Err(e);
            }
        }

        self.quarantined = false;
        let descriptor = table.descriptor(index);
        descriptor.modify(|w| w.set_status(STATUS_OK).set_queue_tag(0));
        descriptor.release_to_device();
        self.cursor = Some(table.next(index));
        Ok(())
    }

    /// Check a deposited frame and turn it into what the upper MAC expects.
    fn accept(
        &mut self,
        buffer: &mut RxBuffer,
        fields: &RxDescriptorReader,
        operating_channel: u8,
    ) -> Result<RxStatus, RxError> {
        let length = fields.length() as usize;
        if length > buffer.tailroom() || length < DMA_HEADER_LEN {
            return Err(RxError::LengthMismatch {
                length,
                tailroom: buffer.tailroom(),
            });
        }

        if fields.channel() != operating_channel {
            return Err(RxError::ChannelMismatch {
                expected: operating_channel,
                received: fields.channel(),
            });
        }

        let mut status = decode(fields, &self.profile);
        self.noise_floor = status.noise;

        buffer.put(length);
        let fc = frame::frame_control(buffer.data()).ok_or(RxError::LengthMismatch {
            length,
            tailroom: buffer.tailroom(),
        })?;

        if fc.is_protected() {
            if status.flags.contains(RxFlags::MMIC_ERROR) {
                let tailroom = buffer.tailroom();
                buffer.put(KEY_INDEX_LEN).ok_or(RxError::LengthMismatch {
                    length: length + KEY_INDEX_LEN,
                    tailroom: tailroom + length,
                })?;
                frame::patch_key_index(buffer.data_mut());
            }
            status.flags |= self.profile.crypto_flags;
        }

        frame::strip_dma_header(buffer, fields.queue_tag())?;

        if self.dump_probe && fc.is_probe_req() {
            if let Some(address) = MacAddress::transmitter(buffer.data()) {
                info!("probe request from {}", address);
            }
        }

        Ok(status)
    }

    pub fn is_initialized(&self) -> bool {
        self.table.is_some()
    }

    /// The slot the next drain starts at, `None` before init.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn headroom(&self) -> usize {
        self.headroom
    }

    /// Noise floor of the last accepted frame, in dBm.
    pub fn noise_floor(&self) -> i8 {
        self.noise_floor
    }

    /// Device address of the first descriptor, to program into the device.
    pub fn descriptor_base(&self) -> Option<BusAddress> {
        self.table.as_ref().map(|table| table.base_address())
    }

    /// Read-only view of slot `index`. Only the drain loop hands a slot back to the device:
    ///
    /// ```compile_fail
    /// fn hand_back(descriptor: &mwl_pcie_rx::rx::RxDescriptor) {
    ///     descriptor.release_to_device();
    /// }
    /// ```
    ///
    /// ```compile_fail
    /// fn redirect(descriptor: &mwl_pcie_rx::rx::RxDescriptor) {
    ///     descriptor.modify(|w| w.set_buffer_address(0xdead_beef));
    /// }
    /// ```
    pub fn descriptor(&self, index: usize) -> Option<&RxDescriptor> {
        let table = self.table.as_ref()?;
        (index < table.len()).then(|| table.descriptor(index))
    }

    pub fn ownership(&self, index: usize) -> Option<Ownership> {
        self.descriptor(index).map(RxDescriptor::ownership)
    }

    /// Slot after `index` in ring order.
    pub fn next_slot(&self, index: usize) -> Option<usize> {
        let table = self.table.as_ref()?;
        (index < table.len()).then(|| table.next(index))
    }

    pub fn is_bound(&self, index: usize) -> bool {
        self.table
            .as_ref()
            .map_or(false, |table| index < table.len() && table.is_bound(index))
    }

    /// Slots left without a buffer by a failed refill.
    pub fn unbound_slots(&self) -> usize {
        self.table.as_ref().map_or(0, RxDescriptorTable::unbound_count)
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }
}

impl<D: DmaOps> Drop for RxRing<D> {
    fn drop(&mut self) {
        self.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipFamily;
    use crate::dma::{CoherentBlock, MappingError};
    use core::alloc::Layout;

    /// A platform with no memory at all; enough to name an `RxRing` type.
    struct NoMemory;

    impl DmaOps for NoMemory {
        fn alloc_coherent(&mut self, _layout: Layout) -> Option<CoherentBlock> {
            None
        }

        unsafe fn free_coherent(&mut self, _block: CoherentBlock) {}

        fn map_from_device(&mut self, _cpu: *mut u8, _len: usize) -> Result<BusAddress, MappingError> {
            Err(MappingError)
        }

        fn unmap_from_device(&mut self, _address: BusAddress, _len: usize) {}
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn ring_can_move_to_the_bottom_half() {
        assert_send::<RxRing<NoMemory>>();
        assert_send::<RxDescriptorTable>();
    }

    #[test]
    fn failed_init_leaves_nothing_behind() {
        let mut ring = Builder::new(ChipFamily::Mwl8864).set_ring_size(4).freeze(NoMemory);

        assert_eq!(ring.init(), Err(RxError::OutOfMemory));
        assert!(!ring.is_initialized());
        assert_eq!(ring.descriptor(0).map(RxDescriptor::ownership), None);
    }
}
