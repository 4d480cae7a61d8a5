use super::frame::DMA_HEADER_LEN;
use super::{RefillPolicy, RxRing, DEFAULT_BUFFER_SIZE, DEFAULT_HEADROOM, DEFAULT_RING_SIZE};
use crate::chip::ChipFamily;
use crate::dma::DmaOps;

/// Smallest headroom the frame path accepts; a rebuilt header may be four bytes longer than
/// the firmware header it replaces.
pub const MIN_HEADROOM: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct Builder {
    chip: ChipFamily,
    ring_size: usize,
    buffer_size: usize,
    headroom: usize,
    refill_policy: RefillPolicy,
    budget: Option<usize>,
    debug_rx: bool,
    dump_probe: bool,
}

impl Builder {
    pub fn new(chip: ChipFamily) -> Self {
        Builder {
            chip,
            ring_size: DEFAULT_RING_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            headroom: DEFAULT_HEADROOM,
            refill_policy: RefillPolicy::default(),
            budget: None,
            debug_rx: false,
            dump_probe: false,
        }
    }

    pub fn chip(&self) -> ChipFamily {
        self.chip
    }

    pub fn set_ring_size(mut self, ring_size: usize) -> Self {
        if ring_size == 0 {
            panic!("Attempted to create an empty receive ring");
        }

        self.ring_size = ring_size;
        self
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// Bytes the device may write into each receive buffer, advertised in the descriptor length
    /// field (16 bits wide). The headroom is allocated on top of this.
    pub fn set_buffer_size(mut self, buffer_size: usize) -> Self {
        if buffer_size > u16::MAX as usize {
            panic!("Receive buffer size doesn't fit the descriptor length field");
        }
        if buffer_size < DMA_HEADER_LEN {
            panic!("Receive buffer leaves no room for the firmware header");
        }

        self.buffer_size = buffer_size;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Bytes reserved in front of each buffer's device-visible area. Each buffer is allocated as
    /// `buffer_size + headroom` bytes.
    pub fn set_headroom(mut self, headroom: usize) -> Self {
        if headroom < MIN_HEADROOM {
            panic!("Receive headroom is too small to rebuild frame headers");
        }

        self.headroom = headroom;
        self
    }

    pub fn headroom(&self) -> usize {
        self.headroom
    }

    pub fn set_refill_policy(mut self, refill_policy: RefillPolicy) -> Self {
        self.refill_policy = refill_policy;
        self
    }

    pub fn refill_policy(&self) -> RefillPolicy {
        self.refill_policy
    }

    /// Stop each drain after `slots` slots.
    pub fn set_budget(mut self, slots: usize) -> Self {
        if slots == 0 {
            panic!("Attempted to set an empty drain budget");
        }

        self.budget = Some(slots);
        self
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    /// Log every dropped frame.
    pub fn enable_debug_rx(mut self) -> Self {
        self.debug_rx = true;
        self
    }

    pub fn has_debug_rx(&self) -> bool {
        self.debug_rx
    }

    /// Log the transmitter of every probe request received.
    pub fn enable_probe_dump(mut self) -> Self {
        self.dump_probe = true;
        self
    }

    pub fn has_probe_dump(&self) -> bool {
        self.dump_probe
    }

    pub fn freeze<D: DmaOps>(self, dma: D) -> RxRing<D> {
        RxRing::new(dma, self)
    }
}
