#![allow(dead_code)]

use mwl_pcie_rx::rx::OWNERSHIP_FILLED;
use mwl_pcie_rx::{BusAddress, CoherentBlock, DmaOps, MappingError, RxBuffer, RxHost, RxSchedule, RxStatus};
use std::alloc::Layout;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Coherent requests above this are handed a block that is never backed by memory.
const FAKE_COHERENT_THRESHOLD: usize = 1 << 32;

struct CoherentRegion {
    cpu: *mut u8,
    layout: Layout,
    fake: bool,
}

#[derive(Default)]
pub struct SimState {
    next_bus: u32,
    coherent: HashMap<u32, CoherentRegion>,
    mappings: HashMap<u32, (*mut u8, usize)>,

    pub fail_coherent: bool,
    /// Buffer allocations left before `alloc_buffer` starts failing.
    pub buffer_budget: Option<usize>,
    /// Mappings left before `map_from_device` starts failing.
    pub map_budget: Option<usize>,

    pub maps: usize,
    pub unmaps: usize,
}

impl SimState {
    fn next_bus(&mut self, len: usize) -> u32 {
        let bus = 0x1000_0000u32.wrapping_add(self.next_bus);
        self.next_bus = self.next_bus.wrapping_add(((len as u32) + 63) & !63);
        bus
    }

    pub fn live_mappings(&self) -> usize {
        self.mappings.len()
    }

    pub fn live_coherent(&self) -> usize {
        self.coherent.len()
    }

    pub fn mapping(&self, bus: BusAddress) -> Option<(*mut u8, usize)> {
        self.mappings.get(&bus.as_u32()).copied()
    }

    fn coherent_ptr(&self, bus: BusAddress) -> *mut u8 {
        let bus = bus.as_u32();
        for (&base, region) in &self.coherent {
            if bus >= base && ((bus - base) as usize) < region.layout.size() {
                assert!(!region.fake, "device touched an unbacked coherent block");
                return unsafe { region.cpu.add((bus - base) as usize) };
            }
        }
        panic!("bus address {:#x} is not coherent memory", bus);
    }
}

/// A platform whose "device addresses" are handed out from a counter and translated back
/// through tables, so the device only reaches memory the driver mapped.
#[derive(Clone, Default)]
pub struct SimDma(pub Rc<RefCell<SimState>>);

impl SimDma {
    pub fn new() -> Self {
        SimDma::default()
    }

    pub fn state(&self) -> std::cell::RefMut<'_, SimState> {
        self.0.borrow_mut()
    }
}

impl DmaOps for SimDma {
    fn alloc_coherent(&mut self, layout: Layout) -> Option<CoherentBlock> {
        let mut state = self.0.borrow_mut();
        if state.fail_coherent {
            return None;
        }

        let fake = layout.size() > FAKE_COHERENT_THRESHOLD;
        let cpu = if fake {
            NonNull::<u32>::dangling().cast::<u8>()
        } else {
            NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })?
        };

        let bus = if fake { 0x8000_0000 } else { state.next_bus(layout.size()) };
        state.coherent.insert(
            bus,
            CoherentRegion {
                cpu: cpu.as_ptr(),
                layout,
                fake,
            },
        );
        Some(unsafe { CoherentBlock::new(cpu, BusAddress::new(bus), layout) })
    }

    unsafe fn free_coherent(&mut self, block: CoherentBlock) {
        let region = self
            .0
            .borrow_mut()
            .coherent
            .remove(&block.bus_address().as_u32())
            .expect("freeing coherent memory that was never allocated");
        assert_eq!(region.cpu, block.cpu_ptr());
        assert_eq!(region.layout, block.layout());
        if !region.fake {
            std::alloc::dealloc(region.cpu, region.layout);
        }
    }

    fn alloc_buffer(&mut self, capacity: usize) -> Option<RxBuffer> {
        let mut state = self.0.borrow_mut();
        if let Some(budget) = state.buffer_budget.as_mut() {
            if *budget == 0 {
                return None;
            }
            *budget -= 1;
        }
        RxBuffer::try_with_capacity(capacity)
    }

    fn map_from_device(&mut self, cpu: *mut u8, len: usize) -> Result<BusAddress, MappingError> {
        let mut state = self.0.borrow_mut();
        if let Some(budget) = state.map_budget.as_mut() {
            if *budget == 0 {
                return Err(MappingError);
            }
            *budget -= 1;
        }

        let bus = state.next_bus(len);
        state.mappings.insert(bus, (cpu, len));
        state.maps += 1;
        Ok(BusAddress::new(bus))
    }

    fn unmap_from_device(&mut self, address: BusAddress, len: usize) {
        let mut state = self.0.borrow_mut();
        let (_, mapped) = state
            .mappings
            .remove(&address.as_u32())
            .expect("unmapping an address that was never mapped");
        assert_eq!(mapped, len, "unmap length differs from map length");
        state.unmaps += 1;
    }
}

/// One frame as the firmware deposits it.
#[derive(Clone, Debug)]
pub struct Deposit {
    /// Firmware header plus body.
    pub bytes: Vec<u8>,
    pub status: u8,
    pub queue_tag: u16,
    pub channel: u8,
    pub signal_strength: u8,
    pub rate_info: u16,
    pub noise_floor: u8,
    /// Length to report instead of `bytes.len()`.
    pub length: Option<u16>,
}

impl Deposit {
    pub fn new(fc: u16, body: &[u8], channel: u8) -> Self {
        Deposit {
            bytes: firmware_frame(fc, body),
            status: mwl_pcie_rx::rx::STATUS_OK,
            queue_tag: 0,
            channel,
            signal_strength: 0,
            rate_info: 0,
            noise_floor: 0,
            length: None,
        }
    }
}

pub const DMA_HEADER_LEN: usize = 32;

/// A firmware-framed frame: length prefix, four-address header and `body`. Address bytes are
/// filled with their offset in the header so tests can check where they end up.
pub fn firmware_frame(fc: u16, body: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; DMA_HEADER_LEN];
    frame[0..2].copy_from_slice(&((DMA_HEADER_LEN + body.len()) as u16).to_le_bytes());
    frame[2..4].copy_from_slice(&fc.to_le_bytes());
    for (i, byte) in frame.iter_mut().enumerate().skip(4) {
        *byte = (i - 2) as u8;
    }
    frame.extend_from_slice(body);
    frame
}

/// The device end of the ring. Follows the `next_address` chain from the ring base the way
/// the adapter does.
pub struct SimDevice {
    dma: SimDma,
    next: BusAddress,
}

impl SimDevice {
    pub fn attach(dma: &SimDma, base: BusAddress) -> Self {
        SimDevice {
            dma: dma.clone(),
            next: base,
        }
    }

    pub fn next_descriptor(&self) -> BusAddress {
        self.next
    }

    /// Write `deposit` into the next slot and hand it to the driver. Returns `false` if the
    /// slot still belongs to the driver.
    pub fn deposit(&mut self, deposit: &Deposit) -> bool {
        let state = self.dma.0.borrow();
        let descriptor = state.coherent_ptr(self.next);
        let ownership = unsafe { &*(descriptor as *const AtomicU8) };
        if ownership.load(Ordering::Acquire) == OWNERSHIP_FILLED {
            return false;
        }

        let buffer = BusAddress(read_u32(descriptor, 10));
        let next = BusAddress(read_u32(descriptor, 14));

        // A slot released without a buffer still carries a stale address the device writes
        // into; with nothing mapped there the payload is lost.
        if let Some((cpu, len)) = state.mapping(buffer) {
            let n = deposit.bytes.len().min(len);
            unsafe { std::ptr::copy_nonoverlapping(deposit.bytes.as_ptr(), cpu, n) };
        }

        let length = deposit.length.unwrap_or(deposit.bytes.len() as u16);
        unsafe {
            write(descriptor, 1, &[deposit.status]);
            write(descriptor, 2, &deposit.queue_tag.to_le_bytes());
            write(descriptor, 4, &[deposit.channel, deposit.signal_strength]);
            write(descriptor, 6, &deposit.rate_info.to_le_bytes());
            write(descriptor, 8, &length.to_le_bytes());
            write(descriptor, 18, &[deposit.noise_floor]);
        }
        ownership.store(OWNERSHIP_FILLED, Ordering::Release);

        self.next = next;
        true
    }
}

fn read_u32(descriptor: *mut u8, offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = unsafe { std::ptr::read_volatile(descriptor.add(offset + i)) };
    }
    u32::from_le_bytes(bytes)
}

unsafe fn write(descriptor: *mut u8, offset: usize, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
        std::ptr::write_volatile(descriptor.add(offset + i), *byte);
    }
}

/// The upper MAC and interrupt controller as far as the ring can tell.
pub struct TestHost {
    pub channel: u8,
    pub frames: Vec<(RxBuffer, RxStatus)>,
    pub unmasked: usize,
    pub schedule: RxSchedule,
}

impl TestHost {
    pub fn new(channel: u8) -> Self {
        TestHost {
            channel,
            frames: Vec::new(),
            unmasked: 0,
            schedule: RxSchedule::new(),
        }
    }

    /// What the interrupt handler does before the bottom half runs.
    pub fn interrupt(&self) -> bool {
        self.schedule.try_schedule()
    }
}

impl RxHost for TestHost {
    fn operating_channel(&self) -> u8 {
        self.channel
    }

    fn deliver(&mut self, frame: RxBuffer, status: RxStatus) {
        self.frames.push((frame, status));
    }

    fn unmask_rx_ready(&mut self) {
        self.unmasked += 1;
    }

    fn schedule(&self) -> &RxSchedule {
        &self.schedule
    }
}
