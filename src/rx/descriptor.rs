use super::VolatileReadWrite;
use crate::dma::BusAddress;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};
use paste::paste;

/// Ownership byte value: the slot is armed and the device may fill it.
pub const OWNERSHIP_AVAILABLE: u8 = 0x00;
/// Ownership byte value: the device has deposited a frame and handed the slot back.
pub const OWNERSHIP_FILLED: u8 = 0x80;

/// Per-frame status value meaning "no error".
pub const STATUS_OK: u8 = 0x01;

/// Size of one descriptor as laid out in coherent memory.
pub const RX_DESC_SIZE: usize = 20;

/// Which side of the interconnect a slot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ownership {
    /// Armed with a buffer; only the device may move it on, to `Filled`.
    Available,
    /// Holds a frame; only software may move it on, to `Available`.
    Filled,
}

impl Ownership {
    pub fn from_raw(raw: u8) -> Self {
        if raw == OWNERSHIP_FILLED {
            Ownership::Filled
        } else {
            Ownership::Available
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Ownership::Available => OWNERSHIP_AVAILABLE,
            Ownership::Filled => OWNERSHIP_FILLED,
        }
    }
}

macro_rules! define_descriptor {
    (
        $($field:ident: $ty:ty),* $(,)?
    ) => {
        paste! {
            /// A receive descriptor as the device sees it.
            ///
            /// Every field is little-endian and byte aligned, so the layout carries no implicit
            /// padding. The ownership byte is the only field either side writes without owning
            /// the slot; everything else is read or written only by the current owner.
            #[repr(C, align(4))]
            pub struct RxDescriptor {
                ownership: AtomicU8,
                $($field: UnsafeCell<[u8; core::mem::size_of::<$ty>()]>,)*
                #[allow(dead_code)]
                reserved: UnsafeCell<[u8; 1]>,
            }

            /// Snapshot of a descriptor's per-frame fields.
            #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
            pub struct RxDescriptorReader {
                $($field: $ty,)*
            }

            impl RxDescriptorReader {
                $(
                    pub fn $field(&self) -> $ty {
                        self.$field
                    }
                )*
            }

            pub(crate) struct RxDescriptorWriter(RxDescriptorReader);
            impl RxDescriptorWriter {
                $(
                    #[allow(dead_code)]
                    pub(crate) fn [<set_ $field>](mut self, value: $ty) -> Self {
                        self.0.$field = value;
                        self
                    }
                )*
            }

            impl RxDescriptor {
                pub fn read(&self) -> RxDescriptorReader {
                    RxDescriptorReader {
                        $($field: <$ty>::from_le_bytes(self.$field.read_volatile()),)*
                    }
                }

                pub(crate) fn modify<F: FnOnce(RxDescriptorWriter) -> RxDescriptorWriter>(&self, f: F) {
                    let w = f(RxDescriptorWriter(self.read()));
                    $(self.$field.write_volatile(w.0.$field.to_le_bytes());)*
                }
            }
        }
    };
}

define_descriptor! {
    status: u8,
    queue_tag: u16,
    channel: u8,
    signal_strength: u8,
    rate_info: u16,
    length: u16,
    buffer_address: u32,
    next_address: u32,
    noise_floor: u8,
}

impl RxDescriptor {
    /// Observe the ownership byte. Acquire ordering makes every field the device wrote before
    /// handing the slot over visible to the reads that follow.
    pub fn ownership(&self) -> Ownership {
        Ownership::from_raw(self.ownership.load(Ordering::Acquire))
    }

    /// Hand a filled slot back to the device. Release ordering publishes the new buffer address
    /// and reset fields before the device can observe the slot as available.
    pub(crate) fn release_to_device(&self) {
        self.ownership.store(OWNERSHIP_AVAILABLE, Ordering::Release);
    }

    /// Point the slot at a freshly mapped buffer of `length` bytes and clear the per-frame
    /// fields. Ownership is left alone.
    pub(crate) fn rebind(&self, buffer: BusAddress, length: u16) {
        self.modify(|w| {
            w.set_status(STATUS_OK)
                .set_queue_tag(0)
                .set_channel(0)
                .set_signal_strength(0)
                .set_length(length)
                .set_buffer_address(buffer.as_u32())
        });
    }

    pub(crate) fn link(&self, next: BusAddress) {
        self.modify(|w| w.set_next_address(next.as_u32()));
    }

    pub fn buffer_address(&self) -> BusAddress {
        BusAddress(self.read().buffer_address())
    }

    pub fn next_address(&self) -> BusAddress {
        BusAddress(self.read().next_address())
    }
}

const _: () = assert!(core::mem::size_of::<RxDescriptor>() == RX_DESC_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> RxDescriptor {
        unsafe { core::mem::zeroed() }
    }

    fn raw_bytes(descriptor: &RxDescriptor) -> [u8; RX_DESC_SIZE] {
        unsafe { core::ptr::read_volatile(descriptor as *const RxDescriptor as *const [u8; RX_DESC_SIZE]) }
    }

    #[test]
    fn fields_are_little_endian_at_fixed_offsets() {
        let descriptor = zeroed();
        descriptor.modify(|w| {
            w.set_status(0x11)
                .set_queue_tag(0x2233)
                .set_channel(0x44)
                .set_signal_strength(0x55)
                .set_rate_info(0x6677)
                .set_length(0x8899)
                .set_buffer_address(0xaabb_ccdd)
                .set_next_address(0x0102_0304)
                .set_noise_floor(0x05)
        });

        assert_eq!(
            raw_bytes(&descriptor),
            [
                0x00, 0x11, 0x33, 0x22, 0x44, 0x55, 0x77, 0x66, 0x99, 0x88, 0xdd, 0xcc, 0xbb, 0xaa,
                0x04, 0x03, 0x02, 0x01, 0x05, 0x00,
            ]
        );
    }

    #[test]
    fn modify_keeps_untouched_fields() {
        let descriptor = zeroed();
        descriptor.modify(|w| w.set_length(4096).set_channel(6));
        descriptor.modify(|w| w.set_status(STATUS_OK));

        let r = descriptor.read();
        assert_eq!(r.length(), 4096);
        assert_eq!(r.channel(), 6);
        assert_eq!(r.status(), STATUS_OK);
    }

    #[test]
    fn rebind_resets_frame_fields_but_not_ownership() {
        let descriptor = zeroed();
        descriptor.modify(|w| w.set_status(0x82).set_queue_tag(7).set_channel(11).set_signal_strength(40));
        descriptor.ownership.store(OWNERSHIP_FILLED, Ordering::Release);
        descriptor.link(BusAddress(0x2000));

        descriptor.rebind(BusAddress(0x1000), 4096);

        let r = descriptor.read();
        assert_eq!(descriptor.ownership(), Ownership::Filled);
        descriptor.release_to_device();
        assert_eq!(descriptor.ownership(), Ownership::Available);
        assert_eq!(r.status(), STATUS_OK);
        assert_eq!(r.queue_tag(), 0);
        assert_eq!(r.channel(), 0);
        assert_eq!(r.signal_strength(), 0);
        assert_eq!(r.length(), 4096);
        assert_eq!(descriptor.buffer_address(), BusAddress(0x1000));
        assert_eq!(descriptor.next_address(), BusAddress(0x2000));
    }

    #[test]
    fn only_the_filled_value_means_filled() {
        assert_eq!(Ownership::from_raw(OWNERSHIP_FILLED), Ownership::Filled);
        assert_eq!(Ownership::from_raw(OWNERSHIP_AVAILABLE), Ownership::Available);
        assert_eq!(Ownership::from_raw(0x01), Ownership::Available);
    }
}
