use crate::buffer::RxBuffer;
use crate::dma::MappingError;
use crate::irq::RxSchedule;
use crate::volatile_read_write::VolatileReadWrite;
use core::fmt;

mod builder;
pub use builder::Builder;

mod descriptor;
pub(crate) use descriptor::RxDescriptorWriter;
pub use descriptor::{
    Ownership, RxDescriptor, RxDescriptorReader, OWNERSHIP_AVAILABLE, OWNERSHIP_FILLED,
    RX_DESC_SIZE, STATUS_OK,
};

mod descriptor_table;

pub mod frame;

mod receiver;
pub use receiver::RxRing;

mod status;
pub use status::{decode, is_mmic_error, Bandwidth, Encoding, RateInfo, RxFlags, RxStatus};

pub const DEFAULT_RING_SIZE: usize = 256;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_HEADROOM: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    /// Ring memory, a slot handle table or a receive buffer could not be allocated.
    OutOfMemory,
    /// A receive buffer could not be mapped for the device.
    MappingError,
    /// The reported frame length doesn't fit the buffer it was written to.
    LengthMismatch { length: usize, tailroom: usize },
    /// The frame arrived on a channel other than the one currently configured.
    ChannelMismatch { expected: u8, received: u8 },
    /// The slot had no buffer bound when the device handed it back.
    NoBuffer,
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RxError::OutOfMemory => f.write_str("out of memory"),
            RxError::MappingError => f.write_str("failed to map receive buffer"),
            RxError::LengthMismatch { length, tailroom } => {
                write!(f, "frame length {} exceeds buffer tailroom {}", length, tailroom)
            }
            RxError::ChannelMismatch { expected, received } => write!(
                f,
                "frame received on channel {} while operating on channel {}",
                received, expected
            ),
            RxError::NoBuffer => f.write_str("no buffer bound to slot"),
        }
    }
}

impl From<MappingError> for RxError {
    fn from(_: MappingError) -> Self {
        RxError::MappingError
    }
}

/// The parts of the surrounding driver the receive path talks to.
pub trait RxHost {
    /// Channel the radio is currently tuned to.
    fn operating_channel(&self) -> u8;

    /// Hand a received frame to the upper MAC. The frame's data window starts at its 802.11
    /// header.
    fn deliver(&mut self, frame: RxBuffer, status: RxStatus);

    /// Re-enable the receive-ready interrupt source.
    fn unmask_rx_ready(&mut self);

    /// Flag shared with the interrupt handler that schedules the drain.
    fn schedule(&self) -> &RxSchedule;
}

/// What the drain loop does with a slot whose refill failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefillPolicy {
    /// Return the slot to the device without a buffer and retry the bind the next time the
    /// device hands it back.
    #[default]
    Release,
    /// Keep the slot and stop draining at it until a later drain manages to refill it.
    Quarantine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrainStatus {
    /// No filled slot left; the interrupt is unmasked and the schedule flag cleared.
    Idle,
    /// The budget ran out with filled slots remaining. The interrupt stays masked and the drain
    /// stays scheduled.
    Pending,
    /// A quarantined slot could not be refilled. The drain stays scheduled.
    Stalled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainReport {
    pub delivered: usize,
    pub dropped: usize,
    pub status: DrainStatus,
}
