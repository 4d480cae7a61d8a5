//! Receive path for Marvell 88W8864/8897/8964/8997 PCIe wireless adapters
//!
//! The device fills a ring of receive descriptors in coherent memory, each pointing at a
//! buffer mapped for device writes, and hands every filled slot back through a one-byte
//! ownership flag. This crate owns that ring: it allocates and wires it up, drains filled slots
//! from the bottom half of the receive interrupt, refills each slot with a fresh buffer and turns
//! what the firmware deposited into an 802.11 frame plus receive metadata for the upper MAC.
//!
//! The platform supplies DMA memory and mappings through [`DmaOps`]; the rest of the driver is
//! reached through [`RxHost`].
//!
//! # Usage
//!
//! ```ignore
//! let mut ring = Builder::new(ChipFamily::Mwl8864)
//!     .set_ring_size(256)
//!     .freeze(platform_dma);
//! ring.init()?;
//! program_rx_ring_base(ring.descriptor_base());
//!
//! // receive-ready interrupt
//! mask_rx_ready();
//! if host.schedule().try_schedule() {
//!     spawn_bottom_half();
//! }
//!
//! // bottom half
//! ring.drain(&mut host);
//! ```
//!
//! # Logging
//!
//! Logs go to the [`log`] facade by default. Build with `default-features = false` and the
//! `defmt` feature to log through `defmt` instead.
//!
//! [`log`]: https://docs.rs/log

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// This must go first so the logging macros are visible to every module below.
mod fmt;

pub mod buffer;
pub mod chip;
pub mod dma;
pub mod ieee80211;
pub mod irq;
pub mod rx;
mod volatile_read_write;

pub use buffer::RxBuffer;
pub use chip::{ChipFamily, SignalProfile};
pub use dma::{BusAddress, CoherentBlock, DmaOps, MappingError};
pub use irq::RxSchedule;
pub use rx::{Builder, DrainReport, DrainStatus, RefillPolicy, RxError, RxHost, RxRing, RxStatus};
