//! Translation of a filled descriptor into receive metadata.

use super::RxDescriptorReader;
use crate::chip::SignalProfile;
use crate::ieee80211::{channel_to_frequency, Band};
use bitflags::bitflags;

pub const DECRYPT_ERR_MASK: u8 = 0x80;
pub const GENERAL_DECRYPT_ERR: u8 = 0xff;
pub const TKIP_DECRYPT_MIC_ERR: u8 = 0x02;
pub const WEP_DECRYPT_ICV_ERR: u8 = 0x04;
pub const TKIP_DECRYPT_ICV_ERR: u8 = 0x08;

pub const RATE_FORMAT_MASK: u16 = 0x0007;
pub const RATE_NSS_MASK: u16 = 0x0018;
pub const RATE_NSS_SHIFT: u16 = 3;
pub const RATE_BW_MASK: u16 = 0x0060;
pub const RATE_BW_SHIFT: u16 = 5;
pub const RATE_GI_MASK: u16 = 0x0080;
pub const RATE_GI_SHIFT: u16 = 7;
pub const RATE_RT_MASK: u16 = 0xff00;
pub const RATE_RT_SHIFT: u16 = 8;

const RATE_FORMAT_11A: u16 = 0;
const RATE_FORMAT_11B: u16 = 1;
const RATE_FORMAT_11N: u16 = 2;
const RATE_FORMAT_11AC: u16 = 4;

/// Legacy rate table sizes; the firmware's legacy index counts the CCK rates first.
const BAND_24_RATE_NUM: u8 = 13;
const BAND_50_RATE_NUM: u8 = 8;
const CCK_RATE_NUM: u8 = 5;

bitflags! {
    /// Receive flags handed to the upper MAC with every frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RxFlags: u32 {
        /// Michael MIC check failed on a TKIP frame.
        const MMIC_ERROR = 1 << 0;
        /// The firmware already decrypted the frame.
        const DECRYPTED = 1 << 1;
        /// The Michael MIC has been removed from the payload.
        const MMIC_STRIPPED = 1 << 2;
        /// The IV/key-id has been removed from the payload.
        const IV_STRIPPED = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Encoding {
    #[default]
    Legacy,
    Ht,
    Vht,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    #[default]
    Mhz20,
    Mhz40,
    Mhz80,
    Mhz160,
}

impl Bandwidth {
    fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Bandwidth::Mhz40,
            2 => Bandwidth::Mhz80,
            3 => Bandwidth::Mhz160,
            _ => Bandwidth::Mhz20,
        }
    }
}

/// The `rate_info` bitfield split into its parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateInfo {
    pub format: u8,
    pub nss: u8,
    pub bandwidth: u8,
    pub short_gi: bool,
    pub rate: u8,
}

impl RateInfo {
    pub fn from_raw(raw: u16) -> Self {
        RateInfo {
            format: (raw & RATE_FORMAT_MASK) as u8,
            nss: ((raw & RATE_NSS_MASK) >> RATE_NSS_SHIFT) as u8,
            bandwidth: ((raw & RATE_BW_MASK) >> RATE_BW_SHIFT) as u8,
            short_gi: (raw & RATE_GI_MASK) >> RATE_GI_SHIFT != 0,
            rate: ((raw & RATE_RT_MASK) >> RATE_RT_SHIFT) as u8,
        }
    }
}

/// Metadata for one received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RxStatus {
    pub signal: i8,
    pub noise: i8,
    pub band: Band,
    /// Centre frequency in MHz.
    pub freq: u16,
    pub encoding: Encoding,
    pub bandwidth: Bandwidth,
    pub short_gi: bool,
    /// Spatial streams, reported for VHT only.
    pub nss: Option<u8>,
    pub rate_idx: u8,
    pub flags: RxFlags,
    /// Opaque queue tag (the QoS control field) as the device reported it.
    pub queue_tag: u16,
}

/// Whether a descriptor status reports a TKIP Michael MIC failure.
///
/// `0xff` is a catch-all the older firmware uses for any decrypt failure and never names a MIC
/// error on its own. Otherwise, with the error bit set, a MIC bit without either ICV bit is a
/// MIC failure.
pub fn is_mmic_error(status: u8) -> bool {
    if status == GENERAL_DECRYPT_ERR || status & DECRYPT_ERR_MASK == 0 {
        return false;
    }

    (status & !DECRYPT_ERR_MASK) & TKIP_DECRYPT_MIC_ERR != 0
        && status & (WEP_DECRYPT_ICV_ERR | TKIP_DECRYPT_ICV_ERR) == 0
}

/// Build receive metadata from a filled descriptor.
pub fn decode(descriptor: &RxDescriptorReader, profile: &SignalProfile) -> RxStatus {
    let rate = RateInfo::from_raw(descriptor.rate_info());
    let band = Band::from_channel(descriptor.channel());

    let mut encoding = Encoding::Legacy;
    let mut bandwidth = Bandwidth::Mhz20;
    let mut short_gi = false;
    let mut nss = None;

    match rate.format as u16 {
        RATE_FORMAT_11N => {
            encoding = Encoding::Ht;
            // HT only signals 20 or 40 MHz.
            if Bandwidth::from_raw(rate.bandwidth as u16) == Bandwidth::Mhz40 {
                bandwidth = Bandwidth::Mhz40;
            }
            short_gi = rate.short_gi;
        }
        RATE_FORMAT_11AC => {
            encoding = Encoding::Vht;
            bandwidth = Bandwidth::from_raw(rate.bandwidth as u16);
            short_gi = rate.short_gi;
            nss = Some(rate.nss + 1);
        }
        RATE_FORMAT_11A | RATE_FORMAT_11B => {}
        _ => {}
    }

    let mut rate_idx = rate.rate;
    if encoding == Encoding::Legacy {
        rate_idx = match band {
            // A CCK index on 5 GHz wraps and lands on the top OFDM rate.
            Band::Band5GHz => rate_idx.wrapping_sub(CCK_RATE_NUM).min(BAND_50_RATE_NUM - 1),
            Band::Band2GHz => rate_idx.min(BAND_24_RATE_NUM - 1),
        };
    }

    let mut flags = RxFlags::empty();
    if is_mmic_error(descriptor.status()) {
        flags |= RxFlags::MMIC_ERROR;
    }

    RxStatus {
        signal: profile.signal(descriptor.signal_strength()),
        noise: profile.noise_floor(descriptor.noise_floor()),
        band,
        freq: channel_to_frequency(descriptor.channel(), band),
        encoding,
        bandwidth,
        short_gi,
        nss,
        rate_idx,
        flags,
        queue_tag: descriptor.queue_tag(),
    }
}
