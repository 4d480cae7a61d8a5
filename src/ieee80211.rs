//! The slice of 802.11 the receive path needs: enough of the frame control field to size and
//! rebuild a MAC header, and the channel numbering plan.

use core::fmt;

pub const FCTL_FTYPE: u16 = 0x000c;
pub const FCTL_STYPE: u16 = 0x00f0;
pub const FCTL_TODS: u16 = 0x0100;
pub const FCTL_FROMDS: u16 = 0x0200;
pub const FCTL_PROTECTED: u16 = 0x4000;
pub const FCTL_ORDER: u16 = 0x8000;

pub const FTYPE_MGMT: u16 = 0x0000;
pub const FTYPE_CTL: u16 = 0x0004;
pub const FTYPE_DATA: u16 = 0x0008;

pub const STYPE_PROBE_REQ: u16 = 0x0040;
pub const STYPE_QOS_DATA: u16 = 0x0080;

pub const QOS_CTL_LEN: usize = 2;
pub const HT_CTL_LEN: usize = 4;

/// Highest channel number in the 2.4 GHz band.
pub const BAND_24_CHANNEL_NUM: u8 = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Band {
    Band2GHz,
    Band5GHz,
}

impl Band {
    pub fn from_channel(channel: u8) -> Self {
        if channel > BAND_24_CHANNEL_NUM {
            Band::Band5GHz
        } else {
            Band::Band2GHz
        }
    }
}

/// Centre frequency in MHz, or 0 for a channel that doesn't exist in `band`.
pub fn channel_to_frequency(channel: u8, band: Band) -> u16 {
    if channel == 0 {
        return 0;
    }

    let channel = channel as u16;
    match band {
        Band::Band2GHz if channel == 14 => 2484,
        Band::Band2GHz if channel < 14 => 2407 + channel * 5,
        Band::Band2GHz => 0,
        Band::Band5GHz if channel >= 182 => 4000 + channel * 5,
        Band::Band5GHz => 5000 + channel * 5,
    }
}

/// Offset of the transmitter address in a MAC header.
pub const ADDR2_OFFSET: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// The transmitter address of the MAC header at the start of `header`.
    pub fn transmitter(header: &[u8]) -> Option<Self> {
        let bytes = header.get(ADDR2_OFFSET..ADDR2_OFFSET + 6)?;
        let mut address = [0u8; 6];
        address.copy_from_slice(bytes);
        Some(MacAddress(address))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacAddress {
    fn format(&self, f: defmt::Formatter) {
        let a = self.0;
        defmt::write!(
            f,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            a[0],
            a[1],
            a[2],
            a[3],
            a[4],
            a[5]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameControl(pub u16);

impl FrameControl {
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        FrameControl(u16::from_le_bytes(bytes))
    }

    pub fn is_mgmt(&self) -> bool {
        self.0 & FCTL_FTYPE == FTYPE_MGMT
    }

    pub fn is_ctl(&self) -> bool {
        self.0 & FCTL_FTYPE == FTYPE_CTL
    }

    pub fn is_data(&self) -> bool {
        self.0 & FCTL_FTYPE == FTYPE_DATA
    }

    pub fn is_data_qos(&self) -> bool {
        self.0 & (FCTL_FTYPE | STYPE_QOS_DATA) == FTYPE_DATA | STYPE_QOS_DATA
    }

    pub fn is_probe_req(&self) -> bool {
        self.0 & (FCTL_FTYPE | FCTL_STYPE) == FTYPE_MGMT | STYPE_PROBE_REQ
    }

    pub fn has_a4(&self) -> bool {
        self.0 & (FCTL_TODS | FCTL_FROMDS) == FCTL_TODS | FCTL_FROMDS
    }

    pub fn has_order(&self) -> bool {
        self.0 & FCTL_ORDER != 0
    }

    pub fn is_protected(&self) -> bool {
        self.0 & FCTL_PROTECTED != 0
    }

    /// Length of the MAC header this frame control describes.
    pub fn header_len(&self) -> usize {
        if self.is_data() {
            let mut len = if self.has_a4() { 30 } else { 24 };
            if self.is_data_qos() {
                len += QOS_CTL_LEN;
                if self.has_order() {
                    len += HT_CTL_LEN;
                }
            }
            len
        } else if self.is_mgmt() {
            if self.has_order() {
                24 + HT_CTL_LEN
            } else {
                24
            }
        } else if self.is_ctl() {
            // CTS and ACK carry a single address.
            if self.0 & 0x00e0 == 0x00c0 {
                10
            } else {
                16
            }
        } else {
            24
        }
    }
}
