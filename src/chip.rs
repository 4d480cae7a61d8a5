use crate::rx::RxFlags;

/// Offset the older firmware subtracts from the reported signal strength.
pub const W836X_RSSI_OFFSET: u8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipFamily {
    Mwl8864,
    Mwl8897,
    Mwl8964,
    Mwl8997,
}

impl ChipFamily {
    pub fn signal_profile(self) -> SignalProfile {
        match self {
            ChipFamily::Mwl8997 => SignalProfile {
                rssi: RssiEncoding::Signed,
                noise: NoiseEncoding::Signed,
                crypto_flags: RxFlags::DECRYPTED | RxFlags::MMIC_STRIPPED,
            },
            ChipFamily::Mwl8864 | ChipFamily::Mwl8897 | ChipFamily::Mwl8964 => SignalProfile {
                rssi: RssiEncoding::NegatedOffset(W836X_RSSI_OFFSET),
                noise: NoiseEncoding::Negated,
                crypto_flags: RxFlags::IV_STRIPPED | RxFlags::DECRYPTED | RxFlags::MMIC_STRIPPED,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RssiEncoding {
    /// The descriptor byte is already a signed dBm value.
    Signed,
    /// The descriptor byte is a positive attenuation, reported as `-(raw + offset)`.
    NegatedOffset(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NoiseEncoding {
    /// Signed dBm; positive readings are folded to negative.
    Signed,
    /// Positive magnitude, reported negated.
    Negated,
}

/// Per chip-family transforms, picked once at attach time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalProfile {
    pub rssi: RssiEncoding,
    pub noise: NoiseEncoding,
    /// Flags set on every protected frame, since the firmware has already decrypted it.
    pub crypto_flags: RxFlags,
}

impl SignalProfile {
    pub fn signal(&self, raw: u8) -> i8 {
        match self.rssi {
            RssiEncoding::Signed => raw as i8,
            RssiEncoding::NegatedOffset(offset) => raw.wrapping_add(offset).wrapping_neg() as i8,
        }
    }

    pub fn noise_floor(&self, raw: u8) -> i8 {
        match self.noise {
            NoiseEncoding::Signed => {
                let noise = raw as i8;
                if noise > 0 {
                    -noise
                } else {
                    noise
                }
            }
            NoiseEncoding::Negated => raw.wrapping_neg() as i8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mwl8997_reports_signed_values() {
        let profile = ChipFamily::Mwl8997.signal_profile();
        assert_eq!(profile.signal(0xc4), -60);
        assert_eq!(profile.noise_floor(0xa0), -96);
        assert_eq!(profile.noise_floor(90), -90);
        assert!(!profile.crypto_flags.contains(RxFlags::IV_STRIPPED));
    }

    #[test]
    fn older_families_report_offsets() {
        let profile = ChipFamily::Mwl8864.signal_profile();
        assert_eq!(profile.signal(52), -60);
        assert_eq!(profile.noise_floor(92), -92);
        assert!(profile
            .crypto_flags
            .contains(RxFlags::IV_STRIPPED | RxFlags::DECRYPTED | RxFlags::MMIC_STRIPPED));
    }
}
