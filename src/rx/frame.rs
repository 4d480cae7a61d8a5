//! The firmware's receive framing.
//!
//! Every frame the device deposits starts with a 2-byte firmware length followed by the 802.11
//! header in its four-address form; the body follows at a fixed offset:
//!
//! ```text
//! | fwlen (2) | fc dur addr1 addr2 addr3 seq addr4 (30) | body ...
//! 0           2                                         32
//! ```
//!
//! QoS control is not part of that header; the device reports it in the descriptor instead.

use super::RxError;
use crate::buffer::RxBuffer;
use crate::ieee80211::FrameControl;

/// Length of the firmware header in front of the body.
pub const DMA_HEADER_LEN: usize = 32;
/// Length of the four-address 802.11 header inside the firmware header.
pub const DMA_WH_LEN: usize = 30;
/// Offset of the 802.11 header inside the firmware header.
pub const DMA_WH_OFFSET: usize = 2;
/// Length of the key-id/IV field re-created after a MIC failure.
pub const KEY_INDEX_LEN: usize = 4;

/// Frame control of a deposited frame, or `None` if it is too short to carry one.
pub fn frame_control(frame: &[u8]) -> Option<FrameControl> {
    let bytes = frame.get(DMA_WH_OFFSET..DMA_WH_OFFSET + 2)?;
    Some(FrameControl::from_le_bytes([bytes[0], bytes[1]]))
}

/// Zero the key-id field right after the firmware header.
///
/// After a MIC failure the firmware drops the payload and sends only its header; the upper MAC
/// needs a key index of 0 in the frame to start TKIP countermeasures.
pub fn patch_key_index(frame: &mut [u8]) {
    if let Some(key_index) = frame.get_mut(DMA_HEADER_LEN..DMA_HEADER_LEN + KEY_INDEX_LEN) {
        key_index.fill(0);
    }
}

/// Replace the firmware header with the frame's real 802.11 header.
///
/// The header is rebuilt in place directly in front of the body, with `qos_ctrl` inserted for QoS
/// data frames, and the data window is moved to start at it. Headers longer than the firmware
/// header grow into the buffer's headroom.
pub fn strip_dma_header(buffer: &mut RxBuffer, qos_ctrl: u16) -> Result<(), RxError> {
    let length = buffer.len();
    if length < DMA_HEADER_LEN {
        return Err(RxError::LengthMismatch {
            length,
            tailroom: buffer.tailroom(),
        });
    }

    let fc = frame_control(buffer.data()).ok_or(RxError::LengthMismatch {
        length,
        tailroom: buffer.tailroom(),
    })?;
    let hdrlen = fc.header_len();
    let qos = fc.is_data_qos();

    let grow = hdrlen.saturating_sub(DMA_HEADER_LEN);
    let data = buffer.push(grow).ok_or(RxError::LengthMismatch {
        length,
        tailroom: 0,
    })?;

    // Everything below is relative to the (possibly grown) window; the firmware header now
    // starts at `grow`.
    let src = grow + DMA_WH_OFFSET;
    let dst = grow + DMA_HEADER_LEN - hdrlen;
    let copied = if qos { hdrlen - 2 } else { hdrlen }.min(DMA_WH_LEN);
    data.copy_within(src..src + copied, dst);

    if qos {
        let end = dst + hdrlen;
        data[dst + copied..end - 2].fill(0);
        data[end - 2..end].copy_from_slice(&qos_ctrl.to_le_bytes());
    }

    buffer.pull(dst);
    Ok(())
}
