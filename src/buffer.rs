//! Receive buffers
//!
//! An [`RxBuffer`] is a fixed-capacity heap allocation with a movable data window, laid out as
//! `headroom | data | tailroom`. The device writes into the tailroom; header processing may grow
//! the window back into the headroom.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use embedded_dma::WriteBuffer;

pub struct RxBuffer {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RxBuffer {
    /// Allocate a zeroed buffer, returning `None` if the allocator is exhausted.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).ok()?;
        storage.resize(capacity, 0);

        Some(RxBuffer {
            storage: storage.into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn headroom(&self) -> usize {
        self.head
    }

    pub fn tailroom(&self) -> usize {
        self.capacity() - self.head - self.len
    }

    pub fn data(&self) -> &[u8] {
        &self.storage[self.head..self.head + self.len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.head..self.head + self.len]
    }

    /// Move the start of an empty buffer forward by `headroom` bytes.
    ///
    /// # Panics
    /// Panics if the buffer already holds data or is smaller than `headroom`.
    pub fn reserve(&mut self, headroom: usize) {
        assert!(self.len == 0, "Attempted to reserve headroom in a non-empty buffer");
        assert!(headroom <= self.tailroom(), "Reserved headroom exceeds buffer capacity");
        self.head += headroom;
    }

    /// Extend the data window by `n` bytes at the tail and return the added bytes.
    pub fn put(&mut self, n: usize) -> Option<&mut [u8]> {
        if n > self.tailroom() {
            return None;
        }
        let start = self.head + self.len;
        self.len += n;
        Some(&mut self.storage[start..start + n])
    }

    /// Drop `n` bytes from the front of the data window and return what remains.
    pub fn pull(&mut self, n: usize) -> Option<&mut [u8]> {
        if n > self.len {
            return None;
        }
        self.head += n;
        self.len -= n;
        Some(self.data_mut())
    }

    /// Grow the data window by `n` bytes into the headroom and return the whole window.
    pub fn push(&mut self, n: usize) -> Option<&mut [u8]> {
        if n > self.head {
            return None;
        }
        self.head -= n;
        self.len += n;
        Some(self.data_mut())
    }
}

impl fmt::Debug for RxBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxBuffer")
            .field("capacity", &self.capacity())
            .field("headroom", &self.head)
            .field("len", &self.len)
            .finish()
    }
}

// The tailroom lives in a boxed slice, so its address is stable however the `RxBuffer` itself
// is moved while the device owns the mapping.
unsafe impl WriteBuffer for RxBuffer {
    type Word = u8;

    unsafe fn write_buffer(&mut self) -> (*mut u8, usize) {
        let start = self.head + self.len;
        let tailroom = self.tailroom();
        (self.storage[start..].as_mut_ptr(), tailroom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_moves_window_into_the_buffer() {
        let mut buffer = RxBuffer::try_with_capacity(128).unwrap();
        buffer.reserve(64);

        assert_eq!(buffer.headroom(), 64);
        assert_eq!(buffer.tailroom(), 64);
        assert!(buffer.is_empty());
    }

    #[test]
    fn put_fails_past_the_tailroom() {
        let mut buffer = RxBuffer::try_with_capacity(128).unwrap();
        buffer.reserve(64);

        assert!(buffer.put(65).is_none());
        assert_eq!(buffer.put(64).map(|added| added.len()), Some(64));
        assert_eq!(buffer.tailroom(), 0);
    }

    #[test]
    fn push_and_pull_move_the_front() {
        let mut buffer = RxBuffer::try_with_capacity(32).unwrap();
        buffer.reserve(8);
        buffer.put(4).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(buffer.pull(1).unwrap(), &[2, 3, 4]);
        assert_eq!(buffer.push(3).unwrap().len(), 6);
        assert_eq!(buffer.headroom(), 6);
        assert!(buffer.push(7).is_none());
        assert!(buffer.pull(7).is_none());
    }

    #[test]
    fn device_writes_land_at_the_tail() {
        let mut buffer = RxBuffer::try_with_capacity(16).unwrap();
        buffer.reserve(4);

        let (ptr, len) = unsafe { buffer.write_buffer() };
        assert_eq!(len, 12);
        unsafe { ptr.write(0xaa) };

        assert_eq!(buffer.put(1).unwrap(), &[0xaa]);
    }
}
