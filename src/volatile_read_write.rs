use core::cell::UnsafeCell;

/// Access to memory the device may read or write behind the compiler's back.
pub trait VolatileReadWrite<T> {
    fn read_volatile(&self) -> T;
    fn write_volatile(&self, new_value: T);
}

impl<T: Copy> VolatileReadWrite<T> for UnsafeCell<T> {
    fn read_volatile(&self) -> T {
        unsafe { core::ptr::read_volatile(self.get()) }
    }

    fn write_volatile(&self, new_value: T) {
        unsafe {
            core::ptr::write_volatile(self.get(), new_value);
        }
    }
}
