// Licensed under the Apache-2.0 license

//! Register access seam.
//!
//! The driver core is generic over [`RegisterInterface`] so the same engine
//! runs against memory-mapped hardware and against the simulated controller
//! used by the test suite.

use super::regs::Reg;

/// Word-level access to one controller instance's register file.
pub trait RegisterInterface {
    fn read(&mut self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);

    fn modify<F: FnOnce(u32) -> u32>(&mut self, reg: Reg, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

/// Direct memory-mapped access to a controller instance.
pub struct MmioInterface {
    base: *mut u32,
}

// The interface is a plain base pointer; moving it across threads is fine,
// concurrent use of the same instance is not, and &self grants no access.
unsafe impl Send for MmioInterface {}

impl MmioInterface {
    /// # Safety
    ///
    /// `base` must be the base address of an I2C controller register block,
    /// and no other code may access that block while this interface exists.
    pub unsafe fn new(base: usize) -> Self {
        Self {
            base: base as *mut u32,
        }
    }

    fn ptr(&self, reg: Reg) -> *mut u32 {
        // Offsets are word-aligned constants within the register block.
        self.base.wrapping_add(reg.offset() / 4)
    }
}

impl RegisterInterface for MmioInterface {
    fn read(&mut self, reg: Reg) -> u32 {
        unsafe { core::ptr::read_volatile(self.ptr(reg)) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        unsafe { core::ptr::write_volatile(self.ptr(reg), value) }
    }
}
