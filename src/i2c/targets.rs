// Licensed under the Apache-2.0 license

//! Target-specific wiring for the shared controller engine.
//!
//! The engine itself is revision-agnostic; each supported chip contributes a
//! [`TargetProfile`] naming the interrupt-flag bits that differ between
//! silicon revisions, plus the base addresses of its instances.

use super::interface::MmioInterface;
use super::regs::{INT0_ADDR_MATCH, INT0_DNR_ERR, INT0_RD_ADDR_MATCH, INT0_WR_ADDR_MATCH};
use crate::syscon::PeripheralClock;

/// Constants the generic engine needs from a concrete chip.
#[derive(Copy, Clone, Debug)]
pub struct TargetProfile {
    /// Flag bits that signal an address match in slave mode.
    pub addr_match: u32,
    /// Flag bit for the master do-not-respond fault on this revision.
    pub dnr_err: u32,
    /// Whether 10-bit addressing is wired up on this revision.
    pub extended_addressing: bool,
    /// Clock gate for this instance.
    pub clock: PeripheralClock,
}

/// A chip with one or more controller instances.
pub trait Target {
    const INSTANCES: usize;

    /// Profile for instance `index`, or `None` past `INSTANCES`.
    fn profile(index: usize) -> Option<TargetProfile>;
}

const fn instance_clock(index: usize) -> PeripheralClock {
    match index {
        0 => PeripheralClock::I2c0,
        1 => PeripheralClock::I2c1,
        _ => PeripheralClock::I2c2,
    }
}

/// MAX32660: two instances, single address-match flag, no 10-bit support.
pub struct Max32660;

impl Target for Max32660 {
    const INSTANCES: usize = 2;

    fn profile(index: usize) -> Option<TargetProfile> {
        if index >= Self::INSTANCES {
            return None;
        }
        Some(TargetProfile {
            addr_match: INT0_ADDR_MATCH,
            dnr_err: INT0_DNR_ERR,
            extended_addressing: false,
            clock: instance_clock(index),
        })
    }
}

/// MAX32670: three instances, directional address-match flags, 10-bit capable.
pub struct Max32670;

impl Target for Max32670 {
    const INSTANCES: usize = 3;

    fn profile(index: usize) -> Option<TargetProfile> {
        if index >= Self::INSTANCES {
            return None;
        }
        Some(TargetProfile {
            addr_match: INT0_ADDR_MATCH | INT0_RD_ADDR_MATCH | INT0_WR_ADDR_MATCH,
            dnr_err: INT0_DNR_ERR,
            extended_addressing: true,
            clock: instance_clock(index),
        })
    }
}

macro_rules! mmio_instances {
    ($($name:ident => $base:literal),+ $(,)?) => {
        paste::paste! {
            $(
                #[doc = "Register interface for the `" [<$name:upper>] "` block."]
                ///
                /// # Safety
                ///
                /// Callers must ensure exclusive access to the block; see
                /// [`MmioInterface::new`].
                pub unsafe fn [<$name _regs>]() -> MmioInterface {
                    MmioInterface::new($base)
                }
            )+
        }
    };
}

mmio_instances! {
    max32660_i2c0 => 0x4001_D000,
    max32660_i2c1 => 0x4001_E000,
    max32670_i2c0 => 0x4001_D000,
    max32670_i2c1 => 0x4001_E000,
    max32670_i2c2 => 0x4001_F000,
}
