// Licensed under the Apache-2.0 license

//! System control seam for peripheral clock and pin configuration.
//!
//! The I2C engine never touches clock-gating or pin-mux registers directly;
//! it asks a [`SystemControl`] implementation to do so at init/shutdown time.
//! This keeps the chip-global control block out of the driver and lets tests
//! substitute a mock.

use fugit::HertzU32;

/// Peripheral clock identifiers the I2C driver can ask to gate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralClock {
    I2c0,
    I2c1,
    I2c2,
}

/// Clock and pin configuration services provided by the surrounding system.
pub trait SystemControl {
    /// Implementation-specific error type.
    type Error: core::fmt::Debug;

    /// Ungate the clock feeding the given peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock source is unavailable or the identifier
    /// is not wired on this system.
    fn enable_clock(&mut self, clock: PeripheralClock) -> Result<(), Self::Error>;

    /// Gate the clock feeding the given peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not wired on this system.
    fn disable_clock(&mut self, clock: PeripheralClock) -> Result<(), Self::Error>;

    /// Route and configure the SCL/SDA pins for the given peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin-mux cannot be applied.
    fn configure_pins(&mut self, clock: PeripheralClock) -> Result<(), Self::Error>;

    /// Frequency of the clock feeding the I2C blocks, used for bus timing
    /// calculations.
    fn clock_frequency(&self) -> HertzU32;
}
