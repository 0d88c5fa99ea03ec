// Licensed under the Apache-2.0 license

//! Common types and constants for the I2C driver modules.
//!
//! This module provides shared definitions for error handling, addressing,
//! transaction results, and controller configuration used across the I2C
//! driver implementation.

use fugit::{HertzU32, MicrosDurationU32};

/// Shared error enumeration for every fallible I2C operation.
///
/// A NACK on the wire is deliberately *not* an error: it is reported through
/// [`AckStatus`] in the `Ok` arm so callers that care can check for it
/// explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A parameter is outside the range the hardware supports.
    BadParam,
    /// The controller is not in the mode the operation requires, or has been
    /// shut down.
    BadState,
    /// The TX FIFO still holds unsent data.
    Overflow,
    /// The RX FIFO is empty.
    Underflow,
    /// An async/DMA request is already active on this instance.
    Busy,
    /// The operation is not supported by this target variant.
    NotSupported,
    /// The peripheral could not be brought up.
    NoDevice,
    /// A bus-level fault was flagged by the controller.
    CommError,
    /// The pending request was cancelled by `abort_async`.
    Abort,
    /// The pending request was cancelled by `shutdown`.
    Shutdown,
    /// A bounded hardware handshake exhausted its poll budget.
    Timeout,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match *self {
            Error::CommError => embedded_hal::i2c::ErrorKind::Bus,
            Error::Overflow | Error::Underflow => embedded_hal::i2c::ErrorKind::Overrun,
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

/// Protocol-level outcome of a completed transfer.
///
/// `Nacked` means at least one transmitted byte went unacknowledged. The
/// per-byte information is collapsed; callers that need to know *which* byte
/// failed must probe byte-by-byte with `write_byte`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckStatus {
    /// Every transmitted byte was acknowledged.
    Acked,
    /// At least one transmitted byte was not acknowledged.
    Nacked,
}

/// Target address for a master transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    /// Standard 7-bit address.
    SevenBit(u8),
    /// 10-bit address; requires a target with extended addressing.
    TenBit(u16),
}

impl Address {
    /// First byte of the address phase with the R/W bit in the LSB.
    pub(crate) fn first_byte(self, read: bool) -> u8 {
        let rw = u8::from(read);
        match self {
            Address::SevenBit(a) => (a << 1) | rw,
            // 11110xx extended-address marker carrying the two high bits.
            Address::TenBit(a) => 0xF0 | (((a >> 8) as u8 & 0x3) << 1) | rw,
        }
    }

    /// Second address byte for 10-bit write framing.
    pub(crate) fn second_byte(self) -> Option<u8> {
        match self {
            Address::SevenBit(_) => None,
            Address::TenBit(a) => Some(a as u8),
        }
    }
}

/// Operating mode of a controller instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Master,
    Slave,
}

/// Events delivered to a slave transaction handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveEvent {
    /// A master addressed us with the write direction bit.
    WriteAddrMatch,
    /// A master addressed us with the read direction bit.
    ReadAddrMatch,
    /// RX FIFO crossed its threshold; the handler's return value decides the
    /// ACK/NACK of the byte about to be received.
    RxThreshold,
    /// TX FIFO dropped below its threshold and wants more data.
    TxThreshold,
    /// The transaction finished: stop detected, TX lockout, or bus fault.
    Complete(Result<(), Error>),
    /// The master read past the data we supplied.
    TxUnderflow,
    /// Received data was dropped because the RX FIFO was full.
    RxOverflow,
}

/// Handler verdict. Load-bearing only for [`SlaveEvent::RxThreshold`];
/// ignored for every other event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveAck {
    #[default]
    Ack,
    Nack,
}

/// Controller configuration.
pub struct Config {
    pub frequency: HertzU32,
    pub mode: Mode,
    pub slave_address: Option<Address>,
    pub clock_stretching: bool,
    pub rx_threshold: u8,
    pub tx_threshold: u8,
    pub timeout: Option<MicrosDurationU32>,
    /// Poll budget for hardware handshakes (stop/flush spins). `None`
    /// reproduces the unbounded busy-wait of the hardware handshake loops;
    /// `Some(n)` bounds each spin to `n` polls and fails with
    /// [`Error::Timeout`].
    pub handshake_polls: Option<u32>,
}

pub struct ConfigBuilder {
    frequency: HertzU32,
    mode: Mode,
    slave_address: Option<Address>,
    clock_stretching: bool,
    rx_threshold: u8,
    tx_threshold: u8,
    timeout: Option<MicrosDurationU32>,
    handshake_polls: Option<u32>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frequency: HertzU32::kHz(100),
            mode: Mode::Master,
            slave_address: None,
            clock_stretching: true,
            rx_threshold: 2,
            tx_threshold: 2,
            timeout: None,
            handshake_polls: None,
        }
    }

    #[must_use]
    pub fn frequency(mut self, frequency: HertzU32) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn slave_address(mut self, address: Address) -> Self {
        self.slave_address = Some(address);
        self
    }

    #[must_use]
    pub fn clock_stretching(mut self, enabled: bool) -> Self {
        self.clock_stretching = enabled;
        self
    }

    #[must_use]
    pub fn rx_threshold(mut self, level: u8) -> Self {
        self.rx_threshold = level;
        self
    }

    #[must_use]
    pub fn tx_threshold(mut self, level: u8) -> Self {
        self.tx_threshold = level;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn handshake_polls(mut self, polls: u32) -> Self {
        self.handshake_polls = Some(polls);
        self
    }

    #[must_use]
    pub fn build(self) -> Config {
        Config {
            frequency: self.frequency,
            mode: self.mode,
            slave_address: self.slave_address,
            clock_stretching: self.clock_stretching,
            rx_threshold: self.rx_threshold,
            tx_threshold: self.tx_threshold,
            timeout: self.timeout,
            handshake_polls: self.handshake_polls,
        }
    }
}
