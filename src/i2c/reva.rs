// Licensed under the Apache-2.0 license

//! Core controller engine shared by every target variant.
//!
//! [`RevaI2c`] owns one controller instance and exposes the lifecycle, FIFO
//! and bus-level primitives that the master, slave and DMA transaction
//! engines are built from. The engine is generic over the register interface
//! so it drives both memory-mapped hardware and the simulated controller in
//! the test suite.

use embedded_hal::delay::DelayNs;
use fugit::{HertzU32, MicrosDurationU32};

use super::common::{AckStatus, Address, Config, Error, Mode};
use super::dma::DmaChannel;
use super::interface::RegisterInterface;
use super::master::MasterRequest;
use super::regs::{Reg, *};
use super::targets::TargetProfile;
use crate::common::{Logger, NoOpLogger};
use crate::syscon::SystemControl;

/// Inter-step settle time for the bus-recovery bit-bang sequence.
const RECOVER_DELAY_US: u32 = 10;

/// Progress of an interrupt-driven master transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Phase {
    Idle,
    Write,
    Read,
    Stopping,
}

/// Bookkeeping for the at-most-one in-flight async request per instance.
pub(super) struct ActiveTransfer<'a> {
    pub(super) request: Option<MasterRequest<'a>>,
    pub(super) finished: bool,
    pub(super) phase: Phase,
    /// End of the receive segment currently programmed into the hardware.
    pub(super) segment_end: usize,
    pub(super) tx_channel: Option<DmaChannel>,
    pub(super) rx_channel: Option<DmaChannel>,
    pub(super) slave_active: bool,
}

impl ActiveTransfer<'_> {
    pub(super) const fn idle() -> Self {
        Self {
            request: None,
            finished: false,
            phase: Phase::Idle,
            segment_end: 0,
            tx_channel: None,
            rx_channel: None,
            slave_active: false,
        }
    }
}

/// One I2C controller instance.
///
/// The lifetime parameter ties the controller to the buffers of an in-flight
/// asynchronous request; a controller with no pending request can use `'static`.
pub struct RevaI2c<'a, R: RegisterInterface, L: Logger = NoOpLogger> {
    pub(super) regs: R,
    pub(super) profile: TargetProfile,
    pub(super) mode: Mode,
    pub(super) clock_stretching: bool,
    pub(super) handshake_polls: Option<u32>,
    pub(super) source_clock: HertzU32,
    pub(super) frequency: HertzU32,
    pub(super) enabled: bool,
    pub(super) txn: ActiveTransfer<'a>,
    pub(super) logger: L,
}

impl<'a, R: RegisterInterface> RevaI2c<'a, R, NoOpLogger> {
    /// Bring up the peripheral with the default (no-op) logger.
    pub fn init<S: SystemControl>(
        regs: R,
        profile: TargetProfile,
        sys: &mut S,
        config: &Config,
    ) -> Result<Self, Error> {
        Self::init_with_logger(regs, profile, sys, config, NoOpLogger)
    }
}

impl<'a, R: RegisterInterface, L: Logger> RevaI2c<'a, R, L> {
    /// Bring up the peripheral: clock gate, pins, FIFO thresholds, mode and
    /// bus frequency.
    pub fn init_with_logger<S: SystemControl>(
        regs: R,
        profile: TargetProfile,
        sys: &mut S,
        config: &Config,
        logger: L,
    ) -> Result<Self, Error> {
        sys.enable_clock(profile.clock).map_err(|_| Error::NoDevice)?;
        sys.configure_pins(profile.clock)
            .map_err(|_| Error::NoDevice)?;

        let mut i2c = Self {
            regs,
            profile,
            mode: config.mode,
            clock_stretching: config.clock_stretching,
            handshake_polls: config.handshake_polls,
            source_clock: sys.clock_frequency(),
            frequency: config.frequency,
            enabled: true,
            txn: ActiveTransfer::idle(),
            logger,
        };

        i2c.regs.write(Reg::Ctrl, CTRL_EN);
        i2c.clear_rx_fifo()?;
        i2c.clear_tx_fifo()?;
        i2c.set_rx_threshold(config.rx_threshold)?;
        i2c.set_tx_threshold(config.tx_threshold)?;
        i2c.clear_flags(!0, !0);

        match config.mode {
            Mode::Master => i2c.regs.modify(Reg::Ctrl, |v| v | CTRL_MST),
            Mode::Slave => {
                let addr = config.slave_address.ok_or(Error::BadParam)?;
                i2c.set_slave_address(addr)?;
            }
        }
        i2c.set_clock_stretching(config.clock_stretching);
        i2c.set_frequency(config.frequency)?;
        if let Some(timeout) = config.timeout {
            i2c.set_timeout(timeout);
        }
        i2c.logger.debug("i2c: controller initialized");
        Ok(i2c)
    }

    /// Tear the instance down. A pending async request is completed with
    /// [`Error::Shutdown`] before the block loses its clock.
    pub fn shutdown<S: SystemControl>(&mut self, sys: &mut S) -> Result<(), Error> {
        self.cancel_pending(Error::Shutdown);
        self.regs.write(Reg::IntEn0, 0);
        self.regs.write(Reg::IntEn1, 0);
        self.clear_flags(!0, !0);
        let _ = self.clear_rx_fifo();
        let _ = self.clear_tx_fifo();
        self.regs.write(Reg::Ctrl, 0);
        self.enabled = false;
        sys.disable_clock(self.profile.clock)
            .map_err(|_| Error::NoDevice)
    }

    /// Program the bus frequency from the source clock; returns the frequency
    /// actually achieved.
    pub fn set_frequency(&mut self, target: HertzU32) -> Result<HertzU32, Error> {
        if target.raw() == 0 {
            return Err(Error::BadParam);
        }
        let ticks = self.source_clock.raw() / target.raw();
        let hi = (ticks >> 1).saturating_sub(1);
        let lo = (ticks - (ticks >> 1)).saturating_sub(1);
        if hi == 0 || lo == 0 || hi > CLK_FIELD || lo > CLK_FIELD {
            return Err(Error::BadParam);
        }
        self.regs.write(Reg::ClkHi, hi);
        self.regs.write(Reg::ClkLo, lo);
        self.frequency = HertzU32::from_raw(self.source_clock.raw() / ((hi + 1) + (lo + 1)));
        Ok(self.frequency)
    }

    pub fn frequency(&self) -> HertzU32 {
        self.frequency
    }

    /// Program the SCL-low bus timeout; zero duration disables it.
    pub fn set_timeout(&mut self, timeout: MicrosDurationU32) {
        let ticks_per_us = self.source_clock.raw() / 1_000_000;
        let ticks = timeout.ticks().saturating_mul(ticks_per_us.max(1));
        self.regs
            .write(Reg::Timeout, ticks.min(TIMEOUT_FIELD));
    }

    pub fn set_clock_stretching(&mut self, enabled: bool) {
        self.clock_stretching = enabled;
        self.regs.modify(Reg::Ctrl, |v| {
            if enabled {
                v & !CTRL_CLKSTR_DIS
            } else {
                v | CTRL_CLKSTR_DIS
            }
        });
    }

    fn set_slave_address(&mut self, address: Address) -> Result<(), Error> {
        match address {
            Address::SevenBit(a) => {
                if a > 0x7F {
                    return Err(Error::BadParam);
                }
                self.regs.write(Reg::SlaveAddr, u32::from(a));
            }
            Address::TenBit(a) => {
                if !self.profile.extended_addressing {
                    return Err(Error::NotSupported);
                }
                if a > 0x3FF {
                    return Err(Error::BadParam);
                }
                self.regs
                    .write(Reg::SlaveAddr, (u32::from(a) & SLAVEADDR_ADDR) | SLAVEADDR_EXT);
            }
        }
        Ok(())
    }

    /// Raw interrupt flags `(intfl0, intfl1)`.
    pub fn get_flags(&mut self) -> (u32, u32) {
        (self.regs.read(Reg::IntFl0), self.regs.read(Reg::IntFl1))
    }

    /// Write-one-to-clear the given flag bits.
    pub fn clear_flags(&mut self, flags0: u32, flags1: u32) {
        if flags0 != 0 {
            self.regs.write(Reg::IntFl0, flags0);
        }
        if flags1 != 0 {
            self.regs.write(Reg::IntFl1, flags1);
        }
    }

    pub fn enable_interrupts(&mut self, flags0: u32, flags1: u32) {
        self.regs.modify(Reg::IntEn0, |v| v | flags0);
        self.regs.modify(Reg::IntEn1, |v| v | flags1);
    }

    pub fn disable_interrupts(&mut self, flags0: u32, flags1: u32) {
        self.regs.modify(Reg::IntEn0, |v| v & !flags0);
        self.regs.modify(Reg::IntEn1, |v| v & !flags1);
    }

    /// True when no asynchronous request is in flight.
    pub fn ready_for_sleep(&self) -> bool {
        !self.is_async_busy()
    }

    pub(super) fn is_async_busy(&self) -> bool {
        (self.txn.request.is_some() && !self.txn.finished) || self.txn.slave_active
    }

    /// Bounded or unbounded spin on a hardware handshake, per configuration.
    pub(super) fn wait(&mut self, mut done: impl FnMut(&mut R) -> bool) -> Result<(), Error> {
        match self.handshake_polls {
            None => {
                while !done(&mut self.regs) {
                    core::hint::spin_loop();
                }
                Ok(())
            }
            Some(budget) => {
                for _ in 0..budget {
                    if done(&mut self.regs) {
                        return Ok(());
                    }
                    core::hint::spin_loop();
                }
                Err(Error::Timeout)
            }
        }
    }

    // --- FIFO primitives ---

    /// Drain available RX bytes into `buf`; returns the count read.
    pub fn read_rx_fifo(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            if self.regs.read(Reg::Status) & STAT_RX_EMPTY != 0 {
                break;
            }
            *slot = self.regs.read(Reg::Fifo) as u8;
            count += 1;
        }
        count
    }

    /// Load bytes from `buf` until the TX FIFO fills; returns the count written.
    pub fn write_tx_fifo(&mut self, buf: &[u8]) -> usize {
        let mut count = 0;
        for &byte in buf {
            if self.regs.read(Reg::Status) & STAT_TX_FULL != 0 {
                break;
            }
            self.regs.write(Reg::Fifo, u32::from(byte));
            count += 1;
        }
        count
    }

    pub fn rx_fifo_available(&mut self) -> usize {
        ((self.regs.read(Reg::Status) & STAT_RX_LVL) >> STAT_RX_LVL_POS) as usize
    }

    pub(super) fn tx_fifo_level(&mut self) -> usize {
        ((self.regs.read(Reg::Status) & STAT_TX_LVL) >> STAT_TX_LVL_POS) as usize
    }

    pub fn tx_fifo_free(&mut self) -> usize {
        self.tx_fifo_depth().saturating_sub(self.tx_fifo_level())
    }

    pub fn rx_fifo_depth(&mut self) -> usize {
        ((self.regs.read(Reg::FifoLen) & FIFOLEN_RX) >> FIFOLEN_RX_POS) as usize
    }

    pub fn tx_fifo_depth(&mut self) -> usize {
        ((self.regs.read(Reg::FifoLen) & FIFOLEN_TX) >> FIFOLEN_TX_POS) as usize
    }

    /// Flush the RX FIFO and wait for the hardware to acknowledge.
    pub fn clear_rx_fifo(&mut self) -> Result<(), Error> {
        self.regs.modify(Reg::RxCtrl0, |v| v | RXCTRL0_FLUSH);
        self.wait(|r| r.read(Reg::RxCtrl0) & RXCTRL0_FLUSH == 0)
    }

    /// Flush the TX FIFO and wait for the hardware to acknowledge.
    pub fn clear_tx_fifo(&mut self) -> Result<(), Error> {
        self.regs.modify(Reg::TxCtrl0, |v| v | TXCTRL0_FLUSH);
        self.wait(|r| r.read(Reg::TxCtrl0) & TXCTRL0_FLUSH == 0)
    }

    /// Set the RX threshold level; rejected without touching the register if
    /// it exceeds the FIFO depth the hardware reports.
    pub fn set_rx_threshold(&mut self, level: u8) -> Result<(), Error> {
        if usize::from(level) > self.rx_fifo_depth() {
            return Err(Error::BadParam);
        }
        self.regs.modify(Reg::RxCtrl0, |v| {
            (v & !RXCTRL0_THD) | ((u32::from(level) << RXCTRL0_THD_POS) & RXCTRL0_THD)
        });
        Ok(())
    }

    pub fn set_tx_threshold(&mut self, level: u8) -> Result<(), Error> {
        if usize::from(level) > self.tx_fifo_depth() {
            return Err(Error::BadParam);
        }
        self.regs.modify(Reg::TxCtrl0, |v| {
            (v & !TXCTRL0_THD) | ((u32::from(level) << TXCTRL0_THD_POS) & TXCTRL0_THD)
        });
        Ok(())
    }

    // --- Bus primitives ---

    /// Request a start condition; escalates to a restart when a previous
    /// start request is still pending.
    pub fn start(&mut self) {
        if self.regs.read(Reg::MasterCtrl) & MSTCTRL_START != 0 {
            self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_RESTART);
        } else {
            self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_START);
        }
    }

    /// Request a stop condition and wait for the hardware to consume it.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_STOP);
        self.wait(|r| r.read(Reg::MasterCtrl) & MSTCTRL_STOP == 0)
    }

    /// Transmit one byte and report whether the peer acknowledged it.
    ///
    /// Fails with [`Error::Overflow`] if the TX FIFO still holds unsent data.
    pub fn write_byte(&mut self, byte: u8) -> Result<AckStatus, Error> {
        if self.regs.read(Reg::Status) & STAT_TX_EMPTY == 0 {
            return Err(Error::Overflow);
        }
        self.clear_flags(INT0_DATA_ERR, 0);
        self.regs.write(Reg::Fifo, u32::from(byte));
        self.wait(|r| r.read(Reg::Status) & STAT_TX_EMPTY != 0)?;
        if self.regs.read(Reg::IntFl0) & INT0_DATA_ERR != 0 {
            self.clear_flags(INT0_DATA_ERR, 0);
            Ok(AckStatus::Nacked)
        } else {
            Ok(AckStatus::Acked)
        }
    }

    /// Pop one received byte. `ack` programs the acknowledge the controller
    /// sends for the *next* byte, not the one returned.
    pub fn read_byte(&mut self, ack: bool) -> Result<u8, Error> {
        if self.regs.read(Reg::Status) & STAT_RX_EMPTY != 0 {
            return Err(Error::Underflow);
        }
        let byte = self.regs.read(Reg::Fifo) as u8;
        self.set_rx_ack(ack);
        Ok(byte)
    }

    /// Pop one byte and let `decide` choose the acknowledge after inspecting
    /// it. Only usable while clock stretching holds the bus.
    pub fn read_byte_interactive(
        &mut self,
        decide: impl FnOnce(u8) -> bool,
    ) -> Result<u8, Error> {
        if !self.clock_stretching {
            return Err(Error::BadState);
        }
        if self.regs.read(Reg::Status) & STAT_RX_EMPTY != 0 {
            return Err(Error::Underflow);
        }
        let byte = self.regs.read(Reg::Fifo) as u8;
        let ack = decide(byte);
        self.set_rx_ack(ack);
        Ok(byte)
    }

    pub(super) fn set_rx_ack(&mut self, ack: bool) {
        self.regs.modify(Reg::Ctrl, |v| {
            if ack {
                v & !CTRL_ACK
            } else {
                v | CTRL_ACK
            }
        });
    }

    /// Transmit a run of bytes. Per-byte acknowledge results are collapsed:
    /// any NACK yields [`AckStatus::Nacked`].
    pub fn write(&mut self, bytes: &[u8]) -> Result<AckStatus, Error> {
        let mut status = AckStatus::Acked;
        for &byte in bytes {
            if self.write_byte(byte)? == AckStatus::Nacked {
                status = AckStatus::Nacked;
            }
        }
        Ok(status)
    }

    /// Receive `buf.len()` bytes, acknowledging all but the last, whose
    /// acknowledge is taken from `ack_last`.
    pub fn read(&mut self, buf: &mut [u8], ack_last: bool) -> Result<(), Error> {
        let last = buf.len().checked_sub(1);
        for (i, slot) in buf.iter_mut().enumerate() {
            self.wait(|r| r.read(Reg::Status) & STAT_RX_EMPTY == 0)?;
            let ack = if Some(i) == last { ack_last } else { true };
            if self.regs.read(Reg::Status) & STAT_RX_EMPTY != 0 {
                return Err(Error::Underflow);
            }
            *slot = self.regs.read(Reg::Fifo) as u8;
            self.set_rx_ack(ack);
        }
        Ok(())
    }

    /// Bit-bang a stuck bus free: drive and verify each line low then high,
    /// retrying up to `retries` times. The block is left disabled on exit and
    /// must be re-initialized before further transactions.
    pub fn recover<D: DelayNs>(&mut self, delay: &mut D, retries: u32) -> Result<(), Error> {
        let ctrl_orig = self.regs.read(Reg::Ctrl);
        self.regs
            .modify(Reg::Ctrl, |v| v | CTRL_EN | CTRL_BB_MODE | CTRL_SCL_OUT | CTRL_SDA_OUT);

        let mut recovered = false;
        for _ in 0..retries {
            self.regs.modify(Reg::Ctrl, |v| v & !CTRL_SCL_OUT);
            delay.delay_us(RECOVER_DELAY_US);
            if self.regs.read(Reg::Ctrl) & CTRL_SCL != 0 {
                self.release_lines(delay);
                continue;
            }

            self.regs.modify(Reg::Ctrl, |v| v & !CTRL_SDA_OUT);
            delay.delay_us(RECOVER_DELAY_US);
            if self.regs.read(Reg::Ctrl) & CTRL_SDA != 0 {
                self.release_lines(delay);
                continue;
            }

            self.regs.modify(Reg::Ctrl, |v| v | CTRL_SDA_OUT);
            delay.delay_us(RECOVER_DELAY_US);
            if self.regs.read(Reg::Ctrl) & CTRL_SDA == 0 {
                self.release_lines(delay);
                continue;
            }

            self.regs.modify(Reg::Ctrl, |v| v | CTRL_SCL_OUT);
            delay.delay_us(RECOVER_DELAY_US);
            if self.regs.read(Reg::Ctrl) & CTRL_SCL == 0 {
                continue;
            }

            recovered = true;
            break;
        }

        let bb_orig = ctrl_orig & CTRL_BB_MODE;
        self.regs
            .modify(Reg::Ctrl, |v| ((v & !CTRL_BB_MODE) | bb_orig) & !CTRL_EN);
        self.enabled = false;

        if recovered {
            Ok(())
        } else {
            self.logger.error("i2c: bus recovery failed");
            Err(Error::CommError)
        }
    }

    fn release_lines<D: DelayNs>(&mut self, delay: &mut D) {
        self.regs
            .modify(Reg::Ctrl, |v| v | CTRL_SCL_OUT | CTRL_SDA_OUT);
        delay.delay_us(RECOVER_DELAY_US);
    }

    // --- Shared helpers for the transaction engines ---

    pub(super) fn master_error_mask(&self) -> u32 {
        INT0_MASTER_ERR | self.profile.dnr_err
    }

    pub(super) fn check_master(&self) -> Result<(), Error> {
        if !self.enabled || self.mode != Mode::Master {
            return Err(Error::BadState);
        }
        Ok(())
    }

    pub(super) fn validate_address(&self, address: Address) -> Result<(), Error> {
        match address {
            Address::SevenBit(a) if a > 0x7F => Err(Error::BadParam),
            Address::TenBit(_) if !self.profile.extended_addressing => Err(Error::NotSupported),
            Address::TenBit(a) if a > 0x3FF => Err(Error::BadParam),
            _ => Ok(()),
        }
    }

    /// Load the address phase into the TX FIFO and select normal or extended
    /// framing.
    pub(super) fn load_address(&mut self, address: Address, read: bool) {
        match address {
            Address::SevenBit(_) => {
                self.regs.modify(Reg::MasterCtrl, |v| v & !MSTCTRL_EX_ADDR)
            }
            Address::TenBit(_) => self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_EX_ADDR),
        }
        self.regs
            .write(Reg::Fifo, u32::from(address.first_byte(read)));
        if !read {
            if let Some(second) = address.second_byte() {
                self.regs.write(Reg::Fifo, u32::from(second));
            }
        }
    }

    /// Program the receive count for the next read segment. `len` must not
    /// exceed [`MAX_RX_SEGMENT`]; 256 is encoded as zero.
    pub(super) fn set_rx_count(&mut self, len: usize) {
        debug_assert!(len >= 1 && len <= MAX_RX_SEGMENT);
        self.regs.write(Reg::RxCtrl1, (len as u32) & RXCTRL1_CNT);
    }
}
