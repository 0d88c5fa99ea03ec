// Licensed under the Apache-2.0 license

//! Slave-mode transaction engine.
//!
//! A slave transaction spans one address match up to the matching stop (or
//! TX lockout). The engine turns raw interrupt flags into [`SlaveEvent`]s
//! and hands them, together with FIFO access, to a [`SlaveHandler`]. The
//! blocking variant polls flags in place; the async variant is driven from
//! the instance's interrupt via [`RevaI2c::slave_async_handler`].

use heapless::Vec;

use super::common::{Error, Mode, SlaveAck, SlaveEvent};
use super::interface::RegisterInterface;
use super::regs::{
    Reg, CTRL_READ, INT0_RD_ADDR_MATCH, INT0_RX_THRESH, INT0_SLAVE_ERR, INT0_STOP,
    INT0_TX_LOCKOUT, INT0_TX_THRESH, INT0_WR_ADDR_MATCH, INT1_RX_OVERFLOW, INT1_TX_UNDERFLOW,
};
use super::reva::RevaI2c;
use crate::common::Logger;

/// Application side of a slave transaction.
///
/// The controller is passed back into the handler so it can drain or feed
/// the FIFOs while the event is being serviced. The returned [`SlaveAck`]
/// only matters for [`SlaveEvent::RxThreshold`].
pub trait SlaveHandler<R: RegisterInterface, L: Logger> {
    fn on_event(&mut self, i2c: &mut RevaI2c<'_, R, L>, event: SlaveEvent) -> SlaveAck;
}

impl<'a, R: RegisterInterface, L: Logger> RevaI2c<'a, R, L> {
    fn check_slave(&self) -> Result<(), Error> {
        if !self.enabled || self.mode != Mode::Slave {
            return Err(Error::BadState);
        }
        Ok(())
    }

    /// Service one slave transaction by polling, dispatching events to
    /// `handler` until the master ends it. Returns the transaction outcome
    /// also delivered in [`SlaveEvent::Complete`].
    pub fn slave_transaction<H: SlaveHandler<R, L>>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), Error> {
        self.check_slave()?;
        if self.is_async_busy() {
            return Err(Error::Busy);
        }
        self.txn.slave_active = true;
        self.clear_flags(!0, !0);

        let result = loop {
            if let Err(error) = self.wait(|r| {
                r.read(Reg::IntFl0) != 0 || r.read(Reg::IntFl1) != 0
            }) {
                break Err(error);
            }
            let (flags0, flags1) = self.get_flags();
            if let Some(result) = self.slave_service(handler, flags0, flags1) {
                break result;
            }
        };
        self.txn.slave_active = false;
        result
    }

    /// Arm the instance for one interrupt-driven slave transaction.
    pub fn slave_transaction_async(&mut self) -> Result<(), Error> {
        self.check_slave()?;
        if self.is_async_busy() {
            return Err(Error::Busy);
        }
        self.txn.slave_active = true;
        self.clear_flags(!0, !0);
        self.regs.write(
            Reg::IntEn0,
            self.profile.addr_match | INT0_SLAVE_ERR | INT0_STOP | INT0_TX_LOCKOUT,
        );
        self.regs
            .write(Reg::IntEn1, INT1_RX_OVERFLOW | INT1_TX_UNDERFLOW);
        Ok(())
    }

    /// Advance a pending async slave transaction from interrupt context.
    /// Returns the outcome once the transaction ends, `None` before then or
    /// when none is pending.
    pub fn slave_async_handler<H: SlaveHandler<R, L>>(
        &mut self,
        handler: &mut H,
    ) -> Option<Result<(), Error>> {
        if !self.txn.slave_active {
            return None;
        }
        let (flags0, flags1) = self.get_flags();
        let done = self.slave_service(handler, flags0, flags1);
        if done.is_some() {
            self.txn.slave_active = false;
        }
        done
    }

    /// Process one interrupt-flag snapshot, in event priority order.
    fn slave_service<H: SlaveHandler<R, L>>(
        &mut self,
        handler: &mut H,
        flags0: u32,
        flags1: u32,
    ) -> Option<Result<(), Error>> {
        let addr_bits = self.profile.addr_match;
        if flags0 & addr_bits != 0 {
            let read = self.slave_direction(flags0);
            self.clear_flags(flags0 & addr_bits, 0);
            let event = if read {
                SlaveEvent::ReadAddrMatch
            } else {
                SlaveEvent::WriteAddrMatch
            };
            let _ = handler.on_event(self, event);
            // Narrow the interrupt interest to the active direction.
            let interest = if read {
                INT0_TX_THRESH | INT0_TX_LOCKOUT
            } else {
                INT0_RX_THRESH
            };
            self.regs
                .write(Reg::IntEn0, interest | INT0_SLAVE_ERR | INT0_STOP);
        }

        if flags1 & INT1_RX_OVERFLOW != 0 {
            self.clear_flags(0, INT1_RX_OVERFLOW);
            let _ = handler.on_event(self, SlaveEvent::RxOverflow);
        }
        if flags1 & INT1_TX_UNDERFLOW != 0 {
            self.clear_flags(0, INT1_TX_UNDERFLOW);
            let _ = handler.on_event(self, SlaveEvent::TxUnderflow);
        }

        if flags0 & INT0_RX_THRESH != 0 {
            self.clear_flags(INT0_RX_THRESH, 0);
            let ack = handler.on_event(self, SlaveEvent::RxThreshold);
            self.set_rx_ack(ack == SlaveAck::Ack);
        }
        if flags0 & INT0_TX_THRESH != 0 {
            self.clear_flags(INT0_TX_THRESH, 0);
            let _ = handler.on_event(self, SlaveEvent::TxThreshold);
        }

        if flags0 & (INT0_SLAVE_ERR | INT0_STOP | INT0_TX_LOCKOUT) != 0 {
            let result = if flags0 & INT0_SLAVE_ERR != 0 {
                self.logger.error("i2c: slave transaction fault");
                Err(Error::CommError)
            } else {
                Ok(())
            };
            self.regs.write(Reg::IntEn0, 0);
            self.regs.write(Reg::IntEn1, 0);
            self.clear_flags(!0, !0);
            let _ = self.clear_rx_fifo();
            let _ = self.clear_tx_fifo();
            let _ = handler.on_event(self, SlaveEvent::Complete(result));
            return Some(result);
        }
        None
    }

    /// Direction of the matched address cycle. Targets with directional
    /// match flags report it there; older ones expose it in CTRL.
    fn slave_direction(&mut self, flags0: u32) -> bool {
        if self.profile.addr_match & INT0_RD_ADDR_MATCH != 0 {
            if flags0 & INT0_RD_ADDR_MATCH != 0 {
                return true;
            }
            if flags0 & INT0_WR_ADDR_MATCH != 0 {
                return false;
            }
        }
        self.regs.read(Reg::Ctrl) & CTRL_READ != 0
    }
}

/// Ready-made [`SlaveHandler`] that collects written data into a buffer and
/// answers reads from a preloaded response.
pub struct BufferedSlave {
    received: Vec<u8, 256>,
    response: Vec<u8, 256>,
    sent: usize,
    overflows: u32,
    underflows: u32,
    last_result: Option<Result<(), Error>>,
}

impl Default for BufferedSlave {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedSlave {
    pub fn new() -> Self {
        Self {
            received: Vec::new(),
            response: Vec::new(),
            sent: 0,
            overflows: 0,
            underflows: 0,
            last_result: None,
        }
    }

    /// Preload the data returned to master reads.
    pub fn set_response(&mut self, data: &[u8]) -> Result<(), Error> {
        self.response.clear();
        self.response
            .extend_from_slice(data)
            .map_err(|()| Error::Overflow)
    }

    /// Data written by the master during the last transaction.
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Drain the received data, leaving the buffer empty for the next
    /// transaction.
    pub fn take(&mut self) -> Vec<u8, 256> {
        core::mem::take(&mut self.received)
    }

    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    pub fn underflows(&self) -> u32 {
        self.underflows
    }

    /// Outcome delivered with the most recent [`SlaveEvent::Complete`].
    pub fn last_result(&self) -> Option<Result<(), Error>> {
        self.last_result
    }

    fn refill<R: RegisterInterface, L: Logger>(&mut self, i2c: &mut RevaI2c<'_, R, L>) {
        let pending = self.response.get(self.sent..).unwrap_or(&[]);
        self.sent += i2c.write_tx_fifo(pending);
    }
}

impl<R: RegisterInterface, L: Logger> SlaveHandler<R, L> for BufferedSlave {
    fn on_event(&mut self, i2c: &mut RevaI2c<'_, R, L>, event: SlaveEvent) -> SlaveAck {
        match event {
            SlaveEvent::WriteAddrMatch => {
                self.received.clear();
                SlaveAck::Ack
            }
            SlaveEvent::ReadAddrMatch => {
                self.sent = 0;
                self.refill(i2c);
                SlaveAck::Ack
            }
            SlaveEvent::RxThreshold => {
                let mut chunk = [0u8; 16];
                let count = i2c.read_rx_fifo(&mut chunk);
                let mut accepted = true;
                for &byte in chunk.get(..count).unwrap_or(&[]) {
                    if self.received.push(byte).is_err() {
                        accepted = false;
                    }
                }
                if accepted {
                    SlaveAck::Ack
                } else {
                    SlaveAck::Nack
                }
            }
            SlaveEvent::TxThreshold => {
                self.refill(i2c);
                SlaveAck::Ack
            }
            SlaveEvent::TxUnderflow => {
                self.underflows += 1;
                SlaveAck::Ack
            }
            SlaveEvent::RxOverflow => {
                self.overflows += 1;
                SlaveAck::Ack
            }
            SlaveEvent::Complete(result) => {
                self.last_result = Some(result);
                SlaveAck::Ack
            }
        }
    }
}
