// Licensed under the Apache-2.0 license

//! Master-mode transaction engines.
//!
//! Three entry points share one shape: a [`MasterRequest`] with an optional
//! write buffer, an optional read buffer, a repeated-start flag and a
//! completion callback. `master_transaction` runs the request to completion
//! by polling, `master_transaction_async` drives it from the instance's
//! interrupt handler, and the DMA variant in [`super::dma`] offloads the data
//! phases to DMA channels.

use embedded_hal::i2c::Operation;

use super::common::{AckStatus, Address, Error};
use super::interface::RegisterInterface;
use super::regs::{
    Reg, INT0_DONE, INT0_RX_THRESH, INT0_STOP, INT0_TX_THRESH, MAX_RX_SEGMENT, MSTCTRL_RESTART,
    MSTCTRL_STOP, STAT_TX_EMPTY,
};
use super::reva::{ActiveTransfer, Phase, RevaI2c};
use crate::common::Logger;

/// Completion callback for asynchronous and DMA transactions. Invoked exactly
/// once per request, from the interrupt/event context that finished it.
pub type TransferCallback = fn(&mut MasterRequest<'_>, Result<AckStatus, Error>);

/// One master transaction: write `tx`, then read into `rx`, in that order.
/// Either buffer may be empty; both empty still runs an address cycle.
pub struct MasterRequest<'a> {
    pub address: Address,
    pub tx: &'a [u8],
    pub rx: &'a mut [u8],
    /// Hold the bus with a repeated start instead of a stop on completion.
    pub restart: bool,
    pub callback: Option<TransferCallback>,
    /// Bytes that reached the wire before completion or fault.
    pub tx_sent: usize,
    /// Bytes received before completion or fault.
    pub rx_received: usize,
}

impl<'a> MasterRequest<'a> {
    pub fn new(address: Address, tx: &'a [u8], rx: &'a mut [u8]) -> Self {
        Self {
            address,
            tx,
            rx,
            restart: false,
            callback: None,
            tx_sent: 0,
            rx_received: 0,
        }
    }

    #[must_use]
    pub fn with_restart(mut self) -> Self {
        self.restart = true;
        self
    }

    #[must_use]
    pub fn with_callback(mut self, callback: TransferCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl<'a, R: RegisterInterface, L: Logger> RevaI2c<'a, R, L> {
    /// Run one master transaction to completion by polling.
    ///
    /// On a bus fault the transaction is ended with a stop, the request's
    /// progress counters reflect the bytes actually transferred, and
    /// [`Error::CommError`] is returned. A NACK anywhere in the transaction
    /// surfaces through the same path.
    pub fn master_transaction(
        &mut self,
        request: &mut MasterRequest<'_>,
    ) -> Result<AckStatus, Error> {
        self.check_master()?;
        self.validate_address(request.address)?;
        if self.is_async_busy() {
            return Err(Error::Busy);
        }
        request.tx_sent = 0;
        request.rx_received = 0;

        self.disable_interrupts(!0, !0);
        self.clear_flags(!0, !0);
        self.clear_rx_fifo()?;
        self.clear_tx_fifo()?;

        let err_mask = self.master_error_mask();
        let has_write = !request.tx.is_empty();
        let has_read = !request.rx.is_empty();

        // Address cycle in the write direction unless this is a pure read.
        if has_write || !has_read {
            self.start();
            self.load_address(request.address, false);
        }

        while request.tx_sent < request.tx.len() {
            self.wait(|r| r.read(Reg::IntFl0) & (err_mask | INT0_TX_THRESH) != 0)?;
            if self.regs.read(Reg::IntFl0) & err_mask != 0 {
                return self.fail_master(request);
            }
            self.clear_flags(INT0_TX_THRESH, 0);
            let pending = request.tx.get(request.tx_sent..).unwrap_or(&[]);
            request.tx_sent += self.write_tx_fifo(pending);
        }
        if has_write || !has_read {
            self.wait(|r| {
                r.read(Reg::Status) & STAT_TX_EMPTY != 0 || r.read(Reg::IntFl0) & err_mask != 0
            })?;
            if self.regs.read(Reg::IntFl0) & err_mask != 0 {
                return self.fail_master(request);
            }
        }

        // Read in hardware-sized segments, re-addressing between them.
        while request.rx_received < request.rx.len() {
            let remaining = request.rx.len() - request.rx_received;
            let segment = remaining.min(MAX_RX_SEGMENT);
            let segment_end = request.rx_received + segment;
            self.set_rx_count(segment);
            self.start();
            self.load_address(request.address, true);
            loop {
                self.wait(|r| {
                    r.read(Reg::IntFl0) & (err_mask | INT0_RX_THRESH | INT0_DONE) != 0
                })?;
                let flags = self.regs.read(Reg::IntFl0);
                if flags & err_mask != 0 {
                    return self.fail_master(request);
                }
                let window = request
                    .rx
                    .get_mut(request.rx_received..segment_end)
                    .unwrap_or(&mut []);
                request.rx_received += self.read_rx_fifo(window);
                self.clear_flags(INT0_RX_THRESH, 0);
                if flags & INT0_DONE != 0 && request.rx_received >= segment_end {
                    self.clear_flags(INT0_DONE, 0);
                    break;
                }
            }
        }

        if request.restart {
            self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_RESTART);
            self.wait(|r| r.read(Reg::IntFl0) & INT0_DONE != 0)?;
            self.clear_flags(INT0_DONE, 0);
        } else {
            self.stop()?;
            let end = INT0_STOP | INT0_DONE;
            self.wait(|r| r.read(Reg::IntFl0) & end == end)?;
            self.clear_flags(end, 0);
        }

        if self.regs.read(Reg::IntFl0) & err_mask != 0 {
            return self.fail_master(request);
        }
        Ok(AckStatus::Acked)
    }

    fn fail_master(&mut self, request: &mut MasterRequest<'_>) -> Result<AckStatus, Error> {
        let _ = self.stop();
        // Bytes still sitting in the FIFO never reached the wire.
        let residue = self.tx_fifo_level();
        request.tx_sent = request.tx_sent.saturating_sub(residue);
        self.clear_flags(!0, !0);
        self.logger.error("i2c: master transaction fault");
        Err(Error::CommError)
    }

    /// Start an interrupt-driven master transaction.
    ///
    /// The request is parked in the instance; [`Self::async_handler`] must be
    /// called from the instance's interrupt until the completion callback
    /// fires, after which the request can be reclaimed with
    /// [`Self::take_request`]. At most one request may be in flight per
    /// instance.
    pub fn master_transaction_async(&mut self, mut request: MasterRequest<'a>) -> Result<(), Error> {
        if self.is_async_busy() {
            return Err(Error::Busy);
        }
        self.check_master()?;
        self.validate_address(request.address)?;
        request.tx_sent = 0;
        request.rx_received = 0;
        self.txn = ActiveTransfer::idle();

        self.clear_flags(!0, !0);
        self.clear_rx_fifo()?;
        self.clear_tx_fifo()?;

        let err_mask = self.master_error_mask();
        if !request.tx.is_empty() || request.rx.is_empty() {
            self.start();
            self.load_address(request.address, false);
            self.txn.phase = Phase::Write;
            self.enable_interrupts(err_mask | INT0_TX_THRESH | INT0_DONE | INT0_STOP, 0);
        } else {
            let segment = request.rx.len().min(MAX_RX_SEGMENT);
            self.set_rx_count(segment);
            self.txn.segment_end = segment;
            self.start();
            self.load_address(request.address, true);
            self.txn.phase = Phase::Read;
            self.enable_interrupts(err_mask | INT0_RX_THRESH | INT0_DONE | INT0_STOP, 0);
        }
        self.txn.request = Some(request);
        Ok(())
    }

    /// Advance the in-flight async transaction. Call from the instance's
    /// interrupt handler; a no-op when nothing is pending.
    pub fn async_handler(&mut self) {
        let flags = self.regs.read(Reg::IntFl0);
        let Some(mut request) = self.txn.request.take() else {
            return;
        };
        if self.txn.finished {
            self.txn.request = Some(request);
            return;
        }

        let err_mask = self.master_error_mask();
        if flags & err_mask != 0 {
            let _ = self.stop();
            let residue = self.tx_fifo_level();
            request.tx_sent = request.tx_sent.saturating_sub(residue);
            self.clear_flags(!0, !0);
            self.logger.error("i2c: async master fault");
            self.finish_master(request, Err(Error::CommError));
            return;
        }

        match self.txn.phase {
            Phase::Write => {
                if request.tx_sent < request.tx.len() && flags & INT0_TX_THRESH != 0 {
                    self.clear_flags(INT0_TX_THRESH, 0);
                    let pending = request.tx.get(request.tx_sent..).unwrap_or(&[]);
                    request.tx_sent += self.write_tx_fifo(pending);
                }
                if request.tx_sent >= request.tx.len()
                    && self.regs.read(Reg::Status) & STAT_TX_EMPTY != 0
                {
                    if request.rx.is_empty() {
                        self.begin_termination(request.restart);
                    } else {
                        self.arm_read_segment(&request);
                    }
                }
                self.txn.request = Some(request);
            }
            Phase::Read => {
                if flags & (INT0_RX_THRESH | INT0_DONE) != 0 {
                    let window = request
                        .rx
                        .get_mut(request.rx_received..self.txn.segment_end)
                        .unwrap_or(&mut []);
                    request.rx_received += self.read_rx_fifo(window);
                    self.clear_flags(INT0_RX_THRESH, 0);
                    if flags & INT0_DONE != 0 && request.rx_received >= self.txn.segment_end {
                        self.clear_flags(INT0_DONE, 0);
                        if request.rx_received < request.rx.len() {
                            self.arm_read_segment(&request);
                        } else {
                            self.begin_termination(request.restart);
                        }
                    }
                }
                self.txn.request = Some(request);
            }
            Phase::Stopping => {
                let end = if request.restart {
                    INT0_DONE
                } else {
                    INT0_STOP | INT0_DONE
                };
                if flags & end == end {
                    self.clear_flags(end, 0);
                    self.finish_master(request, Ok(AckStatus::Acked));
                } else {
                    self.txn.request = Some(request);
                }
            }
            Phase::Idle => {
                self.txn.request = Some(request);
            }
        }
    }

    fn arm_read_segment(&mut self, request: &MasterRequest<'_>) {
        let remaining = request.rx.len() - request.rx_received;
        let segment = remaining.min(MAX_RX_SEGMENT);
        self.txn.segment_end = request.rx_received + segment;
        self.set_rx_count(segment);
        self.start();
        self.load_address(request.address, true);
        self.txn.phase = Phase::Read;
        self.enable_interrupts(INT0_RX_THRESH, 0);
    }

    fn begin_termination(&mut self, restart: bool) {
        if restart {
            self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_RESTART);
        } else {
            self.regs.modify(Reg::MasterCtrl, |v| v | MSTCTRL_STOP);
        }
        self.txn.phase = Phase::Stopping;
    }

    pub(super) fn finish_master(
        &mut self,
        mut request: MasterRequest<'a>,
        result: Result<AckStatus, Error>,
    ) {
        self.disable_interrupts(!0, !0);
        self.txn.finished = true;
        self.txn.phase = Phase::Idle;
        if let Some(callback) = request.callback {
            callback(&mut request, result);
        }
        self.txn.request = Some(request);
    }

    /// Reclaim a completed async request and its buffers. Returns `None`
    /// while the request is still in flight.
    pub fn take_request(&mut self) -> Option<MasterRequest<'a>> {
        if !self.txn.finished {
            return None;
        }
        self.txn.finished = false;
        self.txn.request.take()
    }

    /// Cancel the pending async request, completing it with [`Error::Abort`].
    /// A no-op when nothing is pending.
    pub fn abort_async(&mut self) {
        self.disable_interrupts(!0, !0);
        self.clear_flags(!0, !0);
        self.cancel_pending(Error::Abort);
    }

    pub(super) fn cancel_pending(&mut self, error: Error) {
        if let Some(mut request) = self.txn.request.take() {
            if !self.txn.finished {
                if let Some(callback) = request.callback {
                    callback(&mut request, Err(error));
                }
            }
        }
        self.txn = ActiveTransfer::idle();
    }
}

impl<R: RegisterInterface, L: Logger> embedded_hal::i2c::ErrorType for RevaI2c<'_, R, L> {
    type Error = Error;
}

impl<R: RegisterInterface, L: Logger> embedded_hal::i2c::I2c for RevaI2c<'_, R, L> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let count = operations.len();
        for (index, operation) in operations.iter_mut().enumerate() {
            let hold_bus = index + 1 < count;
            let status = match operation {
                Operation::Write(bytes) => {
                    let mut request =
                        MasterRequest::new(Address::SevenBit(address), bytes, &mut []);
                    request.restart = hold_bus;
                    self.master_transaction(&mut request)?
                }
                Operation::Read(buffer) => {
                    let mut request =
                        MasterRequest::new(Address::SevenBit(address), &[], &mut **buffer);
                    request.restart = hold_bus;
                    self.master_transaction(&mut request)?
                }
            };
            if status == AckStatus::Nacked {
                return Err(Error::CommError);
            }
        }
        Ok(())
    }
}
