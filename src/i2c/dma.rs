// Licensed under the Apache-2.0 license

//! DMA-offloaded master transactions.
//!
//! The controller core does not own a DMA engine; it drives one through the
//! [`DmaController`] seam. The write and read phases run on separately
//! acquired channels, and the platform's DMA interrupt glue reports phase
//! completion through [`RevaI2c::dma_tx_complete`] and
//! [`RevaI2c::dma_rx_complete`].

use super::common::{AckStatus, Error};
use super::interface::RegisterInterface;
use super::master::MasterRequest;
use super::regs::{Reg, DMACTRL_RX_EN, DMACTRL_TX_EN, MAX_RX_SEGMENT};
use super::reva::{Phase, RevaI2c};
use crate::common::Logger;

/// Handle to one acquired DMA channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannel(pub u8);

/// Platform DMA engine as seen by the I2C driver.
///
/// Receive transfers land in a controller-owned bounce buffer and are copied
/// out at completion with [`DmaController::read_rx`].
pub trait DmaController {
    fn acquire_channel(&mut self) -> Result<DmaChannel, Error>;
    fn release_channel(&mut self, channel: DmaChannel);

    /// Arm `channel` to feed `data` into the TX FIFO.
    fn setup_tx(&mut self, channel: DmaChannel, data: &[u8]) -> Result<(), Error>;
    /// Arm `channel` to drain `len` bytes from the RX FIFO.
    fn setup_rx(&mut self, channel: DmaChannel, len: usize) -> Result<(), Error>;
    fn start(&mut self, channel: DmaChannel) -> Result<(), Error>;

    /// Copy the received bytes of a finished RX transfer into `buf`; returns
    /// the count copied.
    fn read_rx(&mut self, channel: DmaChannel, buf: &mut [u8]) -> usize;
}

impl<'a, R: RegisterInterface, L: Logger> RevaI2c<'a, R, L> {
    /// Start a DMA-offloaded master transaction.
    ///
    /// The read phase is limited to one hardware segment; longer reads must
    /// use the polled or interrupt-driven engines. Completion is reported
    /// through the request callback once the DMA glue has delivered the
    /// final phase-completion event.
    pub fn master_transaction_dma<D: DmaController>(
        &mut self,
        mut request: MasterRequest<'a>,
        dma: &mut D,
    ) -> Result<(), Error> {
        if self.is_async_busy() {
            return Err(Error::Busy);
        }
        self.check_master()?;
        self.validate_address(request.address)?;
        if request.rx.len() > MAX_RX_SEGMENT {
            return Err(Error::BadParam);
        }
        request.tx_sent = 0;
        request.rx_received = 0;

        self.clear_flags(!0, !0);
        self.clear_rx_fifo()?;
        self.clear_tx_fifo()?;

        if !request.rx.is_empty() {
            let channel = dma.acquire_channel()?;
            self.txn.rx_channel = Some(channel);
            if let Err(error) = dma.setup_rx(channel, request.rx.len()) {
                self.release_dma(dma);
                return Err(error);
            }
        }

        if !request.tx.is_empty() || request.rx.is_empty() {
            self.start();
            self.load_address(request.address, false);
        }

        if request.tx.is_empty() {
            self.txn.phase = Phase::Write;
            self.txn.request = Some(request);
            // No write phase to wait for; move straight to the read setup.
            self.dma_tx_complete(dma);
        } else {
            let channel = match dma.acquire_channel() {
                Ok(channel) => channel,
                Err(error) => {
                    self.release_dma(dma);
                    return Err(error);
                }
            };
            self.txn.tx_channel = Some(channel);
            let armed = dma
                .setup_tx(channel, request.tx)
                .and_then(|()| dma.start(channel));
            if let Err(error) = armed {
                self.release_dma(dma);
                return Err(error);
            }
            self.regs.modify(Reg::DmaCtrl, |v| v | DMACTRL_TX_EN);
            self.txn.phase = Phase::Write;
            self.txn.request = Some(request);
        }
        Ok(())
    }

    /// DMA glue entry point: the TX channel finished feeding the FIFO.
    /// Arms the read phase, or terminates a write-only transaction.
    pub fn dma_tx_complete<D: DmaController>(&mut self, dma: &mut D) {
        let Some(mut request) = self.txn.request.take() else {
            return;
        };
        if self.txn.finished || self.txn.phase != Phase::Write {
            self.txn.request = Some(request);
            return;
        }
        request.tx_sent = request.tx.len();
        if let Some(channel) = self.txn.tx_channel.take() {
            dma.release_channel(channel);
            self.regs.modify(Reg::DmaCtrl, |v| v & !DMACTRL_TX_EN);
        }

        if request.rx.is_empty() {
            let result = self.terminate_dma(request.restart);
            self.finish_master(request, result.map(|_| AckStatus::Acked));
            return;
        }

        self.set_rx_count(request.rx.len());
        self.start();
        self.load_address(request.address, true);
        self.regs.modify(Reg::DmaCtrl, |v| v | DMACTRL_RX_EN);
        self.txn.phase = Phase::Read;
        let started = match self.txn.rx_channel {
            Some(channel) => dma.start(channel),
            None => Err(Error::BadState),
        };
        if let Err(error) = started {
            self.logger.error("i2c: dma read phase failed to start");
            let _ = self.stop();
            self.release_dma(dma);
            self.finish_master(request, Err(error));
            return;
        }
        self.txn.request = Some(request);
    }

    /// DMA glue entry point: the RX channel finished draining the FIFO.
    /// Copies the received bytes out and completes the request.
    pub fn dma_rx_complete<D: DmaController>(&mut self, dma: &mut D) {
        let Some(mut request) = self.txn.request.take() else {
            return;
        };
        if self.txn.finished || self.txn.phase != Phase::Read {
            self.txn.request = Some(request);
            return;
        }
        if let Some(channel) = self.txn.rx_channel.take() {
            request.rx_received = dma.read_rx(channel, request.rx);
            dma.release_channel(channel);
        }
        self.regs.modify(Reg::DmaCtrl, |v| v & !DMACTRL_RX_EN);
        let result = self.terminate_dma(request.restart);
        self.finish_master(request, result.map(|_| AckStatus::Acked));
    }

    /// Cancel a pending DMA transaction, releasing both channels.
    pub fn abort_dma<D: DmaController>(&mut self, dma: &mut D) {
        self.release_dma(dma);
        self.regs
            .modify(Reg::DmaCtrl, |v| v & !(DMACTRL_TX_EN | DMACTRL_RX_EN));
        self.abort_async();
    }

    fn release_dma<D: DmaController>(&mut self, dma: &mut D) {
        if let Some(channel) = self.txn.tx_channel.take() {
            dma.release_channel(channel);
        }
        if let Some(channel) = self.txn.rx_channel.take() {
            dma.release_channel(channel);
        }
    }

    fn terminate_dma(&mut self, restart: bool) -> Result<(), Error> {
        let err_mask = self.master_error_mask();
        if self.regs.read(Reg::IntFl0) & err_mask != 0 {
            let _ = self.stop();
            self.clear_flags(!0, !0);
            return Err(Error::CommError);
        }
        if restart {
            self.regs.modify(Reg::MasterCtrl, |v| v | super::regs::MSTCTRL_RESTART);
        } else {
            self.stop()?;
        }
        Ok(())
    }
}
