// Licensed under the Apache-2.0 license

//! Simulated controller for the test suite.
//!
//! Implements [`RegisterInterface`] over a scripted model of the controller
//! and the bus behind it: FIFO staging, address consumption on start, read
//! segment generation, fault injection and stuck-line emulation for the
//! recovery sequence. Every observable bus action is appended to an op log
//! that tests assert against. [`SimI2c::new`] returns the interface plus a
//! [`SimHandle`] for scripting and inspection from the test body.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::interface::RegisterInterface;
use super::regs::*;

const FIFO_DEPTH: usize = 8;

/// One observable bus-level action.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BusOp {
    Start,
    Restart,
    Addr { byte: u8, read: bool },
    Write(u8),
    Read { ack: bool },
    Stop,
    SclLow,
    SclHigh,
    SdaLow,
    SdaHigh,
}

struct SimState {
    ctrl: u32,
    int_fl0: u32,
    int_fl1: u32,
    int_en0: u32,
    int_en1: u32,
    rx_ctrl0: u32,
    rx_ctrl1: u32,
    tx_ctrl0: u32,
    master_ctrl: u32,
    clk_lo: u32,
    clk_hi: u32,
    timeout: u32,
    slave_addr: u32,
    dma_ctrl: u32,
    rx_fifo: VecDeque<u8>,
    tx_fifo: VecDeque<u8>,
    ops: Vec<BusOp>,
    transaction_open: bool,
    awaiting_address: bool,
    dir_read: bool,
    error_latched: bool,
    write_index: usize,
    slave_data: VecDeque<u8>,
    nack_address: bool,
    nack_data_at: Option<usize>,
    scl_stuck_low: bool,
    sda_stuck_low: bool,
    slave_dir_read: bool,
}

impl SimState {
    fn new() -> Self {
        Self {
            // Reset state: lines released.
            ctrl: CTRL_SCL_OUT | CTRL_SDA_OUT,
            int_fl0: 0,
            int_fl1: 0,
            int_en0: 0,
            int_en1: 0,
            rx_ctrl0: 0,
            rx_ctrl1: 0,
            tx_ctrl0: 0,
            master_ctrl: 0,
            clk_lo: 0,
            clk_hi: 0,
            timeout: 0,
            slave_addr: 0,
            dma_ctrl: 0,
            rx_fifo: VecDeque::new(),
            tx_fifo: VecDeque::new(),
            ops: Vec::new(),
            transaction_open: false,
            awaiting_address: false,
            dir_read: false,
            error_latched: false,
            write_index: 0,
            slave_data: VecDeque::new(),
            nack_address: false,
            nack_data_at: None,
            scl_stuck_low: false,
            sda_stuck_low: false,
            slave_dir_read: false,
        }
    }

    fn driven_low(ctrl: u32, out_bit: u32) -> bool {
        ctrl & CTRL_BB_MODE != 0 && ctrl & out_bit == 0
    }

    fn tx_threshold(&self) -> usize {
        ((self.tx_ctrl0 & TXCTRL0_THD) >> TXCTRL0_THD_POS) as usize
    }

    /// Shift staged TX bytes onto the simulated bus.
    fn pump(&mut self) {
        if self.transaction_open && self.awaiting_address {
            if let Some(byte) = self.tx_fifo.pop_front() {
                let read = byte & 1 != 0;
                self.awaiting_address = false;
                self.dir_read = read;
                self.ops.push(BusOp::Addr { byte, read });
                if self.nack_address {
                    self.int_fl0 |= INT0_ADDR_NACK_ERR;
                    self.error_latched = true;
                } else {
                    self.int_fl0 |= INT0_ADDR_ACK;
                    if read {
                        self.generate_read_segment();
                    }
                }
            }
        }
        if self.transaction_open && !self.awaiting_address && !self.dir_read {
            while !self.error_latched {
                let Some(byte) = self.tx_fifo.pop_front() else {
                    break;
                };
                self.ops.push(BusOp::Write(byte));
                let index = self.write_index;
                self.write_index += 1;
                if self.nack_data_at == Some(index) {
                    self.int_fl0 |= INT0_DATA_ERR;
                    self.error_latched = true;
                }
            }
        }
    }

    /// Produce one programmed read segment worth of data, NACKing the final
    /// byte as a real master would.
    fn generate_read_segment(&mut self) {
        let programmed = (self.rx_ctrl1 & RXCTRL1_CNT) as usize;
        let count = if programmed == 0 { 256 } else { programmed };
        for i in 0..count {
            let byte = self.slave_data.pop_front().unwrap_or(0);
            self.rx_fifo.push_back(byte);
            self.ops.push(BusOp::Read { ack: i + 1 < count });
        }
        self.int_fl0 |= INT0_RX_THRESH | INT0_DONE;
    }

    fn status(&self) -> u32 {
        let mut value = 0;
        if self.transaction_open {
            value |= STAT_BUSY;
        }
        if self.rx_fifo.is_empty() {
            value |= STAT_RX_EMPTY;
        }
        if self.rx_fifo.len() >= FIFO_DEPTH {
            value |= STAT_RX_FULL;
        }
        if self.tx_fifo.is_empty() {
            value |= STAT_TX_EMPTY;
        }
        if self.tx_fifo.len() >= FIFO_DEPTH {
            value |= STAT_TX_FULL;
        }
        value |= (self.rx_fifo.len().min(FIFO_DEPTH) as u32) << STAT_RX_LVL_POS;
        value |= (self.tx_fifo.len().min(FIFO_DEPTH) as u32) << STAT_TX_LVL_POS;
        value
    }

    fn read(&mut self, reg: Reg) -> u32 {
        match reg {
            Reg::Ctrl => {
                let mut value = self.ctrl & !(CTRL_SCL | CTRL_SDA | CTRL_READ);
                let scl_low = Self::driven_low(self.ctrl, CTRL_SCL_OUT) || self.scl_stuck_low;
                let sda_low = Self::driven_low(self.ctrl, CTRL_SDA_OUT) || self.sda_stuck_low;
                if !scl_low {
                    value |= CTRL_SCL;
                }
                if !sda_low {
                    value |= CTRL_SDA;
                }
                if self.slave_dir_read {
                    value |= CTRL_READ;
                }
                value
            }
            Reg::Status => self.status(),
            Reg::IntFl0 => {
                let mut value = self.int_fl0;
                if self.transaction_open
                    && !self.awaiting_address
                    && !self.dir_read
                    && !self.error_latched
                    && self.tx_fifo.len() <= self.tx_threshold()
                {
                    value |= INT0_TX_THRESH;
                }
                value
            }
            Reg::IntEn0 => self.int_en0,
            Reg::IntFl1 => self.int_fl1,
            Reg::IntEn1 => self.int_en1,
            Reg::FifoLen => {
                (FIFO_DEPTH as u32) | ((FIFO_DEPTH as u32) << FIFOLEN_TX_POS)
            }
            Reg::RxCtrl0 => self.rx_ctrl0,
            Reg::RxCtrl1 => self.rx_ctrl1,
            Reg::TxCtrl0 => self.tx_ctrl0,
            Reg::Fifo => u32::from(self.rx_fifo.pop_front().unwrap_or(0)),
            Reg::MasterCtrl => self.master_ctrl,
            Reg::ClkLo => self.clk_lo,
            Reg::ClkHi => self.clk_hi,
            Reg::Timeout => self.timeout,
            Reg::SlaveAddr => self.slave_addr,
            Reg::DmaCtrl => self.dma_ctrl,
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        match reg {
            Reg::Ctrl => {
                let old = self.ctrl;
                self.ctrl = value & !(CTRL_SCL | CTRL_SDA | CTRL_READ);
                let old_scl = Self::driven_low(old, CTRL_SCL_OUT);
                let new_scl = Self::driven_low(self.ctrl, CTRL_SCL_OUT);
                if !old_scl && new_scl {
                    self.ops.push(BusOp::SclLow);
                } else if old_scl && !new_scl {
                    self.ops.push(BusOp::SclHigh);
                }
                let old_sda = Self::driven_low(old, CTRL_SDA_OUT);
                let new_sda = Self::driven_low(self.ctrl, CTRL_SDA_OUT);
                if !old_sda && new_sda {
                    self.ops.push(BusOp::SdaLow);
                } else if old_sda && !new_sda {
                    self.ops.push(BusOp::SdaHigh);
                }
            }
            Reg::Status | Reg::FifoLen => {}
            Reg::IntFl0 => self.int_fl0 &= !value,
            Reg::IntFl1 => self.int_fl1 &= !value,
            Reg::IntEn0 => self.int_en0 = value,
            Reg::IntEn1 => self.int_en1 = value,
            Reg::RxCtrl0 => {
                let mut stored = value;
                if stored & RXCTRL0_FLUSH != 0 {
                    self.rx_fifo.clear();
                    stored &= !RXCTRL0_FLUSH;
                }
                self.rx_ctrl0 = stored;
            }
            Reg::RxCtrl1 => self.rx_ctrl1 = value & RXCTRL1_CNT,
            Reg::TxCtrl0 => {
                let mut stored = value;
                if stored & TXCTRL0_FLUSH != 0 {
                    self.tx_fifo.clear();
                    stored &= !TXCTRL0_FLUSH;
                }
                self.tx_ctrl0 = stored;
            }
            Reg::Fifo => {
                self.tx_fifo.push_back(value as u8);
                self.pump();
            }
            Reg::MasterCtrl => {
                // Start/restart/stop strobes self-clear; only the extended
                // addressing selector persists.
                self.master_ctrl = value & MSTCTRL_EX_ADDR;
                if value & MSTCTRL_START != 0 {
                    if self.transaction_open {
                        self.ops.push(BusOp::Restart);
                    } else {
                        self.transaction_open = true;
                        self.error_latched = false;
                        self.write_index = 0;
                        self.ops.push(BusOp::Start);
                    }
                    self.awaiting_address = true;
                    self.pump();
                }
                if value & MSTCTRL_RESTART != 0 {
                    self.ops.push(BusOp::Restart);
                    self.awaiting_address = true;
                    self.int_fl0 |= INT0_DONE;
                }
                if value & MSTCTRL_STOP != 0 {
                    self.ops.push(BusOp::Stop);
                    self.transaction_open = false;
                    self.awaiting_address = false;
                    self.int_fl0 |= INT0_STOP | INT0_DONE;
                }
            }
            Reg::ClkLo => self.clk_lo = value & CLK_FIELD,
            Reg::ClkHi => self.clk_hi = value & CLK_FIELD,
            Reg::Timeout => self.timeout = value & TIMEOUT_FIELD,
            Reg::SlaveAddr => self.slave_addr = value,
            Reg::DmaCtrl => self.dma_ctrl = value,
        }
    }
}

/// [`RegisterInterface`] half of the simulated controller.
pub(crate) struct SimI2c {
    state: Arc<Mutex<SimState>>,
}

impl SimI2c {
    pub(crate) fn new() -> (SimI2c, SimHandle) {
        let state = Arc::new(Mutex::new(SimState::new()));
        (
            SimI2c {
                state: Arc::clone(&state),
            },
            SimHandle { state },
        )
    }
}

impl RegisterInterface for SimI2c {
    fn read(&mut self, reg: Reg) -> u32 {
        self.state.lock().unwrap().read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.state.lock().unwrap().write(reg, value)
    }
}

/// Scripting and inspection half, held by the test body.
pub(crate) struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    pub(crate) fn ops(&self) -> Vec<BusOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub(crate) fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    /// Data the scripted peer returns to master reads.
    pub(crate) fn set_slave_data(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.slave_data = data.iter().copied().collect();
    }

    /// NACK the next address cycle.
    pub(crate) fn nack_address(&self) {
        self.state.lock().unwrap().nack_address = true;
    }

    /// NACK the write-data byte at `index` (counted across the transaction).
    pub(crate) fn nack_data_at(&self, index: usize) {
        self.state.lock().unwrap().nack_data_at = Some(index);
    }

    pub(crate) fn stick_sda_low(&self, stuck: bool) {
        self.state.lock().unwrap().sda_stuck_low = stuck;
    }

    pub(crate) fn stick_scl_low(&self, stuck: bool) {
        self.state.lock().unwrap().scl_stuck_low = stuck;
    }

    /// Latch interrupt flags, as slave-side bus activity would.
    pub(crate) fn raise_flags(&self, flags0: u32, flags1: u32) {
        let mut state = self.state.lock().unwrap();
        state.int_fl0 |= flags0;
        state.int_fl1 |= flags1;
    }

    /// Deposit master-written bytes into the RX FIFO (slave direction).
    pub(crate) fn push_rx(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.rx_fifo.extend(data.iter().copied());
    }

    /// Direction bit the controller reports for the last slave address match.
    pub(crate) fn set_slave_read_direction(&self, read: bool) {
        self.state.lock().unwrap().slave_dir_read = read;
    }

    /// Bytes a slave handler has staged for the master to read.
    pub(crate) fn tx_fifo(&self) -> Vec<u8> {
        self.state.lock().unwrap().tx_fifo.iter().copied().collect()
    }

    pub(crate) fn rx_ctrl0(&self) -> u32 {
        self.state.lock().unwrap().rx_ctrl0
    }

    pub(crate) fn latched_flags(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.int_fl0, state.int_fl1)
    }

    pub(crate) fn timeout_reg(&self) -> u32 {
        self.state.lock().unwrap().timeout
    }

    pub(crate) fn clocks(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.clk_lo, state.clk_hi)
    }

    pub(crate) fn slave_addr_reg(&self) -> u32 {
        self.state.lock().unwrap().slave_addr
    }
}

pub(crate) mod fixture {
    use super::super::common::{Address, Config, ConfigBuilder, Mode};
    use super::super::reva::RevaI2c;
    use super::super::targets::{Max32660, Max32670, Target};
    use super::{SimHandle, SimI2c};
    use crate::syscon::mock::MockSystemControl;

    /// Poll budget ample for every simulated handshake; a hang in the sim
    /// surfaces as `Error::Timeout` instead of a wedged test.
    pub(crate) const TEST_POLLS: u32 = 4096;

    pub(crate) fn master_config() -> Config {
        ConfigBuilder::new().handshake_polls(TEST_POLLS).build()
    }

    pub(crate) fn slave_config(address: Address) -> Config {
        ConfigBuilder::new()
            .mode(Mode::Slave)
            .slave_address(address)
            .handshake_polls(TEST_POLLS)
            .build()
    }

    /// Initialized controller over the simulated register file, with the
    /// op log cleared so tests see only their own traffic.
    pub(crate) fn controller<'a>(config: &Config) -> (RevaI2c<'a, SimI2c>, SimHandle) {
        let (regs, handle) = SimI2c::new();
        let mut sys = MockSystemControl::new();
        let profile = Max32660::profile(0).unwrap();
        let i2c = RevaI2c::init(regs, profile, &mut sys, config).unwrap();
        handle.clear_ops();
        (i2c, handle)
    }

    /// Same, over a profile with 10-bit addressing wired up.
    pub(crate) fn extended_controller<'a>(config: &Config) -> (RevaI2c<'a, SimI2c>, SimHandle) {
        let (regs, handle) = SimI2c::new();
        let mut sys = MockSystemControl::new();
        let profile = Max32670::profile(0).unwrap();
        let i2c = RevaI2c::init(regs, profile, &mut sys, config).unwrap();
        handle.clear_ops();
        (i2c, handle)
    }
}
