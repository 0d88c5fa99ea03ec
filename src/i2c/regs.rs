// Licensed under the Apache-2.0 license

//! Register map and bit definitions for the I2C controller block.
//!
//! Offsets and fields follow the FIFO-oriented controller layout shared by
//! the MAX32660/MAX32670 family. All registers are 32 bits wide; the
//! interrupt-flag registers are write-one-to-clear.

/// Registers of a single controller instance, by byte offset from the base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Ctrl,
    Status,
    IntFl0,
    IntEn0,
    IntFl1,
    IntEn1,
    FifoLen,
    RxCtrl0,
    RxCtrl1,
    TxCtrl0,
    Fifo,
    MasterCtrl,
    ClkLo,
    ClkHi,
    Timeout,
    SlaveAddr,
    DmaCtrl,
}

impl Reg {
    pub const fn offset(self) -> usize {
        match self {
            Reg::Ctrl => 0x00,
            Reg::Status => 0x04,
            Reg::IntFl0 => 0x08,
            Reg::IntEn0 => 0x0C,
            Reg::IntFl1 => 0x10,
            Reg::IntEn1 => 0x14,
            Reg::FifoLen => 0x18,
            Reg::RxCtrl0 => 0x1C,
            Reg::RxCtrl1 => 0x20,
            Reg::TxCtrl0 => 0x24,
            Reg::Fifo => 0x2C,
            Reg::MasterCtrl => 0x30,
            Reg::ClkLo => 0x34,
            Reg::ClkHi => 0x38,
            Reg::Timeout => 0x40,
            Reg::SlaveAddr => 0x44,
            Reg::DmaCtrl => 0x48,
        }
    }
}

// CTRL
pub const CTRL_EN: u32 = 1 << 0;
pub const CTRL_MST: u32 = 1 << 1;
/// Interactive receive mode: stretch SCL after each received byte.
pub const CTRL_IRXM_EN: u32 = 1 << 3;
/// Acknowledge value shifted out for the next received byte (0 = ACK,
/// 1 = NACK).
pub const CTRL_ACK: u32 = 1 << 4;
/// Software SCL drive in bit-bang mode (0 = drive low, 1 = release).
pub const CTRL_SCL_OUT: u32 = 1 << 6;
/// Software SDA drive in bit-bang mode (0 = drive low, 1 = release).
pub const CTRL_SDA_OUT: u32 = 1 << 7;
/// SCL pin readback.
pub const CTRL_SCL: u32 = 1 << 8;
/// SDA pin readback.
pub const CTRL_SDA: u32 = 1 << 9;
/// Software (bit-bang) output enable.
pub const CTRL_BB_MODE: u32 = 1 << 10;
/// Direction bit sampled at the last address match (1 = master read).
pub const CTRL_READ: u32 = 1 << 11;
pub const CTRL_CLKSTR_DIS: u32 = 1 << 12;

// STATUS
pub const STAT_BUSY: u32 = 1 << 0;
pub const STAT_RX_EMPTY: u32 = 1 << 1;
pub const STAT_RX_FULL: u32 = 1 << 2;
pub const STAT_TX_EMPTY: u32 = 1 << 3;
pub const STAT_TX_FULL: u32 = 1 << 4;
pub const STAT_RX_LVL_POS: u32 = 8;
pub const STAT_RX_LVL: u32 = 0xFF << STAT_RX_LVL_POS;
pub const STAT_TX_LVL_POS: u32 = 16;
pub const STAT_TX_LVL: u32 = 0xFF << STAT_TX_LVL_POS;

// INTFL0 / INTEN0
pub const INT0_DONE: u32 = 1 << 0;
pub const INT0_IRXM: u32 = 1 << 1;
pub const INT0_GC_ADDR_MATCH: u32 = 1 << 2;
pub const INT0_ADDR_MATCH: u32 = 1 << 3;
pub const INT0_RX_THRESH: u32 = 1 << 4;
pub const INT0_TX_THRESH: u32 = 1 << 5;
pub const INT0_STOP: u32 = 1 << 6;
pub const INT0_ADDR_ACK: u32 = 1 << 7;
pub const INT0_ARB_ERR: u32 = 1 << 8;
pub const INT0_TO_ERR: u32 = 1 << 9;
pub const INT0_ADDR_NACK_ERR: u32 = 1 << 10;
pub const INT0_DATA_ERR: u32 = 1 << 11;
pub const INT0_DNR_ERR: u32 = 1 << 12;
pub const INT0_START_ERR: u32 = 1 << 13;
pub const INT0_STOP_ERR: u32 = 1 << 14;
pub const INT0_TX_LOCKOUT: u32 = 1 << 15;
/// Directional address-match flags, present on newer revisions only.
pub const INT0_RD_ADDR_MATCH: u32 = 1 << 22;
pub const INT0_WR_ADDR_MATCH: u32 = 1 << 23;

/// Faults that abort a master transaction. The do-not-respond bit varies
/// per target and is folded in from the target profile at runtime.
pub const INT0_MASTER_ERR: u32 = INT0_ARB_ERR
    | INT0_TO_ERR
    | INT0_ADDR_NACK_ERR
    | INT0_DATA_ERR
    | INT0_START_ERR
    | INT0_STOP_ERR;

/// Faults that abort a slave transaction.
pub const INT0_SLAVE_ERR: u32 =
    INT0_ARB_ERR | INT0_TO_ERR | INT0_DATA_ERR | INT0_START_ERR | INT0_STOP_ERR;

// INTFL1 / INTEN1
pub const INT1_RX_OVERFLOW: u32 = 1 << 0;
pub const INT1_TX_UNDERFLOW: u32 = 1 << 1;

// FIFOLEN
pub const FIFOLEN_RX_POS: u32 = 0;
pub const FIFOLEN_RX: u32 = 0xFF;
pub const FIFOLEN_TX_POS: u32 = 8;
pub const FIFOLEN_TX: u32 = 0xFF << FIFOLEN_TX_POS;

// RXCTRL0
pub const RXCTRL0_DNR: u32 = 1 << 0;
pub const RXCTRL0_FLUSH: u32 = 1 << 7;
pub const RXCTRL0_THD_POS: u32 = 8;
pub const RXCTRL0_THD: u32 = 0xF << RXCTRL0_THD_POS;

// RXCTRL1: receive count for one master read segment; 0 encodes 256.
pub const RXCTRL1_CNT: u32 = 0xFF;

// TXCTRL0
pub const TXCTRL0_FLUSH: u32 = 1 << 7;
pub const TXCTRL0_THD_POS: u32 = 8;
pub const TXCTRL0_THD: u32 = 0xF << TXCTRL0_THD_POS;

// MASTERCTRL
pub const MSTCTRL_START: u32 = 1 << 0;
pub const MSTCTRL_RESTART: u32 = 1 << 1;
pub const MSTCTRL_STOP: u32 = 1 << 2;
pub const MSTCTRL_EX_ADDR: u32 = 1 << 7;

// CLKLO / CLKHI hold 9-bit tick counts.
pub const CLK_FIELD: u32 = 0x1FF;

// TIMEOUT
pub const TIMEOUT_FIELD: u32 = 0xFFFF;

// SLAVEADDR
pub const SLAVEADDR_ADDR: u32 = 0x3FF;
pub const SLAVEADDR_EXT: u32 = 1 << 15;

// DMACTRL
pub const DMACTRL_TX_EN: u32 = 1 << 0;
pub const DMACTRL_RX_EN: u32 = 1 << 1;

/// Largest receive count one segment register write can express.
pub const MAX_RX_SEGMENT: usize = 256;
