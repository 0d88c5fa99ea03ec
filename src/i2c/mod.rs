// Licensed under the Apache-2.0 license

//! FIFO-based I2C controller driver for the MAX32660/MAX32670 family.
//!
//! The driver splits into a revision-agnostic engine ([`reva::RevaI2c`]) and
//! thin per-target wiring ([`targets`]). Master transactions come in polled,
//! interrupt-driven and DMA-offloaded variants; slave mode is an event
//! dispatcher behind the `i2c_target` feature.

pub mod common;
pub mod dma;
pub mod interface;
pub mod master;
pub mod regs;
pub mod reva;
#[cfg(test)]
pub(crate) mod sim;
#[cfg(feature = "i2c_target")]
pub mod slave;
pub mod targets;

pub use common::{AckStatus, Address, Config, ConfigBuilder, Error, Mode};
pub use dma::{DmaChannel, DmaController};
pub use interface::{MmioInterface, RegisterInterface};
pub use master::{MasterRequest, TransferCallback};
pub use reva::RevaI2c;
#[cfg(feature = "i2c_target")]
pub use common::{SlaveAck, SlaveEvent};
#[cfg(feature = "i2c_target")]
pub use slave::{BufferedSlave, SlaveHandler};
pub use targets::{Max32660, Max32670, Target, TargetProfile};
