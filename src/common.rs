// Licensed under the Apache-2.0 license

//! Shared infrastructure for the DDK.
//!
//! The [`Logger`] trait is the crate's only diagnostic seam. Drivers are
//! parameterized over it with [`NoOpLogger`] as the default, so the library
//! produces no output of its own unless the caller supplies a logger.

/// Minimal logging interface for driver diagnostics.
///
/// Both methods default to doing nothing, so an implementation may pick up
/// only the severity it cares about.
pub trait Logger {
    /// Low-importance progress/diagnostic message.
    fn debug(&self, _msg: &str) {}

    /// Error-path message. Emitted just before an operation reports failure.
    fn error(&self, _msg: &str) {}
}

/// Logger that discards everything. The default for all drivers.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {}
