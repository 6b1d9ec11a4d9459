//! Output abstraction for the `puts` command.
//!
//! Embedders can capture or redirect script output by installing a custom
//! [`OutputWriter`]; the default writes straight to stdout.

use std::{
    cell::RefCell,
    io::{self, Write as _},
    rc::Rc,
};

/// Sink for bytes written by `puts`.
///
/// Implement this trait to capture or redirect output from embedded scripts.
pub trait OutputWriter {
    /// Writes raw bytes; no separators or terminators are added.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Flushes any buffered output to its destination.
    fn flush(&mut self) {}
}

/// Default writer: line-buffered stdout.
#[derive(Debug, Default)]
pub struct StdOutput;

impl OutputWriter for StdOutput {
    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(bytes);
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

/// Writer that collects everything into a shared buffer.
///
/// Clones share the buffer, so a caller can keep one handle while the
/// interpreter owns the other. Useful for testing or capturing script output
/// programmatically.
#[derive(Debug, Clone, Default)]
pub struct CollectOutput {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl CollectOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected output, lossily decoded for display.
    #[must_use]
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }

    #[must_use]
    pub fn take_bytes(&self) -> Vec<u8> {
        std::mem::take(&mut self.buffer.borrow_mut())
    }
}

impl OutputWriter for CollectOutput {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.borrow_mut().extend_from_slice(bytes);
    }
}

/// Writer that discards all output.
#[derive(Debug, Default)]
pub struct NoOutput;

impl OutputWriter for NoOutput {
    fn write_bytes(&mut self, _bytes: &[u8]) {}
}
