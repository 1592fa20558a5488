//! Network side of the host
//!
//! The player only ever talks to one connected stream socket. Host code
//! sees it through [`Connection`]; the generated image drives the W5100
//! registers directly.

pub mod w5100;

pub use w5100::W5100;

/// Host view of the stream socket
pub trait Connection {
    /// Bytes received and not yet consumed
    fn received(&self) -> usize;

    /// Whether more data can still arrive or is still waiting to be consumed
    fn connected(&self) -> bool;

    fn disconnect(&mut self);

    /// Consume up to `buf.len()` received bytes; returns how many were copied
    fn receive(&mut self, buf: &mut [u8]) -> usize;
}
