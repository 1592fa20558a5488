//! W5100 socket 0 model in indirect bus mode
//!
//! Only the parts the player touches are modelled: the address and data
//! registers (the address auto-increments on every data access and wraps
//! inside the receive memory), the received-size and read-pointer registers
//! and the RECV command. Data from the remote end is queued and copied into
//! the 8 KiB receive memory whenever there is room, optionally limited to a
//! delivery rate.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::Connection;

/// Socket 0 command register
pub const SOCKET_COMMAND: u16 = 0x0401;
/// Socket 0 received size register (big endian)
pub const RECEIVED_SIZE: u16 = 0x0426;
/// Socket 0 read pointer register (big endian)
pub const READ_POINTER: u16 = 0x0428;
/// Receive memory base
pub const RX_BASE: u16 = 0x6000;
/// Receive memory size
pub const RX_SIZE: usize = 0x2000;
/// RECV command value
pub const RECV: u8 = 0x40;

const ADDRESS_SPACE: usize = 0x8000;
const RX_END: u16 = RX_BASE + RX_SIZE as u16;

/// Emulated W5100 with one stream socket
pub struct W5100 {
    regs: Box<[u8]>,
    addr: u16,
    mode: u8,
    read_ptr: u16,
    write_ptr: u16,
    remote: VecDeque<u8>,
    remote_closed: bool,
    open: bool,
    /// Bytes per 1000 cycles, unlimited when `None`
    rate: Option<u32>,
    clock: u64,
    delivered: u64,
}

impl Default for W5100 {
    fn default() -> Self {
        Self::new()
    }
}

impl W5100 {
    pub fn new() -> Self {
        Self {
            regs: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            addr: 0,
            mode: 0,
            read_ptr: 0,
            write_ptr: 0,
            remote: VecDeque::new(),
            remote_closed: false,
            open: true,
            rate: None,
            clock: 0,
            delivered: 0,
        }
    }

    /// Limit delivery from the remote end to `bytes_per_kcycle`
    pub fn with_rate(mut self, bytes_per_kcycle: u32) -> Self {
        self.rate = Some(bytes_per_kcycle);
        self
    }

    /// Queue data sent by the remote end
    pub fn push(&mut self, data: &[u8]) {
        if !self.open {
            return;
        }
        self.remote.extend(data);
        self.pump();
    }

    /// The remote end finished sending
    pub fn close_remote(&mut self) {
        self.remote_closed = true;
    }

    /// Bytes the remote end has queued but not yet delivered
    pub fn pending(&self) -> usize {
        self.remote.len()
    }

    /// Advance the socket clock and deliver what the rate allows
    pub fn tick(&mut self, now: u64) {
        if now > self.clock {
            self.clock = now;
        }
        self.pump();
    }

    pub fn received_size(&self) -> u16 {
        self.write_ptr.wrapping_sub(self.read_ptr)
    }

    pub fn read_pointer(&self) -> u16 {
        self.read_ptr
    }

    pub fn address(&self) -> u16 {
        self.addr
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn set_mode(&mut self, value: u8) {
        self.mode = value;
    }

    pub fn set_address_high(&mut self, value: u8) {
        self.addr = u16::from_be_bytes([value, self.addr as u8]);
    }

    pub fn set_address_low(&mut self, value: u8) {
        self.addr = (self.addr & 0xFF00) | value as u16;
    }

    pub fn read_data(&mut self) -> u8 {
        let value = self.regs.get(self.addr as usize).copied().unwrap_or(0);
        self.advance();
        value
    }

    pub fn write_data(&mut self, value: u8) {
        let addr = self.addr;
        if let Some(reg) = self.regs.get_mut(addr as usize) {
            *reg = value;
        }
        if addr == SOCKET_COMMAND && value == RECV {
            self.recv();
        }
        self.advance();
    }

    fn advance(&mut self) {
        let next = self.addr.wrapping_add(1);
        self.addr = if self.addr >= RX_BASE && next == RX_END {
            RX_BASE
        } else {
            next
        };
    }

    /// Commit the read pointer written by the host and make room for more data
    fn recv(&mut self) {
        let at = READ_POINTER as usize;
        let committed = u16::from_be_bytes([self.regs[at], self.regs[at + 1]]);
        trace!(
            consumed = committed.wrapping_sub(self.read_ptr),
            "RECV committed"
        );
        self.read_ptr = committed;
        self.publish_read_pointer();
        self.pump();
    }

    fn allowance(&self) -> usize {
        match self.rate {
            None => usize::MAX,
            Some(rate) => {
                let budget = self.clock * rate as u64 / 1000;
                budget.saturating_sub(self.delivered) as usize
            }
        }
    }

    fn pump(&mut self) {
        let free = RX_SIZE - self.received_size() as usize;
        let count = free.min(self.remote.len()).min(self.allowance());
        for _ in 0..count {
            let Some(byte) = self.remote.pop_front() else {
                break;
            };
            let at = RX_BASE as usize + (self.write_ptr as usize & (RX_SIZE - 1));
            self.regs[at] = byte;
            self.write_ptr = self.write_ptr.wrapping_add(1);
        }
        self.delivered += count as u64;
        self.sync();
    }

    /// Refresh the received-size register.
    ///
    /// The read-pointer register belongs to the host between commits, so it
    /// is only written back when the read pointer itself moves.
    fn sync(&mut self) {
        let at = RECEIVED_SIZE as usize;
        let size = self.received_size().to_be_bytes();
        self.regs[at..at + 2].copy_from_slice(&size);
    }

    fn publish_read_pointer(&mut self) {
        let at = READ_POINTER as usize;
        self.regs[at..at + 2].copy_from_slice(&self.read_ptr.to_be_bytes());
    }
}

impl Connection for W5100 {
    fn received(&self) -> usize {
        self.received_size() as usize
    }

    fn connected(&self) -> bool {
        self.open && !(self.remote_closed && self.remote.is_empty())
    }

    fn disconnect(&mut self) {
        if self.open {
            debug!(dropped = self.remote.len(), "socket disconnected");
        }
        self.open = false;
        self.remote.clear();
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.received());
        for slot in buf.iter_mut().take(count) {
            let at = RX_BASE as usize + (self.read_ptr as usize & (RX_SIZE - 1));
            *slot = self.regs[at];
            self.read_ptr = self.read_ptr.wrapping_add(1);
        }
        self.publish_read_pointer();
        self.pump();
        count
    }
}
