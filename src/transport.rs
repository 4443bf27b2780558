//! The SMBus transport seam.
//!
//! The telemetry engine never talks to an I2C peripheral directly; it
//! issues word/block transactions through [`SmbusTransport`] and gets
//! an in-band [`TransactionStatus`] back with every completion. Bus
//! failures are data, not errors, so the retry policy can classify
//! them without an error type crossing the seam.

use embedded_hal_async::i2c::{Error as I2cError, ErrorKind, I2c, NoAcknowledgeSource};
use heapless::Vec;

/// Longest SMBus block payload.
pub const MAX_BLOCK_LEN: usize = 32;

/// Completion status of a single bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionStatus {
    Ok,
    DeviceAddressNotAcknowledged,
    DeviceCommandAccessDenied,
    DeviceAccessDenied,
    UnknownHostError,
    UnknownFailure,
    DeviceError,
    Timeout,
    Busy,
    HostUnsupportedProtocol,
    PecError,
}

/// Completion of a word read: status plus the received 16-bit value
/// (little-endian on the wire). The value is only meaningful when the
/// status is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WordCompletion {
    pub status: TransactionStatus,
    pub value: u16,
}

impl WordCompletion {
    pub fn failed(status: TransactionStatus) -> Self {
        Self { status, value: 0 }
    }
}

/// Completion of a block read: status plus up to 32 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCompletion {
    pub status: TransactionStatus,
    pub data: Vec<u8, MAX_BLOCK_LEN>,
}

impl BlockCompletion {
    pub fn failed(status: TransactionStatus) -> Self {
        Self {
            status,
            data: Vec::new(),
        }
    }
}

/// Asynchronous SMBus word/block transaction interface.
///
/// Exactly one transaction is in flight at a time; `&mut self` holds
/// that invariant by construction. Implementations must complete every
/// call eventually (the caller guards overall progress with its own
/// watchdog), and report bus-level failures through the returned
/// status rather than panicking or blocking forever.
pub trait SmbusTransport {
    async fn read_word(&mut self, addr: u8, command: u8) -> WordCompletion;
    async fn write_word(&mut self, addr: u8, command: u8, value: u16) -> TransactionStatus;
    async fn read_block(&mut self, addr: u8, command: u8) -> BlockCompletion;
}

/// [`SmbusTransport`] over any `embedded-hal-async` I2C bus.
///
/// Performs plain SMBus framing: word reads are a command write
/// followed by a 2-byte read, block reads receive a leading byte-count
/// byte. PEC is not appended or checked here; transports that validate
/// PEC surface `PecError` themselves.
pub struct SmbusI2c<I> {
    i2c: I,
}

impl<I> SmbusI2c<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

fn status_from_i2c<E: I2cError>(err: E) -> TransactionStatus {
    match err.kind() {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => {
            TransactionStatus::DeviceAddressNotAcknowledged
        }
        ErrorKind::NoAcknowledge(_) => TransactionStatus::DeviceError,
        ErrorKind::ArbitrationLoss => TransactionStatus::Busy,
        ErrorKind::Bus => TransactionStatus::UnknownHostError,
        ErrorKind::Overrun => TransactionStatus::DeviceError,
        _ => TransactionStatus::UnknownFailure,
    }
}

impl<I: I2c> SmbusTransport for SmbusI2c<I> {
    async fn read_word(&mut self, addr: u8, command: u8) -> WordCompletion {
        let mut buf = [0u8; 2];
        match self.i2c.write_read(addr, &[command], &mut buf).await {
            Ok(()) => WordCompletion {
                status: TransactionStatus::Ok,
                value: u16::from_le_bytes(buf),
            },
            Err(e) => WordCompletion::failed(status_from_i2c(e)),
        }
    }

    async fn write_word(&mut self, addr: u8, command: u8, value: u16) -> TransactionStatus {
        let [lo, hi] = value.to_le_bytes();
        match self.i2c.write(addr, &[command, lo, hi]).await {
            Ok(()) => TransactionStatus::Ok,
            Err(e) => status_from_i2c(e),
        }
    }

    async fn read_block(&mut self, addr: u8, command: u8) -> BlockCompletion {
        // count byte plus the longest payload
        let mut buf = [0u8; MAX_BLOCK_LEN + 1];
        match self.i2c.write_read(addr, &[command], &mut buf).await {
            Ok(()) => {
                let count = (buf[0] as usize).min(MAX_BLOCK_LEN);
                let mut data = Vec::new();
                // cannot overflow, count is clamped to capacity
                let _ = data.extend_from_slice(&buf[1..1 + count]);
                BlockCompletion {
                    status: TransactionStatus::Ok,
                    data,
                }
            }
            Err(e) => BlockCompletion::failed(status_from_i2c(e)),
        }
    }
}
