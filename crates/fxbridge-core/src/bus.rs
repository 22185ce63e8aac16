//! Bus master abstraction and write discipline
//!
//! The raw bus primitives (lock, write, read) are supplied by the host
//! environment; this module defines the trait they are supplied through
//! and the two rules every transaction follows:
//!
//! - exclusive ownership is taken via a spin-wait around `try_lock` and
//!   released as soon as the single transaction completes, so the HID
//!   path and the file path never interleave a partial transfer;
//! - large writes are attempted as one transaction first and resent in
//!   32-byte chunks when the transport rejects them. That fallback is a
//!   transport limitation workaround, invisible to callers.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async

use maybe_async::maybe_async;

use crate::error::{Error, Result};

/// Chunk size used when a transport rejects a whole-payload write
pub const WRITE_CHUNK_LEN: usize = 32;
/// Pause between chunks of a fallback write
pub const CHUNK_DELAY_US: u32 = 10_000;
/// Pause between lock-acquisition attempts
const LOCK_RETRY_DELAY_US: u32 = 100;

/// Bus master trait (sync or async depending on `is_sync` feature)
///
/// One implementation per host environment; the in-memory emulator in
/// `fxbridge-dummy` is the reference. An unreleased lock is a fatal
/// condition requiring external reset, so implementations must release
/// in every completion path.
#[maybe_async(AFIT)]
pub trait BusMaster {
    /// Try to take exclusive bus ownership without blocking.
    fn try_lock(&mut self) -> bool;

    /// Release bus ownership.
    fn unlock(&mut self);

    /// Write `data` to the device at `addr` as one transaction.
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Read `buf.len()` bytes from the device at `addr`.
    async fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<()>;

    /// Delay for the specified number of microseconds.
    async fn delay_us(&mut self, us: u32);
}

// Blanket impl so backend registries can hand out trait objects
// (sync mode only; async trait methods are not object-safe)
#[cfg(all(feature = "std", feature = "is_sync"))]
impl BusMaster for std::boxed::Box<dyn BusMaster + Send> {
    fn try_lock(&mut self) -> bool {
        (**self).try_lock()
    }

    fn unlock(&mut self) {
        (**self).unlock()
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }

    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Spin until the bus lock is ours. No timeout: a lock that never
/// frees means the host environment needs a reset anyway.
#[maybe_async]
pub async fn acquire<M: BusMaster + ?Sized>(bus: &mut M) {
    while !bus.try_lock() {
        bus.delay_us(LOCK_RETRY_DELAY_US).await;
    }
}

/// One locked write transaction, no fallback.
#[maybe_async]
pub async fn locked_write<M: BusMaster + ?Sized>(bus: &mut M, addr: u8, data: &[u8]) -> Result<()> {
    acquire(bus).await;
    let result = bus.write(addr, data).await;
    bus.unlock();
    result
}

/// One locked read transaction.
#[maybe_async]
pub async fn locked_read<M: BusMaster + ?Sized>(
    bus: &mut M,
    addr: u8,
    buf: &mut [u8],
) -> Result<()> {
    acquire(bus).await;
    let result = bus.read(addr, buf).await;
    bus.unlock();
    result
}

/// Locked write with the chunked fallback: try the whole payload once,
/// and if the transport rejects it resend in [`WRITE_CHUNK_LEN`] pieces
/// with a short pause between them. The lock is held across the chunks
/// so the payload arrives as one uninterrupted sequence.
#[maybe_async]
pub async fn write_with_fallback<M: BusMaster + ?Sized>(
    bus: &mut M,
    addr: u8,
    data: &[u8],
) -> Result<()> {
    acquire(bus).await;

    let mut result = bus.write(addr, data).await;
    if result.is_err() {
        log::debug!(
            "single {}-byte transfer rejected, retrying in {}-byte chunks",
            data.len(),
            WRITE_CHUNK_LEN
        );
        result = Ok(());
        for chunk in data.chunks(WRITE_CHUNK_LEN) {
            if let Err(e) = bus.write(addr, chunk).await {
                result = Err(e);
                break;
            }
            bus.delay_us(CHUNK_DELAY_US).await;
        }
    }

    bus.unlock();
    result.map_err(|_| Error::BusWriteFailed)
}
