use anyhow::Result;
use async_trait::async_trait;

pub mod debug;
pub mod serial;

/// Byte-level link to the reader hardware. Writes are synchronous with
/// respect to the operation issuing them; reads pull at most one page of
/// streamed data at a time.
#[async_trait]
pub trait Transport: Send {
    fn is_open(&self) -> bool;

    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Pull up to `buf.len()` streamed bytes, returning how many arrived.
    async fn read_page(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the link. Returns whether the underlying port closed cleanly.
    fn close(&mut self) -> bool;
}
