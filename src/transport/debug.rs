use anyhow::Result;
use async_trait::async_trait;
use log::info;

use super::Transport;

/// Simulated device for bench-free runs: logs every command and serves
/// zeroed pages.
pub struct DebugTransport {
    open: bool,
}

impl DebugTransport {
    pub fn new() -> Self {
        Self { open: true }
    }
}

impl Default for DebugTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for DebugTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        info!("write: {:x?}", bytes);
        Ok(())
    }

    async fn read_page(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn close(&mut self) -> bool {
        let was_open = self.open;
        self.open = false;
        was_open
    }
}
