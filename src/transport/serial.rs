use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serialport::SerialPort;

use super::Transport;

/// Baud rate of the reader's USB-serial bridge.
pub const BAUD_RATE: u32 = 1_000_000;

/// Generous ceiling: the device streams pages immediately once triggered,
/// so a stalled read this long means the cartridge is missing or dead.
const READ_TIMEOUT: Duration = Duration::from_millis(5_000);

/// USB-serial link to the physical reader.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialTransport {
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("failed to open serial port {}", path))?;

        info!("opened {} at {} baud", path, BAUD_RATE);
        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .with_context(|| format!("serial port {} is closed", self.path))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes).context("serial write failed")?;
        port.flush().context("serial flush failed")?;
        Ok(())
    }

    async fn read_page(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.port()?.read(buf).context("serial read failed")?;
        debug!("rx {:x?}", &buf[..n]);
        Ok(n)
    }

    fn close(&mut self) -> bool {
        match self.port.take() {
            Some(port) => {
                drop(port);
                info!("closed {}", self.path);
                true
            }
            None => false,
        }
    }
}
