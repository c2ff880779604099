use anyhow::{Context, Result};
use log::{debug, info};
use std::env;
use std::fs;

use gbcart_rs::transport::debug::DebugTransport;
use gbcart_rs::transport::serial::SerialTransport;
use gbcart_rs::{CartHeader, Platform, ReadContext, Reader, Transport};

const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
const DEFAULT_OUTPUT: &str = "cartridge.gb";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let device = args.next().unwrap_or_else(|| DEFAULT_DEVICE.to_string());
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    // "debug" skips the hardware and dumps an all-zero image.
    let transport: Box<dyn Transport> = if device == "debug" {
        Box::new(DebugTransport::new())
    } else {
        Box::new(SerialTransport::open(&device)?)
    };

    let reader = Reader::open(transport, Platform::GameboyClassic)?;

    let header_bytes = reader.read(ReadContext::Header).wait().await?;
    let header = CartHeader::parse(&header_bytes).context("unreadable cartridge header")?;
    info!(
        "cartridge {:?}: {}, {} banks",
        header.title, header.controller, header.rom_banks
    );

    let mut image = Vec::with_capacity(header.rom_len());
    for bank in 1..header.rom_banks {
        let data = reader
            .read(ReadContext::Bank {
                bank,
                header: header.clone(),
            })
            .wait()
            .await?;
        debug!("bank {} of {} read", bank, header.rom_banks - 1);
        image.extend(data);
    }

    fs::write(&output, &image).with_context(|| format!("failed to write {}", output))?;
    info!("wrote {} bytes to {}", image.len(), output);

    reader.close().await;
    Ok(())
}
