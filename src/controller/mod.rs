//! Reader controller: owns the transport and a FIFO operation queue, and
//! drives each queued read through its four lifecycle callbacks. Exactly one
//! operation's commands are on the wire at any time.

use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::cartridge::Platform;
use crate::error::Error;
use crate::protocol::{Command, Payload, PAGE_SIZE};
use crate::sequencer::{ReadContext, ReadOperation};
use crate::transport::Transport;

struct QueuedRead {
    context: ReadContext,
    canceled: Arc<AtomicBool>,
    reply: oneshot::Sender<Result<Vec<u8>, Error>>,
}

/// Ticket for a submitted read.
pub struct ReadHandle {
    canceled: Arc<AtomicBool>,
    reply: oneshot::Receiver<Result<Vec<u8>, Error>>,
}

impl ReadHandle {
    /// Request cancellation. Honored at the next lifecycle-callback entry;
    /// an in-progress settle delay is never interrupted.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Await the bytes the operation produced.
    pub async fn wait(self) -> Result<Vec<u8>, Error> {
        self.reply.await.unwrap_or(Err(Error::ShutDown))
    }
}

/// Session with one reader device.
pub struct Reader {
    ops: mpsc::UnboundedSender<QueuedRead>,
    worker: JoinHandle<bool>,
}

impl Reader {
    /// Start a session on an already-opened transport.
    pub fn open(transport: Box<dyn Transport>, platform: Platform) -> Result<Self, Error> {
        if !transport.is_open() {
            return Err(Error::PortClosed);
        }
        let (ops, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_queue(transport, platform, rx));
        Ok(Self { ops, worker })
    }

    pub fn is_open(&self) -> bool {
        !self.ops.is_closed()
    }

    /// Queue a read. Operations execute strictly in submission order.
    pub fn read(&self, context: ReadContext) -> ReadHandle {
        let canceled = Arc::new(AtomicBool::new(false));
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = QueuedRead {
            context,
            canceled: canceled.clone(),
            reply: reply_tx,
        };
        if let Err(rejected) = self.ops.send(queued) {
            let _ = rejected.0.reply.send(Err(Error::ShutDown));
        }
        ReadHandle {
            canceled,
            reply: reply_rx,
        }
    }

    /// Drain remaining operations and close the transport.
    pub async fn close(self) -> bool {
        drop(self.ops);
        self.worker.await.unwrap_or(false)
    }
}

async fn run_queue(
    mut transport: Box<dyn Transport>,
    platform: Platform,
    mut rx: mpsc::UnboundedReceiver<QueuedRead>,
) -> bool {
    while let Some(QueuedRead {
        context,
        canceled,
        reply,
    }) = rx.recv().await
    {
        debug!("dispatching {:?}", context);
        let result = run_read(transport.as_mut(), platform, context, &canceled).await;
        if let Err(e) = &result {
            warn!("read operation failed: {}", e);
        }
        // The active operation ends here regardless of whether the caller
        // is still waiting on the handle.
        let _ = reply.send(result);
    }
    transport.close()
}

async fn run_read(
    transport: &mut dyn Transport,
    platform: Platform,
    context: ReadContext,
    canceled: &AtomicBool,
) -> Result<Vec<u8>, Error> {
    let mut op = ReadOperation::new(platform, context);
    let total = op.total_len();

    checkpoint(canceled)?;
    transmit(transport, op.will_begin().map_err(out_of_order)?).await?;

    checkpoint(canceled)?;
    transmit(transport, op.did_begin().map_err(out_of_order)?).await?;

    let mut data = Vec::with_capacity(total);
    let mut page = [0u8; PAGE_SIZE];
    while data.len() < total {
        let want = cmp::min(PAGE_SIZE, total - data.len());
        let mut filled = 0;
        while filled < want {
            let n = transport.read_page(&mut page[filled..want]).await?;
            if n == 0 {
                return Err(Error::Transport(anyhow!(
                    "stream ended after {} of {} bytes",
                    data.len() + filled,
                    total
                )));
            }
            filled += n;
        }
        data.extend_from_slice(&page[..want]);

        checkpoint(canceled)?;
        transmit(transport, op.did_progress(data.len()).map_err(out_of_order)?).await?;
    }

    checkpoint(canceled)?;
    transmit(transport, op.did_complete().map_err(out_of_order)?).await?;

    Ok(data)
}

/// Cancellation is observed only between callbacks, never mid-sequence.
fn checkpoint(canceled: &AtomicBool) -> Result<(), Error> {
    if canceled.load(Ordering::SeqCst) {
        Err(Error::Canceled {
            reason: "canceled by caller",
        })
    } else {
        Ok(())
    }
}

fn out_of_order(e: crate::sequencer::SequenceError) -> Error {
    warn!("canceling malformed operation: {}", e);
    Error::Canceled {
        reason: "lifecycle callback out of order",
    }
}

async fn transmit(transport: &mut dyn Transport, plan: Vec<Command>) -> Result<(), Error> {
    for command in plan {
        match command.encode() {
            Payload::Bytes(bytes) => {
                debug!("tx {:x?}", bytes);
                transport.write(&bytes).await?;
            }
            // Hard blocking on purpose: nothing else may touch the wire
            // while the microcontroller settles, and the 150us delay sits
            // below the async timer floor anyway.
            Payload::Wait(duration) => std::thread::sleep(duration),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::CartHeader;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every transmitted command and serves zeroed pages.
    struct MockTransport {
        open: bool,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MockTransport {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let writes = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    open: true,
                    writes: writes.clone(),
                },
                writes,
            )
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn is_open(&self) -> bool {
            self.open
        }

        async fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.writes.lock().unwrap().push(bytes.to_vec());
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

    fn mbc5_header() -> CartHeader {
        let mut bytes = vec![0u8; 0x50];
        bytes[0x47] = 0x19;
        bytes[0x48] = 0x05;
        CartHeader::parse(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_header_read_wire_sequence() {
        let (mock, writes) = MockTransport::new();
        let reader = Reader::open(Box::new(mock), Platform::GameboyClassic).unwrap();

        let data = reader.read(ReadContext::Header).wait().await.unwrap();
        assert_eq!(data.len(), 0x50);

        // Address the header region, trigger, one pulse at the 64-byte
        // boundary (the remaining 16 bytes cross no boundary), then the
        // stop that precedes the mandatory pause.
        assert_eq!(
            *writes.lock().unwrap(),
            vec![
                b"A100\0".to_vec(),
                b"R".to_vec(),
                b"1".to_vec(),
                b"0".to_vec(),
            ]
        );

        assert!(reader.close().await);
    }

    #[tokio::test]
    async fn test_bank_read_wire_sequence() {
        let (mock, writes) = MockTransport::new();
        let reader = Reader::open(Box::new(mock), Platform::GameboyClassic).unwrap();

        let data = reader
            .read(ReadContext::Bank {
                bank: 5,
                header: mbc5_header(),
            })
            .wait()
            .await
            .unwrap();
        assert_eq!(data.len(), 0x4000);

        let writes = writes.lock().unwrap();
        assert_eq!(
            writes[..5],
            [
                b"0".to_vec(),
                b"B2100\0".to_vec(),
                b"B5\0".to_vec(),
                b"A4000\0".to_vec(),
                b"R".to_vec(),
            ]
        );
        // One pulse per 64-byte page across the 16 KiB window, and no
        // completion traffic for a bank read.
        let pulses = &writes[5..];
        assert_eq!(pulses.len(), 0x4000 / PAGE_SIZE);
        assert!(pulses.iter().all(|w| w.as_slice() == b"1"));
    }

    #[tokio::test]
    async fn test_operations_run_in_submission_order() {
        let (mock, writes) = MockTransport::new();
        let reader = Reader::open(Box::new(mock), Platform::GameboyClassic).unwrap();

        let header = reader.read(ReadContext::Header);
        let bank = reader.read(ReadContext::Bank {
            bank: 2,
            header: mbc5_header(),
        });

        header.wait().await.unwrap();
        bank.wait().await.unwrap();

        // The bank read's leading stop must come after the header read's
        // trailing one.
        let writes = writes.lock().unwrap();
        assert_eq!(writes[0], b"A100\0");
        assert_eq!(writes[4], b"0");
        assert_eq!(writes[5], b"B2100\0");
    }

    #[tokio::test]
    async fn test_canceled_operation_is_skipped() {
        let (mock, _writes) = MockTransport::new();
        let reader = Reader::open(Box::new(mock), Platform::GameboyClassic).unwrap();

        let first = reader.read(ReadContext::Header);
        let second = reader.read(ReadContext::Header);
        second.cancel();

        assert!(first.wait().await.is_ok());
        assert!(matches!(
            second.wait().await,
            Err(Error::Canceled { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_requires_open_transport() {
        let (mut mock, _writes) = MockTransport::new();
        mock.close();
        assert!(matches!(
            Reader::open(Box::new(mock), Platform::GameboyClassic),
            Err(Error::PortClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_drains_pending_operations() {
        let (mock, _writes) = MockTransport::new();
        let reader = Reader::open(Box::new(mock), Platform::GameboyClassic).unwrap();
        let pending = reader.read(ReadContext::Header);
        // Close drains the queue, so the pending read still completes.
        assert!(reader.close().await);
        assert!(pending.wait().await.is_ok());
    }
}
