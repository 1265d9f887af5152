use tokio::io::AsyncReadExt as _;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::LedgerSource;
use crate::prelude::*;

/// Maximum accepted frame, to keep a misbehaving peer from ballooning the
/// read buffer.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Reads the push stream of a consensus node: length-prefixed frames, each
/// carrying one encoded ledger record.
pub struct NodeSource {
    stream: TcpStream,
}

impl NodeSource {
    pub async fn connect(address: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|x| Error::upstream(format!("connecting to {address}: {x}")))?;

        info!(address, "connected to upstream node");

        Ok(Self { stream })
    }
}

#[async_trait::async_trait]
impl LedgerSource for NodeSource {
    async fn next_ledger(&mut self) -> Result<RawLedger, Error> {
        let len = self
            .stream
            .read_u32()
            .await
            .map_err(|x| Error::upstream(format!("reading frame header: {x}")))?;

        if len > MAX_FRAME_BYTES {
            return Err(Error::upstream(format!("oversized frame ({len} bytes)")));
        }

        let mut frame = vec![0u8; len as usize];
        self.stream
            .read_exact(&mut frame)
            .await
            .map_err(|x| Error::upstream(format!("reading frame body: {x}")))?;

        let ledger = RawLedger::decode(&frame).map_err(Error::parse)?;

        debug!(sequence = ledger.sequence, "ledger frame received");

        Ok(ledger)
    }
}
