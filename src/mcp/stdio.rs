//! Stdio binding: newline-delimited JSON-RPC over any async reader/writer.

use std::io;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Stdin, Stdout,
};
use tracing::trace;

use super::channel::McpChannel;
use super::protocol::{JsonRpcResponse, RpcError};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Line-oriented JSON transport
pub struct StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    reader: R,
    writer: BufWriter<W>,
}

impl StdioTransport<BufReader<Stdin>, Stdout> {
    /// Transport over the process stdin/stdout
    pub fn stdio() -> Self {
        Self::from_handles(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn from_handles(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: BufWriter::new(writer),
        }
    }

    /// Next non-empty line, or `None` at EOF
    pub async fn read_line(&mut self) -> TransportResult<Option<String>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                trace!("EOF on stdio input");
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    /// Write one message followed by a newline and flush
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> TransportResult<()> {
        let json = serde_json::to_string(message)?;
        trace!(message = %json, "Sending message");

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Serve one channel until EOF. Malformed lines get a parse error reply and
/// the loop keeps going.
pub async fn serve<R, W>(
    channel: &McpChannel,
    transport: &mut StdioTransport<R, W>,
) -> TransportResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(line) = transport.read_line().await? {
        let payload: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed stdio message");
                transport
                    .write_message(&JsonRpcResponse::error(None, RpcError::parse_error(e)))
                    .await?;
                continue;
            }
        };

        if let Some(reply) = channel.handle(payload).await {
            transport.write_message(&reply).await?;
        }
    }

    channel.close();
    Ok(())
}
