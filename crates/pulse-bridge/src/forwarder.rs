// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peripheral forwarder
//!
//! Relays each decoded value to the actuating peripheral over a
//! line-oriented text protocol:
//!
//! ```text
//! -> SEND 72\n
//! <- zero or more acknowledgement lines, until the peripheral goes quiet
//! ```

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_serial::SerialPortBuilderExt;

/// Forwarding errors. Never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("write to peripheral failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read from peripheral failed: {0}")]
    Read(#[source] std::io::Error),
}

/// Relays a single value to the actuating peripheral.
#[async_trait]
pub trait Forwarder: Send {
    /// Send `value` and consume the peripheral's acknowledgements.
    async fn forward(&mut self, value: u32) -> Result<(), ForwardError>;
}

/// Serial-port forwarder
///
/// Opens the port for every call; the port is closed when the call returns.
pub struct SerialForwarder {
    port: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialForwarder {
    pub fn new(port: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout,
        }
    }
}

#[async_trait]
impl Forwarder for SerialForwarder {
    async fn forward(&mut self, value: u32) -> Result<(), ForwardError> {
        let port = tokio_serial::new(&self.port, self.baud_rate)
            .open_native_async()
            .map_err(|source| ForwardError::Open {
                port: self.port.clone(),
                source,
            })?;

        let acks = exchange(port, value, self.read_timeout).await?;
        tracing::trace!("Forwarded {} to {} ({} acks)", value, self.port, acks);
        Ok(())
    }
}

/// Forwarder that accepts every value without touching any device.
#[derive(Debug, Default)]
pub struct NullForwarder;

#[async_trait]
impl Forwarder for NullForwarder {
    async fn forward(&mut self, value: u32) -> Result<(), ForwardError> {
        tracing::trace!("Discarding forward of {}", value);
        Ok(())
    }
}

/// Write one `SEND` command and read replies until silence.
///
/// Stops on read timeout, end of stream, or a blank line. Returns the number
/// of acknowledgement lines seen.
pub async fn exchange<S>(stream: S, value: u32, read_timeout: Duration) -> Result<usize, ForwardError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    let command = format!("SEND {}\n", value);
    stream
        .get_mut()
        .write_all(command.as_bytes())
        .await
        .map_err(ForwardError::Write)?;
    stream.get_mut().flush().await.map_err(ForwardError::Write)?;

    let mut acks = 0;
    let mut line = String::new();
    loop {
        line.clear();
        match tokio::time::timeout(read_timeout, stream.read_line(&mut line)).await {
            // Peripheral went quiet
            Err(_) => break,
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let reply = line.trim();
                if reply.is_empty() {
                    break;
                }
                tracing::info!("Peripheral replied: {}", reply);
                acks += 1;
            }
            Ok(Err(e)) => return Err(ForwardError::Read(e)),
        }
    }

    Ok(acks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_exchange_writes_command_and_counts_acks() {
        let (client, server) = duplex(256);

        let peripheral = tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut request = String::new();
            server.read_line(&mut request).await.unwrap();
            server
                .get_mut()
                .write_all(b"OK 72\nLED ON\n")
                .await
                .unwrap();
            // Stay connected but silent until the client gives up.
            tokio::time::sleep(TIMEOUT * 4).await;
            request
        });

        let acks = exchange(client, 72, TIMEOUT).await.unwrap();
        assert_eq!(acks, 2);
        assert_eq!(peripheral.await.unwrap(), "SEND 72\n");
    }

    #[tokio::test]
    async fn test_exchange_stops_on_blank_line() {
        let (client, server) = duplex(256);

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut request = String::new();
            server.read_line(&mut request).await.unwrap();
            server
                .get_mut()
                .write_all(b"OK\n\nLATE\n")
                .await
                .unwrap();
            tokio::time::sleep(TIMEOUT * 4).await;
        });

        assert_eq!(exchange(client, 60, TIMEOUT).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exchange_stops_on_eof() {
        let (client, server) = duplex(256);

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut request = String::new();
            server.read_line(&mut request).await.unwrap();
            server.get_mut().write_all(b"BYE\n").await.unwrap();
            // Dropping the server half closes the stream.
        });

        assert_eq!(exchange(client, 61, Duration::from_secs(5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exchange_silent_peripheral() {
        let (client, _server) = duplex(256);
        assert_eq!(exchange(client, 99, TIMEOUT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exchange_write_failure() {
        let (client, server) = duplex(256);
        drop(server);

        let err = exchange(client, 70, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ForwardError::Write(_)));
    }

    #[tokio::test]
    async fn test_exchange_invalid_utf8_reply() {
        let (client, server) = duplex(256);

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut request = String::new();
            server.read_line(&mut request).await.unwrap();
            server.get_mut().write_all(b"\xff\xfe\n").await.unwrap();
            tokio::time::sleep(TIMEOUT * 4).await;
        });

        let err = exchange(client, 73, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ForwardError::Read(_)));
    }

    #[tokio::test]
    async fn test_serial_forwarder_missing_port() {
        let mut forwarder =
            SerialForwarder::new("/dev/pulse-bridge-does-not-exist", 9600, TIMEOUT);

        let err = forwarder.forward(72).await.unwrap_err();
        assert!(matches!(err, ForwardError::Open { .. }));
    }

    #[tokio::test]
    async fn test_null_forwarder() {
        assert!(NullForwarder.forward(1).await.is_ok());
    }
}
