//! TCP recognition backend speaking newline-delimited JSON.

use super::protocol::{ClientMessage, RecognizeResponse};
use super::{BackendError, BackendStream, RecognitionConfig, TranscriptionBackend};
use crate::config::Config;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

/// Connects one TCP connection per recognition stream.
#[derive(Debug, Clone)]
pub struct TcpBackend {
    address: String,
    connect_timeout: Duration,
}

impl TcpBackend {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.backend.address.clone(),
            Duration::from_millis(config.backend.connect_timeout_ms),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for TcpBackend {
    type Stream = TcpBackendStream;

    async fn open(&self, config: &RecognitionConfig) -> Result<TcpBackendStream, BackendError> {
        let socket = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| BackendError::Connect {
                message: format!(
                    "Timed out connecting to {} after {}ms",
                    self.address,
                    self.connect_timeout.as_millis()
                ),
            })?
            .map_err(|e| BackendError::Connect {
                message: format!("{}: {}", self.address, e),
            })?;

        socket.set_nodelay(true)?;
        let (reader, writer) = socket.into_split();
        let mut stream = TcpBackendStream {
            reader: BufReader::new(reader),
            writer,
            half_closed: false,
        };

        let handshake =
            ClientMessage::config(config.sample_rate, config.channels, &config.language);
        stream.send(&handshake).await?;
        debug!(address = %self.address, "Sent recognition config");

        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// One TCP recognition stream.
pub struct TcpBackendStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    half_closed: bool,
}

impl TcpBackendStream {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), BackendError> {
        let mut line = message.to_json().map_err(|e| BackendError::Protocol {
            message: format!("Failed to serialize message: {}", e),
        })?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackendStream for TcpBackendStream {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), BackendError> {
        if self.half_closed {
            return Err(BackendError::Closed);
        }
        self.send(&ClientMessage::audio(pcm)).await
    }

    async fn half_close(&mut self) -> Result<(), BackendError> {
        if self.half_closed {
            return Ok(());
        }
        self.writer.shutdown().await?;
        self.half_closed = true;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<RecognizeResponse>, BackendError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return RecognizeResponse::from_json(trimmed)
                .map(Some)
                .map_err(|e| BackendError::Protocol {
                    message: format!("Failed to parse response: {}", e),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_sends_config_line_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let backend = TcpBackend::new(address, Duration::from_secs(1));
        let mut stream = backend.open(&RecognitionConfig::default()).await.unwrap();
        stream.write(&[1, 2, 3]).await.unwrap();
        stream.half_close().await.unwrap();

        let lines = server.await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""type":"config""#));
        assert!(lines[0].contains(r#""language_code":"en-US""#));
        assert_eq!(lines[1], r#"{"type":"audio","content":"AQID"}"#);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let backend = TcpBackend::new(address, Duration::from_secs(1));
        let result = backend.open(&RecognitionConfig::default()).await;
        assert!(matches!(result, Err(BackendError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_write_after_half_close_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move { listener.accept().await });

        let backend = TcpBackend::new(address, Duration::from_secs(1));
        let mut stream = backend.open(&RecognitionConfig::default()).await.unwrap();
        stream.half_close().await.unwrap();
        assert!(matches!(stream.write(&[0]).await, Err(BackendError::Closed)));
    }

    #[test]
    fn test_from_config() {
        let config = Config::default();
        let backend = TcpBackend::from_config(&config);
        assert_eq!(backend.address(), "127.0.0.1:50051");
        assert_eq!(backend.connect_timeout, Duration::from_millis(5000));
    }
}
