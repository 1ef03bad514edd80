//! Serial transport binding for the CE102M.
//!
//! The meter speaks 9600 baud, 7 data bits, even parity, 1 stop bit.
//! Reads use a ~300 ms quiet-gap timeout: bytes are accumulated until
//! the line goes silent, and total silence comes back as an empty
//! buffer; the session treats that as a protocol timeout, not an
//! error.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use ce102m::{Result, Transport};

/// Fixed CE102M line parameters.
const BAUD_RATE: u32 = 9600;
/// Quiet-gap read timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(300);

/// Bounded-timeout transport over a serial line.
pub struct SerialTransport {
    port: SerialStream,
    path: String,
}

impl SerialTransport {
    /// Open the device with the meter's fixed 7E1 framing.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let mut port = tokio_serial::new(path, BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Seven)
            .parity(tokio_serial::Parity::Even)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(READ_TIMEOUT)
            .open_native_async()?;

        #[cfg(unix)]
        port.set_exclusive(false)?;

        debug!(path, baud = BAUD_RATE, "opened serial port");
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).await?;
        self.port.flush().await?;
        debug!(
            port = %self.path,
            hex_data = %hex(data),
            direction = "send",
            "raw packet"
        );
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut collected = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match timeout(READ_TIMEOUT, self.port.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => collected.extend_from_slice(&buf[..n]),
                Ok(Err(e)) => return Err(e.into()),
                // Quiet gap: the device is done talking (or never started).
                Err(_) => break,
            }
        }
        if !collected.is_empty() {
            debug!(
                port = %self.path,
                hex_data = %hex(&collected),
                direction = "recv",
                "raw packet"
            );
        }
        Ok(collected)
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
