use std::io::{self, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::settings::DeviceConfig;
use crate::zones::GradedColor;

const MAGIC: [u8; 3] = *b"Ada";
const CHECKSUM_KEY: u8 = 0x55;
const WRITE_TIMEOUT_BASE_MS: u64 = 100;
const WRITE_TIMEOUT_PER_BYTE_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[from] serialport::Error),
}

/// One AdaLight packet: `'A' 'd' 'a'`, LED count minus one (big endian),
/// checksum, then an RGB triple per LED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaLightFrame {
    bytes: Vec<u8>,
    led_count: usize,
}

impl AdaLightFrame {
    pub const HEADER_LEN: usize = 6;

    pub fn new(led_count: usize) -> Self {
        let count = (led_count.max(1) - 1) as u16;
        let [hi, lo] = count.to_be_bytes();

        let mut bytes = vec![0u8; Self::HEADER_LEN + led_count * 3];
        bytes[..3].copy_from_slice(&MAGIC);
        bytes[3] = hi;
        bytes[4] = lo;
        bytes[5] = hi ^ lo ^ CHECKSUM_KEY;

        Self { bytes, led_count }
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Fill the payload. Extra colors are dropped, missing ones are black.
    pub fn set_colors(&mut self, colors: &[GradedColor]) {
        let payload = &mut self.bytes[Self::HEADER_LEN..];
        for (i, rgb) in payload.chunks_exact_mut(3).enumerate() {
            let c = colors.get(i).copied().unwrap_or(GradedColor::OFF);
            rgb.copy_from_slice(&[c.r, c.g, c.b]);
        }
    }

    pub fn clear(&mut self) {
        self.bytes[Self::HEADER_LEN..].fill(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// AdaLight strip on a byte stream, normally a serial port.
///
/// Writes are fire-and-forget: timeouts are counted and dropped, any other
/// I/O error closes the stream so the owner sees the strip as disconnected.
pub struct AdaLight<W: Write = Box<dyn SerialPort>> {
    port: Option<W>,
    port_name: String,
    frame: AdaLightFrame,
    dropped_writes: u64,
}

impl AdaLight {
    /// Open the configured serial port (8N1) and blank the strip.
    pub fn open(device: &DeviceConfig) -> Result<Self, TransportError> {
        let led_count = device.led_count;
        let frame_len = (AdaLightFrame::HEADER_LEN + led_count * 3) as u64;
        let timeout =
            Duration::from_millis(WRITE_TIMEOUT_BASE_MS + WRITE_TIMEOUT_PER_BYTE_MS * frame_len);

        let port = serialport::new(&device.port, device.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: device.port.clone(),
                source,
            })?;

        let strip = Self::for_device(port, device);
        log::info!(
            "AdaLight interface initialized on serial port {} ({} baud, {} LEDs)",
            device.port,
            device.baud_rate,
            led_count
        );
        Ok(strip)
    }
}

impl<W: Write> AdaLight<W> {
    /// Frame every LED the device declares. Zones only cover an even count;
    /// a trailing odd LED stays black.
    pub fn for_device(writer: W, device: &DeviceConfig) -> Self {
        Self::with_writer(writer, device.led_count, &device.port)
    }

    /// Drive a strip over any writer. The strip is blanked immediately.
    pub fn with_writer(writer: W, led_count: usize, port_name: &str) -> Self {
        let mut strip = Self {
            port: Some(writer),
            port_name: port_name.to_string(),
            frame: AdaLightFrame::new(led_count),
            dropped_writes: 0,
        };
        strip.turn_off();
        strip
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn led_count(&self) -> usize {
        self.frame.led_count()
    }

    /// Writes that timed out or were interrupted since the port was opened.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    #[cfg(test)]
    pub fn writer(&self) -> Option<&W> {
        self.port.as_ref()
    }

    pub fn set_colors(&mut self, colors: &[GradedColor]) {
        if self.port.is_none() {
            return;
        }
        self.frame.set_colors(colors);
        self.write_frame();
    }

    pub fn turn_off(&mut self) {
        if self.port.is_none() {
            return;
        }
        self.frame.clear();
        self.write_frame();
    }

    pub fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("AdaLight disconnected from {}", self.port_name);
        }
    }

    fn write_frame(&mut self) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        match port.write_all(self.frame.as_bytes()) {
            Ok(()) => {}
            Err(e) if is_transient(&e) => {
                self.dropped_writes += 1;
                log::debug!("AdaLight: dropped frame on {}: {e}", self.port_name);
            }
            Err(e) => {
                log::error!("AdaLight: write to {} failed, closing: {e}", self.port_name);
                self.port = None;
            }
        }
    }
}

impl<W: Write> Drop for AdaLight<W> {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Names of the serial ports present on this machine.
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}
