//! The byte-level collaborator underneath the line protocol.

use serial2::SerialPort;
use std::{io, path::PathBuf, time::Duration};

/// `Transport`
///
/// A bidirectional byte pipe to the ramp controller. Reads never block for
/// long: [`Transport::read_available`] hands back whatever is waiting and
/// returns `Ok(0)` when nothing is, so the caller stays in charge of its
/// own deadlines.
pub trait Transport {
    /// Copy the bytes that are waiting into `buf`, returning how many.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write every byte of `bytes` to the device.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Throw away anything the device sent that has not been read yet.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// A [`Transport`] over a serial port.
pub struct SerialTransport {
    port: SerialPort,
}

impl SerialTransport {
    /// Open `device` at `baud_rate`. Reads wait at most `poll_interval`
    /// before reporting that nothing arrived.
    pub fn open(device: &str, baud_rate: u32, poll_interval: Duration) -> io::Result<Self> {
        let mut port = SerialPort::open(device, baud_rate)?;
        port.set_read_timeout(poll_interval)?;
        Ok(Self { port })
    }

    /// Lists the serial devices the operating system knows about.
    pub fn available_ports() -> io::Result<Vec<PathBuf>> {
        SerialPort::available_ports()
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.discard_input_buffer()
    }
}
