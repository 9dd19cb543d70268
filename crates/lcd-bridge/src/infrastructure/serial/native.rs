//! [`DeviceOpener`] backed by the `serialport` crate.
//!
//! The port is opened 8N1 with a read timeout, then cloned so the reader
//! and the writer each own an OS handle.  Lines are read through a
//! `BufReader`; bytes it has already buffered count as "waiting".

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

use serialport::SerialPort;

use crate::application::device::{
    DeviceOpener, LinkError, SerialChannels, SerialReader, SerialWriter,
};

/// Opens real serial ports.
#[derive(Debug, Clone, Copy)]
pub struct NativeOpener {
    read_timeout: Duration,
}

impl NativeOpener {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl DeviceOpener for NativeOpener {
    fn open(&self, path: &Path, baud_rate: u32) -> Result<SerialChannels, LinkError> {
        let open_failed = |e: serialport::Error| LinkError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let name = path.to_string_lossy();
        let port = serialport::new(name.as_ref(), baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(open_failed)?;
        let read_half = port.try_clone().map_err(open_failed)?;

        Ok(SerialChannels {
            reader: Box::new(PortReader {
                port: BufReader::new(read_half),
            }),
            writer: Box::new(PortWriter { port }),
        })
    }
}

struct PortReader {
    port: BufReader<Box<dyn SerialPort>>,
}

impl SerialReader for PortReader {
    fn bytes_waiting(&mut self) -> io::Result<u32> {
        let buffered = self.port.buffer().len() as u32;
        let pending = self.port.get_ref().bytes_to_read()?;
        Ok(buffered + pending)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        match self.port.read_until(b'\n', &mut line) {
            Ok(_) => Ok(line),
            // partial line; read_until keeps what it consumed
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(line),
            Err(e) => Err(e),
        }
    }
}

struct PortWriter {
    port: Box<dyn SerialPort>,
}

impl SerialWriter for PortWriter {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn set_reset_line(&mut self, asserted: bool) -> io::Result<()> {
        self.port.write_data_terminal_ready(asserted)?;
        Ok(())
    }
}
