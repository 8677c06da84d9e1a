//! Transport layer abstraction
//!
//! The worker and the download protocol only see a [`Transport`]; the real
//! board sits behind [`serial::SerialTransport`], tests use an emulator.

use std::time::Duration;

use crate::error::Result;

/// Byte pipe to the board
pub trait Transport: Send {
    /// Write all bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever is available
    ///
    /// Waits up to `timeout` for the first byte, then returns everything
    /// that fits in `buf` without further waiting. Returns 0 on timeout.
    /// Any error means the connection is gone.
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_available(buf, timeout)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::error::SerialError;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};

    /// Serial port transport
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
        timeout: Duration,
    }

    impl SerialTransport {
        /// Open a serial port, 8N1 without flow control
        pub fn open(device: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(timeout)
                .open()?;

            // Whatever the board printed before we attached is stale
            port.clear(ClearBuffer::Input)?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port, timeout })
        }

        fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
            if timeout != self.timeout {
                self.port.set_timeout(timeout)?;
                self.timeout = timeout;
            }
            Ok(())
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.set_timeout(timeout)?;

            let mut n = match self.port.read(&mut buf[..1]) {
                Ok(0) => return Err(SerialError::ConnectionLost("end of stream".into())),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(0),
                Err(e) => return Err(SerialError::ConnectionLost(e.to_string())),
            };

            // Pick up the rest of a burst without waiting again
            let waiting = self.port.bytes_to_read()? as usize;
            if waiting > 0 {
                let end = buf.len().min(n + waiting);
                n += self
                    .port
                    .read(&mut buf[n..end])
                    .map_err(|e| SerialError::ConnectionLost(e.to_string()))?;
            }
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }
    }
}
