use crate::{Error, LineConfig, Result};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Callback invoked from the transport's own thread whenever bytes arrive.
pub type Notify = Arc<dyn Fn(&[u8]) + Send + Sync>;

///trait to implement byte links to the dumper
pub trait Transport: Send {
    /// Candidate port names, in enumeration order.
    fn ports(&self) -> Result<Vec<String>>;
    /// Opens `port` and starts delivering incoming bytes to `notify`.
    fn open(&mut self, port: &str, config: &LineConfig, notify: Notify) -> Result<()>;
    fn write(&mut self, data: &[u8]) -> Result<()>;
    /// Stops notifications and releases the port. Closing a closed transport is a no-op.
    fn close(&mut self);
}

// poll interval of the reader thread, bounds how long close() blocks
const READ_POLL: Duration = Duration::from_millis(50);

struct Reader {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// [`Transport`] over a native serial port.
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    reader: Option<Reader>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for SerialTransport {
    fn ports(&self) -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;

        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&mut self, port: &str, config: &LineConfig, notify: Notify) -> Result<()> {
        self.close();

        let unavailable = |e: serialport::Error| Error::PortUnavailable {
            port: port.into(),
            reason: e.description,
        };

        let serial = serialport::new(port, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .timeout(config.timeout)
            .open()
            .map_err(unavailable)?;

        let mut rx = serial.try_clone().map_err(unavailable)?;
        rx.set_timeout(READ_POLL).map_err(unavailable)?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let name = port.to_string();

        let handle = std::thread::Builder::new()
            .name(format!("megadumper-rx {}", port))
            .spawn(move || {
                let mut buf = [0_u8; 4096];

                while flag.load(Ordering::Acquire) {
                    match rx.read(&mut buf) {
                        Ok(0) => {}
                        Ok(n) => {
                            log::trace!("{}: {} bytes", name, n);
                            (*notify)(&buf[..n]);
                        }
                        Err(ref e) if e.kind() == ErrorKind::TimedOut => {}
                        Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                        Err(e) => {
                            log::warn!("{}: read failed, stopping reader: {}", name, e);
                            break;
                        }
                    }
                }
            })?;

        log::debug!("opened {} at {} baud", port, config.baud_rate);
        self.port = Some(serial);
        self.reader = Some(Reader { running, handle });

        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| Error::Io(ErrorKind::NotConnected.into()))?;

        port.write_all(data).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => Error::Timeout(port.timeout()),
            _ => Error::Io(e),
        })?;
        port.flush()?;

        Ok(())
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.running.store(false, Ordering::Release);
            if reader.handle.join().is_err() {
                log::warn!("serial reader thread panicked");
            }
        }
        if let Some(port) = self.port.take() {
            log::debug!("closed {}", port.name().unwrap_or_default());
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
