use crate::command::Command;
use crate::transport::{Notify, Transport};
use crate::{swap, Error, LineConfig, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Answers a command with a payload, or `None` to stay silent.
pub type Responder = Box<dyn FnMut(Command) -> Option<Vec<u8>> + Send>;

/// Everything the mock saw, in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockLog {
    pub opened: Vec<String>,
    pub commands: Vec<(String, Command)>,
}

/// Prefixes `payload` with its length, the way the firmware frames every reply.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut data = swap::wire_bytes(payload.len() as u32).to_vec();
    data.extend_from_slice(payload);
    data
}

/// Scripted [`Transport`]: each port is either a responder or listed but unopenable.
///
/// Replies are delivered from a separate thread in `chunk` sized pieces, like a real reader thread would.
/// Closing the port stops any delivery still in flight.
pub struct MockTransport {
    ports: Vec<String>,
    devices: HashMap<String, Responder>,
    chunk: usize,
    delay: Duration,
    limit: Option<usize>,
    log: Arc<Mutex<MockLog>>,
    current: Option<(String, Notify)>,
    live: Arc<AtomicBool>,
    pending: Vec<JoinHandle<()>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            ports: vec![],
            devices: HashMap::new(),
            chunk: 64,
            delay: Duration::from_millis(0),
            limit: None,
            log: Arc::new(Mutex::new(MockLog::default())),
            current: None,
            live: Arc::new(AtomicBool::new(false)),
            pending: vec![],
        }
    }

    pub fn port<S, F>(mut self, name: S, responder: F) -> Self
    where
        S: Into<String>,
        F: FnMut(Command) -> Option<Vec<u8>> + Send + 'static,
    {
        let name = name.into();
        self.ports.push(name.clone());
        self.devices.insert(name, Box::new(responder));
        self
    }

    /// A port that enumerates but fails to open, like a busy or vanished device.
    pub fn absent_port<S: Into<String>>(mut self, name: S) -> Self {
        self.ports.push(name.into());
        self
    }

    pub fn chunk_size(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Pause between delivered chunks.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cuts every framed reply after `bytes`, simulating a device that stalls mid-frame.
    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.limit = Some(bytes);
        self
    }

    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }

    fn record(&self, f: impl FnOnce(&mut MockLog)) {
        if let Ok(mut log) = self.log.lock() {
            f(&mut log);
        }
    }
}

impl Transport for MockTransport {
    fn ports(&self) -> Result<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn open(&mut self, port: &str, _config: &LineConfig, notify: Notify) -> Result<()> {
        self.close();
        self.record(|log| log.opened.push(port.into()));

        if !self.devices.contains_key(port) {
            return Err(Error::PortUnavailable {
                port: port.into(),
                reason: "no such device".into(),
            });
        }

        self.current = Some((port.into(), notify));
        self.live = Arc::new(AtomicBool::new(true));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let (port, notify) = match &self.current {
            Some((port, notify)) => (port.clone(), notify.clone()),
            None => return Err(Error::Io(ErrorKind::NotConnected.into())),
        };

        let command = Command::parse(data)?;
        self.record(|log| log.commands.push((port.clone(), command)));

        let reply = match self.devices.get_mut(&port) {
            Some(responder) => responder(command),
            None => None,
        };

        if let Some(payload) = reply {
            let mut data = frame(&payload);
            if let Some(limit) = self.limit {
                data.truncate(limit);
            }
            let chunk = self.chunk;
            let delay = self.delay;
            let live = self.live.clone();

            self.pending.push(thread::spawn(move || {
                for piece in data.chunks(chunk) {
                    if delay > Duration::from_millis(0) {
                        thread::sleep(delay);
                    }
                    if !live.load(Ordering::Acquire) {
                        break;
                    }
                    (*notify)(piece);
                }
            }));
        }

        Ok(())
    }

    fn close(&mut self) {
        self.live.store(false, Ordering::Release);
        for handle in self.pending.drain(..) {
            let _ = handle.join();
        }
        self.current = None;
    }
}
