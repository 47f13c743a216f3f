use crate::command::Command;
use crate::coordinator::{Coordinator, Progress};
use crate::header::{HeaderLayout, RomHeaderFields};
use crate::transport::Transport;
use crate::{DumperConfig, Error, Result, Wait};
use chrono::{DateTime, Local};
use std::sync::mpsc::Sender;

/// What [`Dumper::run`] should do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Version,
    Header,
    /// `from == 0 && to == 0` asks for the whole cartridge.
    Dump { from: u32, to: u32 },
    Autodetect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    Error = -1,
    NotFound = 1,
}

/// Cartridge memory read by [`Dumper::dump`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dump {
    /// Range actually requested from the device.
    pub from: u32,
    pub to: u32,
    /// Raw header window, present when the range was derived from it.
    pub header: Option<Vec<u8>>,
    pub data: Vec<u8>,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Version(String),
    Header(Vec<u8>),
    Dump(Dump),
    Port(String),
}

/// Outcome of [`Dumper::run`], timestamps bracket the whole operation.
#[derive(Debug)]
pub struct OperationResult {
    pub operation: Operation,
    pub payload: Payload,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub code: ReturnCode,
    pub error: Option<Error>,
}

/// Drives the dumper firmware over a [`Transport`].
///
/// The port is opened and closed around every request, so a `Dumper` holds no OS
/// resources between operations.
pub struct Dumper<T: Transport> {
    transport: T,
    port: Option<String>,
    config: DumperConfig,
    coordinator: Coordinator,
    layout: Box<dyn HeaderLayout>,
}

impl<T: Transport> Dumper<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DumperConfig::default())
    }

    pub fn with_config(transport: T, config: DumperConfig) -> Self {
        Dumper {
            transport,
            port: None,
            config,
            coordinator: Coordinator::new(),
            layout: Box::new(RomHeaderFields),
        }
    }

    /// Replaces the parser that turns header bytes into a content range.
    pub fn with_layout<L: HeaderLayout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn set_port<S: Into<String>>(&mut self, port: S) {
        self.port = Some(port.into());
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn config(&self) -> &DumperConfig {
        &self.config
    }

    /// Channel receiving [`Progress`] events of subsequent operations.
    pub fn set_progress(&self, progress: Option<Sender<Progress>>) {
        self.coordinator.set_progress(progress);
    }

    /// Candidate ports as enumerated by the transport.
    pub fn ports(&self) -> Result<Vec<String>> {
        self.transport.ports()
    }

    /// One open, request, response, close cycle on the selected port.
    fn exchange(
        &mut self,
        command: Command,
        wait: Wait,
        report_progress: bool,
    ) -> Result<Vec<u8>> {
        let port = self.port.clone().ok_or(Error::NoPort)?;

        self.transport
            .open(&port, &self.config.line, self.coordinator.notifier())?;
        let res =
            self.coordinator
                .send_and_wait(&mut self.transport, &command, wait, report_progress);
        self.transport.close();

        res
    }

    /// Firmware identity string, or an empty string if the port can't be opened or nothing answers.
    pub fn get_version(&mut self) -> String {
        self.probe_version(true)
    }

    fn probe_version(&mut self, report_progress: bool) -> String {
        let wait = Wait::Total(self.config.version_timeout);

        match self.exchange(Command::Version, wait, report_progress) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                log::debug!("no version from {:?}: {}", self.port, e);
                String::new()
            }
        }
    }

    /// Raw header bytes, unparsed.
    pub fn get_header(&mut self) -> Result<Vec<u8>> {
        let wait = Wait::Total(self.config.header_timeout);

        self.exchange(Command::Header, wait, true)
    }

    /// Reads `[from, to]`, or the whole cartridge when both are zero.
    ///
    /// The whole-cartridge read first fetches the header window, derives the content range from it
    /// and reports a [`Progress::Header`] checkpoint before requesting the content itself.
    pub fn dump(&mut self, from: u32, to: u32) -> Result<Dump> {
        let started = Local::now();

        let (from, to, header) = if from == 0 && to == 0 {
            let (start, end) = self.config.header_window;
            let wait = Wait::Total(self.config.header_timeout);
            let header = self.exchange(Command::Dump { from: start, to: end }, wait, true)?;

            let (start, end) = self.layout.content_range(&header)?;
            // header stores a byte address, the firmware counts words
            let end = end >> 1;
            log::debug!("header gives content range 0x{:08X}..0x{:08X}", start, end);

            self.coordinator.report(Progress::Header {
                start,
                end,
                header: header.clone(),
            });

            (start, end, Some(header))
        } else {
            (from, to, None)
        };

        if from > to {
            return Err(Error::InvalidRange { from, to });
        }

        let wait = self.config.dump_wait;
        let data = self.exchange(Command::Dump { from, to }, wait, true)?;

        Ok(Dump {
            from,
            to,
            header,
            data,
            started,
            finished: Local::now(),
        })
    }

    /// Probes every candidate port with a version query and selects the first genuine dumper.
    ///
    /// Ports that fail to open or stay silent are skipped. When nothing matches, the previously
    /// selected port is kept.
    pub fn autodetect(&mut self) -> Result<String> {
        let ports = self.transport.ports()?;
        let previous = self.port.take();

        for port in ports {
            self.port = Some(port.clone());

            let version = self.probe_version(false);
            if version.starts_with(&self.config.firmware_id) {
                log::info!("found {} on {}", version.trim_end(), port);
                return Ok(port);
            }
            log::debug!("{} is not a dumper", port);
        }

        self.port = previous;
        Err(Error::NotFound)
    }

    /// Runs `operation` and folds its outcome into an [`OperationResult`].
    pub fn run(&mut self, operation: Operation) -> OperationResult {
        let started = Local::now();

        let outcome = match operation {
            Operation::Version => {
                let version = self.get_version();
                if version.is_empty() {
                    Err(Error::Timeout(self.config.version_timeout))
                } else {
                    Ok(Payload::Version(version))
                }
            }
            Operation::Header => self.get_header().map(Payload::Header),
            Operation::Dump { from, to } => self.dump(from, to).map(Payload::Dump),
            Operation::Autodetect => self.autodetect().map(Payload::Port),
        };

        let (payload, code, error) = match outcome {
            Ok(payload) => (payload, ReturnCode::Ok, None),
            Err(Error::NotFound) => (Payload::None, ReturnCode::NotFound, Some(Error::NotFound)),
            Err(e) => {
                log::warn!("{:?} failed: {}", operation, e);
                (Payload::None, ReturnCode::Error, Some(e))
            }
        };

        OperationResult {
            operation,
            payload,
            started,
            finished: Local::now(),
            code,
            error,
        }
    }
}
