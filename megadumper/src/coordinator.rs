//! Turns the transport's asynchronous byte notifications into a blocking request/response call.
//!
//! The transport's reader thread feeds a [`FrameAccumulator`] behind a mutex. When the frame
//! completes it sets a flag under that same mutex and wakes the caller, so a completion that
//! happens before the caller starts waiting is still seen. The mutex is only held for each
//! read-modify-write step; the caller releases it while parked on the condition variable.

use crate::accumulator::FrameAccumulator;
use crate::command::{Command, Opcode};
use crate::transport::{Notify, Transport};
use crate::{Error, Result, Wait};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Events reported while an operation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Percentage of the current frame received. Restarts at 0 with every frame.
    Percent(u8),
    /// Header phase of a full dump finished, the content range has been derived.
    Header { start: u32, end: u32, header: Vec<u8> },
}

struct Transmission {
    acc: FrameAccumulator,
    complete: bool,
    last_activity: Instant,
    operation: Option<Opcode>,
    progress: Option<Sender<Progress>>,
}

struct Shared {
    state: Mutex<Transmission>,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Transmission> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Coordinator {
            shared: Arc::new(Shared {
                state: Mutex::new(Transmission {
                    acc: FrameAccumulator::new(),
                    complete: false,
                    last_activity: Instant::now(),
                    operation: None,
                    progress: None,
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// Where percentage and checkpoint events go. `None` drops them.
    pub fn set_progress(&self, progress: Option<Sender<Progress>>) {
        self.shared.lock().progress = progress;
    }

    /// Emits an event on the progress channel, if one is attached.
    pub fn report(&self, event: Progress) {
        if let Some(tx) = self.shared.lock().progress.as_ref() {
            // receiver gone just means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Callback to hand to [`Transport::open`].
    pub fn notifier(&self) -> Notify {
        let shared = self.shared.clone();

        Arc::new(move |data: &[u8]| {
            let mut tx = shared.lock();
            tx.last_activity = Instant::now();

            let feed = tx.acc.feed(data);
            log::trace!(
                "{:?}: +{} bytes, {} of {:?}",
                tx.operation,
                data.len(),
                tx.acc.received(),
                tx.acc.expected()
            );

            if let (Some(percent), Some(progress)) = (feed.progress, tx.progress.as_ref()) {
                let _ = progress.send(Progress::Percent(percent));
            }

            if feed.completed {
                tx.complete = true;
                shared.done.notify_all();
            }
        })
    }

    /// Drops any partial frame and arms a fresh transmission.
    pub fn reset(&self, operation: Option<Opcode>, report_progress: bool) {
        let mut tx = self.shared.lock();
        tx.acc.reset(report_progress);
        tx.complete = false;
        tx.last_activity = Instant::now();
        tx.operation = operation;
    }

    /// Writes `command` and blocks until a full response frame has arrived.
    ///
    /// [`Wait::Total`] is a hard budget starting once the command is written, [`Wait::Idle`] only
    /// bounds silence and is re-armed by each notification. A device that never answers yields
    /// [`Error::Timeout`], one that stops mid-frame [`Error::ProtocolViolation`].
    pub fn send_and_wait<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        command: &Command,
        wait: Wait,
        report_progress: bool,
    ) -> Result<Vec<u8>> {
        let data = command.encode()?;

        self.reset(Some(command.opcode()), report_progress);

        log::debug!("sending {:?} ({} bytes)", command, data.len());
        transport.write(&data)?;
        let sent = Instant::now();
        let bound = wait.duration();

        let mut tx = self.shared.lock();
        loop {
            if tx.complete {
                tx.complete = false;
                tx.operation = None;
                let payload = tx.acc.take();
                log::debug!("{:?} answered with {} bytes", command, payload.len());
                return Ok(payload);
            }

            let elapsed = match wait {
                Wait::Total(_) => sent.elapsed(),
                Wait::Idle(_) => tx.last_activity.elapsed(),
            };
            if elapsed >= bound {
                tx.operation = None;
                return Err(match tx.acc.expected() {
                    Some(expected) => Error::ProtocolViolation(format!(
                        "frame incomplete at {} of {} bytes",
                        tx.acc.received(),
                        expected
                    )),
                    None => Error::Timeout(bound),
                });
            }

            tx = self
                .shared
                .done
                .wait_timeout(tx, bound - elapsed)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
