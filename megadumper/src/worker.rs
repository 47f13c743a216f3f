use crate::coordinator::Progress;
use crate::dumper::{Dumper, Operation, OperationResult};
use crate::transport::Transport;
use crate::Result;
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

/// An operation running on its own thread.
pub struct Job<T: Transport> {
    /// Progress of the operation. Disconnects once the operation has finished.
    pub progress: Receiver<Progress>,
    handle: JoinHandle<(Dumper<T>, OperationResult)>,
}

impl<T: Transport> Job<T> {
    /// Waits for the operation and hands the dumper back.
    pub fn join(self) -> thread::Result<(Dumper<T>, OperationResult)> {
        self.handle.join()
    }
}

/// Runs `operation` in the background, reporting progress on [`Job::progress`].
pub fn spawn<T: Transport + 'static>(dumper: Dumper<T>, operation: Operation) -> Result<Job<T>> {
    let (tx, rx) = channel();
    dumper.set_progress(Some(tx));

    let handle = thread::Builder::new()
        .name("megadumper-worker".into())
        .spawn(move || {
            let mut dumper = dumper;
            let result = dumper.run(operation);
            dumper.set_progress(None);
            (dumper, result)
        })?;

    Ok(Job {
        progress: rx,
        handle,
    })
}
