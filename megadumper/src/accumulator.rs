//! Reassembles one length-prefixed response frame from arbitrarily fragmented reads.

use crate::swap;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Fewer than 4 bytes of a fresh stream seen.
    AwaitingLength,
    /// Prefix consumed, `expected` payload bytes announced.
    ReceivingPayload { expected: usize },
    /// Frame delivered; further bytes are ignored until reset.
    Complete { expected: usize },
}

/// What a single notification did to the frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Feed {
    /// Percentage to report, if any.
    pub progress: Option<u8>,
    /// The frame became complete with this notification. Raised at most once per frame.
    pub completed: bool,
}

#[derive(Debug)]
pub struct FrameAccumulator {
    buffer: Vec<u8>,
    state: State,
    report_progress: bool,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        FrameAccumulator {
            buffer: Vec::new(),
            state: State::AwaitingLength,
            report_progress: true,
        }
    }

    /// Back to AwaitingLength with an empty buffer. `report_progress` is false while autodetecting.
    pub fn reset(&mut self, report_progress: bool) {
        self.buffer.clear();
        self.state = State::AwaitingLength;
        self.report_progress = report_progress;
    }

    pub fn feed(&mut self, data: &[u8]) -> Feed {
        let mut feed = Feed::default();

        if let State::Complete { expected } = self.state {
            log::warn!(
                "ignoring {} bytes after a complete {} byte frame",
                data.len(),
                expected
            );
            return feed;
        }

        self.buffer.extend_from_slice(data);

        match self.state {
            State::AwaitingLength => {
                if self.buffer.len() < LENGTH_PREFIX {
                    return feed;
                }

                // the prefix is exactly 4 bytes, the read cannot fail
                let expected = swap::wire_u32(&self.buffer, 0).unwrap_or(0) as usize;
                self.buffer.drain(..LENGTH_PREFIX);
                log::debug!("frame announces {} bytes", expected);

                self.state = State::ReceivingPayload { expected };
                if self.report_progress {
                    feed.progress = Some(0);
                }
            }
            State::ReceivingPayload { expected } => {
                if self.report_progress {
                    feed.progress = Some(percent(self.buffer.len(), expected));
                }
            }
            State::Complete { .. } => {}
        }

        if let State::ReceivingPayload { expected } = self.state {
            if self.buffer.len() >= expected {
                if self.buffer.len() > expected {
                    log::warn!(
                        "dropping {} trailing bytes",
                        self.buffer.len() - expected
                    );
                    self.buffer.truncate(expected);
                }
                self.state = State::Complete { expected };
                feed.completed = true;
            }
        }

        feed
    }

    /// Announced payload size, once the prefix has arrived.
    pub fn expected(&self) -> Option<usize> {
        match self.state {
            State::AwaitingLength => None,
            State::ReceivingPayload { expected } | State::Complete { expected } => Some(expected),
        }
    }

    /// Payload bytes received so far.
    pub fn received(&self) -> usize {
        match self.state {
            State::AwaitingLength => 0,
            _ => self.buffer.len(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete { .. })
    }

    /// Hands out the payload, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

fn percent(received: usize, expected: usize) -> u8 {
    if expected == 0 {
        return 100;
    }
    (received.saturating_mul(100) / expected).min(100) as u8
}
