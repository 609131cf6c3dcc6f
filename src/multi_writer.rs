//! MultiProcessWriter: readiness-poll multiplexer across many
//! child stdins.

use crate::{error::CrateResult, process_writer::ProcessWriter};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::{
    cell::RefCell,
    collections::HashMap,
    os::fd::{AsFd, BorrowedFd, RawFd},
    rc::Rc,
    time::Duration,
};

/// The host's atomic pipe-write granularity. POSIX guarantees writes of
/// at most this size are atomic; the writer must never attempt a single
/// write larger than this.
pub const PIPE_BUF: usize = 4096;

pub type SharedWriter = Rc<RefCell<ProcessWriter>>;

/// Wraps a POLLOUT poller keyed by stdin file descriptor. A writer is
/// registered iff it has pending bytes and has not errored.
pub struct MultiProcessWriter {
    registered: HashMap<RawFd, SharedWriter>,
}

impl Default for MultiProcessWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiProcessWriter {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
        }
    }

    /// Registers `writer` for POLLOUT unless it's already done writing.
    pub fn add(&mut self, writer: SharedWriter) {
        let done = writer.borrow().done_writing();
        if done {
            return;
        }
        if let Some(fd) = writer.borrow().fileno() {
            self.registered.insert(fd, writer.clone());
        }
    }

    /// Polls with the given timeout (`None` blocks indefinitely) and
    /// drives a `write(PIPE_BUF)` on every descriptor that comes back
    /// ready, unregistering any that finish as a result. Tolerates
    /// spurious readiness and partial writes — `ProcessWriter::write`
    /// already handles both.
    pub fn write_ready(&mut self, timeout: Option<Duration>) -> CrateResult<()> {
        if self.registered.is_empty() {
            return Ok(());
        }

        let fds: Vec<RawFd> = self.registered.keys().copied().collect();
        let borrowed: Vec<BorrowedFd> = fds
            .iter()
            .map(|&fd| unsafe { BorrowedFd::borrow_raw(fd) })
            .collect();
        let mut poll_fds: Vec<PollFd> = borrowed
            .iter()
            .map(|fd| PollFd::new(fd.as_fd(), PollFlags::POLLOUT))
            .collect();

        let poll_timeout: PollTimeout = match timeout {
            None => PollTimeout::NONE,
            Some(d) => PollTimeout::from(d.as_millis().min(u16::MAX as u128) as u16),
        };
        poll(&mut poll_fds, poll_timeout).map_err(std::io::Error::from)?;

        let mut finished = Vec::new();
        for (fd, pfd) in fds.iter().zip(poll_fds.iter()) {
            let ready = pfd
                .revents()
                .map(|flags| flags.intersects(PollFlags::POLLOUT | PollFlags::POLLERR | PollFlags::POLLHUP))
                .unwrap_or(false);
            if !ready {
                continue;
            }
            if let Some(writer) = self.registered.get(fd) {
                writer.borrow_mut().write(PIPE_BUF);
                if writer.borrow().done_writing() {
                    finished.push(*fd);
                }
            }
        }
        for fd in finished {
            self.registered.remove(&fd);
        }
        Ok(())
    }

    pub fn writing_count(&self) -> usize {
        self.registered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_ready_is_a_noop_with_nothing_registered() {
        let mut multi = MultiProcessWriter::new();
        assert_eq!(multi.writing_count(), 0);
        multi.write_ready(Some(Duration::from_millis(1))).unwrap();
        assert_eq!(multi.writing_count(), 0);
    }
}
