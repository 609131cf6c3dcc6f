//! ProcessWriter: buffered, non-blocking stdin writes for one
//! spawned child, with separator insertion.

use crate::error::{CrateError, Err};
use std::{
    io::{self, Write},
    os::fd::{AsFd, AsRawFd, RawFd},
    process::{Child, ChildStdin, Command, Stdio},
};

pub type TokenIter = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// One spawned child's non-blocking stdin writer. Lifecycle: Created ->
/// Writing -> DoneWriting -> Reaped. Transitions are monotonic.
pub struct ProcessWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    source: TokenIter,
    separator: Option<u8>,
    buffer: Vec<u8>,
    write_error: Option<io::Error>,
    returncode: Option<i32>,
}

impl ProcessWriter {
    /// Spawns `argv[0]` with `argv[1..]` as arguments, wires stdin as a
    /// pipe, and attempts an initial buffer refill. If the source is
    /// empty, stdin is closed immediately. Spawn failure is wrapped as
    /// `UserCommandError(argv[0])`.
    pub fn spawn(argv: &[String], source: TokenIter, separator: Option<u8>) -> Result<Self, CrateError> {
        let program = argv.first().cloned().unwrap_or_default();
        let mut child = Command::new(&program)
            .args(argv.get(1..).unwrap_or(&[]))
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| CrateError::from(Err::UserCommand { program, source }))?;

        let stdin = child.stdin.take();
        if let Some(ref s) = stdin {
            set_nonblocking(s.as_fd().as_raw_fd())?;
        }

        let mut writer = Self {
            child,
            stdin,
            source,
            separator,
            buffer: Vec::new(),
            write_error: None,
            returncode: None,
        };
        if !writer.fill_buffer() {
            writer.close_stdin();
        }
        Ok(writer)
    }

    fn fill_buffer(&mut self) -> bool {
        match self.source.next() {
            None => false,
            Some(mut token) => {
                if let Some(sep) = self.separator {
                    token.push(sep);
                }
                self.buffer.extend_from_slice(&token);
                true
            }
        }
    }

    fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Pulls tokens into the buffer until it holds at least `nbytes` or
    /// the source is exhausted, slices off up to `nbytes`, attempts a
    /// single non-blocking write, and retains any remainder.
    pub fn write(&mut self, nbytes: usize) {
        if self.done_writing() {
            return;
        }
        while self.buffer.len() < nbytes && self.fill_buffer() {}

        let take = nbytes.min(self.buffer.len());
        let chunk: Vec<u8> = self.buffer.drain(..take).collect();

        if !chunk.is_empty() {
            if let Some(stdin) = self.stdin.as_mut() {
                match stdin.write(&chunk) {
                    Ok(n) => {
                        // Retain whatever a short non-blocking write
                        // didn't accept.
                        if n < chunk.len() {
                            let mut remainder = chunk[n..].to_vec();
                            remainder.extend_from_slice(&self.buffer);
                            self.buffer = remainder;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        // Spurious readiness: nothing written, keep the chunk.
                        let mut remainder = chunk;
                        remainder.extend_from_slice(&self.buffer);
                        self.buffer = remainder;
                    }
                    Err(e) => self.write_error = Some(e),
                }
            }
        }

        if self.write_error.is_some() || (self.buffer.is_empty() && !self.fill_buffer()) {
            self.close_stdin();
        }
    }

    pub fn done_writing(&self) -> bool {
        self.stdin.is_none()
    }

    /// Samples the child's status without blocking, latching the return
    /// code once observed.
    pub fn poll(&mut self) -> Option<i32> {
        if self.returncode.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.returncode = Some(status.code().unwrap_or(-1));
            }
        }
        self.returncode
    }

    /// True iff no write error occurred and the child exited zero.
    pub fn success(&mut self) -> bool {
        self.write_error.is_none() && self.poll() == Some(0)
    }

    pub fn fileno(&self) -> Option<RawFd> {
        self.stdin.as_ref().map(|s| s.as_fd().as_raw_fd())
    }
}

#[cfg(unix)]
fn set_nonblocking(fd: RawFd) -> Result<(), CrateError> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io_from_errno)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io_from_errno)?;
    Ok(())
}

#[cfg(unix)]
fn io_from_errno(e: nix::errno::Errno) -> CrateError {
    io::Error::from_raw_os_error(e as i32).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(v: &[&str]) -> TokenIter {
        let v: Vec<Vec<u8>> = v.iter().map(|s| s.as_bytes().to_vec()).collect();
        Box::new(v.into_iter())
    }

    #[test]
    fn empty_source_closes_stdin_immediately() {
        let mut w = ProcessWriter::spawn(&["true".to_string()], tokens(&[]), Some(0)).unwrap();
        assert!(w.done_writing());
        // Allow the child to exit before polling in CI-constrained envs.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(w.success());
    }

    #[test]
    fn missing_binary_is_a_user_command_error() {
        let err =
            ProcessWriter::spawn(&["no-such-binary-xyz".to_string()], tokens(&[]), None)
                .unwrap_err();
        assert_eq!(err.categorize().to_string(), "UserCommand");
        // The underlying ENOENT must still be visible, not discarded.
        assert!(err.to_string().contains("no-such-binary-xyz"));
    }

    #[test]
    fn separator_is_appended_after_every_token_including_last() {
        let mut w = ProcessWriter::spawn(
            &["cat".to_string()],
            tokens(&["a", "b"]),
            Some(0),
        )
        .unwrap();
        while !w.done_writing() {
            w.write(4096);
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(w.success());
    }
}
