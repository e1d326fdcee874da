use std::os::fd::{AsFd, OwnedFd};

use rustix::termios;

/// Saves a tty's mode and window size on construction, switches it to raw mode, and restores
/// both unconditionally on drop. Restoring on drop (rather than an explicit `restore` method)
/// means the terminal comes back sane even if the caller bails out early or panics.
///
/// Operates on a duplicated descriptor rather than borrowing the caller's, so holding a
/// `TerminalState` never conflicts with the caller also reading from or writing to the original
/// handle.
///
/// Constructing this over a file descriptor that isn't a tty is a no-op: `tcgetattr` fails,
/// nothing is saved, and drop has nothing to restore.
pub struct TerminalState {
    fd: OwnedFd,
    original_attrs: Option<termios::Termios>,
    original_winsize: Option<termios::Winsize>,
}

impl TerminalState {
    /// Captures `fd`'s current attributes and window size, then switches it to raw mode.
    pub fn enter_raw(fd: impl AsFd) -> std::io::Result<Self> {
        let fd = rustix::io::dup(fd)?;
        let original_attrs = termios::tcgetattr(fd.as_fd()).ok();
        let original_winsize = termios::tcgetwinsize(fd.as_fd()).ok();

        if let Some(ref attrs) = original_attrs {
            let mut raw = attrs.clone();
            raw.make_raw();
            // Best-effort: if this fails the terminal is left in its original mode, which is
            // the same state drop would restore it to anyway.
            let _ = termios::tcsetattr(fd.as_fd(), termios::OptionalActions::Now, &raw);
        }

        Ok(TerminalState {
            fd,
            original_attrs,
            original_winsize,
        })
    }

    /// The window size observed at construction, as `(columns, rows)`.
    pub fn winsize(&self) -> Option<(u16, u16)> {
        self.original_winsize
            .as_ref()
            .map(|winsize| (winsize.ws_col, winsize.ws_row))
    }
}

impl Drop for TerminalState {
    fn drop(&mut self) {
        if let Some(ref attrs) = self.original_attrs {
            // TCSADRAIN: wait for queued output to drain before applying, so a program that just
            // wrote its last bytes doesn't have them mangled by the mode switch.
            let _ = termios::tcsetattr(self.fd.as_fd(), termios::OptionalActions::Drain, attrs);
        }
        if let Some(winsize) = self.original_winsize {
            let _ = termios::tcsetwinsize(self.fd.as_fd(), winsize);
        }
    }
}
