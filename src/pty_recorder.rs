use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::time::Instant;

use alacritty_terminal::event::WindowSize;
use alacritty_terminal::tty::{self, ChildEvent, EventedPty, EventedReadWrite, Pty, Shell};
use rustix::event::{PollFd, PollFlags};

use termsnap_lib::{CastEvent, CastHeader, CastWriter, EventKind};

use crate::utf8_decoder::Utf8IncrementalDecoder;

/// Forks `command` under a PTY sized to `(columns, rows)` and multiplexes I/O between it and
/// the given input/output fds, writing the recorded header and output events through `writer`
/// as they are produced.
///
/// `input` carries the user's keystrokes to the child; `output` is where the child's own output
/// is echoed back (so a record session looks exactly like running the command directly).
pub fn record_session<I, O, W>(
    command: String,
    args: Vec<String>,
    columns: u16,
    rows: u16,
    input: &mut I,
    output: &mut O,
    writer: &mut CastWriter<W>,
) -> anyhow::Result<()>
where
    I: Read + AsFd,
    O: Write,
    W: Write,
{
    writer.write_header(&CastHeader::new(columns as u32, rows as u32))?;

    let mut pty = tty::new(
        &tty::Options {
            shell: Some(Shell::new(command, args)),
            working_directory: None,
            hold: false,
            env: HashMap::new(),
        },
        WindowSize {
            num_lines: rows,
            num_cols: columns,
            cell_width: 1,
            cell_height: 1,
        },
        0,
    )?;

    let t0 = Instant::now();
    let mut decoder = Utf8IncrementalDecoder::new();
    let mut input_buf = [0u8; 1024];
    let mut output_buf = [0u8; 1024];

    'outer: loop {
        if let Some(ChildEvent::Exited(_)) = pty.next_child_event() {
            break;
        }

        let ready = crate::poll::poll(
            [
                Some(PollFd::from_borrowed_fd(input.as_fd(), PollFlags::IN)),
                Some(PollFd::from_borrowed_fd(pty.file().as_fd(), PollFlags::IN)),
            ],
            None,
        );
        let ready = match ready {
            Ok(ready) => ready,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        if ready[0] {
            match input.read(&mut input_buf) {
                Ok(0) | Err(_) => break 'outer,
                Ok(n) => pty.writer().write_all(&input_buf[..n])?,
            }
        }

        if ready[1] {
            let read = pty.reader().read(&mut output_buf);
            match read {
                Ok(0) | Err(_) => break 'outer,
                Ok(n) => {
                    output.write_all(&output_buf[..n])?;

                    let decoded = decoder.decode(&output_buf[..n]);
                    if !decoded.is_empty() {
                        writer.write_event(&CastEvent {
                            time: t0.elapsed().as_secs_f64(),
                            kind: EventKind::Output,
                            payload: decoded,
                        })?;
                    }
                }
            }
        }
    }

    let remaining = decoder.finish();
    if !remaining.is_empty() {
        writer.write_event(&CastEvent {
            time: t0.elapsed().as_secs_f64(),
            kind: EventKind::Output,
            payload: remaining,
        })?;
    }

    Ok(())
}
