use std::{io, path::Path};

use apl_model::workdir_of;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{info, warn};

use crate::EnvPolicy;

/// Longest run of bytes logged as one line; longer lines are logged in chunks of this size.
pub const MAX_LINE: usize = 8 * 1024;

/// Consecutive read failures after which a stream is given up.
const MAX_READ_ERRORS: usize = 8;

/// Build a command that runs in the program's own directory with the requested environment.
pub fn cmd_program(program: &Path, args: &[String], env: &EnvPolicy) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    if let Some(dir) = workdir_of(program) {
        cmd.current_dir(dir);
    }
    if let EnvPolicy::Explicit(pairs) = env {
        cmd.env_clear();
        for kv in pairs.iter() {
            cmd.env(kv.key(), kv.value());
        }
    }
    cmd
}

/// Forward every line of `reader` to the log until EOF.
pub async fn forward_lines<R>(reader: Option<R>, label: &str, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    split_bounded(reader, label, stream, MAX_LINE, |raw| {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        info!(target: "apl.exec.out", task = %label, stream, "{line}");
    })
    .await;
}

/// Hand `emit` every newline-terminated segment of `reader`, cut at `max` bytes.
///
/// At most `max` bytes are held at a time. After a read error the rest of the stream is
/// drained and dropped so the child never blocks on a full pipe.
pub async fn split_bounded<R, F>(
    reader: R,
    label: &str,
    stream: &'static str,
    max: usize,
    mut emit: F,
) where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]),
{
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(max.min(1024));
    // Set right after a full chunk was emitted, so a newline ending it adds no empty line.
    let mut cut = false;
    let mut discard = false;
    let mut errors = 0;

    loop {
        let buf = match reader.fill_buf().await {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                errors += 1;
                if !discard {
                    warn!(target: "apl.exec.out", task = %label, stream, error = %e, "read failed; discarding remaining output");
                    discard = true;
                    line.clear();
                }
                if errors >= MAX_READ_ERRORS {
                    warn!(target: "apl.exec.out", task = %label, stream, "giving up on stream");
                    return;
                }
                continue;
            }
        };
        if buf.is_empty() {
            break;
        }
        errors = 0;
        let consumed = buf.len();

        if !discard {
            let mut rest = buf;
            while !rest.is_empty() {
                let room = max - line.len();
                let window = &rest[..rest.len().min(room)];
                match window.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        line.extend_from_slice(&window[..i]);
                        if !(cut && line.is_empty()) {
                            emit(&line);
                        }
                        line.clear();
                        cut = false;
                        rest = &rest[i + 1..];
                    }
                    None => {
                        line.extend_from_slice(window);
                        rest = &rest[window.len()..];
                        cut = false;
                        if line.len() == max {
                            emit(&line);
                            line.clear();
                            cut = true;
                        }
                    }
                }
            }
        }
        reader.consume(consumed);
    }

    if !discard && !line.is_empty() {
        emit(&line);
    }
}
