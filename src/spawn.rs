//! Child-process spawning with captured, line-buffered stdout/stderr.
//!
//! Grounded on the original platform spawn helper's argument grammar
//! (whitespace-separated, double-quoted spans preserved as one argument)
//! and its stdout/stderr tagging, expressed with `std::process::Command`
//! and a reader thread per stream instead of raw `poll()`.

use crate::error::{ChefError, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

const COMPONENT: &str = "spawn";

/// Which stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Options controlling a single spawn.
#[derive(Default)]
pub struct SpawnOptions<'a> {
    /// Overrides argv[0]; defaults to the executable path.
    pub argv0: Option<&'a str>,
    /// Working directory for the child.
    pub cwd: Option<&'a Path>,
    /// Invoked once per complete line of captured output. When absent,
    /// the child inherits the parent's stdout/stderr directly.
    pub on_output: Option<&'a mut dyn FnMut(&str, OutputStream)>,
}

/// Split a single argument string the way the original spawn helper does:
/// whitespace separates arguments, double-quoted spans are one argument
/// with the quotes stripped, and runs of whitespace collapse.
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = arguments.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut current = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            if c == '"' {
                chars.next();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    current.push(c);
                }
                continue;
            }
            current.push(c);
            chars.next();
        }
        args.push(current);
    }

    args
}

/// Spawn `path` with the given argument string, waiting for completion and
/// returning the child's exit status.
pub fn spawn(path: &str, arguments: &str, envp: &[(String, String)], options: SpawnOptions<'_>) -> Result<i32> {
    let args = split_arguments(arguments);

    let mut command = Command::new(path);
    command.args(&args);
    if let Some(argv0) = options.argv0 {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.arg0(argv0);
        }
        #[cfg(not(unix))]
        {
            let _ = argv0;
        }
    }
    if let Some(cwd) = options.cwd {
        command.current_dir(cwd);
    }
    command.env_clear();
    for (key, value) in envp {
        command.env(key, value);
    }

    let Some(on_output) = options.on_output else {
        let status = command
            .status()
            .map_err(|e| ChefError::io(COMPONENT, path, e))?;
        return Ok(status.code().unwrap_or(-1));
    };

    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|e| ChefError::io(COMPONENT, path, e))?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    // Reader threads keep both streams draining concurrently; the main
    // thread forwards lines to the caller's callback as they arrive.
    let (tx, rx) = std::sync::mpsc::channel();
    let stdout_tx = tx.clone();
    let stdout_handle = thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(std::result::Result::ok) {
            let _ = stdout_tx.send((OutputStream::Stdout, line));
        }
    });
    let stderr_handle = thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
            let _ = tx.send((OutputStream::Stderr, line));
        }
    });

    let mut on_output = on_output;
    for (stream, line) in rx {
        on_output(&line, stream);
    }

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let status = child.wait().map_err(|e| ChefError::io(COMPONENT, path, e))?;
    Ok(status.code().unwrap_or(-1))
}
