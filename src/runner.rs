//! External command execution.
//!
//! Every external tool (tar, autoreconf, configure, make, cmake) runs through
//! an [`Exec`] implementation. [`ProcessRunner`] merges the child's stdout and
//! stderr line by line and keeps only a short tail of recent output. In
//! normal mode the newest line is shown on one self-overwriting status line;
//! in verbose mode every line is printed. The tail is dumped in full when the
//! command fails.

use crate::context::BuildContext;
use crate::error::{Result, SetupError};
use crate::ui;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Number of recent output lines kept for failure reports.
pub const MAX_TAIL_LINES: usize = 16;

/// Width of the `HH:MM:SS ` prefix on the status line.
const ELAPSED_PREFIX_WIDTH: usize = 9;

/// One external command: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector, prefixed by the cross environment script if one is active.
    pub fn argv(&self, wrapper: Option<&Path>) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        if let Some(w) = wrapper {
            argv.push(w.to_string_lossy().to_string());
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    pub fn command_line(&self) -> String {
        self.argv(None).join(" ")
    }
}

/// Runs external commands to completion.
pub trait Exec {
    /// Run `cmd` and block until it exits. Non-zero exit is an error.
    fn run(&mut self, ctx: &BuildContext, cmd: &Invocation) -> Result<()>;

    /// Forget buffered output, so one package's log never bleeds into the next.
    fn clear_output(&mut self) {}
}

/// Fixed-capacity buffer of the most recent output lines.
#[derive(Debug)]
pub struct OutputTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new(MAX_TAIL_LINES)
    }
}

/// Monotonic stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Timer(Instant);

impl Timer {
    pub fn start() -> Self {
        Timer(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    pub fn formatted(&self) -> String {
        ui::format_elapsed(self.elapsed())
    }
}

/// The part of the status line after the elapsed time, cut to fit `width`.
pub fn status_message(line: &str, width: usize) -> String {
    ui::midsnip(line, width.saturating_sub(ELAPSED_PREFIX_WIDTH + 2))
}

/// The whole status line as it appears on screen.
pub fn render_status(elapsed: Duration, line: &str, width: usize) -> String {
    format!("{} {}", ui::format_elapsed(elapsed), status_message(line, width))
}

#[derive(Debug, Default)]
pub struct ProcessRunner {
    tail: OutputTail,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single redrawn line; the message is a full [`render_status`] line.
    fn status_bar(&self) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    }

    fn report_failure(&self, elapsed: &str, status: std::process::ExitStatus) {
        match status.code() {
            Some(code) => println!(
                "{} Exit with return code {}",
                elapsed.blue(),
                code.to_string().red()
            ),
            None => println!("{} Terminated by signal", elapsed.blue()),
        }
        if !self.tail.is_empty() {
            println!("Command output before exit:");
            for l in self.tail.lines() {
                println!("{}", l);
            }
        }
    }
}

impl Exec for ProcessRunner {
    fn run(&mut self, ctx: &BuildContext, cmd: &Invocation) -> Result<()> {
        let argv = cmd.argv(ctx.cross_env());
        println!("{} Running {}", "▶".yellow(), argv.join(" ").bold());
        println!("   {} {}", "in".dimmed(), cmd.cwd.display().to_string().dimmed());

        let timer = Timer::start();
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&cmd.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = ctx.child_search_path() {
            command.env("PATH", path);
        }

        let mut child = command
            .spawn()
            .map_err(|e| SetupError::execution(format!("Failed to start {}: {}", argv[0], e)))?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(forward_lines(out, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(forward_lines(err, tx.clone()));
        }
        drop(tx);

        let bar = (!ctx.verbose).then(|| self.status_bar());
        let width = ui::term_width();
        for line in rx {
            match &bar {
                Some(pb) => pb.set_message(render_status(timer.elapsed(), &line, width)),
                None => println!("{}", line),
            }
            self.tail.push(line);
        }
        for r in readers {
            let _ = r.join();
        }

        let status = child.wait()?;
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }

        let elapsed = timer.formatted();
        if !status.success() {
            self.report_failure(&elapsed, status);
            return Err(SetupError::execution(format!(
                "Failed to run: {}",
                argv.join(" ")
            )));
        }

        println!("{} {}", elapsed.blue(), "Command completed successfully".green());
        Ok(())
    }

    fn clear_output(&mut self) {
        self.tail.clear();
    }
}

fn forward_lines<R: Read + Send + 'static>(reader: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    type Hook = Box<dyn FnMut(&Invocation)>;
    type Predicate = Box<dyn Fn(&Invocation) -> bool>;

    /// Records invocations instead of running them.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: Vec<Invocation>,
        /// Argument vectors as they would be executed, wrapper included
        pub argvs: Vec<Vec<String>>,
        pub clears: usize,
        effect: Option<Hook>,
        fail_on: Option<Predicate>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Simulate side effects of a command (e.g. `tar` creating files).
        pub fn with_effect(mut self, f: impl FnMut(&Invocation) + 'static) -> Self {
            self.effect = Some(Box::new(f));
            self
        }

        /// Make matching commands fail as if they exited non-zero.
        pub fn failing_on(mut self, f: impl Fn(&Invocation) -> bool + 'static) -> Self {
            self.fail_on = Some(Box::new(f));
            self
        }

        pub fn programs(&self) -> Vec<String> {
            self.calls.iter().map(|c| c.program.clone()).collect()
        }

        pub fn command_lines(&self) -> Vec<String> {
            self.calls.iter().map(|c| c.command_line()).collect()
        }
    }

    impl Exec for RecordingRunner {
        fn run(&mut self, ctx: &BuildContext, cmd: &Invocation) -> Result<()> {
            if let Some(fail) = &self.fail_on
                && fail(cmd)
            {
                return Err(SetupError::execution(format!(
                    "Failed to run: {}",
                    cmd.command_line()
                )));
            }
            self.calls.push(cmd.clone());
            self.argvs.push(cmd.argv(ctx.cross_env()));
            if let Some(effect) = &mut self.effect {
                effect(cmd);
            }
            Ok(())
        }

        fn clear_output(&mut self) {
            self.clears += 1;
        }
    }
}
