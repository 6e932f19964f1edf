//! Terminal output helpers.
//!
//! All user-facing messages go through these functions so that glyphs and
//! colors stay consistent:
//!
//! - `info` - plain progress message
//! - `warn` - skipped work, backups, anything worth noticing
//! - `error` - printed right before a fatal exit
//! - `Table` - compact two-or-more column listing for the pre-flight report

use crate::error::{Result, SetupError};
use colored::*;
use std::cmp;
use std::time::Duration;

pub fn info(msg: impl AsRef<str>) {
    println!("{} {}", "→".blue(), msg.as_ref());
}

pub fn success(msg: impl AsRef<str>) {
    println!("{} {}", "✓".green(), msg.as_ref());
}

pub fn warn(msg: impl AsRef<str>) {
    println!("{} {}", "!".yellow(), msg.as_ref().yellow());
}

pub fn error(msg: impl AsRef<str>) {
    eprintln!("{} {}", "x".red(), msg.as_ref().red());
}

/// Current terminal width in columns.
pub fn term_width() -> usize {
    let (_rows, cols) = console::Term::stdout().size();
    cols as usize
}

fn char_width(c: char) -> usize {
    let mut buf = [0u8; 4];
    console::measure_text_width(c.encode_utf8(&mut buf))
}

/// Leading characters of `chars` that fit in `width` columns.
fn take_columns(chars: impl Iterator<Item = char>, width: usize) -> Vec<char> {
    let mut used = 0;
    let mut out = Vec::new();
    for c in chars {
        let w = char_width(c);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Shorten `s` to at most `width` terminal columns by cutting out its middle.
///
/// The head and tail of the line are kept, since those carry the command
/// name and the file currently being worked on. Tabs count as one space.
pub fn midsnip(s: &str, width: usize) -> String {
    const SEP: &str = "...";
    let s = s.replace('\t', " ");
    if console::measure_text_width(&s) <= width {
        return s;
    }
    if width <= SEP.len() {
        return take_columns(s.chars(), width).into_iter().collect();
    }
    let keep = width - SEP.len();
    let head = keep.div_ceil(2);
    let tail = keep - head;
    let mut out: String = take_columns(s.chars(), head).into_iter().collect();
    out.push_str(SEP);
    out.extend(take_columns(s.chars().rev(), tail).into_iter().rev());
    out
}

/// Format a duration as `HH:MM:SS`.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let (m, s) = (secs / 60, secs % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Ask for confirmation, defaulting to yes. `assume_yes` skips the prompt.
pub fn confirm(question: &str, assume_yes: bool) -> Result<()> {
    if assume_yes {
        return Ok(());
    }
    let answer = inquire::Confirm::new(question)
        .with_default(true)
        .prompt()
        .map_err(|e| SetupError::cancelled(format!("Cancelled ({})", e)))?;
    if answer {
        Ok(())
    } else {
        Err(SetupError::cancelled("Cancelled"))
    }
}

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render to lines, shrinking the widest columns until the table fits.
    pub fn render(&self, max_width: usize) -> Vec<String> {
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|h| console::measure_text_width(h))
            .collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = cmp::max(widths[i], console::measure_text_width(cell));
            }
        }

        // two leading spaces, two between columns
        let overhead = 2 + 2 * self.headers.len().saturating_sub(1);
        let available = max_width.saturating_sub(overhead);
        while widths.iter().sum::<usize>() > available {
            let Some((idx, &w)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if w <= 8 {
                break;
            }
            widths[idx] -= 1;
        }

        let line = |cells: &[String], header: bool| -> String {
            let mut s = String::from("  ");
            for (i, cell) in cells.iter().enumerate() {
                let text = midsnip(cell, widths[i]);
                let pad = widths[i].saturating_sub(console::measure_text_width(&text));
                let text = if header {
                    text.bold().to_string()
                } else if i == 0 {
                    text.cyan().to_string()
                } else {
                    text
                };
                s.push_str(&text);
                if i + 1 < cells.len() {
                    s.push_str(&" ".repeat(pad + 2));
                }
            }
            s
        };

        let mut out = vec![line(&self.headers, true)];
        out.extend(self.rows.iter().map(|r| line(r, false)));
        out
    }

    pub fn print(&self) {
        for l in self.render(term_width()) {
            println!("{}", l);
        }
    }
}
