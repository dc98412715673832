//! Transport-agnostic command output types.
//!
//! Handlers return these instead of printing, so the binary decides where
//! each part goes and tests can inspect results directly.

use std::fmt;

/// Output from a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Informational message (success, status, etc.).
    Info(String),

    /// A failure that did not abort the command, such as one bucket out of a
    /// batch that could not be deleted.
    Error(String),

    /// Structured table data for display.
    Table {
        /// Column headers.
        headers: Vec<String>,
        /// Row data (each row is a vector of cell values).
        rows: Vec<Vec<String>>,
    },

    /// Multiple outputs (for commands that produce several messages).
    Multiple(Vec<CommandOutput>),
}

impl CommandOutput {
    /// Creates an info message.
    pub fn info(msg: impl Into<String>) -> Self {
        Self::Info(msg.into())
    }

    /// Creates an error message.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    /// Creates a table output.
    pub fn table(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self::Table { headers, rows }
    }

    /// Creates a multiple output from a vector.
    pub fn multiple(outputs: Vec<CommandOutput>) -> Self {
        Self::Multiple(outputs)
    }

    /// Returns true if any part of the output is an error.
    pub fn has_errors(&self) -> bool {
        match self {
            Self::Error(_) => true,
            Self::Multiple(parts) => parts.iter().any(Self::has_errors),
            _ => false,
        }
    }

    /// Flattens nested outputs into a list of leaves.
    pub fn flatten(&self) -> Vec<&CommandOutput> {
        match self {
            Self::Multiple(parts) => parts.iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}

fn render_table(f: &mut fmt::Formatter<'_>, headers: &[String], rows: &[Vec<String>]) -> fmt::Result {
    let columns = headers
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(headers).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:<w$}", cells.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        writeln!(f, "{}", padded.join(" | ").trim_end())
    };

    if !headers.is_empty() {
        line(f, headers)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
    }
    for row in rows {
        line(f, row)?;
    }
    write!(f, "({} rows)", rows.len())
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info(msg) | Self::Error(msg) => f.write_str(msg),
            Self::Table { headers, rows } => render_table(f, headers, rows),
            Self::Multiple(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}
