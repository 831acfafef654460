//! Parsing session.
//!
//! A [`Parser`] owns the per-job [`FormatState`], the queue of decoded
//! commands, the warning channel and the tool/macro definitions seen so
//! far. Blocks are parsed one at a time, to completion, in the order they
//! are offered.

use std::collections::vec_deque::Drain;
use std::collections::VecDeque;

use serde::Serialize;

use crate::command::{Command, Location, Setting, ToolDefinition};
use crate::error::ParseError;
use crate::format::{parse_coordinate_field, FormatState, Places, ZeroSuppression};
use crate::macros::PrimitiveBlock;
use crate::{excellon, gerber};

/// Receiver for recoverable anomalies.
pub trait WarningSink {
    /// Records one warning.
    fn warn(&mut self, message: String);
}

impl WarningSink for Vec<String> {
    fn warn(&mut self, message: String) {
        self.push(message);
    }
}

/// Grammar applied to incoming blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// RS-274X photoplotter program.
    Gerber,
    /// NC (Excellon-style) drill program.
    Drill,
}

/// A recoverable anomaly tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// 1-based line number of the block.
    pub line: usize,
    /// Human-readable description.
    pub message: String,
}

/// A tool or aperture recorded by the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinedTool {
    /// Tool code without leading zeros.
    pub code: String,
    /// The definition.
    pub definition: ToolDefinition,
}

/// A macro aperture recorded by the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroDefinition {
    /// Macro name.
    pub name: String,
    /// Parsed statements.
    pub blocks: Vec<PrimitiveBlock>,
}

/// Mutable state shared by every block parser call.
#[derive(Debug, Default)]
pub struct Session {
    format: FormatState,
    line: usize,
    queue: VecDeque<Command>,
    warnings: Vec<Warning>,
    tools: Vec<DefinedTool>,
    macros: Vec<MacroDefinition>,
}

impl Session {
    /// Current format state.
    pub const fn format(&self) -> &FormatState {
        &self.format
    }

    /// Mutable format state.
    pub fn format_mut(&mut self) -> &mut FormatState {
        &mut self.format
    }

    /// Line number of the block being parsed.
    pub const fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn push(&mut self, command: Command) {
        log::trace!("line {}: {:?}", self.line, command);
        match &command {
            Command::Set { setting, .. } => self.format.apply(setting),
            Command::Tool {
                code, definition, ..
            } => self.tools.push(DefinedTool {
                code: code.clone(),
                definition: definition.clone(),
            }),
            Command::Macro { name, blocks, .. } => self.macros.push(MacroDefinition {
                name: name.clone(),
                blocks: blocks.clone(),
            }),
            Command::Level { .. } | Command::Op { .. } | Command::Done { .. } => {}
        }
        self.queue.push_back(command);
    }

    pub(crate) fn set(&mut self, setting: Setting) {
        log::trace!("line {}: set {}", self.line, setting.prop());
        self.push(Command::Set {
            line: self.line,
            setting,
        });
    }

    /// Normalizes a coordinate field, assuming a format first if needed.
    pub(crate) fn coordinate(&mut self, field: &str) -> Result<Location, ParseError> {
        if let Some(message) = self.format.assume_coordinate_defaults() {
            self.warn(message.to_string());
        }
        let (places, zero) = self
            .format
            .coordinate_format()
            .unwrap_or((Places::INCH, ZeroSuppression::Trailing));
        parse_coordinate_field(field, places, zero)
    }
}

impl WarningSink for Session {
    fn warn(&mut self, message: String) {
        log::warn!("line {}: {}", self.line, message);
        self.warnings.push(Warning {
            line: self.line,
            message,
        });
    }
}

/// Block-at-a-time decoder for one Gerber or drill job.
///
/// Commands are pulled with [`Parser::next_command`] / [`Parser::drain`]
/// or pushed to a callback with [`Parser::parse_block_with`].
#[derive(Debug)]
pub struct Parser {
    file_type: FileType,
    session: Session,
    aborted_at: Option<usize>,
}

impl Parser {
    /// Creates a session for the given grammar.
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            session: Session::default(),
            aborted_at: None,
        }
    }

    /// Grammar this session parses.
    pub const fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Current format state.
    pub const fn format(&self) -> &FormatState {
        self.session.format()
    }

    /// Mutable format state, for pre-seeding before the first block.
    pub fn format_mut(&mut self) -> &mut FormatState {
        self.session.format_mut()
    }

    /// Parses one trimmed logical block.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, tagged with `line`. After that every
    /// call returns [`ParseError::Aborted`].
    pub fn parse_block(&mut self, line: usize, block: &str) -> Result<(), ParseError> {
        if let Some(aborted) = self.aborted_at {
            return Err(ParseError::Aborted { line: aborted });
        }

        self.session.line = line;
        let block = block.trim();
        log::trace!("line {line}: block {block:?}");
        if block.is_empty() {
            return Ok(());
        }

        let result = match self.file_type {
            FileType::Gerber => gerber::parse_block(block, &mut self.session),
            FileType::Drill => excellon::parse_block(block, &mut self.session),
        };

        result.map_err(|err| {
            log::error!("line {line}: {err}; aborting session");
            self.aborted_at = Some(line);
            err.at_line(line)
        })
    }

    /// Parses the next block, numbering lines consecutively.
    ///
    /// # Errors
    ///
    /// See [`Parser::parse_block`].
    pub fn write(&mut self, block: &str) -> Result<(), ParseError> {
        let line = self.session.line + 1;
        self.parse_block(line, block)
    }

    /// Parses one block and hands each resulting command to `on_command`.
    ///
    /// # Errors
    ///
    /// See [`Parser::parse_block`]. Commands produced before the error are
    /// still delivered.
    pub fn parse_block_with(
        &mut self,
        line: usize,
        block: &str,
        mut on_command: impl FnMut(Command),
    ) -> Result<(), ParseError> {
        let result = self.parse_block(line, block);
        self.drain().for_each(&mut on_command);
        result
    }

    /// Pops the oldest undelivered command.
    pub fn next_command(&mut self) -> Option<Command> {
        self.session.queue.pop_front()
    }

    /// Removes every undelivered command, oldest first.
    pub fn drain(&mut self) -> Drain<'_, Command> {
        self.session.queue.drain(..)
    }

    /// Warnings reported so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.session.warnings
    }

    /// Takes the warnings reported so far.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.session.warnings)
    }

    /// Tools and apertures defined so far, in definition order.
    pub fn tools(&self) -> &[DefinedTool] {
        &self.session.tools
    }

    /// Macro apertures defined so far, in definition order.
    pub fn macros(&self) -> &[MacroDefinition] {
        &self.session.macros
    }

    /// Line of the fatal error that aborted the session, if any.
    pub const fn aborted_at(&self) -> Option<usize> {
        self.aborted_at
    }
}
