//! Normalized command stream shared by the Gerber and drill parsers.

use serde::Serialize;

use crate::format::{Notation, Units};
use crate::macros::PrimitiveBlock;

/// Interpolation mode selected by `G01`/`G02`/`G03` (or drill `G85`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterpolationMode {
    /// Linear interpolation.
    #[serde(rename = "i")]
    Linear,
    /// Clockwise circular interpolation.
    #[serde(rename = "cw")]
    Clockwise,
    /// Counter-clockwise circular interpolation.
    #[serde(rename = "ccw")]
    CounterClockwise,
}

/// Arc quadrant mode selected by `G74`/`G75`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArcMode {
    /// Single-quadrant arcs.
    #[serde(rename = "s")]
    Single,
    /// Multi-quadrant arcs.
    #[serde(rename = "m")]
    Multi,
}

/// Dark or clear image polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Polarity {
    /// Clear polarity, removes material.
    #[serde(rename = "C")]
    Clear,
    /// Dark polarity, adds material.
    #[serde(rename = "D")]
    Dark,
}

/// Step-and-repeat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepRepeat {
    /// Repeat count along X.
    pub x: u32,
    /// Repeat count along Y.
    pub y: u32,
    /// Step distance along X.
    pub i: f64,
    /// Step distance along Y.
    pub j: f64,
}

impl Default for StepRepeat {
    fn default() -> Self {
        Self {
            x: 1,
            y: 1,
            i: 0.0,
            j: 0.0,
        }
    }
}

/// A scalar state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "prop", content = "value", rename_all = "camelCase")]
pub enum Setting {
    /// Job units.
    Units(Units),
    /// Units from a legacy code or format hint.
    BackupUnits(Units),
    /// Coordinate notation.
    Nota(Notation),
    /// Notation from a format hint.
    BackupNota(Notation),
    /// Interpolation mode.
    Mode(InterpolationMode),
    /// Selected tool code.
    Tool(String),
    /// Arc quadrant mode.
    Arc(ArcMode),
    /// Region fill on or off.
    Region(bool),
    /// Geometric tolerance.
    Epsilon(f64),
}

impl Setting {
    /// Property name as it appears on the wire.
    pub const fn prop(&self) -> &'static str {
        match self {
            Self::Units(_) => "units",
            Self::BackupUnits(_) => "backupUnits",
            Self::Nota(_) => "nota",
            Self::BackupNota(_) => "backupNota",
            Self::Mode(_) => "mode",
            Self::Tool(_) => "tool",
            Self::Arc(_) => "arc",
            Self::Region(_) => "region",
            Self::Epsilon(_) => "epsilon",
        }
    }
}

/// A non-scalar state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Level {
    /// Image polarity.
    Polarity(Polarity),
    /// Step-and-repeat block.
    StepRepeat(StepRepeat),
}

/// Aperture or tool shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    /// Circle: `[diameter]`.
    Circle,
    /// Rectangle: `[width, height]`.
    Rect,
    /// Obround: `[width, height]`.
    Obround,
    /// Regular polygon: `[diameter, vertices, rotation]`.
    Poly,
    /// Reference to a macro aperture by name; params are passed through.
    /// Serialized as the bare macro name.
    #[serde(untagged)]
    Macro(String),
}

/// A tool or aperture definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Shape of the tool.
    pub shape: Shape,
    /// Shape parameters.
    pub params: Vec<f64>,
    /// Hole: empty, `[diameter]`, or `[width, height]`.
    pub hole: Vec<f64>,
}

impl ToolDefinition {
    /// Circular tool without a hole, as defined by drill files.
    pub fn circle(diameter: f64) -> Self {
        Self {
            shape: Shape::Circle,
            params: vec![diameter],
            hole: Vec::new(),
        }
    }
}

/// Kind of a geometric operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Flash the current tool (`D03`, drill hit).
    #[serde(rename = "flash")]
    Flash,
    /// Move without exposure (`D02`).
    #[serde(rename = "move")]
    Move,
    /// Interpolate with exposure (`D01`).
    #[serde(rename = "int")]
    Interpolate,
    /// Coordinates without an operation code; repeat the previous one.
    #[serde(rename = "last")]
    Last,
}

/// Target location of an operation; unmentioned axes stay unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Location {
    /// X coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Arc center X offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i: Option<f64>,
    /// Arc center Y offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub j: Option<f64>,
}

impl Location {
    /// Location with both X and Y set.
    pub const fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            i: None,
            j: None,
        }
    }
}

/// One decoded command, tagged with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Scalar state change.
    Set {
        /// Source line.
        line: usize,
        /// The new value, flattened into `prop` and `value`.
        #[serde(flatten)]
        setting: Setting,
    },
    /// Tool or aperture definition.
    Tool {
        /// Source line.
        line: usize,
        /// Tool code without leading zeros.
        code: String,
        /// The definition.
        definition: ToolDefinition,
    },
    /// Macro aperture definition.
    Macro {
        /// Source line.
        line: usize,
        /// Macro name.
        name: String,
        /// Parsed macro statements in source order.
        blocks: Vec<PrimitiveBlock>,
    },
    /// Non-scalar state change.
    Level {
        /// Source line.
        line: usize,
        /// The new level, flattened into `kind` and `value`.
        #[serde(flatten)]
        level: Level,
    },
    /// Geometric operation.
    Op {
        /// Source line.
        line: usize,
        /// Operation kind.
        operation: Operation,
        /// Target location.
        location: Location,
    },
    /// End of job.
    Done {
        /// Source line.
        line: usize,
    },
}

impl Command {
    /// Source line of the block that produced this command.
    pub const fn line(&self) -> usize {
        match self {
            Self::Set { line, .. }
            | Self::Tool { line, .. }
            | Self::Macro { line, .. }
            | Self::Level { line, .. }
            | Self::Op { line, .. }
            | Self::Done { line } => *line,
        }
    }
}
