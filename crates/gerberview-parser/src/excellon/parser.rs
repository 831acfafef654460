//! NC drill (Excellon) block parser.

use lazy_regex::{lazy_regex, Lazy, Regex};

use crate::command::{Command, InterpolationMode, Location, Operation, Setting, ToolDefinition};
use crate::error::ParseError;
use crate::format::{normalize_tool_value, Notation, Places, Units, ZeroSuppression};
use crate::session::Session;

use super::types::FormatHint;

static RE_UNITS: Lazy<Regex> = lazy_regex!(r"(INCH|METRIC)(?:,([TL])Z)?");
static RE_TOOL_DEF: Lazy<Regex> = lazy_regex!(r"T0*([0-9]+)C([0-9.]+)");
static RE_TOOL_SET: Lazy<Regex> = lazy_regex!(r"T0*([0-9]+)");
static RE_COORD: Lazy<Regex> = lazy_regex!(r"((?:[XY][+-]?[0-9.]+){1,2})");

const SLOT: &str = "G85";

/// Parses one drill block, pushing commands onto the session.
///
/// Unrecognized blocks are dropped without a warning; drill headers are
/// full of vendor codes that carry nothing for the command stream.
///
/// # Errors
///
/// Returns [`ParseError::InvalidNumber`] for malformed coordinates or
/// tool diameters.
pub fn parse_block(block: &str, session: &mut Session) -> Result<(), ParseError> {
    if block.starts_with(';') {
        if let Some(hint) = FormatHint::parse(block) {
            apply_hint(hint, session);
        }
        return Ok(());
    }

    if let Some(caps) = RE_TOOL_DEF.captures(block) {
        let code = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let raw = caps.get(2).map_or("", |m| m.as_str());
        let format = session.format();
        let diameter = normalize_tool_value(raw, format.places, format.zero)?;
        session.push(Command::Tool {
            line: session.line(),
            code,
            definition: ToolDefinition::circle(diameter),
        });
        return Ok(());
    }

    // a tool change may share its line with a coordinate
    if let Some(code) = tool_selection(block) {
        session.set(Setting::Tool(code.to_string()));
    }

    if RE_COORD.is_match(block) {
        return parse_operations(block, session);
    }

    match block {
        "M00" | "M30" => session.push(Command::Done {
            line: session.line(),
        }),
        "M71" => set_units(Units::Millimeter, session),
        "M72" => set_units(Units::Inch, session),
        "G90" => session.set(Setting::Nota(Notation::Absolute)),
        "G91" => session.set(Setting::Nota(Notation::Incremental)),
        _ => {
            if let Some(caps) = RE_UNITS.captures(block) {
                let units = if caps.get(1).is_some_and(|m| m.as_str() == "METRIC") {
                    Units::Millimeter
                } else {
                    Units::Inch
                };
                set_units(units, session);

                // `TZ` keeps trailing zeros, so leading ones are suppressed
                match caps.get(2).map(|m| m.as_str()) {
                    Some("T") => {
                        session.format_mut().zero_or(ZeroSuppression::Leading);
                    }
                    Some("L") => {
                        session.format_mut().zero_or(ZeroSuppression::Trailing);
                    }
                    _ => {}
                }
            } else {
                log::debug!("line {}: ignoring drill block {block:?}", session.line());
            }
        }
    }

    Ok(())
}

/// Tool selection code, unless the `T` code is actually a definition.
fn tool_selection(block: &str) -> Option<&str> {
    let caps = RE_TOOL_SET.captures(block)?;
    let whole = caps.get(0)?;
    if block.get(whole.end()..).is_some_and(|rest| rest.starts_with('C')) {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// Emits a flash, or a move/interpolate pair for a `G85` slot.
fn parse_operations(block: &str, session: &mut Session) -> Result<(), ParseError> {
    if let Some((start, end)) = block.split_once(SLOT) {
        let start = coordinate(start, session)?;
        push_op(Operation::Move, start, session);
        session.set(Setting::Mode(InterpolationMode::Linear));
        let end = coordinate(end, session)?;
        push_op(Operation::Interpolate, end, session);
        return Ok(());
    }

    let location = coordinate(block, session)?;
    push_op(Operation::Flash, location, session);
    Ok(())
}

fn coordinate(text: &str, session: &mut Session) -> Result<Location, ParseError> {
    let field = RE_COORD
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());
    if field.is_empty() {
        return Ok(Location::default());
    }
    session.coordinate(field)
}

fn push_op(operation: Operation, location: Location, session: &mut Session) {
    session.push(Command::Op {
        line: session.line(),
        operation,
        location,
    });
}

fn set_units(units: Units, session: &mut Session) {
    session.format_mut().places_or(Places::for_units(units));
    session.set(Setting::Units(units));
}

/// Hints from the CAD tool are authoritative for places and zero.
fn apply_hint(hint: FormatHint, session: &mut Session) {
    log::debug!("line {}: drill format hint {hint:?}", session.line());
    match hint {
        FormatHint::KiCad {
            places,
            notation,
            units,
            zero,
        } => {
            if let Some(places) = places {
                session.format_mut().places = Some(places);
            }
            session.set(Setting::BackupNota(notation));
            session.set(Setting::BackupUnits(units));
            session.format_mut().zero = Some(zero);
        }
        FormatHint::Altium { places } => session.format_mut().places = Some(places),
    }
}
