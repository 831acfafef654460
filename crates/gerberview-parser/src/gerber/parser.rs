//! RS-274X block parser.
//!
//! Rules are tried in a fixed order and the first match wins; later rules
//! assume earlier ones did not match.

use lazy_regex::{lazy_regex, Lazy};
use regex::{Captures, Regex};

use crate::command::{
    ArcMode, Command, InterpolationMode, Level, Location, Operation, Polarity, Setting, Shape,
    StepRepeat, ToolDefinition,
};
use crate::error::ParseError;
use crate::format::{normalize_tool_value, Notation, Places, Units, ZeroSuppression};
use crate::macros::parse_primitive_block;
use crate::session::{Session, WarningSink};

static RE_COMMENT: Lazy<Regex> = lazy_regex!(r"^G0*4");
static RE_REGION: Lazy<Regex> = lazy_regex!(r"^G3([67])");
static RE_ARC: Lazy<Regex> = lazy_regex!(r"^G7([45])");
static RE_UNITS: Lazy<Regex> = lazy_regex!(r"^%MO(IN|MM)");
static RE_BACKUP_UNITS: Lazy<Regex> = lazy_regex!(r"^G7([01])");
static RE_FORMAT: Lazy<Regex> =
    lazy_regex!(r"^%FS([LT]?)([AI]?)X([0-7])([0-7])Y([0-7])([0-7])");
static RE_POLARITY: Lazy<Regex> = lazy_regex!(r"^%LP([CD])");
static RE_STEP_REPEAT: Lazy<Regex> =
    lazy_regex!(r"^%SR(?:X([0-9]+)Y([0-9]+)I([0-9.]+)J([0-9.]+))?");
static RE_TOOL: Lazy<Regex> = lazy_regex!(r"^(?:G54)?D0*([1-9][0-9]+)");
static RE_TOOL_DEF: Lazy<Regex> =
    lazy_regex!(r"^%ADD([0-9]{2,})([A-Za-z_][A-Za-z0-9_]*)(?:,((?:X?[0-9.]+)*))?");
static RE_MACRO: Lazy<Regex> = lazy_regex!(r"(?s)^%AM([A-Za-z_][A-Za-z0-9_]*)\*?(.*)");
static RE_MODE: Lazy<Regex> = lazy_regex!(r"^G0*([123])");
static RE_OP: Lazy<Regex> = lazy_regex!(r"D0*([123])$");
static RE_COORD: Lazy<Regex> = lazy_regex!(r"((?:[XYIJ][+-]?[0-9]+){1,4})");

const ZERO_MISSING: &str = "zero suppression missing from format; assuming leading";
const TRAILING_DEPRECATED: &str = "trailing zero suppression has been deprecated";

/// Parses one Gerber block, pushing commands onto the session.
///
/// # Errors
///
/// Returns a [`ParseError`] for malformed numbers or macro expressions.
pub fn parse_block(block: &str, session: &mut Session) -> Result<(), ParseError> {
    let block = block.trim_end_matches('*');

    if RE_COMMENT.is_match(block) {
        return Ok(());
    }

    if block == "M02" {
        session.push(Command::Done {
            line: session.line(),
        });
        return Ok(());
    }

    if let Some(code) = capture(&RE_REGION, block) {
        session.set(Setting::Region(code == "6"));
        return Ok(());
    }

    if let Some(code) = capture(&RE_ARC, block) {
        let arc = if code == "4" {
            ArcMode::Single
        } else {
            ArcMode::Multi
        };
        session.set(Setting::Arc(arc));
        return Ok(());
    }

    if let Some(units) = capture(&RE_UNITS, block) {
        session.set(Setting::Units(parse_units(units)));
        return Ok(());
    }

    if let Some(code) = capture(&RE_BACKUP_UNITS, block) {
        let units = if code == "0" {
            Units::Inch
        } else {
            Units::Millimeter
        };
        session.set(Setting::BackupUnits(units));
        return Ok(());
    }

    if block.starts_with("%FS") {
        return parse_format(block, session);
    }

    if let Some(polarity) = capture(&RE_POLARITY, block) {
        let polarity = if polarity == "C" {
            Polarity::Clear
        } else {
            Polarity::Dark
        };
        session.push(Command::Level {
            line: session.line(),
            level: Level::Polarity(polarity),
        });
        return Ok(());
    }

    if let Some(caps) = RE_STEP_REPEAT.captures(block) {
        return parse_step_repeat(&caps, session);
    }

    if let Some(code) = capture(&RE_TOOL, block) {
        session.set(Setting::Tool(code.to_string()));
        return Ok(());
    }

    if let Some(caps) = RE_TOOL_DEF.captures(block) {
        return parse_tool_definition(&caps, session);
    }

    if let Some(caps) = RE_MACRO.captures(block) {
        return parse_macro_definition(&caps, session);
    }

    parse_operation(block, session)
}

fn parse_format(block: &str, session: &mut Session) -> Result<(), ParseError> {
    let Some(caps) = RE_FORMAT.captures(block) else {
        warn_unrecognized(block, session);
        return Ok(());
    };

    let x_places = Places::new(digit(&caps, 3)?, digit(&caps, 4)?);
    let y_places = Places::new(digit(&caps, 5)?, digit(&caps, 6)?);
    if x_places != y_places {
        warn_unrecognized(block, session);
        return Ok(());
    }

    let zero = match group(&caps, 1) {
        "L" => Some(ZeroSuppression::Leading),
        "T" => Some(ZeroSuppression::Trailing),
        _ => None,
    };
    let nota = if group(&caps, 2) == "I" {
        Notation::Incremental
    } else {
        Notation::Absolute
    };

    let format = session.format_mut();
    if let Some(zero) = zero {
        format.zero_or(zero);
    }
    let places = format.places_or(x_places);
    let resolved = format.zero;

    match resolved {
        None => {
            session.format_mut().zero = Some(ZeroSuppression::Leading);
            session.warn(ZERO_MISSING.to_string());
        }
        Some(ZeroSuppression::Trailing) => session.warn(TRAILING_DEPRECATED.to_string()),
        Some(_) => {}
    }

    session.set(Setting::Nota(nota));
    session.set(Setting::Epsilon(places.epsilon()));
    Ok(())
}

fn parse_step_repeat(caps: &Captures<'_>, session: &mut Session) -> Result<(), ParseError> {
    let defaults = StepRepeat::default();
    let count = |index: usize, fallback: u32| {
        caps.get(index).map_or(Ok(fallback), |m| {
            m.as_str()
                .parse::<u32>()
                .map_err(|_| ParseError::invalid_number("step-repeat count", m.as_str()))
        })
    };
    let step = |index: usize, fallback: f64| {
        caps.get(index).map_or(Ok(fallback), |m| {
            m.as_str()
                .parse::<f64>()
                .map_err(|_| ParseError::invalid_number("step-repeat distance", m.as_str()))
        })
    };

    let step_repeat = StepRepeat {
        x: count(1, defaults.x)?,
        y: count(2, defaults.y)?,
        i: step(3, defaults.i)?,
        j: step(4, defaults.j)?,
    };
    session.push(Command::Level {
        line: session.line(),
        level: Level::StepRepeat(step_repeat),
    });
    Ok(())
}

fn parse_tool_definition(caps: &Captures<'_>, session: &mut Session) -> Result<(), ParseError> {
    let code = strip_leading_zeros(group(caps, 1));
    let args: Vec<&str> = caps
        .get(3)
        .map(|m| m.as_str().split('X').filter(|a| !a.is_empty()).collect())
        .unwrap_or_default();

    let (shape, max_args): (Shape, usize) = match group(caps, 2) {
        "C" => (Shape::Circle, 3),
        "R" => (Shape::Rect, 4),
        "O" => (Shape::Obround, 4),
        "P" => (Shape::Poly, 5),
        name => (Shape::Macro(name.to_string()), 0),
    };

    let format = session.format();
    let (places, zero) = (format.places, format.zero);
    let normalize = |index: usize| {
        let raw = args.get(index).copied().unwrap_or_default();
        normalize_tool_value(raw, places, zero)
    };
    let literal = |raw: &str| normalize_tool_value(raw, None, None);

    let params = match &shape {
        Shape::Circle => vec![normalize(0)?],
        Shape::Rect | Shape::Obround => vec![normalize(0)?, normalize(1)?],
        Shape::Poly => {
            let rotation = args.get(2).map_or(Ok(0.0), |raw| literal(raw))?;
            vec![
                normalize(0)?,
                literal(args.get(1).copied().unwrap_or_default())?,
                rotation,
            ]
        }
        Shape::Macro(_) => args.iter().map(|raw| literal(raw)).collect::<Result<_, _>>()?,
    };

    // trailing extras beyond the shape's own parameters describe the hole
    let hole = match (max_args.checked_sub(2), max_args.checked_sub(1)) {
        (Some(first), Some(second)) if args.get(second).is_some() => {
            vec![normalize(first)?, normalize(second)?]
        }
        (Some(first), _) if args.get(first).is_some() => vec![normalize(first)?],
        _ => Vec::new(),
    };

    session.push(Command::Tool {
        line: session.line(),
        code,
        definition: ToolDefinition {
            shape,
            params,
            hole,
        },
    });
    Ok(())
}

fn parse_macro_definition(caps: &Captures<'_>, session: &mut Session) -> Result<(), ParseError> {
    let name = group(caps, 1).to_string();
    let statements = group(caps, 2)
        .trim_end_matches('%')
        .split('*')
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut blocks = Vec::new();
    for statement in statements {
        if let Some(block) = parse_primitive_block(statement, session)? {
            blocks.push(block);
        }
    }

    session.push(Command::Macro {
        line: session.line(),
        name,
        blocks,
    });
    Ok(())
}

/// Mode codes, operation codes and coordinates may share one block.
fn parse_operation(block: &str, session: &mut Session) -> Result<(), ParseError> {
    let mode = capture(&RE_MODE, block);
    let op = capture(&RE_OP, block);
    let coord = capture(&RE_COORD, block);

    if mode.is_none() && op.is_none() && coord.is_none() {
        warn_unrecognized(block, session);
        return Ok(());
    }

    if let Some(mode) = mode {
        let mode = match mode {
            "1" => InterpolationMode::Linear,
            "2" => InterpolationMode::Clockwise,
            _ => InterpolationMode::CounterClockwise,
        };
        session.set(Setting::Mode(mode));
    }

    if op.is_some() || coord.is_some() {
        let location = match coord {
            Some(field) => session.coordinate(field)?,
            None => Location::default(),
        };
        let operation = match op {
            Some("1") => Operation::Interpolate,
            Some("2") => Operation::Move,
            Some("3") => Operation::Flash,
            _ => Operation::Last,
        };
        session.push(Command::Op {
            line: session.line(),
            operation,
            location,
        });
    }

    Ok(())
}

fn warn_unrecognized(block: &str, session: &mut Session) {
    session.warn(format!("block \"{block}\" was not recognized and was ignored"));
}

fn parse_units(units: &str) -> Units {
    if units == "IN" {
        Units::Inch
    } else {
        Units::Millimeter
    }
}

fn capture<'a>(re: &Regex, block: &'a str) -> Option<&'a str> {
    re.captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn group<'a>(caps: &Captures<'a>, index: usize) -> &'a str {
    caps.get(index).map_or("", |m| m.as_str())
}

fn digit(caps: &Captures<'_>, index: usize) -> Result<u8, ParseError> {
    let raw = group(caps, index);
    raw.parse::<u8>()
        .map_err(|_| ParseError::invalid_number("format digit", raw))
}

fn strip_leading_zeros(code: &str) -> String {
    let stripped = code.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FileType, Parser, Warning};

    const EPSILON: f64 = 1e-9;

    fn run(blocks: &[&str]) -> (Vec<Command>, Vec<Warning>) {
        let mut parser = Parser::new(FileType::Gerber);
        for block in blocks {
            assert!(parser.write(block).is_ok(), "block {block} failed");
        }
        let commands = parser.drain().collect();
        (commands, parser.take_warnings())
    }

    fn set(line: usize, setting: Setting) -> Command {
        Command::Set { line, setting }
    }

    #[test]
    fn ut_gbr_001_comments_are_ignored() {
        let (commands, warnings) = run(&["G04 this is a comment", "G4 legacy"]);
        assert!(commands.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn ut_gbr_002_scalar_state_codes() {
        let (commands, _) = run(&["G36", "G37", "G74", "G75", "%MOIN*%", "%MOMM", "G70", "G71"]);
        assert_eq!(
            commands,
            vec![
                set(1, Setting::Region(true)),
                set(2, Setting::Region(false)),
                set(3, Setting::Arc(ArcMode::Single)),
                set(4, Setting::Arc(ArcMode::Multi)),
                set(5, Setting::Units(Units::Inch)),
                set(6, Setting::Units(Units::Millimeter)),
                set(7, Setting::BackupUnits(Units::Inch)),
                set(8, Setting::BackupUnits(Units::Millimeter)),
            ]
        );
    }

    #[test]
    fn ut_gbr_003_format_statement_resolves_places_and_zero() {
        let mut parser = Parser::new(FileType::Gerber);
        assert!(parser.write("%FSLAX34Y34*%").is_ok());
        assert_eq!(parser.format().places, Some(Places::new(3, 4)));
        assert_eq!(parser.format().zero, Some(ZeroSuppression::Leading));
        assert!(parser.warnings().is_empty());

        let commands: Vec<Command> = parser.drain().collect();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands.first(),
            Some(&set(1, Setting::Nota(Notation::Absolute)))
        );
        let Some(Command::Set {
            setting: Setting::Epsilon(epsilon),
            ..
        }) = commands.get(1)
        else {
            return;
        };
        assert!((epsilon - 0.00015).abs() < EPSILON);
    }

    #[test]
    fn ut_gbr_004_format_statement_never_overwrites_and_warns() {
        let mut parser = Parser::new(FileType::Gerber);
        parser.format_mut().places = Some(Places::new(2, 5));
        assert!(parser.write("%FSAX24Y24").is_ok());
        assert_eq!(parser.format().places, Some(Places::new(2, 5)));
        assert_eq!(parser.format().zero, Some(ZeroSuppression::Leading));
        assert!(parser
            .warnings()
            .iter()
            .any(|w| w.message.contains("assuming leading")));

        let mut parser = Parser::new(FileType::Gerber);
        assert!(parser.write("%FSTIX24Y24").is_ok());
        assert_eq!(parser.format().zero, Some(ZeroSuppression::Trailing));
        assert_eq!(parser.format().nota, Some(Notation::Incremental));
        assert!(parser
            .warnings()
            .iter()
            .any(|w| w.message.contains("deprecated")));
    }

    #[test]
    fn ut_gbr_005_polarity_and_step_repeat_levels() {
        let (commands, _) = run(&["%LPC*%", "%LPD", "%SRX3Y2I5.0J4.5", "%SR"]);
        assert_eq!(
            commands,
            vec![
                Command::Level {
                    line: 1,
                    level: Level::Polarity(Polarity::Clear)
                },
                Command::Level {
                    line: 2,
                    level: Level::Polarity(Polarity::Dark)
                },
                Command::Level {
                    line: 3,
                    level: Level::StepRepeat(StepRepeat {
                        x: 3,
                        y: 2,
                        i: 5.0,
                        j: 4.5
                    })
                },
                Command::Level {
                    line: 4,
                    level: Level::StepRepeat(StepRepeat::default())
                },
            ]
        );
    }

    #[test]
    fn ut_gbr_006_tool_selection() {
        let (commands, _) = run(&["D10", "G54D011", "D123"]);
        assert_eq!(
            commands,
            vec![
                set(1, Setting::Tool("10".to_string())),
                set(2, Setting::Tool("11".to_string())),
                set(3, Setting::Tool("123".to_string())),
            ]
        );
    }

    #[test]
    fn ut_gbr_007_standard_aperture_definitions() {
        let (commands, _) = run(&[
            "%ADD10C,0.0100*%",
            "%ADD011R,0.5X0.25*%",
            "%ADD12O,0.5X0.25X0.1*%",
            "%ADD13P,1.0X6*%",
            "%ADD14C,0.5X0.1X0.2*%",
        ]);
        let tools: Vec<(String, ToolDefinition)> = commands
            .into_iter()
            .filter_map(|c| match c {
                Command::Tool {
                    code, definition, ..
                } => Some((code, definition)),
                _ => None,
            })
            .collect();
        assert_eq!(
            tools,
            vec![
                ("10".to_string(), ToolDefinition::circle(0.01)),
                (
                    "11".to_string(),
                    ToolDefinition {
                        shape: Shape::Rect,
                        params: vec![0.5, 0.25],
                        hole: vec![]
                    }
                ),
                (
                    "12".to_string(),
                    ToolDefinition {
                        shape: Shape::Obround,
                        params: vec![0.5, 0.25],
                        hole: vec![0.1]
                    }
                ),
                (
                    "13".to_string(),
                    ToolDefinition {
                        shape: Shape::Poly,
                        params: vec![1.0, 6.0, 0.0],
                        hole: vec![]
                    }
                ),
                (
                    "14".to_string(),
                    ToolDefinition {
                        shape: Shape::Circle,
                        params: vec![0.5],
                        hole: vec![0.1, 0.2]
                    }
                ),
            ]
        );
    }

    #[test]
    fn ut_gbr_008_macro_aperture_reference_passes_args_through() {
        let (commands, _) = run(&["%ADD15RECT1,0.5X0.25X45*%", "%ADD16THERM*%"]);
        assert_eq!(
            commands,
            vec![
                Command::Tool {
                    line: 1,
                    code: "15".to_string(),
                    definition: ToolDefinition {
                        shape: Shape::Macro("RECT1".to_string()),
                        params: vec![0.5, 0.25, 45.0],
                        hole: vec![]
                    }
                },
                Command::Tool {
                    line: 2,
                    code: "16".to_string(),
                    definition: ToolDefinition {
                        shape: Shape::Macro("THERM".to_string()),
                        params: vec![],
                        hole: vec![]
                    }
                },
            ]
        );
    }

    #[test]
    fn ut_gbr_009_macro_definition() {
        let (commands, warnings) = run(&["%AMTEST*0 comment*$3=$1x2*1,1,$3,0,0*2,1,0.1,0,0,1,1,0*%"]);
        assert!(warnings.iter().any(|w| w.message.contains("code 2")));
        let Some(Command::Macro { name, blocks, .. }) = commands.first() else {
            return;
        };
        assert_eq!(name, "TEST");
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn ut_gbr_010_operations_with_mode_and_coordinates() {
        let mut parser = Parser::new(FileType::Gerber);
        assert!(parser.write("%FSLAX24Y24").is_ok());
        parser.drain().for_each(drop);

        assert!(parser.write("G01X100Y-200D01").is_ok());
        assert!(parser.write("X300D02").is_ok());
        assert!(parser.write("G03X0Y0I50J-50D01").is_ok());
        assert!(parser.write("Y500").is_ok());
        assert!(parser.write("D03").is_ok());
        assert!(parser.write("G02").is_ok());

        let commands: Vec<Command> = parser.drain().collect();
        assert_eq!(
            commands,
            vec![
                set(2, Setting::Mode(InterpolationMode::Linear)),
                Command::Op {
                    line: 2,
                    operation: Operation::Interpolate,
                    location: Location::xy(0.01, -0.02)
                },
                Command::Op {
                    line: 3,
                    operation: Operation::Move,
                    location: Location {
                        x: Some(0.03),
                        ..Location::default()
                    }
                },
                set(4, Setting::Mode(InterpolationMode::CounterClockwise)),
                Command::Op {
                    line: 4,
                    operation: Operation::Interpolate,
                    location: Location {
                        x: Some(0.0),
                        y: Some(0.0),
                        i: Some(0.005),
                        j: Some(-0.005)
                    }
                },
                Command::Op {
                    line: 5,
                    operation: Operation::Last,
                    location: Location {
                        y: Some(0.05),
                        ..Location::default()
                    }
                },
                Command::Op {
                    line: 6,
                    operation: Operation::Flash,
                    location: Location::default()
                },
                set(7, Setting::Mode(InterpolationMode::Clockwise)),
            ]
        );
        assert!(parser.warnings().is_empty());
    }

    #[test]
    fn ut_gbr_011_end_of_program() {
        let (commands, _) = run(&["M02*"]);
        assert_eq!(commands, vec![Command::Done { line: 1 }]);
    }

    #[test]
    fn bc_gbr_001_unrecognized_block_warns_with_text() {
        let (commands, warnings) = run(&["%IPPOS*%", "M05"]);
        assert!(commands.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .first()
            .is_some_and(|w| w.line == 1 && w.message.contains("%IPPOS")));
        assert!(warnings.get(1).is_some_and(|w| w.message.contains("M05")));
    }

    #[test]
    fn bc_gbr_002_mismatched_format_places_are_not_a_format() {
        let (commands, warnings) = run(&["%FSLAX24Y35"]);
        assert!(commands.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("was not recognized")));
    }

    #[test]
    fn bc_gbr_003_coordinates_without_format_assume_defaults_once() {
        let (commands, warnings) = run(&["X0016Y0158D03", "X1Y1D03"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.first().is_some_and(|w| w.line == 1));
        assert!(warnings
            .first()
            .is_some_and(|w| w.message.contains("assuming trailing suppression")));
        assert!(warnings
            .first()
            .is_some_and(|w| w.message.contains("assuming [2, 4]")));
        assert!(matches!(
            commands.first(),
            Some(Command::Op { location, .. }) if *location == Location::xy(0.16, 1.58)
        ));
    }
}
