//! Integration tests for NC drill decoding over whole files.

use gerberview_parser::command::InterpolationMode;
use gerberview_parser::{
    parse_drill_internal, Command, Location, Notation, Operation, Places, Setting,
    ToolDefinition, Units, ZeroSuppression,
};

const EPSILON: f64 = 1e-9;

/// IT-DRL-001: KiCad drill file with a decimal format hint.
#[test]
#[allow(clippy::expect_used)]
fn it_drl_001_kicad_drill_file() {
    let data = include_bytes!("fixtures/minimal/drill.drl");
    let result = parse_drill_internal(data);
    assert!(
        result.is_ok(),
        "expected Ok, got Err: {:?}",
        result.as_ref().err()
    );
    let output = result.as_ref().expect("assert!(result.is_ok()) above");

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.format.zero, Some(ZeroSuppression::Decimal));
    assert_eq!(output.format.places, Some(Places::METRIC));
    assert_eq!(output.format.backup_units, Some(Units::Millimeter));
    assert_eq!(output.format.backup_nota, Some(Notation::Absolute));

    let set = |line, setting| Command::Set { line, setting };
    let op = |line, operation, location| Command::Op {
        line,
        operation,
        location,
    };
    assert_eq!(
        output.commands,
        vec![
            set(3, Setting::BackupNota(Notation::Absolute)),
            set(3, Setting::BackupUnits(Units::Millimeter)),
            set(6, Setting::Units(Units::Millimeter)),
            Command::Tool {
                line: 7,
                code: "1".to_string(),
                definition: ToolDefinition::circle(0.3),
            },
            Command::Tool {
                line: 8,
                code: "2".to_string(),
                definition: ToolDefinition::circle(1.0),
            },
            set(10, Setting::Nota(Notation::Absolute)),
            set(12, Setting::Tool("1".to_string())),
            op(13, Operation::Flash, Location::xy(10.0, -5.0)),
            op(14, Operation::Flash, Location::xy(12.5, -5.0)),
            set(15, Setting::Tool("2".to_string())),
            op(16, Operation::Flash, Location::xy(20.0, -10.0)),
            op(17, Operation::Move, Location::xy(30.0, -10.0)),
            set(17, Setting::Mode(InterpolationMode::Linear)),
            op(17, Operation::Interpolate, Location::xy(32.0, -10.0)),
            Command::Done { line: 18 },
        ]
    );
}

/// IT-DRL-002: legacy header with `INCH,TZ` and zero-padded tool codes.
#[test]
fn it_drl_002_legacy_inch_header() {
    let data = include_bytes!("fixtures/minimal/legacy.drl");
    let Ok(output) = parse_drill_internal(data) else {
        return;
    };

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.format.places, Some(Places::INCH));
    assert_eq!(output.format.zero, Some(ZeroSuppression::Leading));
    assert_eq!(output.format.units, Some(Units::Inch));

    let codes: Vec<&str> = output
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Tool { code, .. } => Some(code.as_str()),
            Command::Set {
                setting: Setting::Tool(code),
                ..
            } => Some(code.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec!["1", "2", "1", "2"]);

    let first = output.commands.iter().find_map(|c| match c {
        Command::Op { location, .. } => Some(location),
        _ => None,
    });
    let Some(Location {
        x: Some(x),
        y: Some(y),
        ..
    }) = first
    else {
        return;
    };
    assert!((x - 0.0016).abs() < EPSILON);
    assert!((y - 0.0158).abs() < EPSILON);
}

/// IT-DRL-003: a tool change sharing a line with a hole precedes the flash.
#[test]
fn it_drl_003_inline_tool_change_order() {
    let data = include_bytes!("fixtures/minimal/legacy.drl");
    let Ok(output) = parse_drill_internal(data) else {
        return;
    };
    let on_line_9: Vec<&Command> = output.commands.iter().filter(|c| c.line() == 9).collect();
    assert_eq!(on_line_9.len(), 2);
    assert!(matches!(
        on_line_9.first(),
        Some(Command::Set {
            setting: Setting::Tool(_),
            ..
        })
    ));
    assert!(matches!(
        on_line_9.get(1),
        Some(Command::Op {
            operation: Operation::Flash,
            ..
        })
    ));
}
