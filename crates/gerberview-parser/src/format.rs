//! Coordinate format model.
//!
//! Holds the per-job numeric interpretation rules (places, zero
//! suppression, units) and turns raw digit strings into real values.

use lazy_regex::{lazy_regex, Lazy, Regex};
use serde::Serialize;

use crate::command::{ArcMode, InterpolationMode, Location, Setting};
use crate::error::ParseError;

static RE_AXIS: Lazy<Regex> = lazy_regex!(r"([XYIJ])([+-]?[0-9.]+)");

const ZERO_MISSING: &str = "zero suppression missing; assuming trailing suppression";
const PLACES_MISSING: &str = "places format missing; assuming [2, 4]";
const FORMAT_MISSING: &str =
    "zero suppression and places format missing; assuming trailing suppression; assuming [2, 4]";

/// Integer and decimal digit counts of fixed-width coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Places {
    /// Digits before the implied decimal point.
    pub integer: u8,
    /// Digits after the implied decimal point.
    pub decimal: u8,
}

impl Places {
    /// Fallback used for inch files and unresolved formats.
    pub const INCH: Self = Self::new(2, 4);
    /// Fallback used for metric drill files.
    pub const METRIC: Self = Self::new(3, 3);

    /// Creates a places pair.
    pub const fn new(integer: u8, decimal: u8) -> Self {
        Self { integer, decimal }
    }

    /// Default places for the given units.
    pub const fn for_units(units: Units) -> Self {
        match units {
            Units::Inch => Self::INCH,
            Units::Millimeter => Self::METRIC,
        }
    }

    /// Comparison tolerance derived from the decimal resolution.
    pub fn epsilon(self) -> f64 {
        1.5 * 10f64.powi(-i32::from(self.decimal))
    }
}

/// Zero-suppression convention of coordinate digit strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ZeroSuppression {
    /// Leading zeros omitted; digits are right-aligned.
    #[serde(rename = "L")]
    Leading,
    /// Trailing zeros omitted; digits are left-aligned.
    #[serde(rename = "T")]
    Trailing,
    /// Values carry an explicit decimal point.
    #[serde(rename = "D")]
    Decimal,
}

/// Measurement units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Units {
    /// Inches.
    #[serde(rename = "in")]
    Inch,
    /// Millimeters.
    #[serde(rename = "mm")]
    Millimeter,
}

/// Coordinate notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Notation {
    /// Absolute coordinates.
    #[serde(rename = "A")]
    Absolute,
    /// Incremental coordinates.
    #[serde(rename = "I")]
    Incremental,
}

/// Mutable per-job state owned by a parsing session.
///
/// Front ends may pre-seed any field before the first block; the parsers
/// only fill `places` and `zero` when they are still unresolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatState {
    /// Coordinate digit counts.
    pub places: Option<Places>,
    /// Zero-suppression mode.
    pub zero: Option<ZeroSuppression>,
    /// Job units.
    pub units: Option<Units>,
    /// Units from a legacy code or format hint.
    pub backup_units: Option<Units>,
    /// Coordinate notation.
    pub nota: Option<Notation>,
    /// Notation from a format hint.
    pub backup_nota: Option<Notation>,
    /// Arc quadrant mode.
    pub arc: Option<ArcMode>,
    /// Whether region mode is active.
    pub region: Option<bool>,
    /// Currently selected tool code.
    pub tool: Option<String>,
    /// Interpolation mode.
    pub mode: Option<InterpolationMode>,
    /// Geometric comparison tolerance.
    pub epsilon: Option<f64>,
}

impl FormatState {
    /// Fills `places` unless an earlier source already resolved it.
    pub fn places_or(&mut self, places: Places) -> Places {
        *self.places.get_or_insert(places)
    }

    /// Fills `zero` unless an earlier source already resolved it.
    pub fn zero_or(&mut self, zero: ZeroSuppression) -> ZeroSuppression {
        *self.zero.get_or_insert(zero)
    }

    /// Mirrors a scalar state change into the session state.
    pub fn apply(&mut self, setting: &Setting) {
        match setting {
            Setting::Units(units) => self.units = Some(*units),
            Setting::BackupUnits(units) => self.backup_units = Some(*units),
            Setting::Nota(nota) => self.nota = Some(*nota),
            Setting::BackupNota(nota) => self.backup_nota = Some(*nota),
            Setting::Arc(arc) => self.arc = Some(*arc),
            Setting::Region(region) => self.region = Some(*region),
            Setting::Tool(code) => self.tool = Some(code.clone()),
            Setting::Mode(mode) => self.mode = Some(*mode),
            Setting::Epsilon(epsilon) => self.epsilon = Some(*epsilon),
        }
    }

    /// Resolves `places` and `zero` ahead of the first coordinate.
    ///
    /// Returns the warning to report when anything had to be assumed.
    pub(crate) fn assume_coordinate_defaults(&mut self) -> Option<&'static str> {
        let message = match (self.zero.is_none(), self.places.is_none()) {
            (true, true) => FORMAT_MISSING,
            (true, false) => ZERO_MISSING,
            (false, true) => PLACES_MISSING,
            (false, false) => return None,
        };
        self.zero_or(ZeroSuppression::Trailing);
        self.places_or(Places::INCH);
        Some(message)
    }

    /// Resolved coordinate format, if both halves are known.
    pub fn coordinate_format(&self) -> Option<(Places, ZeroSuppression)> {
        self.places.zip(self.zero)
    }
}

/// Converts a signed digit string into a real value.
///
/// An explicit decimal point always wins; otherwise the digits are padded
/// to the full `places` width on the suppressed side and the decimal point
/// is placed `places.decimal` digits from the right.
///
/// # Errors
///
/// Returns [`ParseError::InvalidNumber`] when the field holds anything but
/// an optional sign, digits and at most one decimal point.
pub fn normalize_coordinate(
    raw: &str,
    places: Places,
    zero: ZeroSuppression,
) -> Result<f64, ParseError> {
    let (negative, magnitude) = split_sign(raw);
    if magnitude.is_empty() || !magnitude.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
        return Err(ParseError::invalid_number("coordinate", raw));
    }

    let value = if magnitude.contains('.') || zero == ZeroSuppression::Decimal {
        parse_f64(magnitude, raw)?
    } else {
        parse_f64(&implied_decimal(magnitude, places, zero), raw)?
    };

    Ok(if negative { -value } else { value })
}

/// Normalizes a tool diameter or aperture modifier.
///
/// Decimal values are taken literally. Bare digit strings follow the
/// current `places` and `zero` (leading by default); without known places
/// they are read as plain integers.
///
/// # Errors
///
/// Returns [`ParseError::InvalidNumber`] for malformed values.
pub fn normalize_tool_value(
    raw: &str,
    places: Option<Places>,
    zero: Option<ZeroSuppression>,
) -> Result<f64, ParseError> {
    let raw = raw.trim();
    match places {
        Some(places) if !raw.contains('.') => {
            normalize_coordinate(raw, places, zero.unwrap_or(ZeroSuppression::Leading))
        }
        _ => {
            let (negative, magnitude) = split_sign(raw);
            if magnitude.is_empty()
                || !magnitude.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
            {
                return Err(ParseError::invalid_number("tool value", raw));
            }
            let value = parse_f64(magnitude, raw)?;
            Ok(if negative { -value } else { value })
        }
    }
}

/// Splits a coordinate field such as `X-0125Y300` into per-axis values.
///
/// Axes absent from the field stay unset.
///
/// # Errors
///
/// Propagates [`normalize_coordinate`] failures.
pub fn parse_coordinate_field(
    field: &str,
    places: Places,
    zero: ZeroSuppression,
) -> Result<Location, ParseError> {
    let mut location = Location::default();
    for caps in RE_AXIS.captures_iter(field) {
        let (Some(axis), Some(digits)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let value = Some(normalize_coordinate(digits.as_str(), places, zero)?);
        match axis.as_str() {
            "X" => location.x = value,
            "Y" => location.y = value,
            "I" => location.i = value,
            "J" => location.j = value,
            _ => {}
        }
    }
    Ok(location)
}

fn implied_decimal(digits: &str, places: Places, zero: ZeroSuppression) -> String {
    let integer = usize::from(places.integer);
    let decimal = usize::from(places.decimal);
    let width = integer + decimal;

    let (expanded, split_index) = if zero == ZeroSuppression::Trailing {
        let expanded = format!("{digits:0<width$}");
        let split_index = integer.min(expanded.len());
        (expanded, split_index)
    } else {
        let expanded = format!("{digits:0>width$}");
        let split_index = expanded.len().saturating_sub(decimal);
        (expanded, split_index)
    };

    let (int_part, frac_part) = expanded.split_at(split_index);
    format!("0{int_part}.{frac_part}0")
}

fn split_sign(raw: &str) -> (bool, &str) {
    match (raw.strip_prefix('-'), raw.strip_prefix('+')) {
        (Some(rest), _) => (true, rest),
        (None, Some(rest)) => (false, rest),
        (None, None) => (false, raw),
    }
}

fn parse_f64(text: &str, raw: &str) -> Result<f64, ParseError> {
    text.parse::<f64>()
        .map_err(|_| ParseError::invalid_number("coordinate", raw))
}
