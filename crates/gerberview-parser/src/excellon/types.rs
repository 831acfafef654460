//! Drill file format hints.

use lazy_regex::{lazy_regex, Lazy, Regex};

use crate::format::{Notation, Places, Units, ZeroSuppression};

static RE_KICAD_HINT: Lazy<Regex> = lazy_regex!(
    r";FORMAT=\{(.):(.)/ (absolute|.+)? / (metric|inch) /.+(trailing|leading|decimal|keep)"
);
static RE_ALTIUM_HINT: Lazy<Regex> = lazy_regex!(r";FILE_FORMAT=([0-9]):([0-9])");

/// Format information carried in a CAD-specific drill comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    /// `;FORMAT={i:d/ absolute / metric / suppress trailing zeros}`.
    KiCad {
        /// Places, when both digit fields are numeric.
        places: Option<Places>,
        /// Coordinate notation.
        notation: Notation,
        /// Units.
        units: Units,
        /// Zero suppression.
        zero: ZeroSuppression,
    },
    /// `;FILE_FORMAT=i:d`.
    Altium {
        /// Places.
        places: Places,
    },
}

impl FormatHint {
    /// Recognizes a format hint in a drill comment block.
    pub fn parse(comment: &str) -> Option<Self> {
        if let Some(caps) = RE_KICAD_HINT.captures(comment) {
            let group = |index: usize| caps.get(index).map_or("", |m| m.as_str());
            let places = match (group(1).parse::<u8>(), group(2).parse::<u8>()) {
                (Ok(integer), Ok(decimal)) => Some(Places::new(integer, decimal)),
                _ => None,
            };
            let notation = if group(3) == "absolute" {
                Notation::Absolute
            } else {
                Notation::Incremental
            };
            let units = if group(4) == "metric" {
                Units::Millimeter
            } else {
                Units::Inch
            };
            let zero = match group(5) {
                "leading" | "keep" => ZeroSuppression::Leading,
                "trailing" => ZeroSuppression::Trailing,
                _ => ZeroSuppression::Decimal,
            };
            return Some(Self::KiCad {
                places,
                notation,
                units,
                zero,
            });
        }

        let caps = RE_ALTIUM_HINT.captures(comment)?;
        let integer = caps.get(1)?.as_str().parse::<u8>().ok()?;
        let decimal = caps.get(2)?.as_str().parse::<u8>().ok()?;
        Some(Self::Altium {
            places: Places::new(integer, decimal),
        })
    }
}
