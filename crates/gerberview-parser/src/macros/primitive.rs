//! Macro aperture statements.
//!
//! Parses one statement of an `%AM` body into a [`PrimitiveBlock`] and
//! resolves parsed blocks against concrete modifier bindings.

use lazy_regex::{lazy_regex, Lazy, Regex};
use serde::Serialize;

use crate::error::ParseError;
use crate::session::WarningSink;

use super::expression::{parse_expression, Expression, Modifiers};

static RE_EXPR: Lazy<Regex> = lazy_regex!(r"[$+\-/xX]");
static RE_VAR_DEF: Lazy<Regex> = lazy_regex!(r"^\$([0-9]+)=(.+)$");

const VECTOR_CODE_2: &str = "macro aperture vector primitives with code 2 are deprecated";
const LOWER_LEFT_RECT: &str = "macro aperture lower-left rectangle primitives are deprecated";

/// A primitive field: a literal or an expression over the modifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Literal number.
    Number(f64),
    /// Deferred arithmetic.
    Expression(Expression),
}

impl Value {
    /// Resolves the field against the given bindings.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnboundVariable`] for missing bindings.
    pub fn resolve(&self, modifiers: &Modifiers) -> Result<f64, ParseError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Expression(expression) => expression.evaluate(modifiers),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

/// `$n=<expr>` statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDefinition {
    /// Variable number being assigned.
    pub index: u32,
    /// Right-hand side.
    pub expression: Expression,
}

impl VariableDefinition {
    /// Returns a copy of `modifiers` with this variable bound.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnboundVariable`] when the right-hand side
    /// references a missing binding.
    pub fn apply(&self, modifiers: &Modifiers) -> Result<Modifiers, ParseError> {
        let value = self.expression.evaluate(modifiers)?;
        let mut next = modifiers.clone();
        next.insert(self.index, value);
        Ok(next)
    }
}

/// Shape primitive with fields of type `T`.
///
/// Parsed macros hold `Primitive<Value>`; [`instantiate`] produces
/// `Primitive<f64>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Primitive<T> {
    /// Code 1.
    Circle {
        /// Exposure flag.
        exposure: T,
        /// Diameter.
        diameter: T,
        /// Center X.
        cx: T,
        /// Center Y.
        cy: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Codes 2 and 20.
    Vect {
        /// Exposure flag.
        exposure: T,
        /// Line width.
        width: T,
        /// Start X.
        x1: T,
        /// Start Y.
        y1: T,
        /// End X.
        x2: T,
        /// End Y.
        y2: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 21.
    Rect {
        /// Exposure flag.
        exposure: T,
        /// Width.
        width: T,
        /// Height.
        height: T,
        /// Center X.
        cx: T,
        /// Center Y.
        cy: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 22.
    #[serde(rename = "rectLL")]
    RectLowerLeft {
        /// Exposure flag.
        exposure: T,
        /// Width.
        width: T,
        /// Height.
        height: T,
        /// Lower-left X.
        x: T,
        /// Lower-left Y.
        y: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 4.
    Outline {
        /// Exposure flag.
        exposure: T,
        /// Flattened `x, y` point list.
        points: Vec<T>,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 5.
    Poly {
        /// Exposure flag.
        exposure: T,
        /// Vertex count.
        vertices: T,
        /// Center X.
        cx: T,
        /// Center Y.
        cy: T,
        /// Circumscribed diameter.
        diameter: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 6.
    Moire {
        /// Exposure flag.
        exposure: T,
        /// Center X.
        cx: T,
        /// Center Y.
        cy: T,
        /// Outer ring diameter.
        diameter: T,
        /// Ring thickness.
        ring_thickness: T,
        /// Gap between rings.
        ring_gap: T,
        /// Maximum ring count.
        max_rings: T,
        /// Crosshair thickness.
        cross_thickness: T,
        /// Crosshair length.
        cross_length: T,
        /// Rotation in degrees.
        rotation: T,
    },
    /// Code 7.
    Thermal {
        /// Exposure flag.
        exposure: T,
        /// Center X.
        cx: T,
        /// Center Y.
        cy: T,
        /// Outer diameter.
        outer_diameter: T,
        /// Inner diameter.
        inner_diameter: T,
        /// Gap width.
        gap: T,
        /// Rotation in degrees.
        rotation: T,
    },
}

impl<T> Primitive<T> {
    /// Converts every field with `f`, short-circuiting on the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(&T) -> Result<U, E>) -> Result<Primitive<U>, E> {
        Ok(match self {
            Self::Circle {
                exposure,
                diameter,
                cx,
                cy,
                rotation,
            } => Primitive::Circle {
                exposure: f(exposure)?,
                diameter: f(diameter)?,
                cx: f(cx)?,
                cy: f(cy)?,
                rotation: f(rotation)?,
            },
            Self::Vect {
                exposure,
                width,
                x1,
                y1,
                x2,
                y2,
                rotation,
            } => Primitive::Vect {
                exposure: f(exposure)?,
                width: f(width)?,
                x1: f(x1)?,
                y1: f(y1)?,
                x2: f(x2)?,
                y2: f(y2)?,
                rotation: f(rotation)?,
            },
            Self::Rect {
                exposure,
                width,
                height,
                cx,
                cy,
                rotation,
            } => Primitive::Rect {
                exposure: f(exposure)?,
                width: f(width)?,
                height: f(height)?,
                cx: f(cx)?,
                cy: f(cy)?,
                rotation: f(rotation)?,
            },
            Self::RectLowerLeft {
                exposure,
                width,
                height,
                x,
                y,
                rotation,
            } => Primitive::RectLowerLeft {
                exposure: f(exposure)?,
                width: f(width)?,
                height: f(height)?,
                x: f(x)?,
                y: f(y)?,
                rotation: f(rotation)?,
            },
            Self::Outline {
                exposure,
                points,
                rotation,
            } => Primitive::Outline {
                exposure: f(exposure)?,
                points: points.iter().map(&mut f).collect::<Result<_, _>>()?,
                rotation: f(rotation)?,
            },
            Self::Poly {
                exposure,
                vertices,
                cx,
                cy,
                diameter,
                rotation,
            } => Primitive::Poly {
                exposure: f(exposure)?,
                vertices: f(vertices)?,
                cx: f(cx)?,
                cy: f(cy)?,
                diameter: f(diameter)?,
                rotation: f(rotation)?,
            },
            Self::Moire {
                exposure,
                cx,
                cy,
                diameter,
                ring_thickness,
                ring_gap,
                max_rings,
                cross_thickness,
                cross_length,
                rotation,
            } => Primitive::Moire {
                exposure: f(exposure)?,
                cx: f(cx)?,
                cy: f(cy)?,
                diameter: f(diameter)?,
                ring_thickness: f(ring_thickness)?,
                ring_gap: f(ring_gap)?,
                max_rings: f(max_rings)?,
                cross_thickness: f(cross_thickness)?,
                cross_length: f(cross_length)?,
                rotation: f(rotation)?,
            },
            Self::Thermal {
                exposure,
                cx,
                cy,
                outer_diameter,
                inner_diameter,
                gap,
                rotation,
            } => Primitive::Thermal {
                exposure: f(exposure)?,
                cx: f(cx)?,
                cy: f(cy)?,
                outer_diameter: f(outer_diameter)?,
                inner_diameter: f(inner_diameter)?,
                gap: f(gap)?,
                rotation: f(rotation)?,
            },
        })
    }
}

/// One statement of a macro aperture body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrimitiveBlock {
    /// Code 0; carries no geometry.
    Comment,
    /// `$n=<expr>` assignment.
    Variable(VariableDefinition),
    /// Shape primitive.
    #[serde(untagged)]
    Shape(Primitive<Value>),
}

/// Parses one macro statement such as `1,1,$1,0,0` or `$3=$1x2`.
///
/// Returns `Ok(None)` for an unrecognized primitive code, after warning.
///
/// # Errors
///
/// Returns [`ParseError::InvalidNumber`] for malformed literals and
/// [`ParseError::MalformedExpression`] for unparsable expressions.
pub fn parse_primitive_block(
    block: &str,
    warnings: &mut impl WarningSink,
) -> Result<Option<PrimitiveBlock>, ParseError> {
    let block = block.trim();

    if block.starts_with('0') {
        return Ok(Some(PrimitiveBlock::Comment));
    }

    if let Some(caps) = RE_VAR_DEF.captures(block) {
        let (Some(index), Some(expression)) = (caps.get(1), caps.get(2)) else {
            return Err(ParseError::malformed(block, "invalid variable definition"));
        };
        let index = index
            .as_str()
            .parse::<u32>()
            .map_err(|_| ParseError::invalid_number("macro variable", index.as_str()))?;
        let expression = parse_expression(expression.as_str())?;
        return Ok(Some(PrimitiveBlock::Variable(VariableDefinition {
            index,
            expression,
        })));
    }

    let mut fields = block.split(',').map(str::trim);
    let code_raw = fields.next().unwrap_or_default();
    let code = code_raw
        .parse::<u32>()
        .map_err(|_| ParseError::invalid_number("macro primitive code", code_raw))?;
    let mods = fields.map(parse_value).collect::<Result<Vec<_>, _>>()?;
    let field = |index: usize| mods.get(index).cloned().unwrap_or_default();

    let primitive = match code {
        1 => Primitive::Circle {
            exposure: field(0),
            diameter: field(1),
            cx: field(2),
            cy: field(3),
            rotation: field(4),
        },
        2 | 20 => {
            if code == 2 {
                warnings.warn(VECTOR_CODE_2.to_string());
            }
            Primitive::Vect {
                exposure: field(0),
                width: field(1),
                x1: field(2),
                y1: field(3),
                x2: field(4),
                y2: field(5),
                rotation: field(6),
            }
        }
        21 => Primitive::Rect {
            exposure: field(0),
            width: field(1),
            height: field(2),
            cx: field(3),
            cy: field(4),
            rotation: field(5),
        },
        22 => {
            warnings.warn(LOWER_LEFT_RECT.to_string());
            Primitive::RectLowerLeft {
                exposure: field(0),
                width: field(1),
                height: field(2),
                x: field(3),
                y: field(4),
                rotation: field(5),
            }
        }
        4 => {
            // exposure, point count, points..., rotation
            let points = mods
                .get(2..mods.len().saturating_sub(1))
                .map(<[Value]>::to_vec)
                .unwrap_or_default();
            let rotation = if mods.len() > 2 {
                mods.last().cloned().unwrap_or_default()
            } else {
                Value::default()
            };
            Primitive::Outline {
                exposure: field(0),
                points,
                rotation,
            }
        }
        5 => Primitive::Poly {
            exposure: field(0),
            vertices: field(1),
            cx: field(2),
            cy: field(3),
            diameter: field(4),
            rotation: field(5),
        },
        6 => Primitive::Moire {
            exposure: field(0),
            cx: field(1),
            cy: field(2),
            diameter: field(3),
            ring_thickness: field(4),
            ring_gap: field(5),
            max_rings: field(6),
            cross_thickness: field(7),
            cross_length: field(8),
            rotation: field(9),
        },
        7 => Primitive::Thermal {
            exposure: field(0),
            cx: field(1),
            cy: field(2),
            outer_diameter: field(3),
            inner_diameter: field(4),
            gap: field(5),
            rotation: field(6),
        },
        other => {
            warnings.warn(format!(
                "{other} is an unrecognized primitive for a macro aperture"
            ));
            return Ok(None);
        }
    };

    Ok(Some(PrimitiveBlock::Shape(primitive)))
}

/// Resolves a macro body against one aperture's modifiers.
///
/// Statements run in source order: each variable definition rebinds the
/// modifiers seen by every later statement. Comments are dropped.
///
/// # Errors
///
/// Returns [`ParseError::UnboundVariable`] when any statement references
/// a modifier that is never bound.
pub fn instantiate(
    blocks: &[PrimitiveBlock],
    modifiers: &Modifiers,
) -> Result<Vec<Primitive<f64>>, ParseError> {
    let mut modifiers = modifiers.clone();
    let mut resolved = Vec::new();

    for block in blocks {
        match block {
            PrimitiveBlock::Comment => {}
            PrimitiveBlock::Variable(definition) => modifiers = definition.apply(&modifiers)?,
            PrimitiveBlock::Shape(primitive) => {
                resolved.push(primitive.try_map(|value| value.resolve(&modifiers))?);
            }
        }
    }

    Ok(resolved)
}

fn parse_value(field: &str) -> Result<Value, ParseError> {
    if RE_EXPR.is_match(field) {
        return parse_expression(field).map(Value::Expression);
    }
    field
        .parse::<f64>()
        .map(Value::Number)
        .map_err(|_| ParseError::invalid_number("macro modifier", field))
}
