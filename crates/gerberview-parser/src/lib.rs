#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `GerberView` parser module: Gerber RS-274X and NC drill block decoding
//! into a typed command stream.

pub mod blocks;
pub mod command;
pub mod error;
pub mod excellon;
pub mod format;
pub mod gerber;
pub mod macros;
pub mod session;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use crate::command::{Command, Level, Location, Operation, Setting, Shape, ToolDefinition};
pub use crate::error::ParseError;
pub use crate::format::{FormatState, Notation, Places, Units, ZeroSuppression};
pub use crate::session::{FileType, Parser, Warning};

/// Everything a one-shot parse produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    /// Commands in emission order.
    pub commands: Vec<Command>,
    /// Recoverable anomalies, in the order they were reported.
    pub warnings: Vec<Warning>,
    /// Format state after the last block.
    pub format: FormatState,
}

/// Initialize the WASM module. Sets up the panic hook for debugging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Parse a Gerber RS-274X file from raw bytes.
///
/// Returns [`ParseOutput`] as a `JsValue` via `serde-wasm-bindgen`.
///
/// # Errors
///
/// Returns a descriptive error string if parsing fails fatally.
#[wasm_bindgen]
pub fn parse_gerber(data: &[u8]) -> Result<JsValue, JsValue> {
    let output = parse_gerber_internal(data).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&output)
}

/// Parse an NC drill file from raw bytes.
///
/// Returns [`ParseOutput`] as a `JsValue` via `serde-wasm-bindgen`.
///
/// # Errors
///
/// Returns a descriptive error string if parsing fails fatally.
#[wasm_bindgen]
pub fn parse_drill(data: &[u8]) -> Result<JsValue, JsValue> {
    let output = parse_drill_internal(data).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&output)
}

/// Parse a Gerber file, calling `callback` once per command in order.
///
/// Returns the warnings as a `JsValue` array.
///
/// # Errors
///
/// Returns the fatal error message; commands decoded before it have
/// already been delivered.
#[wasm_bindgen]
pub fn stream_gerber(data: &[u8], callback: &js_sys::Function) -> Result<JsValue, JsValue> {
    stream_to_js(FileType::Gerber, data, callback)
}

/// Parse a drill file, calling `callback` once per command in order.
///
/// Returns the warnings as a `JsValue` array.
///
/// # Errors
///
/// Returns the fatal error message; commands decoded before it have
/// already been delivered.
#[wasm_bindgen]
pub fn stream_drill(data: &[u8], callback: &js_sys::Function) -> Result<JsValue, JsValue> {
    stream_to_js(FileType::Drill, data, callback)
}

fn stream_to_js(
    file_type: FileType,
    data: &[u8],
    callback: &js_sys::Function,
) -> Result<JsValue, JsValue> {
    let mut delivery: Result<(), JsValue> = Ok(());
    let warnings = stream_internal(file_type, data, |command| {
        if delivery.is_err() {
            return;
        }
        delivery = to_js(&command)
            .and_then(|value| callback.call1(&JsValue::NULL, &value).map(drop));
    })
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    delivery?;
    to_js(&warnings)
}

/// Flattened commands serialize through maps; keep them plain JS objects.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Internal parse logic shared between the wasm export and native tests.
///
/// # Errors
///
/// Returns [`ParseError::InvalidInput`] for empty or non-UTF-8 data and
/// the first fatal block error otherwise.
#[doc(hidden)]
pub fn parse_gerber_internal(data: &[u8]) -> Result<ParseOutput, ParseError> {
    parse_internal(FileType::Gerber, data)
}

/// Internal parse logic shared between the wasm export and native tests.
///
/// # Errors
///
/// See [`parse_gerber_internal`].
#[doc(hidden)]
pub fn parse_drill_internal(data: &[u8]) -> Result<ParseOutput, ParseError> {
    parse_internal(FileType::Drill, data)
}

fn parse_internal(file_type: FileType, data: &[u8]) -> Result<ParseOutput, ParseError> {
    let text = decode(data)?;
    let mut parser = Parser::new(file_type);
    let mut commands = Vec::new();

    for block in blocks::split(file_type, text) {
        parser.parse_block(block.line, &block.text)?;
        commands.extend(parser.drain());
    }

    Ok(ParseOutput {
        commands,
        warnings: parser.take_warnings(),
        format: parser.format().clone(),
    })
}

/// Push-style parse: hands every command to `on_command` as soon as its
/// block is decoded and returns the collected warnings.
///
/// # Errors
///
/// See [`parse_gerber_internal`].
#[doc(hidden)]
pub fn stream_internal(
    file_type: FileType,
    data: &[u8],
    mut on_command: impl FnMut(Command),
) -> Result<Vec<Warning>, ParseError> {
    let text = decode(data)?;
    let mut parser = Parser::new(file_type);

    for block in blocks::split(file_type, text) {
        parser.parse_block_with(block.line, &block.text, &mut on_command)?;
    }

    Ok(parser.take_warnings())
}

fn decode(data: &[u8]) -> Result<&str, ParseError> {
    if data.is_empty() {
        return Err(ParseError::InvalidInput("empty input".to_string()));
    }
    std::str::from_utf8(data)
        .map_err(|err| ParseError::InvalidInput(format!("invalid UTF-8 input: {err}")))
}
