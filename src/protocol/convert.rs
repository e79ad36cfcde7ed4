//! Typed value converter
//!
//! Turns a `name[:type]=value` token into a field name and a [`TypedValue`].
//! Conversion never fails: a malformed numeric payload keeps its raw text
//! while the declared type tag is preserved.

use crate::protocol::tokenizer::parse_masked_u32;
use crate::types::{TypeTag, TypedValue, Variant};

/// Convert a single field token
///
/// Returns `None` for tokens without `=`. The type suffix is whatever follows
/// the last `:` of the name part, so `a:b:u=1` names the field `a:b`.
pub fn convert_token(token: &str) -> Option<(String, TypedValue)> {
    let (name_part, raw_value) = token.split_once('=')?;
    let (name, type_tag) = match name_part.rsplit_once(':') {
        Some((name, suffix)) => (name, TypeTag::from_suffix(suffix)),
        None => (name_part, TypeTag::Str),
    };
    Some((name.to_string(), convert_value(type_tag, raw_value)))
}

/// Convert a raw payload according to its declared type
pub fn convert_value(type_tag: TypeTag, raw: &str) -> TypedValue {
    let converted = match type_tag {
        TypeTag::Uint | TypeTag::Timestamp => parse_masked_u32(raw).map(Variant::Uint),
        TypeTag::Int => raw.parse::<i64>().ok().map(Variant::Int),
        TypeTag::Float => raw.parse::<f64>().ok().map(Variant::Float),
        TypeTag::Str | TypeTag::Message => None,
    };

    let value = converted.unwrap_or_else(|| Variant::Str(raw.to_string()));
    TypedValue::new(value, type_tag)
}
