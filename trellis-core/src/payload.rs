//! Response envelopes and their JSON/XML encodings.
//!
//! Every successful response is wrapped as `{"stat": "ok", ...}` and every
//! failure as `{"stat": "fail", "err": {...}}` (see [`Error::to_payload`]).
//! The XML encoding mirrors the JSON tree under an `<rsp>` root element.

use crate::Error;
use crate::content_negotiation::MediaType;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::io::Cursor;

/// Wire format of a negotiated mimetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    /// Format family of a media type, including `+json`/`+xml` suffixes.
    pub fn from_media_type(media_type: &MediaType) -> Option<Self> {
        let subtype = media_type.subtype.as_str();
        if subtype == "json" || subtype.ends_with("+json") {
            Some(Format::Json)
        } else if subtype == "xml" || subtype.ends_with("+xml") {
            Some(Format::Xml)
        } else {
            None
        }
    }

    /// Parse the `api_format` query parameter.
    pub fn from_api_format(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "xml" => Some(Format::Xml),
            _ => None,
        }
    }

    /// The generic media type of this format.
    pub fn media_type(&self) -> MediaType {
        match self {
            Format::Json => MediaType::json(),
            Format::Xml => MediaType::xml(),
        }
    }

    /// Encode a payload tree in this format.
    pub fn encode(&self, payload: &Value) -> Result<Vec<u8>, Error> {
        match self {
            Format::Json => Ok(serde_json::to_vec(payload)?),
            Format::Xml => encode_xml(payload),
        }
    }
}

/// `{"stat": "ok", "<name>": item}`
pub fn item_envelope(name: &str, item: Value) -> Value {
    let mut rsp = Map::new();
    rsp.insert("stat".to_string(), Value::from("ok"));
    rsp.insert(name.to_string(), item);
    Value::Object(rsp)
}

/// `{"stat": "ok", "<plural>": [...], "total_results": N, "links": {...}}`
pub fn list_envelope(
    name_plural: &str,
    items: Vec<Value>,
    total_results: usize,
    links: Map<String, Value>,
) -> Value {
    let mut rsp = Map::new();
    rsp.insert("stat".to_string(), Value::from("ok"));
    rsp.insert(name_plural.to_string(), Value::Array(items));
    rsp.insert("total_results".to_string(), Value::from(total_results));
    rsp.insert("links".to_string(), Value::Object(links));
    Value::Object(rsp)
}

/// Wrap an arbitrary handler payload, adding `stat` when it is missing.
pub fn raw_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            if !map.contains_key("stat") {
                map.insert("stat".to_string(), Value::from("ok"));
            }
            Value::Object(map)
        }
        other => {
            let mut rsp = Map::new();
            rsp.insert("stat".to_string(), Value::from("ok"));
            rsp.insert("result".to_string(), other);
            Value::Object(rsp)
        }
    }
}

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Serialization(format!("XML encoding failed: {}", err))
}

/// Whether `name` can be written as an element name without rewriting.
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// Keys from raw payloads may hold spaces or start with a digit.
fn element_name(key: &str) -> Cow<'_, str> {
    if is_xml_name(key) {
        return Cow::Borrowed(key);
    }
    let mut name = String::with_capacity(key.len() + 1);
    if !key.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.push('_');
    }
    name.extend(key.chars().map(|c| {
        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            c
        } else {
            '_'
        }
    }));
    Cow::Owned(name)
}

fn encode_xml(payload: &Value) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, "rsp", payload)?;
    Ok(writer.into_inner().into_inner())
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &Value) -> Result<(), Error> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;

    match value {
        Value::Null => {}
        Value::Bool(b) => {
            let text = if *b { "1" } else { "0" };
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        Value::Number(n) => {
            writer
                .write_event(Event::Text(BytesText::new(&n.to_string())))
                .map_err(xml_error)?;
        }
        Value::String(s) => {
            writer
                .write_event(Event::Text(BytesText::new(s)))
                .map_err(xml_error)?;
        }
        Value::Array(items) => {
            writer
                .write_event(Event::Start(BytesStart::new("array")))
                .map_err(xml_error)?;
            for item in items {
                write_element(writer, "item", item)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("array")))
                .map_err(xml_error)?;
        }
        Value::Object(map) => {
            for (key, child) in map {
                write_element(writer, &element_name(key), child)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}
