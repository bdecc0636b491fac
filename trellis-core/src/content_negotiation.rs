//! Content negotiation for resource responses.
//!
//! Every resource exposes an ordered list of [`MimetypePair`]s: the generic
//! JSON and XML pairs, plus vendor-specific pairs when the resource declares
//! a vendor (`application/vnd.<vendor>.<name>+json`). The negotiator picks
//! one media type from the list or item side of those pairs according to the
//! client's `Accept` header.
//!
//! # Examples
//!
//! ```
//! use trellis_core::content_negotiation::{negotiate, MediaType, TieBreak};
//!
//! let supported = vec![
//!     MediaType::json(),
//!     MediaType::parse("application/vnd.example.foo+json").unwrap(),
//! ];
//! let selected = negotiate(
//!     Some("application/vnd.example.foo+json, application/json;q=0.9"),
//!     &supported,
//!     TieBreak::HeaderOrder,
//! )
//! .unwrap();
//! assert_eq!(selected.mime_type(), "application/vnd.example.foo+json");
//! ```

use crate::Error;
use crate::payload::Format;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Media Types
// ============================================================================

/// Represents a media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "vnd.example.item+json")
    pub subtype: String,
    /// Optional parameters (e.g., charset=utf-8)
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    /// Create a new media type.
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
            params: BTreeMap::new(),
        }
    }

    /// Create a media type with a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Create `application/json` media type.
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// Create `application/xml` media type.
    pub fn xml() -> Self {
        Self::new("application", "xml")
    }

    /// Create `*/*` wildcard media type.
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Vendor media type `application/vnd.<vendor>.<name>+<format>`.
    pub fn vendor(vendor: &str, name: &str, format: Format) -> Self {
        let suffix = match format {
            Format::Json => "json",
            Format::Xml => "xml",
        };
        Self::new("application", format!("vnd.{}.{}+{}", vendor, name, suffix))
    }

    /// Parse a media type from a string (without quality value).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut parts = s.split(';');

        let type_subtype = parts.next()?.trim();
        let (type_, subtype) = type_subtype.split_once('/')?;
        let type_ = type_.trim().to_lowercase();
        let subtype = subtype.trim().to_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = BTreeMap::new();
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().trim_matches('"').to_string();
                // Skip quality parameter
                if key != "q" {
                    params.insert(key, value);
                }
            }
        }

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// Check if this media type matches another (considering wildcards).
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// Exact type/subtype equality, ignoring parameters.
    pub fn same_type(&self, other: &MediaType) -> bool {
        self.type_ == other.type_ && self.subtype == other.subtype
    }

    /// Check if either part is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.type_ == "*" || self.subtype == "*"
    }

    /// Vendor subtypes (`vnd.*`) are only ever selected when named explicitly.
    pub fn is_vendor(&self) -> bool {
        self.subtype.starts_with("vnd.")
    }

    /// Get the full MIME type string.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    /// Get the full MIME type string with parameters.
    pub fn to_header_value(&self) -> String {
        let mut result = self.mime_type();
        for (key, value) in &self.params {
            result.push_str(&format!("; {}={}", key, value));
        }
        result
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}

// ============================================================================
// Accept Header
// ============================================================================

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pub media_type: MediaType,
    pub quality: f32,
    /// Position in the header, used for tie-breaking.
    pub index: usize,
}

/// Represents a parsed `Accept` header with quality values.
#[derive(Debug, Clone, Default)]
pub struct Accept {
    /// Acceptable media types, sorted by quality then header position.
    pub entries: Vec<AcceptEntry>,
    /// Media types listed with `q=0`.
    pub refused: Vec<MediaType>,
}

impl Accept {
    /// Parse an Accept header string.
    ///
    /// ```
    /// use trellis_core::content_negotiation::Accept;
    ///
    /// let accept = Accept::parse("application/json, text/html;q=0.9, text/plain;q=0");
    /// assert_eq!(accept.entries.len(), 2);
    /// assert_eq!(accept.refused.len(), 1);
    /// ```
    pub fn parse(header: &str) -> Self {
        let mut entries = Vec::new();
        let mut refused = Vec::new();

        for (index, part) in header.split(',').enumerate() {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let quality = Self::extract_quality(part);
            let Some(media_type) = MediaType::parse(part) else {
                continue;
            };

            if quality <= 0.0 {
                refused.push(media_type);
            } else {
                entries.push(AcceptEntry {
                    media_type,
                    quality,
                    index,
                });
            }
        }

        // Stable sort: highest quality first, header order within a quality
        entries.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal));

        Self { entries, refused }
    }

    /// Extract the `q` parameter, defaulting to 1.0 and clamped to [0, 1].
    fn extract_quality(part: &str) -> f32 {
        part.split(';')
            .skip(1)
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, value)| value.trim().parse::<f32>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    /// Whether the client explicitly refused a media type.
    pub fn refuses(&self, media_type: &MediaType) -> bool {
        self.refused.iter().any(|r| {
            if r.is_wildcard() {
                r.matches(media_type) && !media_type.is_vendor()
            } else {
                r.same_type(media_type)
            }
        })
    }

    /// Entries grouped by equal quality, highest first.
    fn quality_groups(&self) -> Vec<&[AcceptEntry]> {
        let mut groups = Vec::new();
        let mut rest = self.entries.as_slice();
        while let Some(first) = rest.first() {
            let len = rest
                .iter()
                .take_while(|e| e.quality == first.quality)
                .count();
            let (group, tail) = rest.split_at(len);
            groups.push(group);
            rest = tail;
        }
        groups
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// How to choose between equally-weighted `Accept` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The entry the client listed first wins.
    #[default]
    HeaderOrder,
    /// The mimetype the resource declared first wins.
    DeclarationOrder,
}

/// Pick one of `supported` for the given `Accept` header.
///
/// Exact matches (vendor subtypes included) win over wildcard matches within
/// each quality group. Wildcards only ever select generic mimetypes. A
/// missing or empty header selects the first supported type.
pub fn negotiate(
    accept: Option<&str>,
    supported: &[MediaType],
    tie_break: TieBreak,
) -> Result<MediaType, Error> {
    let header = accept.map(str::trim).filter(|h| !h.is_empty());
    let Some(header) = header else {
        return supported
            .first()
            .cloned()
            .ok_or_else(|| Error::NotAcceptable("no mimetypes are available".to_string()));
    };

    let accept = Accept::parse(header);
    let allowed: Vec<&MediaType> = supported.iter().filter(|s| !accept.refuses(s)).collect();

    for group in accept.quality_groups() {
        let exact = |entry: &AcceptEntry, candidate: &MediaType| {
            !entry.media_type.is_wildcard() && entry.media_type.same_type(candidate)
        };
        let wildcard = |entry: &AcceptEntry, candidate: &MediaType| {
            entry.media_type.is_wildcard()
                && !candidate.is_vendor()
                && entry.media_type.matches(candidate)
        };

        let rules: [&dyn Fn(&AcceptEntry, &MediaType) -> bool; 2] = [&exact, &wildcard];
        for rule in rules {
            let found = match tie_break {
                TieBreak::HeaderOrder => group.iter().find_map(|entry| {
                    allowed.iter().find(|candidate| rule(entry, candidate))
                }),
                TieBreak::DeclarationOrder => allowed
                    .iter()
                    .find(|candidate| group.iter().any(|entry| rule(entry, candidate))),
            };
            if let Some(found) = found {
                return Ok((*found).clone());
            }
        }
    }

    Err(Error::NotAcceptable(format!(
        "none of the requested mimetypes are supported: {}",
        header
    )))
}

/// Resolve the effective `Accept` value, honoring the `api_format` override.
pub fn effective_accept(
    api_format: Option<&str>,
    accept: Option<&str>,
) -> Result<Option<String>, Error> {
    match api_format {
        Some(value) => Format::from_api_format(value)
            .map(|format| Some(format.media_type().mime_type()))
            .ok_or_else(|| Error::NotAcceptable(format!("unsupported api_format '{}'", value))),
        None => Ok(accept.map(str::to_string)),
    }
}

/// A list mimetype and the mimetype of each entry in that list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimetypePair {
    pub list: MediaType,
    pub item: MediaType,
}

impl MimetypePair {
    pub fn new(list: MediaType, item: MediaType) -> Self {
        Self { list, item }
    }

    /// The generic pair for a format.
    pub fn generic(format: Format) -> Self {
        Self::new(format.media_type(), format.media_type())
    }

    /// The vendor pair for a resource.
    pub fn vendor(vendor: &str, name: &str, name_plural: &str, format: Format) -> Self {
        Self::new(
            MediaType::vendor(vendor, name_plural, format),
            MediaType::vendor(vendor, name, format),
        )
    }

    /// Pairs a resource serves, generic first.
    pub fn for_resource(
        vendor: Option<&str>,
        name: &str,
        name_plural: &str,
        singleton: bool,
    ) -> Vec<Self> {
        let mut pairs = vec![Self::generic(Format::Json), Self::generic(Format::Xml)];
        if let Some(vendor) = vendor {
            let list_name = if singleton { name } else { name_plural };
            pairs.push(Self::vendor(vendor, name, list_name, Format::Json));
            pairs.push(Self::vendor(vendor, name, list_name, Format::Xml));
        }
        pairs
    }
}

/// Outcome of negotiating a resource response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Value for the `Content-Type` header.
    pub content_type: MediaType,
    /// Value for `Item-Content-Type` on list responses.
    pub item_content_type: Option<MediaType>,
    pub format: Format,
}

/// Negotiate the response type for an item or list of a resource.
///
/// A generic selection is upgraded to the resource's vendor type of the same
/// format, so clients always learn the resource-specific type.
pub fn negotiate_pairs(
    accept: Option<&str>,
    pairs: &[MimetypePair],
    is_list: bool,
    tie_break: TieBreak,
) -> Result<Negotiated, Error> {
    let side = |pair: &MimetypePair| if is_list { pair.list.clone() } else { pair.item.clone() };
    let supported: Vec<MediaType> = pairs.iter().map(side).collect();

    let selected = negotiate(accept, &supported, tie_break)?;
    let format = Format::from_media_type(&selected).ok_or_else(|| {
        Error::NotAcceptable(format!("unsupported mimetype {}", selected.mime_type()))
    })?;

    let content_type = if selected.is_vendor() {
        selected
    } else {
        supported
            .iter()
            .find(|mt| mt.is_vendor() && Format::from_media_type(mt) == Some(format))
            .cloned()
            .unwrap_or(selected)
    };

    let item_content_type = if is_list {
        pairs
            .iter()
            .find(|pair| pair.list.same_type(&content_type))
            .map(|pair| pair.item.clone())
    } else {
        None
    };

    Ok(Negotiated {
        content_type,
        item_content_type,
        format,
    })
}

// ============================================================================
// Tests
// ============================================================================
