//! ETag and conditional request handling.
//!
//! A resource declares at most one [`CachePolicy`]. For item reads the
//! dispatcher runs the [`CacheValidator`], which computes the validator for
//! the resolved object and compares it with `If-None-Match` or
//! `If-Modified-Since`. Validators are attached to every successful item
//! response, even when the request carried no conditional header.

use crate::collection::{Object, downcast};
use crate::{Error, HttpRequest, HttpResponse};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// ETag
// ============================================================================

/// An HTTP entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag {
    /// The tag value (without quotes)
    pub value: String,
    /// Whether this is a weak ETag
    pub weak: bool,
}

impl ETag {
    /// Create a strong ETag.
    pub fn strong(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: false,
        }
    }

    /// Create a weak ETag.
    pub fn weak(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: true,
        }
    }

    /// Parse an ETag from a header value.
    ///
    /// Surrounding quotes are optional so that sloppy clients sending bare
    /// tokens still revalidate.
    ///
    /// ```
    /// use trellis_core::conditional::ETag;
    ///
    /// let weak = ETag::parse("W/\"abc123\"").unwrap();
    /// assert!(weak.weak);
    /// assert_eq!(weak.value, "abc123");
    /// assert_eq!(ETag::parse("abc123").unwrap().value, "abc123");
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        let (weak, value_part) = match s.strip_prefix("W/").or_else(|| s.strip_prefix("w/")) {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let value = value_part
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value_part);

        if value.is_empty() {
            return None;
        }

        Some(Self {
            value: value.to_string(),
            weak,
        })
    }

    /// Strong ETag from the SHA-256 digest of `data`.
    pub fn from_digest(data: &[u8]) -> Self {
        Self::strong(hex::encode(Sha256::digest(data)))
    }

    /// Get the header value representation.
    pub fn to_header_value(&self) -> String {
        if self.weak {
            format!("W/\"{}\"", self.value)
        } else {
            format!("\"{}\"", self.value)
        }
    }

    /// Weak comparison: values must match, the weak flag is ignored.
    pub fn weak_match(&self, other: &ETag) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}

// ============================================================================
// ETag List (for If-None-Match)
// ============================================================================

/// Represents a list of ETags from an If-None-Match header.
#[derive(Debug, Clone, Default)]
pub struct ETagList {
    pub etags: Vec<ETag>,
    /// Whether the header is the wildcard "*"
    pub any: bool,
}

impl ETagList {
    /// Create an ETag list that matches any ETag.
    pub fn any() -> Self {
        Self {
            etags: Vec::new(),
            any: true,
        }
    }

    /// Parse an ETag list from a header value.
    pub fn parse(header: &str) -> Self {
        let header = header.trim();

        if header == "*" {
            return Self::any();
        }

        let etags = header.split(',').filter_map(ETag::parse).collect();

        Self { etags, any: false }
    }

    /// Check if any ETag in the list matches (weak comparison).
    pub fn contains_weak(&self, etag: &ETag) -> bool {
        self.any || self.etags.iter().any(|e| e.weak_match(etag))
    }
}

// ============================================================================
// Conditional Request Headers
// ============================================================================

/// Parsed conditional request headers.
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<ETagList>,
    pub if_modified_since: Option<SystemTime>,
}

impl ConditionalHeaders {
    /// Parse conditional headers from an HTTP request.
    pub fn from_request(request: &HttpRequest) -> Self {
        let if_none_match = request.header("If-None-Match").map(ETagList::parse);

        let if_modified_since = request
            .header("If-Modified-Since")
            .and_then(|h| httpdate::parse_http_date(h).ok());

        Self {
            if_none_match,
            if_modified_since,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }

    /// Check if the resource should return 304 Not Modified.
    ///
    /// If-Modified-Since is ignored whenever If-None-Match is present
    /// (RFC 9110 section 13.2.2) and is compared at one-second granularity.
    pub fn is_not_modified(&self, etag: Option<&ETag>, last_modified: Option<SystemTime>) -> bool {
        if let Some(if_none_match) = &self.if_none_match {
            return etag.is_some_and(|etag| if_none_match.contains_weak(etag));
        }

        if let (Some(if_modified_since), Some(last_modified)) =
            (self.if_modified_since, last_modified)
        {
            return unix_seconds(last_modified) <= unix_seconds(if_modified_since);
        }

        false
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// Cache Policy
// ============================================================================

/// Accessor returning an object's modification time.
pub type LastModifiedFn =
    Arc<dyn Fn(&Object) -> Result<Option<SystemTime>, Error> + Send + Sync>;

/// The single validator strategy a resource uses.
#[derive(Clone, Default)]
pub enum CachePolicy {
    #[default]
    None,
    /// Use the serialized value of the named field as the ETag.
    EtagField(String),
    /// Hash every exposed field and link href into the ETag.
    AutoEtag,
    /// Compare a timestamp against `If-Modified-Since`.
    LastModified(LastModifiedFn),
}

impl CachePolicy {
    pub fn etag_field(field: impl Into<String>) -> Self {
        CachePolicy::EtagField(field.into())
    }

    /// Typed Last-Modified accessor.
    pub fn last_modified<T, F>(accessor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Option<SystemTime> + Send + Sync + 'static,
    {
        CachePolicy::LastModified(Arc::new(move |obj: &Object| {
            downcast::<T>(obj).map(&accessor)
        }))
    }

    /// Whether computing the validator requires the serialized object.
    pub fn needs_payload(&self) -> bool {
        matches!(self, CachePolicy::EtagField(_) | CachePolicy::AutoEtag)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CachePolicy::None)
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::None => f.write_str("None"),
            CachePolicy::EtagField(field) => f.debug_tuple("EtagField").field(field).finish(),
            CachePolicy::AutoEtag => f.write_str("AutoEtag"),
            CachePolicy::LastModified(_) => f.write_str("LastModified(..)"),
        }
    }
}

/// ETag over a serialized object, independent of field and link order.
///
/// `payload` is the object's serialization without expansion; its `links`
/// entry contributes the set of hrefs, every other key a `field=json` pair.
pub fn auto_etag(payload: &Map<String, Value>) -> ETag {
    let mut fields: Vec<String> = payload
        .iter()
        .filter(|(key, _)| key.as_str() != "links")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    fields.sort();

    let mut hrefs: Vec<&str> = payload
        .get("links")
        .and_then(Value::as_object)
        .map(|links| {
            links
                .values()
                .filter_map(|link| link.get("href").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    hrefs.sort_unstable();
    hrefs.dedup();

    let mut material = fields.join("\n");
    material.push_str("\n\n");
    material.push_str(&hrefs.join("\n"));
    ETag::from_digest(material.as_bytes())
}

/// ETag taken from one serialized field.
pub fn field_etag(payload: &Map<String, Value>, field: &str) -> Option<ETag> {
    match payload.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(ETag::strong(s.clone())),
        other => Some(ETag::strong(other.to_string())),
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Result of validating a resolved object against the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheCheck {
    /// The client's copy is current; respond 304.
    pub use_cached: bool,
    pub etag: Option<ETag>,
    pub last_modified: Option<SystemTime>,
}

impl CacheCheck {
    /// Attach `ETag` / `Last-Modified` to a response.
    pub fn apply_headers(&self, mut response: HttpResponse) -> HttpResponse {
        if let Some(etag) = &self.etag {
            response
                .headers
                .insert("ETag".to_string(), etag.to_header_value());
        }
        if let Some(last_modified) = self.last_modified {
            response.headers.insert(
                "Last-Modified".to_string(),
                httpdate::fmt_http_date(last_modified),
            );
        }
        response
    }
}

/// Evaluates a resource's [`CachePolicy`] for one object.
pub struct CacheValidator<'a> {
    policy: &'a CachePolicy,
}

impl<'a> CacheValidator<'a> {
    pub fn new(policy: &'a CachePolicy) -> Self {
        Self { policy }
    }

    /// Compute validators and decide whether the client copy is current.
    ///
    /// `payload` must be supplied when [`CachePolicy::needs_payload`] is true.
    pub fn check(
        &self,
        object: &Object,
        headers: &ConditionalHeaders,
        payload: Option<&Map<String, Value>>,
    ) -> Result<CacheCheck, Error> {
        let (etag, last_modified) = match self.policy {
            CachePolicy::None => (None, None),
            CachePolicy::EtagField(field) => (payload.and_then(|p| field_etag(p, field)), None),
            CachePolicy::AutoEtag => (payload.map(auto_etag), None),
            CachePolicy::LastModified(accessor) => (None, accessor(object)?),
        };

        if self.policy.needs_payload() && payload.is_none() {
            return Err(Error::Internal(
                "ETag policy evaluated without a serialized object".to_string(),
            ));
        }

        let use_cached = !headers.is_empty()
            && headers.is_not_modified(etag.as_ref(), last_modified);

        Ok(CacheCheck {
            use_cached,
            etag,
            last_modified,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
