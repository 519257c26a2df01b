//! Content negotiation.
//!
//! Pure functions over a route's ordered formatter bindings:
//!
//! - `Content-Type` picks the request formatter: the first one that can format
//!   requests and either declares no media type or declares one matching the
//!   header (parameters ignored, `type/*`, `*/*` and `+suffix` allowed).
//! - `Accept` picks the response formatter: the first one that can format
//!   responses and either declares no media type or wins an `Accept`
//!   negotiation against `application/json`. A bare `*/*` therefore selects
//!   a custom type only when it is `application/json` itself.
//! - The handler comes from the request formatter's binding, else the response
//!   formatter's binding, else the route default.

use crate::error::HttpError;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::request::Request;
use crate::route::{MediaTypeBinding, Route};

/// The offer every response formatter competes against.
const JSON: &str = "application/json";

/// The outcome of negotiating one request against one route.
pub(crate) struct Negotiated<'r> {
    pub(crate) request: Option<&'r MediaTypeBinding>,
    pub(crate) response: Option<&'r MediaTypeBinding>,
    pub(crate) handler: &'r BoxedHandler,
}

/// Runs both negotiations and resolves the handler.
///
/// Checks run in a fixed order: request formatting (500, then 415), response
/// formatting for `GET` (500, then 406), then handler resolution (500).
/// A non-`GET` without an acceptable response formatter is not an error here;
/// the handler may never produce a model.
pub(crate) fn negotiate<'r>(route: &'r Route, req: &Request) -> Result<Negotiated<'r>, HttpError> {
    let bindings = &route.bindings[..];

    let request = match req.body() {
        Some(_) if req.method().allows_body() => {
            Some(select_request_formatter(bindings, req.header("content-type"))?)
        }
        _ => None,
    };

    let response = select_response_formatter(bindings, req.header("accept"));
    if response.is_none() && req.method() == Method::Get {
        let supported = supported(bindings, |b| b.formatter.formats_responses());
        if supported.is_empty() {
            return Err(HttpError::configuration(
                "This route is not configured to support Accept responses. It must have at least one \
                 media type that formats responses, or no media types to get pass-through behavior.",
            ));
        }
        return Err(HttpError::not_acceptable(format!(
            "The requested Accept format cannot be satisfied. Try one of the supported media types: {}",
            supported.join(", "),
        )));
    }

    let handler = request.and_then(|b| b.handler.as_ref())
        .or_else(|| response.and_then(|b| b.handler.as_ref()))
        .or(route.default_handler.as_ref())
        .ok_or_else(|| HttpError::configuration(
            "This route is not configured properly. It must have a default handler or handlers \
             provided with each of the media types.",
        ))?;

    Ok(Negotiated { request, response, handler })
}

/// First request-capable binding matching `content_type`.
pub(crate) fn select_request_formatter<'r>(
    bindings: &'r [MediaTypeBinding],
    content_type: Option<&str>,
) -> Result<&'r MediaTypeBinding, HttpError> {
    let supported = supported(bindings, |b| b.formatter.formats_requests());
    if supported.is_empty() {
        return Err(HttpError::configuration(
            "This route is not configured to support Content-Type requests. It must have at least one \
             media type that formats requests, or no media types to get pass-through behavior.",
        ));
    }

    bindings.iter()
        .filter(|b| b.formatter.formats_requests())
        .find(|b| b.formatter.media_type().is_none_or(|declared| is_content_type(declared, content_type)))
        .ok_or_else(|| HttpError::unsupported_media_type(format!(
            "The provided Content-Type {} is not supported. Try one of the supported media types: {}",
            content_type.unwrap_or("(none)"),
            supported.join(", "),
        )))
}

/// First response-capable binding acceptable under `accept`.
pub(crate) fn select_response_formatter<'r>(
    bindings: &'r [MediaTypeBinding],
    accept: Option<&str>,
) -> Option<&'r MediaTypeBinding> {
    bindings.iter()
        .filter(|b| b.formatter.formats_responses())
        .find(|b| b.formatter.media_type().is_none_or(|declared| is_acceptable(declared, accept)))
}

fn supported<'r>(
    bindings: &'r [MediaTypeBinding],
    capable: impl Fn(&MediaTypeBinding) -> bool,
) -> Vec<&'r str> {
    bindings.iter().filter(|b| capable(b)).map(|b| b.formatter.label()).collect()
}

// ── Content-Type matching ─────────────────────────────────────────────────────

/// Whether a request's `Content-Type` satisfies a declared media type.
///
/// `declared` may be a full type, `type/*`, `*/*`, `*/*+suffix` or a bare
/// `+suffix`. Parameters on either side are ignored.
pub fn is_content_type(declared: &str, content_type: Option<&str>) -> bool {
    let Some(actual) = content_type.and_then(MediaRange::parse) else {
        return false;
    };
    let declared = declared.trim();
    let expanded;
    let declared = if declared.starts_with('+') {
        expanded = format!("*/*{declared}");
        expanded.as_str()
    } else {
        declared
    };
    let Some(expected) = MediaRange::parse(declared) else {
        return false;
    };

    if expected.kind != "*" && expected.kind != actual.kind {
        return false;
    }
    if let Some(suffix) = expected.subtype.strip_prefix('*') {
        return suffix.is_empty()
            || (suffix.starts_with('+') && actual.subtype.len() > suffix.len() && actual.subtype.ends_with(suffix));
    }
    expected.subtype == actual.subtype
}

// ── Accept negotiation ────────────────────────────────────────────────────────

/// Whether `declared` is what the client asked for, given that plain
/// `application/json` is always on offer first.
pub fn is_acceptable(declared: &str, accept: Option<&str>) -> bool {
    preferred(accept, &[JSON, declared]) == Some(declared)
}

/// Picks the offer the client prefers.
///
/// Offers are ranked by the quality of their best-matching `Accept` entry,
/// then by how specific that match was, then by the entry's position in the
/// header, then by offer order. A missing header accepts everything.
/// Returns `None` when nothing is acceptable.
pub fn preferred<'o>(accept: Option<&str>, offers: &[&'o str]) -> Option<&'o str> {
    let accepted = parse_accept(accept.unwrap_or("*/*"));

    let mut ranked: Vec<(Priority, &'o str)> = offers.iter()
        .enumerate()
        .filter_map(|(index, offer)| {
            let offer_range = MediaRange::parse(offer)?;
            let priority = accepted.iter()
                .filter_map(|entry| entry.specify(&offer_range, index))
                .fold(None, |best: Option<Priority>, spec| match best {
                    Some(p) if !p.replaced_by(&spec) => Some(p),
                    _ => Some(spec),
                })?;
            (priority.q > 0.0).then_some((priority, *offer))
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| {
        b.q.total_cmp(&a.q)
            .then(b.s.cmp(&a.s))
            .then(a.o.cmp(&b.o))
            .then(a.i.cmp(&b.i))
    });
    ranked.first().map(|(_, offer)| *offer)
}

#[derive(Clone, Copy, Debug)]
struct Priority {
    /// Offer index.
    i: usize,
    /// Accept entry index.
    o: usize,
    q: f32,
    s: u8,
}

impl Priority {
    fn replaced_by(&self, spec: &Priority) -> bool {
        spec.s.cmp(&self.s)
            .then(spec.q.total_cmp(&self.q))
            .then(spec.o.cmp(&self.o))
            .is_gt()
    }
}

struct AcceptEntry {
    range: MediaRange,
    q: f32,
    index: usize,
}

impl AcceptEntry {
    /// How well this entry matches `offer`; `None` when it does not.
    fn specify(&self, offer: &MediaRange, offer_index: usize) -> Option<Priority> {
        let mut s = 0;
        if self.range.kind == offer.kind {
            s |= 4;
        } else if self.range.kind != "*" {
            return None;
        }
        if self.range.subtype == offer.subtype {
            s |= 2;
        } else if self.range.subtype != "*" {
            return None;
        }
        if !self.range.params.is_empty() {
            let all_match = self.range.params.iter().all(|(key, value)| {
                value == "*" || offer.param(key).is_some_and(|v| v.eq_ignore_ascii_case(value))
            });
            if !all_match {
                return None;
            }
            s |= 1;
        }
        Some(Priority { i: offer_index, o: self.index, q: self.q, s })
    }
}

fn parse_accept(header: &str) -> Vec<AcceptEntry> {
    header.split(',')
        .filter_map(MediaRange::parse_with_quality)
        .enumerate()
        .map(|(index, (range, q))| AcceptEntry { range, q, index })
        .collect()
}

/// A parsed `type/subtype; key=value` with lowercased type and keys.
#[derive(Debug, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl MediaRange {
    fn parse(raw: &str) -> Option<Self> {
        Self::parse_with_quality(raw).map(|(range, _)| range)
    }

    fn parse_with_quality(raw: &str) -> Option<(Self, f32)> {
        let mut parts = raw.split(';');
        let essence = parts.next()?.trim();
        let (kind, subtype) = essence.split_once('/')?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut q = 1.0;
        let mut params = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().trim_matches('"');
            if key == "q" {
                q = value.parse().ok().filter(|q: &f32| (0.0..=1.0).contains(q))?;
            } else {
                params.push((key, value.to_owned()));
            }
        }

        let range = Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        };
        Some((range, q))
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_ignores_parameters_and_case() {
        assert!(is_content_type("application/json", Some("Application/JSON; charset=utf-8")));
        assert!(!is_content_type("application/json", Some("application/pet+json")));
        assert!(!is_content_type("application/json", None));
    }

    #[test]
    fn content_type_wildcards_and_suffixes() {
        assert!(is_content_type("application/*", Some("application/pet+json")));
        assert!(is_content_type("*/*", Some("text/plain")));
        assert!(is_content_type("+json", Some("application/pet+json")));
        assert!(is_content_type("*/*+json", Some("application/vnd.api+json")));
        assert!(!is_content_type("+json", Some("application/json")));
        assert!(!is_content_type("json", Some("application/json")));
    }

    #[test]
    fn missing_accept_prefers_json() {
        assert!(is_acceptable("application/json", None));
        assert!(!is_acceptable("application/vnd.custom+json", None));
        assert!(!is_acceptable("application/vnd.custom+json", Some("*/*")));
    }

    #[test]
    fn explicit_accept_selects_custom_type() {
        assert!(is_acceptable("application/pets+json", Some("application/pets+json")));
        assert!(!is_acceptable("application/vnd.custom+json", Some("application/json")));
        assert!(is_acceptable("application/pet+json", Some("application/json;q=0.5, application/pet+json")));
    }

    #[test]
    fn quality_and_specificity_rank_offers() {
        let offers = ["application/json", "text/csv"];
        assert_eq!(preferred(Some("text/*;q=0.9, */*;q=0.1"), &offers), Some("text/csv"));
        assert_eq!(preferred(Some("text/csv;q=0, */*"), &offers), Some("application/json"));
        assert_eq!(preferred(Some("image/png"), &offers), None);
        assert_eq!(preferred(Some("application/json, text/csv"), &offers), Some("application/json"));
    }

    #[test]
    fn accept_parameters_must_match_offer() {
        let offers = ["application/json", "application/json; version=2"];
        assert_eq!(preferred(Some("application/json; version=2"), &offers), Some("application/json; version=2"));
    }

    #[test]
    fn malformed_accept_entries_are_skipped() {
        assert_eq!(preferred(Some("garbage, text/csv"), &["text/csv"]), Some("text/csv"));
        assert_eq!(preferred(Some("text/csv;q=2"), &["text/csv"]), None);
    }
}
