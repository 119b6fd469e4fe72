//! Header parsing and name conversions.
//!
//! Claims travel as one header each, named `<Prefix>-<Claim-In-Header-Case>`
//! (`service_name` ⇄ `CAT-Service-Name`). HTTP header names are
//! case-insensitive, so incoming names are matched without regard to case
//! and reported in canonical Header-Case.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use std::collections::BTreeMap;

use crate::error::AuthError;

/// `snake_case` → `Header-Case`.
pub fn snake_case_to_header_case(value: &str) -> String {
    value
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// `Header-Case` → `snake_case`.
pub fn header_case_to_snake_case(value: &str) -> String {
    value
        .split('-')
        .map(str::to_lowercase)
        .collect::<Vec<String>>()
        .join("_")
}

/// `service_name` → `CAT-Service-Name` for prefix `CAT`.
pub fn to_cat_header_name(prefix: &str, claim: &str) -> String {
    format!("{}-{}", prefix, snake_case_to_header_case(claim))
}

/// `CAT-Service-Name` (any case) → `service_name`, or `None` if the header
/// does not carry the prefix.
pub fn from_cat_header_name(prefix: &str, header: &str) -> Option<String> {
    let head = header.get(..prefix.len())?;
    let rest = header[prefix.len()..].strip_prefix('-')?;
    if !head.eq_ignore_ascii_case(prefix) || rest.is_empty() {
        return None;
    }
    Some(header_case_to_snake_case(rest))
}

/// `'a', 'b' & 'c'`.
pub fn human_readable_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = values
        .into_iter()
        .map(|value| format!("'{}'", value.as_ref()))
        .collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} & {}", rest.join(", "), last),
    }
}

/// Split the `Authorization` header into `(scheme, token)`.
pub fn authorization_header(headers: &HeaderMap) -> Result<(String, String), AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingAuthHeader),
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => Ok((scheme.to_string(), token.to_string())),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// One claim header as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimHeader {
    /// Canonical header name, e.g. `CAT-Service-Name`
    pub header: String,
    /// Raw value, exactly as transmitted
    pub value: String,
}

/// Collect every prefixed header, keyed by claim name.
pub fn claim_headers(
    headers: &HeaderMap,
    prefix: &str,
) -> Result<BTreeMap<String, ClaimHeader>, AuthError> {
    let mut claims = BTreeMap::new();
    for (name, value) in headers {
        let Some(claim) = from_cat_header_name(prefix, name.as_str()) else {
            continue;
        };
        let header = to_cat_header_name(prefix, &claim);
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidHeaderEncoding {
                header: header.clone(),
            })?
            .to_string();
        claims.insert(claim, ClaimHeader { header, value });
    }
    Ok(claims)
}
