//! Review pagination via the `next` link in each response body.
//!
//! The reviews API returns a relative link for the following page, e.g.
//!
//! ```text
//! /v1/catalog/us/apps/284882215/reviews?l=en-GB&offset=21&platform=web
//! ```
//!
//! The offset is treated as an opaque cursor: it is copied verbatim and never
//! used for arithmetic, even though the server renders it as an integer.

/// Cursor for the first page of any review stream.
pub const FIRST_CURSOR: &str = "1";

/// Extracts the `offset` query value from a `next` link.
///
/// Returns `None` if:
/// - `next` is `None` (last page reached),
/// - the link has no `offset` parameter,
/// - the offset value is empty or not made of ASCII digits.
#[must_use]
pub fn extract_next_cursor(next: Option<&str>) -> Option<String> {
    let link = next?;
    let query_start = link.find('?')? + 1;
    let query = &link[query_start..];
    let query = query.split('#').next().unwrap_or(query);

    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("offset="))
        .find(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_owned)
}
