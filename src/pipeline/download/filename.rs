//! Destination file name selection for downloads.

use percent_encoding::percent_decode_str;
use url::Url;

/// Reduces a server-supplied name to its last path component.
///
/// Returns `None` for names that cannot be used as a plain file name.
fn sanitize(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .rsplit(['/', '\\'])
        .next()?
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let name = name.trim();

    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

/// Splits a header value on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

/// Removes surrounding quotes and `\` escapes from a parameter value.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

/// Extracts the `filename=` parameter of a `Content-Disposition` value.
///
/// `filename*=` (RFC 5987) is not interpreted.
pub fn from_content_disposition(value: &str) -> Option<String> {
    split_params(value).into_iter().find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("filename") {
            sanitize(&unquote(raw))
        } else {
            None
        }
    })
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|segment| !segment.is_empty())?;
    sanitize(&percent_decode_str(segment).decode_utf8_lossy())
}

/// Picks the destination name: `Content-Disposition`, then the final URL,
/// then `fallback`.
pub fn suggested_file_name(content_disposition: Option<&str>, final_url: &Url, fallback: &str) -> String {
    content_disposition
        .and_then(from_content_disposition)
        .or_else(|| from_url(final_url))
        .unwrap_or_else(|| fallback.to_string())
}
