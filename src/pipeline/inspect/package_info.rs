//! Identity extraction from expanded flat packages.
//!
//! `pkgutil --expand` leaves one `PackageInfo` per component package and, for
//! distribution packages, a `Distribution` file at the top.

use super::IdentityCandidate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Unescaped value of attribute `name`.
fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// Applies `visit` to each `tag` element until it yields a value.
///
/// Stops quietly at the first malformed construct.
fn find_element<T>(
    xml: &str,
    tag: &str,
    mut visit: impl FnMut(&BytesStart<'_>) -> Option<T>,
) -> Option<T> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element) | Event::Empty(element))
                if element.name().as_ref() == tag.as_bytes() =>
            {
                if let Some(found) = visit(&element) {
                    return Some(found);
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                log::debug!("Stopped reading package XML at {}: {}", reader.buffer_position(), e);
                return None;
            }
            Ok(_) => {}
        }
    }
}

/// Reads `identifier` and `version` from a `PackageInfo` document.
pub fn parse_package_info(xml: &str) -> Option<IdentityCandidate> {
    find_element(xml, "pkg-info", |element| {
        let identifier = attribute(element, "identifier").filter(|s| !s.is_empty())?;
        Some(IdentityCandidate {
            identifier,
            version: attribute(element, "version").unwrap_or_default(),
            minimum_os: None,
        })
    })
}

/// Reads the minimum OS version from a `Distribution` document, if declared.
pub fn parse_distribution_minimum_os(xml: &str) -> Option<String> {
    find_element(xml, "os-version", |element| {
        attribute(element, "min").filter(|s| !s.is_empty())
    })
}
