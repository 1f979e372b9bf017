//! Parsing `pkgutil --check-signature` and `codesign -dv` output.

use super::SignatureVerdict;
use regex::Regex;
use std::sync::LazyLock;

/// `Developer ID Installer: Vendor Inc (ABCDE12345)` and similar leaf names.
static CERTIFICATE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^:]+:\s*)?(?P<name>.+?)\s*\((?P<team>[A-Z0-9]{10})\)\s*$")
        .expect("certificate name pattern is valid")
});

/// First entry of the certificate chain listing.
static CHAIN_LEAF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*1\.\s+(?P<leaf>.+?)\s*$").expect("chain leaf pattern is valid")
});

/// Splits a certificate common name into developer name and team id.
///
/// Names without a team suffix keep the whole name and an unknown team.
pub fn split_certificate_name(common_name: &str) -> (String, Option<String>) {
    match CERTIFICATE_NAME.captures(common_name.trim()) {
        Some(caps) => (caps["name"].to_string(), Some(caps["team"].to_string())),
        None => (common_name.trim().to_string(), None),
    }
}

/// Builds a verdict from `pkgutil --check-signature` output.
pub fn parse_pkgutil_signature(exit_success: bool, stdout: &str) -> SignatureVerdict {
    let status = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Status:"))
        .map(str::trim)
        .unwrap_or_default();

    let leaf = CHAIN_LEAF
        .captures(stdout)
        .map(|caps| caps["leaf"].to_string());

    let Some(leaf) = leaf else {
        return SignatureVerdict::unknown();
    };

    let (developer_id, team) = split_certificate_name(&leaf);
    SignatureVerdict {
        accepted: exit_success && status.starts_with("signed") && !status.contains("untrusted"),
        developer_id,
        developer_team: team.unwrap_or_else(|| SignatureVerdict::UNKNOWN.to_string()),
    }
}

/// Builds a verdict from `codesign -dv` details (printed on stderr) and the
/// outcome of `codesign --verify`.
pub fn parse_codesign_details(verified: bool, details: &str) -> SignatureVerdict {
    let mut authority = None;
    let mut team = None;

    for line in details.lines() {
        if let Some(value) = line.strip_prefix("Authority=") {
            authority.get_or_insert_with(|| value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("TeamIdentifier=") {
            let value = value.trim();
            if value != "not set" {
                team = Some(value.to_string());
            }
        }
    }

    // Ad-hoc signatures carry no authority
    let Some(authority) = authority else {
        return SignatureVerdict::unknown();
    };

    let (developer_id, name_team) = split_certificate_name(&authority);
    SignatureVerdict {
        accepted: verified,
        developer_id,
        developer_team: team
            .or(name_team)
            .unwrap_or_else(|| SignatureVerdict::UNKNOWN.to_string()),
    }
}
