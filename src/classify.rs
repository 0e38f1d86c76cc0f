//! Source trust classification.
//!
//! A candidate date is only as trustworthy as the page it came from. The
//! classifier maps a hit's URL to a [`SourceTier`] using a per-manufacturer
//! allowlist of authoritative domains: a host equal to (or a subdomain of)
//! an allowlisted domain is a vendor site, anything else is third party.
//! `ManualEntry` is reserved for the human override path and is never
//! produced here.

use url::Url;

use crate::config::VendorsConfig;
use crate::models::SourceTier;

/// Built-in manufacturer keyword → authoritative domains.
///
/// A manufacturer name is matched against keywords case-insensitively, so
/// "Cisco Meraki" picks up both the cisco.com and meraki.com rows.
const VENDOR_DOMAIN_ROWS: &[(&str, &[&str])] = &[
    ("cisco", &["cisco.com"]),
    ("meraki", &["documentation.meraki.com", "meraki.com"]),
    ("fortinet", &["fortinet.com"]),
    ("palo alto", &["paloaltonetworks.com"]),
    ("hpe", &["hpe.com"]),
    ("aruba", &["arubanetworks.com", "hpe.com"]),
    ("juniper", &["juniper.net"]),
];

/// Classifies source URLs for one manufacturer.
pub struct SourceClassifier {
    domains: Vec<String>,
}

impl SourceClassifier {
    /// Build the allowlist for `manufacturer` from the built-in rows plus
    /// any configured extras whose key appears in the manufacturer name.
    pub fn for_manufacturer(manufacturer: &str, vendors: &VendorsConfig) -> Self {
        let needle = manufacturer.to_lowercase();
        let mut domains: Vec<String> = Vec::new();

        for (keyword, row_domains) in VENDOR_DOMAIN_ROWS {
            if needle.contains(keyword) {
                domains.extend(row_domains.iter().map(|d| d.to_string()));
            }
        }

        for (keyword, extra) in &vendors.domains {
            if needle.contains(&keyword.to_lowercase()) {
                domains.extend(extra.iter().cloned());
            }
        }

        domains.sort();
        domains.dedup();

        Self { domains }
    }

    /// The allowlisted domains for this manufacturer (sorted).
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Map a source URL to its trust tier.
    ///
    /// Unparseable URLs classify as third party.
    pub fn classify(&self, url: &str) -> SourceTier {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
            Some(host) => host,
            None => return SourceTier::ThirdParty,
        };

        for domain in &self.domains {
            if host == *domain || host.ends_with(&format!(".{}", domain)) {
                return SourceTier::VendorSite;
            }
        }

        SourceTier::ThirdParty
    }
}

/// The registrable host of a URL, used by the scorer to count distinct
/// supporting domains. Falls back to the raw string for unparseable URLs so
/// two identical bad URLs still count as one domain.
pub fn source_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase())
}
