//! Destination URL validation.
//!
//! Rejects SSRF and open-redirect vectors before a URL is persisted. Checks run in a fixed
//! order and the first failure wins, so a URL is always reported with a single
//! [`Rejection`]. The validated string is never rewritten: what passes is what gets stored.
//!
//! Domain allow/deny lists and the pattern set live behind read/write locks and can be
//! changed on a running validator.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{PoisonError, RwLock};

use regex::RegexSet;
use url::{Host, Url};

/// Query parameters that usually carry a second, attacker-chosen destination.
pub const SUSPICIOUS_REDIRECT_PARAMS: &[&str] = &[
    "redirect",
    "url",
    "next",
    "continue",
    "return",
    "goto",
    "target",
    "dest",
    "destination",
];

/// Public shorteners; linking to them would hide the real destination.
pub const KNOWN_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "adf.ly",
    "bit.do",
    "mcaf.ee",
    "su.pr",
];

/// Schemes that are refused whatever the policy says.
const FORBIDDEN_SCHEMES: &[&str] = &["data", "javascript"];

/// More `%25` sequences than this is treated as layered encoding.
const MAX_DOUBLE_ENCODED: usize = 2;

/// Why a destination was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("URL exceeds maximum length of {max} characters")]
    TooLong { max: usize },

    #[error("URL must be absolute with a scheme and host")]
    Malformed,

    #[error("URL scheme '{0}' is not allowed")]
    SchemeNotAllowed(String),

    #[error("Domain '{0}' is not allowed")]
    DomainBlocked(String),

    #[error("URL matches a blocked pattern")]
    PatternBlocked,

    #[error("Private, loopback and literal IP destinations are not allowed")]
    PrivateOrLoopbackIp,

    #[error("Links to other URL shorteners are not allowed")]
    ShortenerChaining,

    #[error("File extension '{0}' is not allowed")]
    BlockedExtension(String),

    #[error("Suspicious redirect parameter detected")]
    SuspiciousRedirectParam,

    #[error("URL contains null bytes or repeated encoding")]
    EncodingAbuse,
}

impl Rejection {
    /// Stable identifier for API responses and logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "too_long",
            Self::Malformed => "malformed",
            Self::SchemeNotAllowed(_) => "scheme_not_allowed",
            Self::DomainBlocked(_) => "domain_blocked",
            Self::PatternBlocked => "pattern_blocked",
            Self::PrivateOrLoopbackIp => "private_or_loopback_ip",
            Self::ShortenerChaining => "shortener_chaining",
            Self::BlockedExtension(_) => "blocked_extension",
            Self::SuspiciousRedirectParam => "suspicious_redirect_param",
            Self::EncodingAbuse => "encoding_abuse",
        }
    }
}

/// Validator configuration.
///
/// Loaded from `URL_*` environment variables by [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pub max_length: usize,
    pub allowed_protocols: Vec<String>,
    /// When non-empty, only these domains (and their subdomains) are accepted.
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    /// Regexes matched against the lower-cased raw URL.
    pub blocked_patterns: Vec<String>,
    pub blocked_extensions: Vec<String>,
    pub allow_private_ips: bool,
    pub allow_localhost: bool,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            max_length: 2048,
            allowed_protocols: vec!["http".to_string(), "https".to_string()],
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            blocked_patterns: default_blocked_patterns(),
            blocked_extensions: default_blocked_extensions(),
            allow_private_ips: false,
            allow_localhost: false,
        }
    }
}

/// Suspicious TLDs in the authority, malware keywords, and IPv4 literals anywhere.
pub fn default_blocked_patterns() -> Vec<String> {
    [
        r"^[a-z][a-z0-9+.-]*://[^/?#]*\.(tk|ml|ga|cf)(:[0-9]+)?([/?#]|$)",
        "phishing",
        "malware",
        "virus",
        "hack",
        r"(^|[^0-9.])([0-9]{1,3}\.){3}[0-9]{1,3}([^0-9.]|$)",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Executables, installers, archives and scripts.
pub fn default_blocked_extensions() -> Vec<String> {
    [
        ".exe", ".bat", ".cmd", ".com", ".pif", ".scr", ".app", ".dmg", ".deb", ".rpm", ".jar",
        ".jnlp", ".swf", ".ps1", ".vbs", ".js", ".jse", ".vbe", ".msi", ".msp", ".zip", ".rar",
        ".7z",
    ]
    .iter()
    .map(|e| e.to_string())
    .collect()
}

/// A destination that passed every check.
///
/// Only [`UrlValidator::validate`] can build one, so holding a `ValidatedUrl` is proof
/// that the URL was checked.
#[derive(Debug, Clone)]
pub struct ValidatedUrl {
    original: String,
    parsed: Url,
}

impl ValidatedUrl {
    /// The URL exactly as submitted.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn parsed(&self) -> &Url {
        &self.parsed
    }

    pub fn into_string(self) -> String {
        self.original
    }
}

#[derive(Debug, Default)]
struct DomainLists {
    allowed: HashSet<String>,
    blocked: HashSet<String>,
}

/// Policy-driven destination validator.
pub struct UrlValidator {
    max_length: usize,
    allowed_protocols: Vec<String>,
    blocked_extensions: Vec<String>,
    allow_private_ips: bool,
    allow_localhost: bool,
    domains: RwLock<DomainLists>,
    patterns: RwLock<RegexSet>,
}

impl UrlValidator {
    /// Builds a validator from a policy.
    ///
    /// # Errors
    ///
    /// Returns the regex error if any blocked pattern does not compile.
    pub fn new(policy: UrlPolicy) -> Result<Self, regex::Error> {
        let patterns = RegexSet::new(&policy.blocked_patterns)?;

        let domains = DomainLists {
            allowed: policy
                .allowed_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            blocked: policy
                .blocked_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
        };

        Ok(Self {
            max_length: policy.max_length,
            allowed_protocols: policy
                .allowed_protocols
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
            blocked_extensions: policy
                .blocked_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            allow_private_ips: policy.allow_private_ips,
            allow_localhost: policy.allow_localhost,
            domains: RwLock::new(domains),
            patterns: RwLock::new(patterns),
        })
    }

    /// Validates a candidate destination.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] hit, in this order: length, syntax, scheme, domain
    /// lists, patterns, IP literals, shortener chaining, file extension, redirect
    /// parameters, encoding abuse.
    pub fn validate(&self, raw: &str) -> Result<ValidatedUrl, Rejection> {
        if raw.len() > self.max_length {
            return Err(Rejection::TooLong {
                max: self.max_length,
            });
        }

        let parsed = Url::parse(raw).map_err(|_| Rejection::Malformed)?;

        self.check_scheme(&parsed)?;

        let host = parsed.host().ok_or(Rejection::Malformed)?;
        let host_name = match &host {
            Host::Domain(d) => d.to_ascii_lowercase(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };
        if host_name.is_empty() {
            return Err(Rejection::Malformed);
        }

        self.check_domain(&host_name)?;
        self.check_patterns(raw)?;
        self.check_ip(&host)?;
        check_shortener(&host_name)?;
        self.check_extension(parsed.path())?;
        check_redirect_params(&parsed)?;
        check_encoding(raw)?;

        Ok(ValidatedUrl {
            original: raw.to_string(),
            parsed,
        })
    }

    fn check_scheme(&self, url: &Url) -> Result<(), Rejection> {
        let scheme = url.scheme();

        if FORBIDDEN_SCHEMES.contains(&scheme)
            || !self.allowed_protocols.iter().any(|p| p == scheme)
        {
            return Err(Rejection::SchemeNotAllowed(scheme.to_string()));
        }

        Ok(())
    }

    fn check_domain(&self, host: &str) -> Result<(), Rejection> {
        let lists = self.domains.read().unwrap_or_else(PoisonError::into_inner);

        if lists.blocked.iter().any(|d| domain_matches(host, d)) {
            return Err(Rejection::DomainBlocked(host.to_string()));
        }

        if !lists.allowed.is_empty() && !lists.allowed.iter().any(|d| domain_matches(host, d)) {
            return Err(Rejection::DomainBlocked(host.to_string()));
        }

        Ok(())
    }

    fn check_patterns(&self, raw: &str) -> Result<(), Rejection> {
        let lowered = raw.to_ascii_lowercase();
        let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);

        if patterns.is_match(&lowered) {
            return Err(Rejection::PatternBlocked);
        }

        Ok(())
    }

    /// Literal IP hosts are refused outright unless at least one allow flag is set.
    fn check_ip(&self, host: &Host<&str>) -> Result<(), Rejection> {
        let ip = match host {
            Host::Domain(name) => {
                if !self.allow_localhost && is_localhost_name(name) {
                    return Err(Rejection::PrivateOrLoopbackIp);
                }
                return Ok(());
            }
            Host::Ipv4(v4) => IpAddr::V4(*v4),
            Host::Ipv6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(*v6)),
        };

        if !self.allow_localhost && is_loopback_or_link_local(ip) {
            return Err(Rejection::PrivateOrLoopbackIp);
        }

        if !self.allow_private_ips && is_private(ip) {
            return Err(Rejection::PrivateOrLoopbackIp);
        }

        if !self.allow_private_ips && !self.allow_localhost {
            return Err(Rejection::PrivateOrLoopbackIp);
        }

        Ok(())
    }

    fn check_extension(&self, path: &str) -> Result<(), Rejection> {
        let lowered = path.to_ascii_lowercase();

        match self
            .blocked_extensions
            .iter()
            .find(|ext| lowered.ends_with(ext.as_str()))
        {
            Some(ext) => Err(Rejection::BlockedExtension(ext.clone())),
            None => Ok(()),
        }
    }

    pub fn add_blocked_domain(&self, domain: &str) {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .blocked
            .insert(domain.to_ascii_lowercase());
    }

    pub fn remove_blocked_domain(&self, domain: &str) {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .blocked
            .remove(&domain.to_ascii_lowercase());
    }

    pub fn add_allowed_domain(&self, domain: &str) {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .allowed
            .insert(domain.to_ascii_lowercase());
    }

    pub fn remove_allowed_domain(&self, domain: &str) {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .allowed
            .remove(&domain.to_ascii_lowercase());
    }

    /// Swaps the whole pattern set. The old set stays active if compilation fails.
    ///
    /// # Errors
    ///
    /// Returns the regex error for the first pattern that does not compile.
    pub fn replace_patterns<I, S>(&self, patterns: I) -> Result<(), regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = RegexSet::new(patterns)?;
        *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = compiled;
        Ok(())
    }
}

/// Exact match or subdomain match (`a.example.com` matches `example.com`).
fn domain_matches(host: &str, entry: &str) -> bool {
    host == entry
        || host
            .strip_suffix(entry)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn check_shortener(host: &str) -> Result<(), Rejection> {
    if KNOWN_SHORTENERS.iter().any(|s| domain_matches(host, s)) {
        return Err(Rejection::ShortenerChaining);
    }
    Ok(())
}

fn check_redirect_params(url: &Url) -> Result<(), Rejection> {
    let suspicious = url.query_pairs().any(|(key, value)| {
        !value.is_empty()
            && SUSPICIOUS_REDIRECT_PARAMS.contains(&key.to_ascii_lowercase().as_str())
    });

    if suspicious {
        return Err(Rejection::SuspiciousRedirectParam);
    }
    Ok(())
}

fn check_encoding(raw: &str) -> Result<(), Rejection> {
    let lowered = raw.to_ascii_lowercase();

    if raw.contains('\0') || lowered.contains("%00") {
        return Err(Rejection::EncodingAbuse);
    }

    if lowered.matches("%25").count() > MAX_DOUBLE_ENCODED {
        return Err(Rejection::EncodingAbuse);
    }

    Ok(())
}

fn is_localhost_name(name: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    name == "localhost" || name.ends_with(".localhost")
}

fn is_loopback_or_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || is_ipv6_link_local(&v6),
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_ipv4_private(&v4),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_ipv4_private(ip: &Ipv4Addr) -> bool {
    ip.is_private()
}

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
