//! Cache key layout.
//!
//! Every key written by the service is built here so the namespaces stay disjoint.

/// `short:{code}` → destination, for every link.
pub fn short_code(code: &str) -> String {
    format!("short:{code}")
}

/// `url:{destination}` → code, for anonymous links only.
pub fn destination(url: &str) -> String {
    format!("url:{url}")
}

pub fn rate_limit_user(user_id: &str) -> String {
    format!("ratelimit:user:{user_id}")
}

pub fn rate_limit_ip(ip: &str) -> String {
    format!("ratelimit:ip:{ip}")
}

/// Marks a window in which the burst allowance is active.
pub fn burst(rate_key: &str) -> String {
    format!("{rate_key}:burst")
}

pub fn custom_limit(rate_key: &str, path: &str) -> String {
    format!("{rate_key}:custom:{path}")
}
