//! Route handlers and the header helpers they share.

pub mod auth;
pub mod gyms;
pub mod health;

use axum::http::HeaderMap;

/// Request header naming the gym a login targets.
pub const GYM_DOMAIN_HEADER: &str = "x-gym-domain";

/// First `x-forwarded-for` entry, else `x-real-ip`.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    header_text(headers, "x-real-ip")
}

/// Gym selector for login. An empty header counts as absent.
///
/// Bytes that are not UTF-8 are kept lossily so the selector stays present
/// and fails domain validation instead of falling back to the admin population.
pub(crate) fn gym_domain(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(GYM_DOMAIN_HEADER)?;
    let text = String::from_utf8_lossy(value.as_bytes());
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.7, 172.16.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(extract_client_ip(&headers), Some("10.0.0.7".to_string()));
    }

    #[test]
    fn client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(extract_client_ip(&headers), Some("192.168.1.1".to_string()));
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn blank_gym_header_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(GYM_DOMAIN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(gym_domain(&headers), None);

        headers.insert(GYM_DOMAIN_HEADER, HeaderValue::from_static("ironworks"));
        assert_eq!(gym_domain(&headers), Some("ironworks".to_string()));
    }

    #[test]
    fn unreadable_gym_header_stays_present() -> anyhow::Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(
            GYM_DOMAIN_HEADER,
            HeaderValue::from_bytes(b"iron-templ\xe9")?,
        );
        let domain = gym_domain(&headers);
        assert!(domain.is_some());
        assert!(!crate::tenant::valid_domain(&domain.unwrap_or_default()));
        Ok(())
    }
}
