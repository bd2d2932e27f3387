use regex::Regex;

/// Lowercase alphanumerics and hyphens, 1-63 chars, no leading or trailing hyphen.
pub const DOMAIN_PATTERN: &str = r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$";

/// Schema names Postgres or the global tables already use.
const RESERVED: [&str; 2] = ["public", "information_schema"];

/// Whether `domain` may be used verbatim as a schema identifier.
#[must_use]
pub fn valid_domain(domain: &str) -> bool {
    !is_reserved(domain) && Regex::new(DOMAIN_PATTERN).is_ok_and(|regex| regex.is_match(domain))
}

fn is_reserved(domain: &str) -> bool {
    RESERVED.contains(&domain) || domain.starts_with("pg-") || domain.starts_with("pg_")
}

/// Quote a Postgres identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
