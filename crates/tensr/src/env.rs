use std::env;
use std::sync::OnceLock;

static TENSR_EAGER: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// When set, freshly captured nodes flush immediately instead of staying lazy.
pub(crate) fn eager_enabled() -> bool {
    *TENSR_EAGER.get_or_init(|| match env::var("TENSR_EAGER") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}
