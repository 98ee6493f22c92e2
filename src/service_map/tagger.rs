//! Derives a span's service identity and fan-out flag from its tags.

use crate::core::{ServiceIdentity, Span, Tag};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tag holding the URL a span called.
pub const HTTP_URL_TAG: &str = "http.url";
/// Tag holding the host a span addressed.
pub const HTTP_HOST_TAG: &str = "http.host";

/// Host label suffix of a parallel broadcast channel.
pub const PARALLEL_CHANNEL_SUFFIX: &str = "-kn-parallel-kn-channel";
/// Host label suffix of a trigger-filtered channel.
pub const TRIGGER_CHANNEL_SUFFIX: &str = "-kne-trigger-kn-channel";

/// `<name>.<namespace>.svc.cluster.local`, over http or https, nothing else.
static CLUSTER_LOCAL_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://([a-zA-Z0-9-]+)\.([a-zA-Z0-9-]+)\.svc\.cluster\.local$")
        .expect("Valid cluster-local URL pattern")
});

/// Parses a cluster-local service address into its identity.
pub fn parse_cluster_url(url: &str) -> Option<ServiceIdentity> {
    let captures = CLUSTER_LOCAL_URL.captures(url)?;
    Some(ServiceIdentity::new(&captures[1], &captures[2]))
}

/// Returns true if the host's first label names a fan-out channel.
pub fn is_fan_out_host(host: &str) -> bool {
    let label = host.split('.').next().unwrap_or_default();
    label.ends_with(PARALLEL_CHANNEL_SUFFIX) || label.ends_with(TRIGGER_CHANNEL_SUFFIX)
}

/// The first `http.url` tag that parses wins; later ones are not consulted.
pub fn resolve_service(tags: &[Tag]) -> Option<ServiceIdentity> {
    tags.iter()
        .filter(|tag| tag.key == HTTP_URL_TAG)
        .find_map(|tag| parse_cluster_url(&tag.value))
}

/// Fan-out is decided by the first `http.host` tag alone.
pub fn resolve_fan_out(tags: &[Tag]) -> bool {
    tags.iter()
        .find(|tag| tag.key == HTTP_HOST_TAG)
        .is_some_and(|tag| is_fan_out_host(&tag.value))
}

/// Sets the derived `service` and `fan_out` fields of a span.
///
/// Spans without usable tags end up with no identity and `fan_out == false`.
pub fn tag_span(span: &mut Span) {
    span.service = resolve_service(&span.tags);
    span.fan_out = resolve_fan_out(&span.tags);
}
