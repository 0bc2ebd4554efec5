//! Routes otherwise unreachable CDN links through a mirror instance.

use url::Url;

/// Host substring identifying the upstream CDN family served by mirrors.
pub const CDN_HOST_MARKER: &str = "googlevideo.com";

/// Replaces the scheme and authority of a CDN `url` with those of `mirror`,
/// keeping path and query untouched.
///
/// Anything that does not parse, or whose host is not part of the CDN
/// family, is returned as given.
pub fn rewrite_to_mirror(url: &str, mirror: &str) -> String {
    try_rewrite(url, mirror).unwrap_or_else(|| url.to_string())
}

fn try_rewrite(url: &str, mirror: &str) -> Option<String> {
    let mut target = Url::parse(url).ok()?;
    if !target.host_str()?.contains(CDN_HOST_MARKER) {
        return None;
    }

    let mirror = Url::parse(mirror).ok()?;
    let mirror_host = mirror.host_str()?;

    target.set_scheme(mirror.scheme()).ok()?;
    target.set_host(Some(mirror_host)).ok()?;
    target.set_port(mirror.port()).ok()?;
    Some(target.to_string())
}

#[cfg(test)]
mod tests {
    use super::rewrite_to_mirror;

    const CDN_URL: &str =
        "https://rr4---sn-q4fl6nsl.googlevideo.com/videoplayback?expire=1700000000&itag=140&id=o-AB";

    #[test]
    fn rewrites_cdn_host_preserving_path_and_query() {
        assert_eq!(
            rewrite_to_mirror(CDN_URL, "https://yt.mirror.example"),
            "https://yt.mirror.example/videoplayback?expire=1700000000&itag=140&id=o-AB"
        );
    }

    #[test]
    fn takes_scheme_and_port_from_mirror() {
        assert_eq!(
            rewrite_to_mirror(CDN_URL, "http://127.0.0.1:3000/"),
            "http://127.0.0.1:3000/videoplayback?expire=1700000000&itag=140&id=o-AB"
        );
    }

    #[test]
    fn non_cdn_hosts_pass_through_and_are_stable() {
        let url = "https://aac.saavncdn.com/123/abc_160.mp4";
        let once = rewrite_to_mirror(url, "https://yt.mirror.example");
        assert_eq!(once, url);
        assert_eq!(rewrite_to_mirror(&once, "https://yt.mirror.example"), once);
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(rewrite_to_mirror("not a url", "https://m.example"), "not a url");
        assert_eq!(rewrite_to_mirror(CDN_URL, "::nope::"), CDN_URL);
    }
}
