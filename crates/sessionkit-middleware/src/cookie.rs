//! Session cookie wire format.

use axum::http::header::{CONNECTION, COOKIE, UPGRADE};
use axum::http::{HeaderMap, Request};
use sessionkit_core::SessionId;
use tower_cookies::cookie::Cookie;

use crate::SessionConfig;

/// Find the session id among the request cookies.
///
/// All `Cookie` headers are searched; the first cookie called `name` wins.
/// Unparsable pairs are skipped.
pub fn session_id_from_headers(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .and_then(|cookie| SessionId::from_cookie_value(cookie.value()))
}

/// Whether the client reached us over HTTPS, directly or through a proxy.
pub fn is_https<B>(req: &Request<B>) -> bool {
    if req.uri().scheme_str() == Some("https") {
        return true;
    }

    if header_str(req, "x-forwarded-proto").is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
    {
        return true;
    }

    // CGI-style flag set by some front proxies
    header_str(req, "https")
        .is_some_and(|flag| !flag.is_empty() && flag != "0" && !flag.eq_ignore_ascii_case("off"))
}

fn header_str<'r, B>(req: &'r Request<B>, name: &str) -> Option<&'r str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Requests switching protocols (e.g. WebSocket) don't get a session.
pub fn is_upgrade<B>(req: &Request<B>) -> bool {
    req.headers().contains_key(UPGRADE)
        && req
            .headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Build the `Set-Cookie` value for a session.
///
/// Clauses come in a fixed order and each is terminated by `;`, except a
/// trailing `Secure`:
///
/// ```text
/// <name>=<id>; path=<path>;[Max-Age=..;][SameSite=..;][Domain=..;][HttpOnly;][Secure]
/// ```
///
/// A destroyed session gets `Max-Age=-1` so the client drops it.
pub fn set_cookie_value(
    config: &SessionConfig,
    id: &SessionId,
    destroyed: bool,
    secure_request: bool,
) -> String {
    let mut value = format!("{}={}; path={};", config.session_name, id, config.cookie_path);

    if destroyed {
        value.push_str("Max-Age=-1;");
    } else if config.cookie_expire != 0 {
        value.push_str(&format!("Max-Age={};", config.cookie_expire));
    }

    if let Some(same_site) = config.cookie_same_site {
        value.push_str(&format!("SameSite={same_site};"));
    }

    if let Some(domain) = config.cookie_domain.as_deref().filter(|d| !d.is_empty()) {
        value.push_str(&format!("Domain={domain};"));
    }

    if config.cookie_http_only {
        value.push_str("HttpOnly;");
    }

    if config.cookie_secure && secure_request {
        value.push_str("Secure");
    }

    value
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use tower_cookies::cookie::SameSite;

    use super::*;

    fn id() -> SessionId {
        "0123abcd".parse().unwrap()
    }

    #[test]
    fn default_config_for_new_session() {
        assert_eq!(
            set_cookie_value(&SessionConfig::default(), &id(), false, false),
            "PYSESSONID=0123abcd; path=/;SameSite=Lax;HttpOnly;"
        );
    }

    #[test]
    fn destroyed_session_expires_cookie() {
        let config = SessionConfig::default().with_cookie_expire(3600);
        assert_eq!(
            set_cookie_value(&config, &id(), true, false),
            "PYSESSONID=0123abcd; path=/;Max-Age=-1;SameSite=Lax;HttpOnly;"
        );
    }

    #[test]
    fn all_clauses_in_order() {
        let config = SessionConfig::default()
            .with_session_name("sid")
            .with_cookie_path("/app")
            .with_cookie_domain("example.com")
            .with_cookie_expire(-5)
            .with_cookie_secure(true)
            .with_cookie_same_site(Some(SameSite::Strict));

        assert_eq!(
            set_cookie_value(&config, &id(), false, true),
            "sid=0123abcd; path=/app;Max-Age=-5;SameSite=Strict;Domain=example.com;HttpOnly;Secure"
        );
        // same-site appears exactly once even with a domain set
        assert_eq!(
            set_cookie_value(&config, &id(), false, true)
                .matches("SameSite=")
                .count(),
            1
        );
    }

    #[test]
    fn secure_needs_https_request() {
        let config = SessionConfig::default()
            .with_cookie_secure(true)
            .with_cookie_http_only(false)
            .with_cookie_same_site(None);

        assert_eq!(
            set_cookie_value(&config, &id(), false, false),
            "PYSESSONID=0123abcd; path=/;"
        );
        assert_eq!(
            set_cookie_value(&config, &id(), false, true),
            "PYSESSONID=0123abcd; path=/;Secure"
        );
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("PYSESSONID=abc123; other=1"));

        assert_eq!(
            session_id_from_headers(&headers, "PYSESSONID").map(|id| id.to_string()),
            Some("abc123".to_owned())
        );
        assert_eq!(session_id_from_headers(&headers, "missing"), None);
    }

    #[test]
    fn empty_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("PYSESSONID="));

        assert_eq!(session_id_from_headers(&headers, "PYSESSONID"), None);
    }

    #[test]
    fn https_detection() {
        let plain = Request::builder().uri("/").body(()).unwrap();
        assert!(!is_https(&plain));

        let direct = Request::builder()
            .uri("https://example.com/")
            .body(())
            .unwrap();
        assert!(is_https(&direct));

        let proxied = Request::builder()
            .uri("/")
            .header("x-forwarded-proto", "HTTPS")
            .body(())
            .unwrap();
        assert!(is_https(&proxied));

        let flagged = Request::builder()
            .uri("/")
            .header("https", "on")
            .body(())
            .unwrap();
        assert!(is_https(&flagged));

        let off = Request::builder()
            .uri("/")
            .header("https", "off")
            .body(())
            .unwrap();
        assert!(!is_https(&off));
    }

    #[test]
    fn upgrade_detection() {
        let ws = Request::builder()
            .uri("/ws")
            .header(CONNECTION, "keep-alive, Upgrade")
            .header(UPGRADE, "websocket")
            .body(())
            .unwrap();
        assert!(is_upgrade(&ws));

        let plain = Request::builder()
            .uri("/")
            .header(CONNECTION, "keep-alive")
            .body(())
            .unwrap();
        assert!(!is_upgrade(&plain));
    }
}
