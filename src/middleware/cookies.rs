//! Cookie parsing and `Set-Cookie` construction.

use axum::http::{HeaderMap, HeaderValue, header};
use uuid::Uuid;

/// Holds the raw session token.
pub const SESSION_COOKIE: &str = "sid";

/// Holds a guest's cart token until they sign in.
pub const CART_COOKIE: &str = "cart_token";

/// Value of cookie `name` from any `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// The guest cart token, if the cookie holds a valid one.
pub fn guest_token(headers: &HeaderMap) -> Option<Uuid> {
    read_cookie(headers, CART_COOKIE).and_then(|value| Uuid::parse_str(&value).ok())
}

/// An http-only cookie living for `max_age_secs`.
pub fn set_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> HeaderValue {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    // Names are constants and values are hex or UUIDs, both valid header text
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Expire cookie `name` immediately.
pub fn clear_cookie(name: &str, secure: bool) -> HeaderValue {
    set_cookie(name, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let h = headers("theme=dark; sid=abc123; other=1");
        assert_eq!(read_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&h, "missing"), None);
    }

    #[test]
    fn guest_token_must_be_a_uuid() {
        let token = Uuid::new_v4();
        assert_eq!(guest_token(&headers(&format!("cart_token={token}"))), Some(token));
        assert_eq!(guest_token(&headers("cart_token=42")), None);
    }

    #[test]
    fn set_cookie_carries_attributes() {
        let value = set_cookie(SESSION_COOKIE, "abc", 86400, true);
        let text = value.to_str().unwrap();
        assert!(text.starts_with("sid=abc;"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("Max-Age=86400"));
        assert!(text.ends_with("; Secure"));

        let cleared = clear_cookie(CART_COOKIE, false);
        assert_eq!(
            cleared.to_str().unwrap(),
            "cart_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
