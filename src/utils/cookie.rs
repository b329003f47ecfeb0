// src/utils/cookie.rs

use url::form_urlencoded;

use crate::models::user::DisplayIdentity;

/// Opaque, HttpOnly cookie carrying the signed session token.
pub const AUTH_COOKIE: &str = "auth_token";
/// Client-readable cookie carrying the display identity.
pub const USER_COOKIE: &str = "curr_user";

/// Formats a `Set-Cookie` value. Both session cookies share path, SameSite
/// and lifetime so they expire together.
pub fn set_cookie(name: &str, value: &str, max_age: u64, http_only: bool, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Strict",
        name, value, max_age
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// A `Set-Cookie` value that deletes the cookie immediately.
pub fn expired_cookie(name: &str, http_only: bool, secure: bool) -> String {
    set_cookie(name, "", 0, http_only, secure)
}

/// URL-encoded JSON for the `curr_user` cookie.
pub fn encode_identity(identity: &DisplayIdentity) -> String {
    let json = serde_json::to_string(identity).unwrap_or_default();
    form_urlencoded::byte_serialize(json.as_bytes()).collect()
}

/// Inverse of [`encode_identity`]; `None` for anything malformed.
pub fn decode_identity(raw: &str) -> Option<DisplayIdentity> {
    let decoded: String = form_urlencoded::parse(format!("v={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())?;
    serde_json::from_str(&decoded).ok()
}

/// Finds a cookie by name in a `Cookie` request header.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Extracts `(name, value)` from a `Set-Cookie` response header.
pub fn parse_set_cookie(header: &str) -> Option<(&str, &str)> {
    let first = header.split(';').next()?;
    let (name, value) = first.trim().split_once('=')?;
    Some((name, value))
}
