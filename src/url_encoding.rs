use kstring::KString;
use pct_str::{InvalidPctString, PctStr};

// Don't want to return InvalidPctString as error value because it
// borrows the input, which would then have to outlive the request
// context. Thus make our own that owns the string.

#[derive(Debug, thiserror::Error)]
#[error("url decoding error: {0}")]
pub struct UrlDecodingError(Box<String>);

impl From<InvalidPctString<&str>> for UrlDecodingError {
    fn from(e: InvalidPctString<&str>) -> Self {
        Self(Box::new(format!("{}", e)))
    }
}

pub fn url_decode(s: &str) -> Result<String, UrlDecodingError> {
    let p = PctStr::new(s)?;
    Ok(p.decode())
}

/// Decoding as done for request paths: invalid percent sequences
/// are kept literally instead of failing the request.
pub fn url_decode_lenient(s: &str) -> String {
    match url_decode(s) {
        Ok(d) => d,
        Err(_) => s.to_string()
    }
}

/// Parse an `application/x-www-form-urlencoded` string (query
/// string or POST body). Pairs without `=` get an empty value.
pub fn parse_urlencoded(s: &str) -> Vec<(KString, String)> {
    s.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| url_decode_lenient(&s.replace('+', " "));
            (KString::from_string(decode(k)), decode(v))
        })
        .collect()
}
