use std::borrow::Cow;

use kstring::KString;
use rouille::{Response, ResponseBody};

/// A finished response, independent of the HTTP server so that the
/// pipeline can be tested directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AResponse {
    pub status: u16,
    pub mime: KString,
    pub headers: Vec<(KString, String)>,
    pub body: Vec<u8>,
}

impl AResponse {
    pub fn bytes(status: u16, mime: &str, body: Vec<u8>) -> Self {
        AResponse {
            status,
            mime: KString::from_ref(mime),
            headers: Vec::new(),
            body,
        }
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::bytes(status, "text/html", body.into().into_bytes())
    }

    /// A body-less response, e.g. 304.
    pub fn empty(status: u16) -> Self {
        Self::bytes(status, "text/plain", Vec::new())
    }

    pub fn redirect(uri: &str, permanent: bool) -> Self {
        Self::empty(if permanent { 301 } else { 302 })
            .with_header("Location", uri)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((KString::from_ref(name), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("{}; charset=utf-8", self.mime)
    }

    pub fn body_str(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl From<AResponse> for Response {
    fn from(r: AResponse) -> Self {
        let mut headers: Vec<(Cow<'static, str>, Cow<'static, str>)> = vec![
            (Cow::from("Content-Type"), Cow::from(r.content_type()))
        ];
        for (k, v) in r.headers {
            headers.push((Cow::from(k.to_string()), Cow::from(v)));
        }
        Response {
            status_code: r.status,
            headers,
            data: ResponseBody::from_data(r.body),
            upgrade: None,
        }
    }
}
