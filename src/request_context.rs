//! Everything belonging to one request, passed down the pipeline.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use kstring::KString;
use rouille::Request;

use crate::markup::serialize::html_escape;
use crate::middleware::ContentHandler;
use crate::session::SessionHandle;
use crate::settings::SettingsValue;
use crate::url_encoding::parse_urlencoded;

fn lookup<'v>(pairs: &'v [(KString, String)], key: &str) -> Option<&'v str> {
    pairs.iter().find(|(k, _)| k.as_str() == key).map(|(_, v)| v.as_str())
}

pub struct RequestContext {
    method: KString,
    /// As received, including the query string.
    uri: String,
    query: Vec<(KString, String)>,
    post: Vec<(KString, String)>,
    headers: Vec<(KString, String)>,
    client_ip: Option<IpAddr>,
    session: Option<SessionHandle>,
    physical_path: Option<PathBuf>,
    mime: Option<KString>,
    /// Page settings, extracted at most once per request.
    pub(crate) settings: Option<SettingsValue>,
    /// Set by middleware, run once while composing the page.
    pub(crate) pending_handler: Option<Arc<dyn ContentHandler>>,
}

impl RequestContext {
    pub fn new(method: &str, uri: &str) -> Self {
        let query = match uri.split_once('?') {
            Some((_, q)) => parse_urlencoded(q.split('#').next().unwrap_or("")),
            None => Vec::new(),
        };
        RequestContext {
            method: KString::from_string(method.to_ascii_uppercase()),
            uri: uri.into(),
            query,
            post: Vec::new(),
            headers: Vec::new(),
            client_ip: None,
            session: None,
            physical_path: None,
            mime: None,
            settings: None,
            pending_handler: None,
        }
    }

    pub fn with_post(mut self, body: &str) -> Self {
        self.post = parse_urlencoded(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((KString::from_ref(name), value.into()));
        self
    }

    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn from_rouille(request: &Request, session: Option<SessionHandle>) -> Result<Self> {
        let mut ctx = RequestContext::new(request.method(), &request.raw_url());
        for (k, v) in request.headers() {
            ctx.headers.push((KString::from_ref(k), v.into()));
        }
        ctx.client_ip = Some(request.remote_addr().ip());
        ctx.session = session;
        let is_form = ctx.header("Content-Type").map_or(
            false,
            |t| t.starts_with("application/x-www-form-urlencoded"));
        if ctx.is_post() && is_form {
            let fields = rouille::input::post::raw_urlencoded_post_input(request)
                .map_err(|e| anyhow!("reading POST body: {e}"))?;
            ctx.post = fields.into_iter()
                .map(|(k, v)| (KString::from_string(k), v))
                .collect();
        }
        Ok(ctx)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_post(&self) -> bool {
        &*self.method == "POST"
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// Query parameter, HTML escaped.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_raw(key).map(html_escape)
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// POST form field, HTML escaped.
    pub fn post(&self, key: &str) -> Option<String> {
        self.post_raw(key).map(html_escape)
    }

    pub fn post_raw(&self, key: &str) -> Option<&str> {
        lookup(&self.post, key)
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn physical_path(&self) -> Option<&Path> {
        self.physical_path.as_deref()
    }

    pub fn set_physical_path(&mut self, path: PathBuf) {
        self.physical_path = Some(path);
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn set_mime(&mut self, mime: &str) {
        self.mime = Some(KString::from_ref(mime));
    }

    pub fn set_pending_handler(&mut self, handler: Arc<dyn ContentHandler>) {
        self.pending_handler = Some(handler);
    }

    pub fn has_pending_handler(&self) -> bool {
        self.pending_handler.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_request_values() {
        let ctx = RequestContext::new("post", "/a/b?x=1&name=%3Cb%3E+c#frag")
            .with_post("csrf-token=abc&q=a%26b")
            .with_header("Content-Type", "text/html");
        assert!(ctx.is_post());
        assert_eq!(ctx.get_raw("x"), Some("1"));
        assert_eq!(ctx.get_raw("name"), Some("<b> c"));
        assert_eq!(ctx.get("name").as_deref(), Some("&lt;b&gt; c"));
        assert_eq!(ctx.post_raw("q"), Some("a&b"));
        assert_eq!(ctx.post("q").as_deref(), Some("a&amp;b"));
        assert_eq!(ctx.get("nope"), None);
        assert_eq!(ctx.header("content-type"), Some("text/html"));
    }
}
