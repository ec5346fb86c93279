//! Tokens against cross-site request forgery, kept in the session.

use anyhow::{Result, anyhow};

use crate::interrupt::Flow;
use crate::middleware::{Middleware, MiddlewareValue};
use crate::output_capture::OutputCapture;
use crate::random_util::random_hex;
use crate::request_context::RequestContext;
use crate::session::SessionHandle;
use crate::note;

/// Session key, and also the name of the form field and of the
/// placeholder tag.
pub const CSRF_KEY: &str = "csrf-token";

/// A fresh token, replacing the one stored in the session.
pub fn generate_token(session: &SessionHandle, len: usize) -> Result<String> {
    let token = random_hex(len).map_err(|e| anyhow!("generating CSRF token: {e}"))?;
    session.set(CSRF_KEY, token.clone());
    Ok(token)
}

/// Whether `token` is the one stored in the session. A new token is
/// generated afterwards in any case, so each token is usable once.
pub fn verify_token(session: &SessionHandle, token: Option<&str>, len: usize) -> Result<bool> {
    let expected = session.get(CSRF_KEY);
    let ok = match (expected, token) {
        // blake3::Hash comparison is constant time
        (Some(expected), Some(token)) if !expected.is_empty() =>
            blake3::hash(expected.as_bytes()) == blake3::hash(token.as_bytes()),
        _ => false
    };
    generate_token(session, len)?;
    Ok(ok)
}

/// Rejects POST requests without the right `csrf-token` field with
/// 403. Registered as `csrf-verify`.
#[derive(Debug, Clone)]
pub struct CsrfVerifyMiddleware {
    pub token_length: usize,
}

impl Middleware for CsrfVerifyMiddleware {
    fn run(&self, ctx: &mut RequestContext, _out: &mut OutputCapture)
           -> Flow<MiddlewareValue> {
        if !ctx.is_post() {
            return Ok(MiddlewareValue::Nothing)
        }
        let ok = match ctx.session() {
            Some(session) =>
                verify_token(session, ctx.post_raw(CSRF_KEY), self.token_length)?,
            None => false
        };
        if ok {
            Ok(MiddlewareValue::Nothing)
        } else {
            note!("rejecting POST to {:?}: bad CSRF token", ctx.uri());
            Ok(MiddlewareValue::Code(403))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use crate::session::MemorySessionStore;

    fn session() -> SessionHandle {
        SessionHandle::new("sid", Arc::new(MemorySessionStore::new(Duration::from_secs(60))))
    }

    #[test]
    fn t_tokens_are_single_use() -> Result<()> {
        let s = session();
        let token = generate_token(&s, 64)?;
        assert_eq!(token.len(), 64);
        assert!(verify_token(&s, Some(&token), 64)?);
        assert!(! verify_token(&s, Some(&token), 64)?);
        assert!(! verify_token(&s, None, 64)?);
        Ok(())
    }

    #[test]
    fn t_verify_middleware() -> Result<()> {
        let s = session();
        let mw = CsrfVerifyMiddleware { token_length: 16 };
        let mut out = OutputCapture::new();

        let mut get = RequestContext::new("GET", "/form").with_session(s.clone());
        assert!(matches!(mw.run(&mut get, &mut out)?, MiddlewareValue::Nothing));

        let token = generate_token(&s, 16)?;
        let mut good = RequestContext::new("POST", "/form")
            .with_post(&format!("csrf-token={token}"))
            .with_session(s.clone());
        assert!(matches!(mw.run(&mut good, &mut out)?, MiddlewareValue::Nothing));

        let mut replay = RequestContext::new("POST", "/form")
            .with_post(&format!("csrf-token={token}"))
            .with_session(s);
        assert!(matches!(mw.run(&mut replay, &mut out)?, MiddlewareValue::Code(403)));

        let mut no_session = RequestContext::new("POST", "/form");
        assert!(matches!(mw.run(&mut no_session, &mut out)?, MiddlewareValue::Code(403)));
        Ok(())
    }
}
