//! Serving a `FileRouter` over HTTP with rouille.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use rouille::session::session;
use rouille::{Server, Request, Response};

use crate::access_log::log_combined;
use crate::aresponse::AResponse;
use crate::file_router::FileRouter;
use crate::request_context::RequestContext;
use crate::session::{SessionHandle, SessionStore};
use crate::warn;

/// Make a handler for Rouille's `Server::new`. Each request runs on
/// rouille's own thread; nothing but the session store is shared.
pub fn server_handler(
    router: Arc<FileRouter>,
    sessions: Arc<dyn SessionStore>,
) -> impl for<'r> Fn(&'r Request) -> Response
{
    move |request: &Request| -> Response {
        let handle = |session: Option<SessionHandle>| -> Response {
            match RequestContext::from_rouille(request, session) {
                Ok(mut context) =>
                    log_combined(&mut context, |ctx| router.handle(ctx)).into(),
                Err(e) => {
                    warn!("{e:#}");
                    AResponse::html(400, router.config().error_fatal.clone()).into()
                }
            }
        };
        let config = router.config();
        if config.session {
            session(request, &config.session_name, config.session_timeout_secs, |s| {
                handle(Some(SessionHandle::new(s.id(), sessions.clone())))
            })
        } else {
            handle(None)
        }
    }
}

/// Serve until the process is killed.
pub fn run_server(
    addr: &str,
    router: Arc<FileRouter>,
    sessions: Arc<dyn SessionStore>,
) -> Result<()> {
    let server = Server::new(addr, server_handler(router, sessions)).map_err(
        |e| anyhow!("starting server on {addr:?}: {e}"))?;
    eprintln!("listening on {}", server.server_addr());
    server.run();
    Ok(())
}
