//! Turning an `Interrupt` into the response: error pages are
//! composed from the error template like any other page, redirects
//! just get their `Location` header.

use std::path::PathBuf;

use thiserror::Error;

use crate::aresponse::AResponse;
use crate::composer::ContentComposer;
use crate::config::Config;
use crate::interrupt::Interrupt;
use crate::markup::document::MarkupDocument;
use crate::request_context::RequestContext;
use crate::{warn, note};

#[derive(Error, Debug)]
pub enum ErrorPageError {
    #[error("error page template {0:?} can't be loaded")]
    TemplateMissing(PathBuf),
    #[error("composing error page: {0}")]
    Compose(#[source] Interrupt),
}

/// `Normal -> ErrorRaised -> ErrorRendered`, or
/// `Normal -> RedirectRaised -> ResponseSent`. A redirect without
/// target turns into a 500 error.
#[derive(Debug)]
pub enum FlowState {
    Normal,
    ErrorRaised { code: u16, message: Option<String> },
    RedirectRaised { uri: String, permanent: bool },
    ErrorRendered(AResponse),
    ResponseSent(AResponse),
}

impl FlowState {
    pub fn raise(interrupt: Interrupt) -> FlowState {
        match interrupt {
            Interrupt::Redirect { uri, permanent } =>
                FlowState::RedirectRaised { uri, permanent },
            Interrupt::Internal(e) => {
                warn!("internal error: {e:#}");
                FlowState::ErrorRaised { code: 500, message: None }
            }
            other => {
                note!("{other}");
                FlowState::ErrorRaised {
                    code: other.status_code(),
                    message: other.message().map(String::from),
                }
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::ErrorRendered(_) | FlowState::ResponseSent(_))
    }

    pub fn step(self, flow: &ErrorFlow, ctx: &mut RequestContext) -> FlowState {
        match self {
            FlowState::ErrorRaised { code, message } =>
                FlowState::ErrorRendered(flow.render(code, message.as_deref(), ctx)),
            FlowState::RedirectRaised { uri, permanent } =>
                if uri.trim().is_empty() {
                    warn!("redirect without target");
                    FlowState::ErrorRaised { code: 500, message: None }
                } else {
                    FlowState::ResponseSent(AResponse::redirect(&uri, permanent))
                },
            s => s
        }
    }
}

pub struct ErrorFlow<'c> {
    config: &'c Config,
}

impl<'c> ErrorFlow<'c> {
    pub fn new(config: &'c Config) -> Self {
        ErrorFlow { config }
    }

    pub fn run(&self, interrupt: Interrupt, ctx: &mut RequestContext) -> AResponse {
        let mut state = FlowState::raise(interrupt);
        loop {
            state = match state.step(self, ctx) {
                FlowState::ErrorRendered(r) | FlowState::ResponseSent(r) => return r,
                FlowState::Normal => {
                    warn!("error flow fell back to the normal state");
                    FlowState::ErrorRaised { code: 500, message: None }
                }
                s => s
            }
        }
    }

    /// The error page for `code`, or the fatal fragment if the error
    /// page itself can't be made.
    pub fn render(&self, code: u16, message: Option<&str>, ctx: &mut RequestContext)
                  -> AResponse {
        match self.render_page(code, message, ctx) {
            Ok(html) => AResponse::html(code, html),
            Err(e) => {
                warn!("{e:#}");
                AResponse::html(code, self.config.error_fatal.clone())
            }
        }
    }

    fn render_page(&self, code: u16, message: Option<&str>, ctx: &mut RequestContext)
                   -> Result<String, ErrorPageError> {
        let config = self.config;
        let mut doc = MarkupDocument::load_file(&config.error_template).map_err(
            |_| ErrorPageError::TemplateMissing(config.error_template.clone()))?;

        match message {
            Some(m) => doc.replace_all_safe("error-message", m),
            None => {
                let configured = |key: &str| {
                    doc.get_content(&["settings", "error-messages", key])
                        .filter(|s| !s.trim().is_empty())
                };
                let m = configured(&format!("error-{code}"))
                    .or_else(|| configured("default"))
                    .or_else(|| config.error_message_default.clone())
                    .unwrap_or_else(|| config.error_fatal.clone());
                doc.replace_all("error-message", &m);
            }
        }
        doc.replace_all_safe("error-code", &code.to_string());

        // a handler bound for the failed page must not run on this one
        ctx.pending_handler = None;
        let page = ContentComposer::new(config).compose(doc, ctx)
            .map_err(ErrorPageError::Compose)?;
        Ok(page.print())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use crate::composer::tests::site;
    use crate::config::ERROR_FATAL;
    use crate::test_util::write_file;

    #[test]
    fn t_not_found_renders_template() -> Result<()> {
        let (_dir, config) = site()?;
        let mut ctx = RequestContext::new("GET", "/nowhere");
        let r = ErrorFlow::new(&config).run(Interrupt::NotFound("/nowhere".into()), &mut ctx);
        assert_eq!(r.status, 404);
        let body = r.body_str();
        assert!(body.contains("<title>Error 404</title>"));
        assert!(body.contains("<h1>Error 404</h1>"));
        assert!(body.contains("Page <b>not</b> found"));
        assert!(body.contains("<nav>Site nav</nav>"));
        assert!(! body.contains("error-message"));
        Ok(())
    }

    #[test]
    fn t_message_order() -> Result<()> {
        let (_dir, config) = site()?;
        let flow = ErrorFlow::new(&config);
        let ctx = || RequestContext::new("GET", "/");

        let r = flow.run(Interrupt::Status { code: 403, message: Some("<i>no</i>".into()) },
                         &mut ctx());
        assert_eq!(r.status, 403);
        assert!(r.body_str().contains("&lt;i&gt;no&lt;/i&gt;"));

        let r = flow.run(Interrupt::status(503), &mut ctx());
        assert!(r.body_str().contains("Something broke"));

        // internal details stay in the log
        let r = flow.run(anyhow!("secret path /etc").into(), &mut ctx());
        assert_eq!(r.status, 500);
        assert!(! r.body_str().contains("secret"));

        write_file(&config.error_template, "<h1>Error <error-code/></h1><error-message/>")?;
        let r = flow.run(Interrupt::status(410), &mut ctx());
        assert!(r.body_str().contains(ERROR_FATAL));
        let config = Config { error_message_default: Some("Oops".into()), ..config };
        let r = ErrorFlow::new(&config).run(Interrupt::status(410), &mut ctx());
        assert!(r.body_str().contains("<h1>Error 410</h1>Oops"));
        Ok(())
    }

    #[test]
    fn t_missing_template() -> Result<()> {
        let (dir, mut config) = site()?;
        config.error_template = dir.path().join("modules/nonexistent.html");
        let mut ctx = RequestContext::new("GET", "/");
        let r = ErrorFlow::new(&config).run(Interrupt::NotFound("/".into()), &mut ctx);
        assert_eq!(r.status, 404);
        assert_eq!(r.body_str(), ERROR_FATAL);
        Ok(())
    }

    #[test]
    fn t_redirect() -> Result<()> {
        let (_dir, config) = site()?;
        let flow = ErrorFlow::new(&config);
        let mut ctx = RequestContext::new("GET", "/old");

        let state = FlowState::raise(Interrupt::redirect("/new", true));
        assert!(matches!(state, FlowState::RedirectRaised { permanent: true, .. }));
        let state = state.step(&flow, &mut ctx);
        assert!(state.is_terminal());
        match state {
            FlowState::ResponseSent(r) => {
                assert_eq!(r.status, 301);
                assert_eq!(r.header("Location"), Some("/new"));
                assert!(r.body.is_empty());
            }
            other => panic!("unexpected {other:?}")
        }

        let r = flow.run(Interrupt::redirect("", false), &mut ctx);
        assert_eq!(r.status, 500);
        assert!(r.body_str().contains("Something broke"));
        Ok(())
    }
}
