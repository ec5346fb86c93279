//! Per-directory route files and the code they run before a file
//! is served.

//! A route file named `Config::route_file` in the directory of the
//! requested path, or in the closest ancestor directory up to the
//! public root, intercepts the request. Its first directive line
//! (blank lines and `#` comments are skipped) decides what happens:
//!
//! - `continue`, `true`, or no directive: serve the file normally
//! - `stop`, `false`: end the request with what the route produced
//! - `<number>`: respond with that error status
//! - `redirect <uri> [permanent]`
//! - `run <name>`: run the `Middleware` registered under that name

use std::any::type_name;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, Context, anyhow};
use kstring::KString;

use crate::config::Config;
use crate::csrf::CsrfVerifyMiddleware;
use crate::interrupt::{Interrupt, Flow};
use crate::markup::document::MarkupDocument;
use crate::output_capture::OutputCapture;
use crate::request_context::RequestContext;
use crate::settings::SettingsValue;
use crate::{note, warn};

/// What a content handler gets to see: the page before the head,
/// header and footer templates are merged in, and its settings.
pub struct HandlerArgs<'a> {
    pub content: &'a mut MarkupDocument,
    pub settings: &'a SettingsValue,
}

/// Custom page processing requested by a middleware. It may change
/// `content` in place, or return a whole replacement document.
pub trait ContentHandler: Send + Sync {
    fn call(&self, args: HandlerArgs) -> Result<Option<MarkupDocument>>;
}

impl<F> ContentHandler for F
where F: Fn(HandlerArgs) -> Result<Option<MarkupDocument>> + Send + Sync
{
    fn call(&self, args: HandlerArgs) -> Result<Option<MarkupDocument>> {
        self(args)
    }
}

/// What a `Middleware` produced.
pub enum MiddlewareValue {
    Bool(bool),
    Handler(Arc<dyn ContentHandler>),
    Code(u16),
    Nothing,
}

pub trait Middleware: Debug + Send + Sync {
    /// Text written to `out` is the response body if the request is
    /// stopped, and discarded otherwise. Errors abort the request,
    /// `Interrupt::Redirect` included.
    fn run(&self, ctx: &mut RequestContext, out: &mut OutputCapture)
           -> Flow<MiddlewareValue>;
}

// ------------------------------------------------------------------
/// Allow closures to be registered as `Middleware`s.
pub struct FnMiddleware<F>
where F: Fn(&mut RequestContext, &mut OutputCapture) -> Flow<MiddlewareValue> + Send + Sync
{
    handler: F
}

impl<F> FnMiddleware<F>
where F: Fn(&mut RequestContext, &mut OutputCapture) -> Flow<MiddlewareValue> + Send + Sync
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Middleware for FnMiddleware<F>
where F: Fn(&mut RequestContext, &mut OutputCapture) -> Flow<MiddlewareValue> + Send + Sync
{
    fn run(&self, ctx: &mut RequestContext, out: &mut OutputCapture)
           -> Flow<MiddlewareValue> {
        (self.handler)(ctx, out)
    }
}

impl<F> Debug for FnMiddleware<F>
where F: Fn(&mut RequestContext, &mut OutputCapture) -> Flow<MiddlewareValue> + Send + Sync
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("FnMiddleware({})", type_name::<F>()))
    }
}

// ------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MiddlewareRegistry {
    middlewares: HashMap<KString, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The middlewares that are always available.
    pub fn with_builtins(config: &Config) -> Self {
        Self::new().add("csrf-verify", CsrfVerifyMiddleware {
            token_length: config.csrf_length
        })
    }

    pub fn add(mut self, name: &str, middleware: impl Middleware + 'static) -> Self {
        if self.middlewares.insert(KString::from_ref(name), Arc::new(middleware)).is_some() {
            warn!("middleware {name:?} registered twice, using the latter");
        }
        self
    }

    pub fn add_fn<F>(self, name: &str, f: F) -> Self
    where F: Fn(&mut RequestContext, &mut OutputCapture) -> Flow<MiddlewareValue>
        + Send + Sync + 'static
    {
        self.add(name, FnMiddleware::new(f))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Middleware>> {
        self.middlewares.get(name)
    }
}

// ------------------------------------------------------------------

pub const MAX_DEPTH: usize = 100;

/// Finds the route file responsible for a physical path.
#[derive(Debug, Clone)]
pub struct MiddlewareResolver {
    public_root: PathBuf,
    file_name: String,
    max_depth: usize,
}

impl MiddlewareResolver {
    pub fn new(public_root: impl Into<PathBuf>, file_name: &str) -> Self {
        MiddlewareResolver {
            public_root: public_root.into(),
            file_name: file_name.into(),
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The route file in the directory of `physical` (or `physical`
    /// itself if it is a directory) or the closest ancestor up to the
    /// public root, checking at most `max_depth` directories.
    pub fn find(&self, physical: &Path) -> Option<PathBuf> {
        let mut dir = if physical.is_dir() {
            physical
        } else {
            physical.parent()?
        };
        for _ in 0..self.max_depth {
            if !dir.starts_with(&self.public_root) {
                return None
            }
            let candidate = dir.join(&self.file_name);
            if candidate.is_file() {
                return Some(candidate)
            }
            if dir == self.public_root {
                return None
            }
            dir = dir.parent()?;
        }
        None
    }
}

// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDirective {
    Continue(bool),
    Code(u16),
    Redirect { uri: String, permanent: bool },
    Run(KString),
}

pub fn parse_directive(text: &str) -> Result<RouteDirective> {
    let line = text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'));
    let line = match line {
        Some(l) => l,
        None => return Ok(RouteDirective::Continue(true))
    };
    let mut words = line.split_whitespace();
    let keyword = words.next().unwrap_or("").to_ascii_lowercase();
    let args: Vec<&str> = words.collect();
    match (keyword.as_str(), args.as_slice()) {
        ("continue" | "true", []) => Ok(RouteDirective::Continue(true)),
        ("stop" | "false", []) => Ok(RouteDirective::Continue(false)),
        ("redirect", [uri]) =>
            Ok(RouteDirective::Redirect { uri: uri.to_string(), permanent: false }),
        ("redirect", [uri, p]) if p.eq_ignore_ascii_case("permanent") =>
            Ok(RouteDirective::Redirect { uri: uri.to_string(), permanent: true }),
        ("run", [name]) => Ok(RouteDirective::Run(KString::from_ref(name))),
        (code, []) if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) =>
            code.parse().map(RouteDirective::Code).with_context(
                || anyhow!("invalid status code {code:?}")),
        _ => Err(anyhow!("invalid route directive {line:?}"))
    }
}

/// How the request proceeds after a route file.
pub enum RouteOutcome {
    /// `true`: serve the file, `false`: stop here.
    Continue(bool),
    /// Serve the file, running the handler on the page content.
    Handler(Arc<dyn ContentHandler>),
    ErrorCode(u16),
}

impl Debug for RouteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteOutcome::Continue(b) => write!(f, "Continue({b})"),
            RouteOutcome::Handler(_) => write!(f, "Handler(..)"),
            RouteOutcome::ErrorCode(c) => write!(f, "ErrorCode({c})"),
        }
    }
}

impl From<MiddlewareValue> for RouteOutcome {
    fn from(v: MiddlewareValue) -> Self {
        match v {
            MiddlewareValue::Bool(b) => RouteOutcome::Continue(b),
            MiddlewareValue::Handler(h) => RouteOutcome::Handler(h),
            MiddlewareValue::Code(c) => RouteOutcome::ErrorCode(c),
            MiddlewareValue::Nothing => RouteOutcome::Continue(true),
        }
    }
}

/// The result of running a route file.
#[derive(Debug)]
pub struct Invocation {
    pub outcome: RouteOutcome,
    /// What the middleware wrote.
    pub output: String,
}

pub struct MiddlewareInvoker<'r> {
    registry: &'r MiddlewareRegistry,
}

impl<'r> MiddlewareInvoker<'r> {
    pub fn new(registry: &'r MiddlewareRegistry) -> Self {
        MiddlewareInvoker { registry }
    }

    pub fn run(&self, route_file: &Path, ctx: &mut RequestContext, out: &mut OutputCapture)
               -> Flow<Invocation> {
        let text = std::fs::read_to_string(route_file).with_context(
            || anyhow!("reading route file {route_file:?}"))?;
        // misconfiguration: the details go to the log only
        let directive = parse_directive(&text).with_context(
            || anyhow!("route file {route_file:?}"))?;
        note!("route file {route_file:?}: {directive:?}");
        let outcome = match directive {
            RouteDirective::Continue(b) => RouteOutcome::Continue(b),
            RouteDirective::Code(c) => RouteOutcome::ErrorCode(c),
            RouteDirective::Redirect { uri, permanent } =>
                return Err(Interrupt::Redirect { uri, permanent }),
            RouteDirective::Run(name) => {
                let middleware = self.registry.get(&name).ok_or_else(
                    || anyhow!("route file {route_file:?}: no middleware named {name:?}"))?;
                let (value, output) = out.capture(|o| middleware.run(ctx, o))?;
                return Ok(Invocation { outcome: value.into(), output })
            }
        };
        Ok(Invocation { outcome, output: String::new() })
    }
}
