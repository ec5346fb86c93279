//! The request pipeline: locate the file, run the responsible route
//! file, resolve the file, serve it by content type. Any `Interrupt`
//! on the way ends up in `ErrorFlow`.

use std::sync::Arc;

use crate::aresponse::AResponse;
use crate::config::Config;
use crate::error_flow::ErrorFlow;
use crate::handler::MimeDispatcher;
use crate::image::ImageResizer;
use crate::interrupt::{Interrupt, Flow};
use crate::middleware::{Invocation, MiddlewareInvoker, MiddlewareRegistry, MiddlewareResolver,
                        RouteOutcome};
use crate::output_capture::OutputCapture;
use crate::path_resolver::PathResolver;
use crate::request_context::RequestContext;
use crate::note;

#[derive(Debug)]
pub struct FileRouter {
    config: Arc<Config>,
    middlewares: MiddlewareRegistry,
    dispatcher: MimeDispatcher,
    paths: PathResolver,
    routes: MiddlewareResolver,
}

impl FileRouter {
    pub fn new(config: Arc<Config>,
               middlewares: MiddlewareRegistry,
               dispatcher: MimeDispatcher) -> Self {
        let paths = PathResolver::new(&config.public_root, &config.index_file, &config.route_file);
        let routes = MiddlewareResolver::new(&config.public_root, &config.route_file);
        FileRouter { config, middlewares, dispatcher, paths, routes }
    }

    /// With the built-in middlewares and the default handlers.
    pub fn with_defaults(config: Arc<Config>, resizer: Arc<dyn ImageResizer>) -> Self {
        let middlewares = MiddlewareRegistry::with_builtins(&config);
        Self::new(config, middlewares, MimeDispatcher::new(resizer))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self, ctx: &mut RequestContext) -> AResponse {
        let mut out = OutputCapture::new();
        match self.serve(ctx, &mut out) {
            Ok(response) => response,
            Err(interrupt) => ErrorFlow::new(&self.config).run(interrupt, ctx)
        }
    }

    fn serve(&self, ctx: &mut RequestContext, out: &mut OutputCapture) -> Flow<AResponse> {
        let located = self.paths.locate(ctx.uri())?;
        if let Some(route_file) = self.routes.find(&located) {
            let Invocation { outcome, output } =
                MiddlewareInvoker::new(&self.middlewares).run(&route_file, ctx, out)?;
            match outcome {
                RouteOutcome::Continue(true) => (),
                RouteOutcome::Continue(false) => {
                    note!("{route_file:?} stopped {:?}", ctx.uri());
                    return Ok(AResponse::html(200, output))
                }
                RouteOutcome::ErrorCode(code) =>
                    return Err(Interrupt::status(code)),
                RouteOutcome::Handler(handler) =>
                    ctx.set_pending_handler(handler),
            }
        }
        let path = self.paths.resolve_located(&located)?;
        ctx.set_physical_path(path.clone());
        self.dispatcher.dispatch(&path, ctx, &self.config)
    }
}
