use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser as ClapParser;
use filerouter::config::{Config, getenv};
use filerouter::file_router::FileRouter;
use filerouter::handler::MimeDispatcher;
use filerouter::image::SizeCheckingResizer;
use filerouter::middleware::MiddlewareRegistry;
use filerouter::rouille_runner::run_server;
use filerouter::session::MemorySessionStore;
use filerouter::warn::set_verbose;

#[derive(clap::Parser, Debug)]
/// Serve the directory given in the PUBLICDIR env var, composing
/// HTML pages from the templates in MODULESDIR.
struct Args {
    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Print what the request pipeline decides (same as setting the
    /// VERBOSE env var)
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_verbose(args.verbose || getenv("VERBOSE")?.is_some());

    let config = Arc::new(Config::from_env()?);
    let middlewares = MiddlewareRegistry::with_builtins(&config);
    let dispatcher = MimeDispatcher::new(Arc::new(SizeCheckingResizer));
    let sessions = Arc::new(MemorySessionStore::new(
        Duration::from_secs(config.session_timeout_secs)));
    let router = Arc::new(FileRouter::new(config, middlewares, dispatcher));
    run_server(&args.listen, router, sessions)
}
