pub mod warn;
pub mod config;
pub mod random_util;
pub mod url_encoding;
pub mod easy_fs;
pub mod output_capture;
pub mod markup {
    pub mod node;
    pub mod parse;
    pub mod serialize;
    pub mod document;
}
pub mod settings;
pub mod interrupt;
pub mod session;
pub mod csrf;
pub mod request_context;
pub mod aresponse;
pub mod access_log;
pub mod mime;
pub mod image;
pub mod path_resolver;
pub mod middleware;
pub mod composer;
pub mod error_flow;
pub mod handler;
pub mod file_router;
pub mod rouille_runner;

#[cfg(test)]
pub mod test_util;
