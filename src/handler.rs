//! Serving a resolved file according to its content type.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use httpdate::{fmt_http_date, parse_http_date};

use crate::aresponse::AResponse;
use crate::composer::ContentComposer;
use crate::config::Config;
use crate::image::{ImageResizer, requested_width};
use crate::interrupt::{Interrupt, Flow};
use crate::markup::document::MarkupDocument;
use crate::mime::mime_for_path;
use crate::request_context::RequestContext;
use crate::note;

// Can't just check `mtime > modsince` since mtime has a nsec value,
// where modsince has 0 there. So only count the file as newer if it
// is at least a second newer.
fn file_is_newer_than_snapshot_time(mtime: SystemTime, modsince: SystemTime) -> bool {
    match mtime.duration_since(modsince) {
        // file is older than snapshot time, or has been restored to
        // an older version; in any case it is not newer
        Err(_e) => false,
        Ok(secsnewer) => secsnewer >= Duration::from_secs(1)
    }
}

pub trait Handler: Debug + Send + Sync {
    fn accepts(&self, mime: &str) -> bool;

    /// Returning Ok(None) means, the handler is refusing to handle
    /// the file; the next handler accepting the mime type gets to
    /// try. Err means, the handler has accepted to handle it but
    /// failed to.
    fn call(&self, path: &Path, mime: &str, ctx: &mut RequestContext, config: &Config)
            -> Flow<Option<AResponse>>;
}

/// Pages: composed with head, header and footer.
#[derive(Debug, Default)]
pub struct HtmlHandler;

impl Handler for HtmlHandler {
    fn accepts(&self, mime: &str) -> bool {
        mime == "text/html"
    }

    fn call(&self, path: &Path, _mime: &str, ctx: &mut RequestContext, config: &Config)
            -> Flow<Option<AResponse>> {
        let doc = MarkupDocument::load_file(path)?;
        let page = ContentComposer::new(config).compose(doc, ctx)?;
        Ok(Some(AResponse::html(200, page.print())))
    }
}

#[derive(Debug)]
pub struct ImageHandler {
    resizer: Arc<dyn ImageResizer>,
}

impl ImageHandler {
    pub fn new(resizer: Arc<dyn ImageResizer>) -> Self {
        ImageHandler { resizer }
    }
}

impl Handler for ImageHandler {
    fn accepts(&self, mime: &str) -> bool {
        mime.starts_with("image/")
    }

    fn call(&self, path: &Path, mime: &str, ctx: &mut RequestContext, config: &Config)
            -> Flow<Option<AResponse>> {
        let width = requested_width(ctx.get_raw(&config.image_resize_query));
        Ok(self.resizer.resize(path, mime, width)?
           .map(|data| AResponse::bytes(200, mime, data)))
    }
}

/// Sends any file as is, with caching headers, answering conditional
/// requests with 304.
#[derive(Debug, Default)]
pub struct RawFileHandler;

impl Handler for RawFileHandler {
    fn accepts(&self, _mime: &str) -> bool {
        true
    }

    fn call(&self, path: &Path, mime: &str, ctx: &mut RequestContext, _config: &Config)
            -> Flow<Option<AResponse>> {
        let metadata = path.metadata().with_context(
            || anyhow!("can't get metadata of {path:?}"))?;
        let mtime: SystemTime = metadata.modified().with_context(
            || anyhow!("can't get mtime of {path:?}"))?;
        // mtime in the future: treat as new
        let age: Duration = mtime.elapsed().unwrap_or_default();
        let age_allowed = age.as_secs() + age.as_secs() / 10;
        let expires = mtime.checked_add(Duration::from_secs(age_allowed)).ok_or_else(
            || anyhow!("time overflow for {path:?}"))?;
        let mtime_seconds = mtime.duration_since(UNIX_EPOCH).map_err(
            |e| anyhow!("mtime of {path:?} before the epoch: {e}"))?.as_secs();
        let etag_quoted = format!("{:?}", mtime_seconds.to_string());

        let not_modified =
            if let Some(modsince_str) = ctx.header("If-Modified-Since") {
                match parse_http_date(modsince_str) {
                    Ok(modsince) => !file_is_newer_than_snapshot_time(mtime, modsince),
                    Err(_) => {
                        note!("ignoring invalid If-Modified-Since {modsince_str:?}");
                        false
                    }
                }
            } else if let Some(nonematch_str) = ctx.header("If-None-Match") {
                nonematch_str == etag_quoted
            } else {
                false
            };

        let response = if not_modified {
            note!("{path:?} not modified");
            AResponse::bytes(304, mime, Vec::new())
        } else {
            let data = std::fs::read(path).with_context(
                || anyhow!("can't open file for reading: {path:?}"))?;
            AResponse::bytes(200, mime, data)
        };
        Ok(Some(response
                .with_header("Last-Modified", fmt_http_date(mtime))
                .with_header("Cache-Control", format!("max-age={age_allowed}"))
                .with_header("Expires", fmt_http_date(expires))
                .with_header("ETag", etag_quoted)))
    }
}

/// Picks the handlers for a file's content type, in order, until one
/// takes it.
#[derive(Debug)]
pub struct MimeDispatcher {
    handlers: Vec<Box<dyn Handler>>,
}

impl MimeDispatcher {
    /// Pages, then images, then everything as raw bytes.
    pub fn new(resizer: Arc<dyn ImageResizer>) -> Self {
        MimeDispatcher {
            handlers: vec![
                Box::new(HtmlHandler),
                Box::new(ImageHandler::new(resizer)),
                Box::new(RawFileHandler),
            ]
        }
    }

    /// Add `handler` in front of the existing ones.
    pub fn with_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(0, Box::new(handler));
        self
    }

    pub fn dispatch(&self, path: &Path, ctx: &mut RequestContext, config: &Config)
                    -> Flow<AResponse> {
        let mime = mime_for_path(path)?;
        ctx.set_mime(mime);
        for handler in self.handlers.iter().filter(|h| h.accepts(mime)) {
            if let Some(response) = handler.call(path, mime, ctx, config)? {
                return Ok(response)
            }
            note!("{handler:?} declined {path:?} ({mime})");
        }
        Err(Interrupt::NotFound(path.to_string_lossy().into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use anyhow::Result;
    use crate::composer::tests::site;
    use crate::image::SizeCheckingResizer;
    use crate::test_util::write_file;

    const GIF_32X1: &[u8] = b"GIF89a\x20\x00\x01\x00\x80\x00\x00";

    fn dispatcher() -> MimeDispatcher {
        MimeDispatcher::new(Arc::new(SizeCheckingResizer))
    }

    #[derive(Debug, Default)]
    struct Declining {
        calls: AtomicUsize,
    }

    impl Handler for Declining {
        fn accepts(&self, mime: &str) -> bool {
            mime != "text/html"
        }
        fn call(&self, _: &Path, _: &str, _: &mut RequestContext, _: &Config)
                -> Flow<Option<AResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[test]
    fn t_file_is_newer_than_snapshot_time() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert!(! file_is_newer_than_snapshot_time(t + Duration::from_millis(300), t));
        assert!(file_is_newer_than_snapshot_time(t + Duration::from_secs(2), t));
        assert!(! file_is_newer_than_snapshot_time(t, t + Duration::from_secs(5)));
    }

    #[test]
    fn t_dispatch_by_mime() -> Result<()> {
        let (_dir, config) = site()?;
        let public = &config.public_root;
        write_file(&public.join("page.html"), "<h1>Hello</h1>")?;
        write_file(&public.join("notes.txt"), "plain")?;
        write_file(&public.join("wide.gif"), GIF_32X1)?;
        let d = dispatcher();

        let mut ctx = RequestContext::new("GET", "/page.html");
        let r = d.dispatch(&public.join("page.html"), &mut ctx, &config)?;
        assert_eq!(ctx.mime(), Some("text/html"));
        assert_eq!(r.content_type(), "text/html; charset=utf-8");
        assert!(r.body_str().contains("<title>Hello</title>"));
        assert!(r.body_str().contains("<nav>Site nav</nav>"));

        let mut ctx = RequestContext::new("GET", "/notes.txt");
        let r = d.dispatch(&public.join("notes.txt"), &mut ctx, &config)?;
        assert_eq!((r.status, r.mime.as_str(), r.body.as_slice()),
                   (200, "text/plain", &b"plain"[..]));
        assert!(r.header("Last-Modified").is_some());

        // too wide for the resizer: falls through to the raw handler
        let mut ctx = RequestContext::new("GET", "/wide.gif?res=10");
        let r = d.dispatch(&public.join("wide.gif"), &mut ctx, &config)?;
        assert_eq!((r.status, r.mime.as_str(), r.body.as_slice()),
                   (200, "image/gif", GIF_32X1));
        assert!(r.header("ETag").is_some());
        let mut ctx = RequestContext::new("GET", "/wide.gif?res=100");
        let r = d.dispatch(&public.join("wide.gif"), &mut ctx, &config)?;
        assert_eq!(r.body.as_slice(), GIF_32X1);
        assert!(r.header("ETag").is_none());
        Ok(())
    }

    #[test]
    fn t_declined_falls_through() -> Result<()> {
        let (_dir, config) = site()?;
        let path = config.public_root.join("data.bin");
        write_file(&path, [0xff, 0xfe, 0x00, 0x81])?;
        let d = dispatcher().with_handler(Declining::default());
        let mut ctx = RequestContext::new("GET", "/data.bin");
        let r = d.dispatch(&path, &mut ctx, &config)?;
        assert_eq!(r.mime.as_str(), "application/octet-stream");
        assert_eq!(r.body, vec![0xff, 0xfe, 0x00, 0x81]);
        assert!(format!("{:?}", d.handlers[0]).contains("calls: 1"));
        Ok(())
    }

    #[test]
    fn t_conditional_get() -> Result<()> {
        let (_dir, config) = site()?;
        let path = config.public_root.join("style.css");
        write_file(&path, "p {}")?;
        let raw = RawFileHandler;
        let get = |ctx: &mut RequestContext| -> Result<AResponse> {
            Ok(raw.call(&path, "text/css", ctx, &config)?.expect("raw never declines"))
        };

        let first = get(&mut RequestContext::new("GET", "/style.css"))?;
        assert_eq!(first.status, 200);
        let etag = first.header("ETag").expect("etag").to_string();

        let later = fmt_http_date(SystemTime::now() + Duration::from_secs(60));
        let r = get(&mut RequestContext::new("GET", "/style.css")
                    .with_header("If-Modified-Since", &later))?;
        assert_eq!(r.status, 304);
        assert!(r.body.is_empty());

        let r = get(&mut RequestContext::new("GET", "/style.css")
                    .with_header("If-Modified-Since", "Thu, 01 Jan 1970 00:16:40 GMT"))?;
        assert_eq!(r.status, 200);

        let r = get(&mut RequestContext::new("GET", "/style.css")
                    .with_header("If-None-Match", &etag))?;
        assert_eq!(r.status, 304);
        let r = get(&mut RequestContext::new("GET", "/style.css")
                    .with_header("If-None-Match", "\"1\""))?;
        assert_eq!(r.status, 200);

        let r = get(&mut RequestContext::new("GET", "/style.css")
                    .with_header("If-Modified-Since", "yesterday"))?;
        assert_eq!(r.status, 200);
        Ok(())
    }
}
