//! Turning a content page into a full page: settings, title, and the
//! head, header and footer templates.

use itertools::Itertools;

use crate::config::{Config, TitleConfig};
use crate::csrf::{generate_token, CSRF_KEY};
use crate::interrupt::{Interrupt, Flow};
use crate::markup::document::MarkupDocument;
use crate::markup::node::{Element, Node};
use crate::middleware::HandlerArgs;
use crate::request_context::RequestContext;
use crate::settings::SettingsValue;
use crate::{note, warn};

/// Whether a page brings its own header (or footer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// No such element: the template is inserted.
    Absent,
    /// An element with blank content: it is removed.
    Empty,
    /// Kept as the page has it.
    Present,
}

#[derive(Debug)]
pub struct PageComposition {
    pub document: MarkupDocument,
    pub title: String,
    pub header: Presence,
    pub footer: Presence,
}

impl PageComposition {
    pub fn print(&self) -> String {
        self.document.print()
    }
}

fn plain_text(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// `parts` that are not empty, joined by the separator.
fn join_title(title: &TitleConfig, parts: &[&str]) -> String {
    parts.iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .join(&title.separator)
}

/// The text of the page's `title` setting with markup stripped, read
/// from `content` while it still has its settings block, or else from
/// the settings already extracted for this request.
pub fn title_setting(content: &MarkupDocument, settings: &SettingsValue) -> Option<String> {
    content.get_element(&["settings", "title"])
        .map(Element::text_content)
        .or_else(|| settings.get("title").map(SettingsValue::to_plain_string))
}

/// Title precedence: a `title` setting with text is used as is; a
/// blank one gives just prefix and suffix; without the setting, the
/// first `h1` is wrapped in prefix and suffix.
pub fn resolve_title(title: &TitleConfig, setting: Option<&str>, content: &MarkupDocument)
                     -> String {
    match setting.map(plain_text) {
        Some(s) if !s.is_empty() => s,
        Some(_) => join_title(title, &[&title.prefix, &title.suffix]),
        None => {
            let h1 = content.text_of("h1").map(|s| plain_text(&s)).unwrap_or_default();
            join_title(title, &[&title.prefix, &h1, &title.suffix])
        }
    }
}

/// `head` with the `body` of `content`, keeping the attributes of
/// both the head template's and the content's `body`.
fn merge_head(head: MarkupDocument, content: MarkupDocument) -> MarkupDocument {
    let mut content_body = content.into_root().children.into_iter()
        .find_map(|n| match n {
            Node::Element(e) if e.is("body") => Some(e),
            _ => None
        });
    let mut root = head.into_root();
    for c in &mut root.children {
        if let Node::Element(e) = c {
            if e.is("body") {
                if let Some(mut body) = content_body.take() {
                    for a in e.attributes() {
                        if body.attribute(&a.name).is_none() {
                            body.set_attribute(&a.name, a.value.clone());
                        }
                    }
                    *e = body;
                }
            }
        }
    }
    if let Some(body) = content_body {
        root.children.push(Node::Element(body));
    }
    MarkupDocument::from_root(root)
}

fn body_children(template: &MarkupDocument) -> Vec<Node> {
    template.get_element(&["body"])
        .map(|b| b.children.clone())
        .unwrap_or_default()
}

fn body_mut(doc: &mut MarkupDocument) -> Option<&mut Element> {
    doc.root_mut().find_first_mut("body")
}

pub struct ContentComposer<'c> {
    config: &'c Config,
}

impl<'c> ContentComposer<'c> {
    pub fn new(config: &'c Config) -> Self {
        ContentComposer { config }
    }

    /// The page settings, extracted from `content` unless this
    /// request already did.
    fn settings(&self, content: &MarkupDocument, ctx: &mut RequestContext) -> SettingsValue {
        ctx.settings.get_or_insert_with(|| content.get_content_array("settings")).clone()
    }

    /// Insert the template's `body` at the start or end of the page
    /// body unless the page has its own `tag` element.
    fn resolve_part(&self, doc: &mut MarkupDocument, tag: &str,
                    template: &std::path::Path, at_front: bool) -> Flow<Presence> {
        match doc.get_content(&[tag]) {
            None => {
                let nodes = body_children(&MarkupDocument::load_file(template)?);
                if let Some(body) = body_mut(doc) {
                    if at_front {
                        body.children.splice(0..0, nodes);
                    } else {
                        body.children.extend(nodes);
                    }
                }
                Ok(Presence::Absent)
            }
            Some(s) if s.trim().is_empty() => {
                doc.replace_all(tag, "");
                Ok(Presence::Empty)
            }
            Some(_) => Ok(Presence::Present)
        }
    }

    pub fn compose(&self, mut doc: MarkupDocument, ctx: &mut RequestContext)
                   -> Flow<PageComposition> {
        let config = self.config;
        let settings = self.settings(&doc, ctx);
        let explicit_title = title_setting(&doc, &settings);
        doc.replace_all("settings", "");

        if let Some(handler) = ctx.pending_handler.take() {
            note!("running content handler");
            let replacement = handler.call(HandlerArgs {
                content: &mut doc,
                settings: &settings
            }).map_err(|e| Interrupt::MiddlewareFailure(format!("{e:#}")))?;
            if let Some(replacement) = replacement {
                doc = replacement;
                doc.replace_all("settings", "");
            }
        }

        let title = resolve_title(&config.title, explicit_title.as_deref(), &doc);
        let mut head = MarkupDocument::load_file(&config.head_template)?;
        if head.get_element(&["head", "title"]).is_some() {
            head.replace_children("title", &[Node::text(title.clone())]);
        } else {
            head.set_content("title", "", Some("head"), false);
            head.replace_children("title", &[Node::text(title.clone())]);
        }
        let mut doc = merge_head(head, doc);

        let header = self.resolve_part(&mut doc, "header", &config.header_template, true)?;
        let footer = self.resolve_part(&mut doc, "footer", &config.footer_template, false)?;

        if config.csrf_enabled() && doc.contains_placeholder(CSRF_KEY) {
            match ctx.session() {
                Some(session) => {
                    let token = generate_token(session, config.csrf_length)?;
                    doc.replace_all_safe(CSRF_KEY, &token);
                }
                None => {
                    warn!("page wants a CSRF token but there is no session");
                    doc.replace_all_safe(CSRF_KEY, "");
                }
            }
        }

        Ok(PageComposition { document: doc, title, header, footer })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use anyhow::{Result, bail};
    use crate::session::{MemorySessionStore, SessionHandle};
    use crate::test_util::{TempDir, write_file};

    /// A public root and modules dir with the four templates.
    pub fn site() -> Result<(TempDir, Config)> {
        let dir = TempDir::new()?;
        let public = dir.path().join("public");
        let modules = dir.path().join("modules");
        std::fs::create_dir_all(&public)?;
        write_file(&modules.join("head.html"),
                   "<head><meta charset=\"utf-8\"><title>t</title></head>")?;
        write_file(&modules.join("header.html"), "<header><nav>Site nav</nav></header>")?;
        write_file(&modules.join("footer.html"), "<footer>(c) site</footer>")?;
        write_file(&modules.join("error.html"),
                   "<settings><error-messages>\
                      <error-404>Page <b>not</b> found</error-404>\
                      <default>Something broke</default>\
                    </error-messages></settings>\
                    <main><h1>Error <error-code></error-code></h1>\
                    <error-message></error-message></main>")?;
        let config = Config::new(&public, &modules);
        Ok((dir, config))
    }

    fn title_config(prefix: &str, suffix: &str) -> TitleConfig {
        TitleConfig { prefix: prefix.into(), suffix: suffix.into(), ..Default::default() }
    }

    #[test]
    fn t_title_precedence() {
        let resolve = |config: &TitleConfig, s: &str| {
            let doc = MarkupDocument::parse(s);
            let settings = doc.get_content_array("settings");
            resolve_title(config, title_setting(&doc, &settings).as_deref(), &doc)
        };
        assert_eq!(resolve(&title_config("Site", ""), "<h1>Foo <em>bar</em></h1><h1>Second</h1>"),
                   "Site | Foo bar");

        let empty = "<settings><title></title></settings><h1>Foo</h1>";
        assert_eq!(resolve(&title_config("Site", "Docs"), empty), "Site | Docs");
        assert_eq!(resolve(&title_config("", "Docs"), empty), "Docs");

        assert_eq!(resolve(&title_config("Site", "Docs"),
                           "<settings><title> My \n  Page </title></settings><h1>Foo</h1>"),
                   "My Page");
        assert_eq!(resolve(&title_config("", ""), "<p>no heading</p>"), "");
    }

    #[test]
    fn t_title_with_markup() {
        let resolve = |config: &TitleConfig, s: &str| {
            let doc = MarkupDocument::parse(s);
            let settings = doc.get_content_array("settings");
            resolve_title(config, title_setting(&doc, &settings).as_deref(), &doc)
        };
        assert_eq!(resolve(&title_config("Site", ""),
                           "<settings><title>My <b>Page</b></title></settings><h1>x</h1>"),
                   "My Page");
        assert_eq!(resolve(&title_config("Site", ""),
                           "<settings><title><b>Bold</b></title></settings>"),
                   "Bold");
        // only markup, no text: same as an empty title
        assert_eq!(resolve(&title_config("Site", ""),
                           "<settings><title><img src=\"x.png\"> </title></settings><h1>x</h1>"),
                   "Site");
    }

    #[test]
    fn t_title_from_request_settings() {
        // the settings of this request were extracted from an earlier
        // document already
        let doc = MarkupDocument::parse("<h1>Error</h1>");
        let earlier = MarkupDocument::parse("<settings><title>Kept</title></settings>");
        let settings = earlier.get_content_array("settings");
        assert_eq!(title_setting(&doc, &settings).as_deref(), Some("Kept"));
    }

    #[test]
    fn t_compose_defaults() -> Result<()> {
        let (_dir, config) = site()?;
        let mut ctx = RequestContext::new("GET", "/");
        let doc = MarkupDocument::parse(
            "<settings><title>Hello</title></settings><body class=\"home\"><main><p>Hi</p></main></body>");
        let page = ContentComposer::new(&config).compose(doc, &mut ctx)?;
        assert_eq!(page.title, "Hello");
        assert_eq!((page.header, page.footer), (Presence::Absent, Presence::Absent));
        let out = page.print();
        assert!(out.contains("<title>Hello</title>"));
        assert!(out.contains("<meta charset=\"utf-8\">"));
        assert!(! out.contains("settings"));
        let body = page.document.get_content(&["body"]).unwrap();
        assert_eq!(body, "<header><nav>Site nav</nav></header><main><p>Hi</p></main>\
                          <footer>(c) site</footer>");
        assert_eq!(page.document.get_element(&["body"]).unwrap().attribute("class"),
                   Some("home"));
        Ok(())
    }

    #[test]
    fn t_compose_header_footer_overrides() -> Result<()> {
        let (_dir, config) = site()?;
        let mut ctx = RequestContext::new("GET", "/");
        let doc = MarkupDocument::parse(
            "<header>  \n </header><h1>T</h1><footer><p>Hi</p></footer>");
        let page = ContentComposer::new(&config).compose(doc, &mut ctx)?;
        assert_eq!((page.header, page.footer), (Presence::Empty, Presence::Present));
        assert_eq!(page.document.get_content(&["body"]).unwrap(),
                   "<h1>T</h1><footer><p>Hi</p></footer>");
        assert_eq!(page.title, "T");
        Ok(())
    }

    #[test]
    fn t_compose_is_deterministic() -> Result<()> {
        let (_dir, config) = site()?;
        let src = "<settings><title>x</title></settings><p>a</p>";
        let compose = || -> Result<String> {
            let mut ctx = RequestContext::new("GET", "/");
            Ok(ContentComposer::new(&config).compose(MarkupDocument::parse(src), &mut ctx)?.print())
        };
        assert_eq!(compose()?, compose()?);
        Ok(())
    }

    #[test]
    fn t_handler_runs_once_with_settings() -> Result<()> {
        let (_dir, config) = site()?;
        let mut ctx = RequestContext::new("GET", "/");
        ctx.set_pending_handler(Arc::new(|args: HandlerArgs| -> Result<Option<MarkupDocument>> {
            let greeting = args.settings.get("greeting")
                .map(SettingsValue::to_plain_string)
                .unwrap_or_default();
            args.content.replace_all("slot", &format!("<b>{greeting}</b>"));
            Ok(None)
        }));
        let doc = MarkupDocument::parse(
            "<settings><greeting>hey</greeting></settings><p><slot></slot></p>");
        let composer = ContentComposer::new(&config);
        let page = composer.compose(doc.clone(), &mut ctx)?;
        assert!(page.print().contains("<p><b>hey</b></p>"));
        assert!(! ctx.has_pending_handler());
        // the settings stay memoized for this request
        let page = composer.compose(MarkupDocument::parse("<p><slot></slot></p>"), &mut ctx)?;
        assert_eq!(page.title, "");
        assert!(page.print().contains("<slot></slot>"));
        Ok(())
    }

    #[test]
    fn t_handler_failure_is_500() -> Result<()> {
        let (_dir, config) = site()?;
        let mut ctx = RequestContext::new("GET", "/");
        ctx.set_pending_handler(Arc::new(|_args: HandlerArgs| -> Result<Option<MarkupDocument>> {
            bail!("database unavailable")
        }));
        match ContentComposer::new(&config).compose(MarkupDocument::parse("<p>x</p>"), &mut ctx) {
            Err(e @ Interrupt::MiddlewareFailure(_)) => {
                assert_eq!(e.status_code(), 500);
                assert_eq!(e.message(), Some("database unavailable"));
            }
            other => panic!("unexpected {other:?}")
        }
        Ok(())
    }

    #[test]
    fn t_csrf_placeholder() -> Result<()> {
        let (_dir, config) = site()?;
        let session = SessionHandle::new(
            "s", Arc::new(MemorySessionStore::new(Duration::from_secs(60))));
        let mut ctx = RequestContext::new("GET", "/").with_session(session.clone());
        let doc = MarkupDocument::parse(
            "<form><input name=\"csrf-token\" value=\"<csrf-token />\"></form><p><csrf-token/></p>");
        let page = ContentComposer::new(&config).compose(doc, &mut ctx)?;
        let token = session.get(CSRF_KEY).unwrap();
        assert_eq!(token.len(), config.csrf_length);
        let out = page.print();
        assert!(out.contains(&format!("value=\"{token}\"")));
        assert!(out.contains(&format!("<p>{token}</p>")));

        let config = Config { csrf: false, ..config };
        let doc = MarkupDocument::parse("<p><csrf-token/></p>");
        let page = ContentComposer::new(&config).compose(doc, &mut ctx)?;
        assert!(page.print().contains("<csrf-token></csrf-token>"));
        Ok(())
    }
}
