//! Lenient tree building on top of the html5gum tokenizer.

//! Parse errors never abort: unmatched end tags are dropped, open
//! elements are closed at the end of input, and a full document
//! always gets an `html` element with `head` and `body` children
//! (head-only elements seen before any body content are moved into
//! `head`), similar to what browsers do with fragments.

use html5gum::{DefaultEmitter, Emitter, Error, HtmlString, State, Token, Tokenizer};
use kstring::KString;

use crate::markup::node::{Element, Node, Attribute, is_void_element, is_raw_text_element};
use crate::nowarn;

/// Elements that belong into `head` when they appear before any
/// body content.
const HEAD_ELEMENTS: &[&str] = &[
    "base", "link", "meta", "noscript", "script", "style", "template", "title",
];

fn is_head_element(name: &str) -> bool {
    HEAD_ELEMENTS.contains(&name)
}

fn string(s: HtmlString) -> String {
    String::from_utf8_lossy(&s).into_owned()
}

fn name(s: HtmlString) -> String {
    let mut s = string(s);
    s.make_ascii_lowercase();
    s
}

/// `DefaultEmitter`, but switching the tokenizer into the raw text
/// states after `script` and `style` start tags, so that their
/// contents come through as a single string. Other elements (`title`
/// in particular, which appears in settings with markup inside) stay
/// in the data state.
#[derive(Debug, Default)]
struct RawTextEmitter {
    inner: DefaultEmitter,
    tag_name: Vec<u8>,
    is_start_tag: bool,
}

impl Emitter for RawTextEmitter {
    type Token = Token;

    fn set_last_start_tag(&mut self, last_start_tag: Option<&[u8]>) {
        self.inner.set_last_start_tag(last_start_tag)
    }
    fn emit_eof(&mut self) {
        self.inner.emit_eof()
    }
    fn emit_error(&mut self, error: Error) {
        self.inner.emit_error(error)
    }
    fn pop_token(&mut self) -> Option<Token> {
        self.inner.pop_token()
    }
    fn emit_string(&mut self, c: &[u8]) {
        self.inner.emit_string(c)
    }
    fn init_start_tag(&mut self) {
        self.tag_name.clear();
        self.is_start_tag = true;
        self.inner.init_start_tag()
    }
    fn init_end_tag(&mut self) {
        self.tag_name.clear();
        self.is_start_tag = false;
        self.inner.init_end_tag()
    }
    fn init_comment(&mut self) {
        self.inner.init_comment()
    }
    fn emit_current_tag(&mut self) -> Option<State> {
        let next = self.inner.emit_current_tag();
        if !self.is_start_tag {
            return next
        }
        match &*String::from_utf8_lossy(&self.tag_name).to_ascii_lowercase() {
            "script" => Some(State::ScriptData),
            name if is_raw_text_element(name) => Some(State::RawText),
            _ => next
        }
    }
    fn emit_current_comment(&mut self) {
        self.inner.emit_current_comment()
    }
    fn emit_current_doctype(&mut self) {
        self.inner.emit_current_doctype()
    }
    fn set_self_closing(&mut self) {
        self.inner.set_self_closing()
    }
    fn set_force_quirks(&mut self) {
        self.inner.set_force_quirks()
    }
    fn push_tag_name(&mut self, s: &[u8]) {
        self.tag_name.extend_from_slice(s);
        self.inner.push_tag_name(s)
    }
    fn push_comment(&mut self, s: &[u8]) {
        self.inner.push_comment(s)
    }
    fn push_doctype_name(&mut self, s: &[u8]) {
        self.inner.push_doctype_name(s)
    }
    fn init_doctype(&mut self) {
        self.inner.init_doctype()
    }
    fn init_attribute(&mut self) {
        self.inner.init_attribute()
    }
    fn push_attribute_name(&mut self, s: &[u8]) {
        self.inner.push_attribute_name(s)
    }
    fn push_attribute_value(&mut self, s: &[u8]) {
        self.inner.push_attribute_value(s)
    }
    fn set_doctype_public_identifier(&mut self, value: &[u8]) {
        self.inner.set_doctype_public_identifier(value)
    }
    fn set_doctype_system_identifier(&mut self, value: &[u8]) {
        self.inner.set_doctype_system_identifier(value)
    }
    fn push_doctype_public_identifier(&mut self, s: &[u8]) {
        self.inner.push_doctype_public_identifier(s)
    }
    fn push_doctype_system_identifier(&mut self, s: &[u8]) {
        self.inner.push_doctype_system_identifier(s)
    }
    fn current_is_appropriate_end_tag_token(&mut self) -> bool {
        self.inner.current_is_appropriate_end_tag_token()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Head,
    Body,
}

struct TreeBuilder {
    is_document: bool,
    html: Element,
    head: Element,
    body: Element,
    /// Elements opened and not closed yet, innermost last.
    open: Vec<Element>,
    target: Target,
    body_started: bool,
}

impl TreeBuilder {
    fn new(is_document: bool) -> Self {
        TreeBuilder {
            is_document,
            html: Element::new("html"),
            head: Element::new("head"),
            body: Element::new("body"),
            open: Vec::new(),
            target: Target::Head,
            body_started: false,
        }
    }

    fn container(&mut self) -> &mut Element {
        if let Some(e) = self.open.last_mut() {
            e
        } else if self.is_document && self.target == Target::Head {
            &mut self.head
        } else {
            &mut self.body
        }
    }

    fn start_body(&mut self) {
        self.target = Target::Body;
        self.body_started = true;
    }

    fn insert(&mut self, node: Node) {
        self.container().push_child(node);
    }

    fn close_top(&mut self) {
        if let Some(e) = self.open.pop() {
            self.insert(Node::Element(e));
        }
    }

    fn close_all(&mut self) {
        while !self.open.is_empty() {
            self.close_top();
        }
    }

    fn merge_attributes(into: &mut Element, attributes: &[Attribute]) {
        for a in attributes {
            if into.attribute(&a.name).is_none() {
                into.set_attribute(&a.name, a.value.clone());
            }
        }
    }

    fn start_tag(&mut self, tagname: &str, attributes: Vec<Attribute>, self_closing: bool) {
        match tagname {
            "html" => {
                Self::merge_attributes(&mut self.html, &attributes);
                return
            }
            "head" => {
                if self.is_document && !self.body_started && self.open.is_empty() {
                    self.target = Target::Head;
                    Self::merge_attributes(&mut self.head, &attributes);
                }
                return
            }
            "body" => {
                if self.is_document {
                    self.close_all();
                    self.start_body();
                    Self::merge_attributes(&mut self.body, &attributes);
                }
                return
            }
            _ => ()
        }
        if self.open.is_empty() {
            if is_head_element(tagname) && !self.body_started {
                self.target = Target::Head;
            } else {
                self.start_body();
            }
        }
        let mut element = Element::new(tagname);
        for a in attributes {
            element.set_attribute(&a.name, a.value);
        }
        if self_closing || is_void_element(tagname) {
            self.insert(Node::Element(element));
        } else {
            self.open.push(element);
        }
    }

    fn end_tag(&mut self, tagname: &str) {
        match tagname {
            "html" | "body" => return,
            "head" => {
                if self.target == Target::Head {
                    self.close_all();
                    self.target = Target::Body;
                }
                return
            }
            _ => ()
        }
        if let Some(i) = self.open.iter().rposition(|e| e.is(tagname)) {
            while self.open.len() > i {
                self.close_top();
            }
        } else {
            nowarn!("ignoring unmatched end tag {tagname:?}");
        }
    }

    fn text(&mut self, s: String) {
        if self.open.is_empty() {
            if s.trim().is_empty() {
                if !self.body_started {
                    return
                }
            } else {
                self.start_body();
            }
        }
        self.insert(Node::Text(s));
    }

    fn feed(&mut self, input: &str) {
        let tokenizer = Tokenizer::new_with_emitter(input, RawTextEmitter::default());
        for token in tokenizer.infallible() {
            match token {
                Token::StartTag(starttag) => {
                    let attributes = starttag.attributes.into_iter().map(
                        |(k, v)| Attribute {
                            name: KString::from_string(name(k)),
                            value: string(v)
                        }).collect();
                    self.start_tag(&name(starttag.name), attributes, starttag.self_closing);
                }
                Token::EndTag(endtag) => {
                    self.end_tag(&name(endtag.name));
                }
                Token::String(s) => {
                    self.text(string(s));
                }
                Token::Comment(s) => {
                    self.insert(Node::Comment(string(s)));
                }
                // A fixed doctype is written when printing.
                Token::Doctype(_) => (),
                // The tokenizer recovers by itself.
                Token::Error(_) => (),
            }
        }
        self.close_all();
    }
}

/// Parse a full document: the result is always an `html` element
/// with exactly a `head` and a `body` child.
pub fn parse_document(input: &str) -> Element {
    let mut builder = TreeBuilder::new(true);
    builder.feed(input);
    let TreeBuilder { mut html, head, body, .. } = builder;
    html.children = vec![Node::Element(head), Node::Element(body)];
    html
}

/// Parse a fragment into a node list. `html`, `head` and `body`
/// tags are dropped, their contents kept.
pub fn parse_fragment(input: &str) -> Vec<Node> {
    let mut builder = TreeBuilder::new(false);
    builder.feed(input);
    builder.body.children
}
