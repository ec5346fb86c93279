//! A parsed page or page fragment, with tag-based substitution.

//! Tags are matched case-insensitively everywhere. Substitution
//! works on two levels: elements named like the placeholder are
//! replaced in the tree, and placeholder spellings like `<token/>`
//! written inside attribute values are replaced in the attribute
//! text (see `PLACEHOLDER_FORMS`).

use std::path::Path;

use anyhow::{Result, Context, anyhow};

use crate::markup::node::{Element, Node};
use crate::markup::parse::{parse_document, parse_fragment};
use crate::markup::serialize::{inner_html, print_document};
use crate::output_capture::OutputCapture;
use crate::settings::{SettingsValue, extract};

/// The ways a template author writes a placeholder inside an
/// attribute value, tried in this order. `{}` is the tag name.
pub const PLACEHOLDER_FORMS: &[&str] = &[
    "<{}></{}>",
    "<{} />",
    "<{}/>",
    "<{}>",
];

fn placeholder_forms(tag: &str) -> impl Iterator<Item = String> + '_ {
    PLACEHOLDER_FORMS.iter().map(move |form| form.replace("{}", tag))
}

/// Replace all ASCII case-insensitive occurrences of `needle`;
/// returns None if there were none.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str)
                             -> Option<String> {
    if needle.is_empty() {
        return None
    }
    // Lowercasing ASCII keeps byte offsets intact.
    let lc_haystack = haystack.to_ascii_lowercase();
    let lc_needle = needle.to_ascii_lowercase();
    let mut out = String::new();
    let mut last = 0;
    for (i, _) in lc_haystack.match_indices(&lc_needle) {
        out.push_str(&haystack[last..i]);
        out.push_str(replacement);
        last = i + needle.len();
    }
    if last == 0 {
        return None
    }
    out.push_str(&haystack[last..]);
    Some(out)
}

fn replace_in_attributes(root: &mut Element, tag: &str, content: &str) {
    let forms: Vec<String> = placeholder_forms(tag).collect();
    root.for_each_mut(&mut |e| {
        for a in e.attributes_mut() {
            for form in &forms {
                if let Some(v) = replace_ignore_ascii_case(&a.value, form, content) {
                    a.value = v;
                }
            }
        }
    });
}

/// Replace every descendant element named `tag` with a copy of
/// `replacement`. The inserted nodes are not searched again.
fn replace_elements(parent: &mut Element, tag: &str, replacement: &[Node]) {
    let mut i = 0;
    while i < parent.children.len() {
        let matched = match &mut parent.children[i] {
            Node::Element(e) =>
                if e.is(tag) {
                    true
                } else {
                    replace_elements(e, tag, replacement);
                    false
                },
            _ => false
        };
        if matched {
            let mut nodes = replacement.to_vec();
            if let (Node::Element(old), [Node::Element(new)]) =
                (&parent.children[i], nodes.as_mut_slice())
            {
                for a in old.attributes() {
                    new.set_attribute(&a.name, a.value.clone());
                }
            }
            let n = nodes.len();
            parent.children.splice(i..i + 1, nodes);
            i += n;
        } else {
            i += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    root: Element,
}

impl MarkupDocument {
    /// Parse a string; never fails, malformed markup gives a
    /// best-effort tree.
    pub fn parse(source: &str) -> Self {
        MarkupDocument { root: parse_document(source) }
    }

    /// If `is_literal`, `source` is the markup itself, otherwise the
    /// path of a file to read it from.
    pub fn load(source: &str, is_literal: bool) -> Result<Self> {
        if is_literal {
            Ok(Self::parse(source))
        } else {
            Self::load_file(source)
        }
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).with_context(
            || anyhow!("can't read markup file {path:?}"))?;
        Ok(Self::parse(&s))
    }

    /// Parse what `produce` writes. Its output is discarded if it
    /// fails.
    pub fn load_dynamic(
        out: &mut OutputCapture,
        produce: impl FnOnce(&mut OutputCapture) -> Result<()>
    ) -> Result<Self> {
        let ((), text) = out.capture(produce)?;
        Ok(Self::parse(&text))
    }

    /// `root` should be an `html` element with `head` and `body`.
    pub fn from_root(root: Element) -> Self {
        MarkupDocument { root }
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Follow `path`, each step finding the first element of that
    /// name inside the previous match.
    pub fn get_element(&self, path: &[&str]) -> Option<&Element> {
        let mut current = &self.root;
        for step in path {
            current = current.find_first(step)?;
        }
        Some(current)
    }

    /// The serialized inner content of the element at `path`.
    pub fn get_content(&self, path: &[&str]) -> Option<String> {
        self.get_element(path).map(inner_html)
    }

    /// Plain text of the first `tag` element.
    pub fn text_of(&self, tag: &str) -> Option<String> {
        self.root.find_first(tag).map(Element::text_content)
    }

    /// Structured value of the first `tag` element, an empty map if
    /// there is none.
    pub fn get_content_array(&self, tag: &str) -> SettingsValue {
        match self.root.find_first(tag) {
            Some(e) => extract(e),
            None => SettingsValue::empty_map(),
        }
    }

    /// Whether `tag` occurs as an element or as placeholder text in
    /// an attribute.
    pub fn contains_placeholder(&self, tag: &str) -> bool {
        let forms: Vec<String> = placeholder_forms(tag)
            .map(|f| f.to_ascii_lowercase())
            .collect();
        self.root.child_elements().any(|c| c.any(&|e: &Element| {
            e.is(tag) || e.attributes().iter().any(|a| {
                let v = a.value.to_ascii_lowercase();
                forms.iter().any(|f| v.contains(f.as_str()))
            })
        }))
    }

    fn substitute(&mut self, tag: &str, nodes: &[Node], attribute_text: &str) {
        replace_in_attributes(&mut self.root, tag, attribute_text);
        replace_elements(&mut self.root, tag, nodes);
    }

    /// Replace every `tag` element with the parsed `content`, and
    /// every placeholder for it in attribute values with `content`.
    /// A single replacement element gets the attributes of the
    /// element it replaces. Empty `content` removes the elements.
    pub fn replace_all(&mut self, tag: &str, content: &str) {
        let nodes = parse_fragment(content);
        self.substitute(tag, &nodes, content);
    }

    /// Like `replace_all`, but `content` is inserted as text, never
    /// as markup.
    pub fn replace_all_safe(&mut self, tag: &str, content: &str) {
        let nodes = if content.is_empty() {
            vec![]
        } else {
            vec![Node::text(content)]
        };
        self.substitute(tag, &nodes, content);
    }

    /// Replace the children of every `tag` element with the parsed
    /// `content`, keeping the elements themselves.
    pub fn replace_content(&mut self, tag: &str, content: &str) {
        let nodes = parse_fragment(content);
        self.replace_children(tag, &nodes);
    }

    pub fn replace_children(&mut self, tag: &str, nodes: &[Node]) {
        self.root.for_each_named_mut(tag, &mut |e| {
            e.children = nodes.to_vec();
        });
    }

    /// Insert the parsed `content` into the first `tag` element; if
    /// there is none, a new `tag` element holding it is created
    /// inside the first `parent_tag` element (or the root).
    pub fn set_content(&mut self, tag: &str, content: &str,
                       parent_tag: Option<&str>, insert_at_front: bool) {
        fn insert(into: &mut Element, nodes: Vec<Node>, at_front: bool) {
            if at_front {
                into.children.splice(0..0, nodes);
            } else {
                into.children.extend(nodes);
            }
        }
        let nodes = parse_fragment(content);
        if let Some(e) = self.root.find_first_mut(tag) {
            insert(e, nodes, insert_at_front);
            return
        }
        let new = Node::Element(Element::with_children(tag, nodes));
        if let Some(p) = parent_tag {
            if let Some(e) = self.root.find_first_mut(p) {
                insert(e, vec![new], insert_at_front);
                return
            }
        }
        insert(&mut self.root, vec![new], insert_at_front);
    }

    pub fn print(&self) -> String {
        print_document(&self.root)
    }
}
