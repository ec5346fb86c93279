//! The tree a `MarkupDocument` owns.

use kstring::KString;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text is written out without escaping.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: KString,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Node {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None
        }
    }

    /// Concatenated text of this node and all its descendants,
    /// ignoring markup and comments.
    pub fn text_content(&self, out: &mut String) {
        match self {
            Node::Element(e) => for c in &e.children {
                c.text_content(out)
            },
            Node::Text(s) => out.push_str(s),
            Node::Comment(_) => (),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Always lowercase.
    name: KString,
    attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: KString::from_string(name.to_ascii_lowercase()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: &str, children: Vec<Node>) -> Self {
        let mut e = Element::new(name);
        e.children = children;
        e
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive tag name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut [Attribute] {
        &mut self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Replaces the value of an existing attribute (matched
    /// case-insensitively), otherwise appends it.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(a) = self.attributes.iter_mut().find(
            |a| a.name.eq_ignore_ascii_case(name))
        {
            a.value = value;
        } else {
            self.attributes.push(Attribute {
                name: KString::from_ref(name),
                value
            });
        }
    }

    /// Appends a child, merging adjacent text nodes.
    pub fn push_child(&mut self, node: Node) {
        if let Node::Text(s) = &node {
            if s.is_empty() {
                return
            }
            if let Some(Node::Text(last)) = self.children.last_mut() {
                last.push_str(s);
                return
            }
        }
        self.children.push(node);
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn has_child_elements(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// First element named `name` in document order, including self.
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        if self.is(name) {
            return Some(self)
        }
        self.child_elements().find_map(|c| c.find_first(name))
    }

    pub fn find_first_mut(&mut self, name: &str) -> Option<&mut Element> {
        if self.is(name) {
            return Some(self)
        }
        for c in &mut self.children {
            if let Node::Element(e) = c {
                if let Some(found) = e.find_first_mut(name) {
                    return Some(found)
                }
            }
        }
        None
    }

    /// Applies `f` to every element named `name`, in document order
    /// (including self). Does not descend into a matching element
    /// after `f` was applied to it.
    pub fn for_each_named_mut(&mut self, name: &str, f: &mut impl FnMut(&mut Element)) {
        if self.is(name) {
            f(self);
            return
        }
        for c in &mut self.children {
            if let Node::Element(e) = c {
                e.for_each_named_mut(name, f);
            }
        }
    }

    /// Applies `f` to every element, self first.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for c in &mut self.children {
            if let Node::Element(e) = c {
                e.for_each_mut(f);
            }
        }
    }

    pub fn any(&self, pred: &impl Fn(&Element) -> bool) -> bool {
        pred(self) || self.child_elements().any(|c| c.any(pred))
    }

    pub fn text_content(&self) -> String {
        let mut s = String::new();
        for c in &self.children {
            c.text_content(&mut s);
        }
        s
    }
}
