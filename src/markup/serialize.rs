//! Writing trees back out as HTML.

use std::fmt::Write;

use crate::markup::node::{Element, Node, is_void_element, is_raw_text_element};

pub const DOCTYPE: &str = "<!DOCTYPE html>";

/// Escape a value for use in text or attributes; used for untrusted
/// input like request values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c)
        }
    }
    out
}

fn push_text(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c)
        }
    }
}

fn push_attribute_value(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c)
        }
    }
}

fn write_node(out: &mut String, node: &Node, raw_text: bool) {
    match node {
        Node::Element(e) => write_element(out, e),
        Node::Text(s) =>
            if raw_text {
                out.push_str(s)
            } else {
                push_text(out, s)
            },
        Node::Comment(s) => {
            let _ = write!(out, "<!--{s}-->");
        }
    }
}

fn write_children(out: &mut String, element: &Element) {
    let raw_text = is_raw_text_element(element.name());
    for c in &element.children {
        write_node(out, c, raw_text);
    }
}

fn write_start_tag(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(element.name());
    for a in element.attributes() {
        out.push(' ');
        out.push_str(&a.name);
        out.push_str("=\"");
        push_attribute_value(out, &a.value);
        out.push('"');
    }
    out.push('>');
}

fn write_element(out: &mut String, element: &Element) {
    write_start_tag(out, element);
    if is_void_element(element.name()) {
        return
    }
    write_children(out, element);
    let _ = write!(out, "</{}>", element.name());
}

/// Like `write_element`, with line breaks before the structural
/// tags of `html`, `head` and `body`.
fn write_structure(out: &mut String, element: &Element) {
    write_start_tag(out, element);
    for c in &element.children {
        match c {
            Node::Element(e) if e.is("head") || e.is("body") => {
                out.push('\n');
                write_start_tag(out, e);
                write_children(out, e);
                let _ = write!(out, "\n</{}>", e.name());
            }
            c => write_node(out, c, false)
        }
    }
    let _ = write!(out, "\n</{}>", element.name());
}

/// The serialized children of `element`.
pub fn inner_html(element: &Element) -> String {
    let mut out = String::new();
    write_children(&mut out, element);
    out
}

pub fn outer_html(element: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, element);
    out
}

pub fn nodes_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for n in nodes {
        write_node(&mut out, n, false);
    }
    out
}

/// Serialize a whole document: the fixed doctype, then the root
/// with line breaks around the structural tags, and runs of blank
/// lines collapsed.
pub fn print_document(root: &Element) -> String {
    let mut html = String::new();
    write_structure(&mut html, root);
    let mut out = String::with_capacity(html.len() + DOCTYPE.len() + 1);
    out.push_str(DOCTYPE);
    out.push('\n');
    let mut last_blank = true;
    for line in html.lines() {
        let blank = line.trim().is_empty();
        if blank && last_blank {
            continue
        }
        out.push_str(line);
        out.push('\n');
        last_blank = blank;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse::{parse_document, parse_fragment};

    #[test]
    fn t_escaping() {
        assert_eq!(html_escape(r#"<a href="x">'&'</a>"#),
                   "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
        let mut e = Element::new("input");
        e.set_attribute("value", "a\"b&c<d>");
        e.push_child(Node::text("ignored"));
        assert_eq!(outer_html(&e), "<input value=\"a&quot;b&amp;c<d>\">");
        let p = Element::with_children("p", vec![Node::text("1 < 2")]);
        assert_eq!(outer_html(&p), "<p>1 &lt; 2</p>");
        let s = Element::with_children("script", vec![Node::text("a < b && c")]);
        assert_eq!(outer_html(&s), "<script>a < b && c</script>");
    }

    #[test]
    fn t_fragment_reserializes() {
        let src = "<p class=\"a\">Hello <b>world</b><!-- c --></p><br>";
        assert_eq!(nodes_html(&parse_fragment(src)), src);
    }

    #[test]
    fn t_print_document() {
        let doc = parse_document(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\">\n\
             <html><head><title>x</title></head><body>\n\n\n<p>y</p>\n\n\n</body></html>");
        let s = print_document(&doc);
        assert!(s.starts_with("<!DOCTYPE html>\n<html>\n<head><title>x</title>\n</head>\n<body>"));
        assert_eq!(s.matches("DOCTYPE").count(), 1);
        assert!(! s.contains("\n\n\n"));
        assert!(s.ends_with("</body>\n</html>\n"));
    }

    #[test]
    fn t_print_document_keeps_content() {
        let doc = parse_document(
            "<script>document.write(\"<body>\")</script>\
             <input value=\"<body> tag\"><p title=\"</head>\">x</p>");
        let s = print_document(&doc);
        assert!(s.contains("<script>document.write(\"<body>\")</script>"));
        assert!(s.contains("<input value=\"<body> tag\">"));
        assert!(s.contains("<p title=\"</head>\">x</p>"));
        assert_eq!(s.matches("\n<body>").count(), 1);
        assert_eq!(s.matches("\n</head>").count(), 1);
    }
}
