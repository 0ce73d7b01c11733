//! Minimal HTML node tree.
//!
//! Text children and attribute values are escaped when the tree is
//! serialized, so renderers never concatenate untrusted strings into markup.
//! `Node::Raw` is reserved for trusted fragments: formatter output and
//! fixed glyphs.

use std::fmt::Write as _;

/// Escape `& < > " '` for use in text content and quoted attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const VOID_TAGS: &[&str] = &["input", "br", "hr", "img"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Raw(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }

    pub fn write_to(&self, out: &mut String) {
        match self {
            Self::Element(el) => el.write_to(out),
            Self::Text(t) => out.push_str(&escape(t)),
            Self::Raw(r) => out.push_str(r),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: &'static str,
    classes: Vec<String>,
    attrs: Vec<(&'static str, String)>,
    flags: Vec<&'static str>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            classes: Vec::new(),
            attrs: Vec::new(),
            flags: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add space-separated classes; empty input is ignored.
    pub fn class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_owned));
        self
    }

    pub fn class_if(self, cond: bool, classes: &str) -> Self {
        if cond { self.class(classes) } else { self }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn attr_opt(self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    /// Boolean attribute such as `checked` or `disabled`.
    pub fn flag_if(mut self, cond: bool, name: &'static str) -> Self {
        if cond {
            self.flags.push(name);
        }
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn text(self, s: impl Into<String>) -> Self {
        self.child(Node::Text(s.into()))
    }

    pub fn raw(self, s: impl Into<String>) -> Self {
        self.child(Node::Raw(s.into()))
    }

    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&self.classes.join(" ")));
        }
        for (name, value) in &self.attrs {
            let _ = write!(out, " {name}=\"{}\"", escape(value));
        }
        for flag in &self.flags {
            out.push(' ');
            out.push_str(flag);
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag) {
            return;
        }
        for child in &self.children {
            child.write_to(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            escape(r#"<img src=x onerror="alert('1')">&"#),
            "&lt;img src=x onerror=&quot;alert(&#39;1&#39;)&quot;&gt;&amp;"
        );
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let html = Element::new("td")
            .class("text-right")
            .attr("title", "\"quoted\"")
            .text("<script>")
            .to_html();
        assert_eq!(
            html,
            r#"<td class="text-right" title="&quot;quoted&quot;">&lt;script&gt;</td>"#
        );
    }

    #[test]
    fn void_elements_and_flags() {
        let html = Element::new("input")
            .attr("type", "checkbox")
            .class("grid-row-select")
            .flag_if(true, "checked")
            .flag_if(false, "disabled")
            .to_html();
        assert_eq!(html, r#"<input class="grid-row-select" type="checkbox" checked>"#);
    }

    #[test]
    fn raw_nodes_pass_through() {
        let html = Element::new("span").raw("<b>ok</b>").to_html();
        assert_eq!(html, "<span><b>ok</b></span>");
    }

    #[test]
    fn empty_class_is_omitted() {
        assert_eq!(Element::new("th").class("").class_if(false, "active").to_html(), "<th></th>");
    }
}
