//! Builds a `Tag` tree from template output.
//!
//! Contract:
//! - The markup must contain exactly one root node (element, component or text).
//! - Whitespace-only text is dropped and text nodes are trimmed.
//! - A start tag that is neither a standard HTML element nor inside an SVG subtree is a
//!   component reference: it never has children, and an end tag naming it is ignored.
//! - `<svg>` and everything below it carries the SVG namespace; text inside SVG is dropped
//!   and mixed-case names are restored.
//! - Void and self-closing elements never take children.
//! - Attribute transforms run in registration order on every attribute.
//! - When an allow-list is configured, any element outside it is rejected.
use crate::elements::{is_html_element, is_void_element};
use crate::error::DecodeError;
use crate::svg::{self, Namespace};
use crate::tokenizer::tokenize;
use crate::transforms::AttrTransform;
use crate::types::{Attrs, Tag, Token};
use std::collections::HashSet;

struct Open {
    name: String,
    namespace: Option<Namespace>,
    attrs: Attrs,
    children: Vec<Tag>,
}

impl Open {
    fn into_tag(self) -> Tag {
        Tag::Element {
            name: self.name,
            namespace: self.namespace,
            attrs: self.attrs,
            children: self.children,
        }
    }
}

fn push(open: &mut [Open], roots: &mut Vec<Tag>, tag: Tag) {
    match open.last_mut() {
        Some(parent) => parent.children.push(tag),
        None => roots.push(tag),
    }
}

/// Markup decoder configured with an optional element allow-list and attribute transforms.
#[derive(Default)]
pub struct Decoder {
    allowed_nodes: HashSet<String>,
    transforms: Vec<AttrTransform>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts decodable elements to `names`. An empty allow-list accepts every element.
    pub fn allow_nodes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_nodes
            .extend(names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()));
    }

    pub fn add_transform(&mut self, transform: AttrTransform) {
        self.transforms.push(transform);
    }

    fn allows(&self, name: &str) -> bool {
        self.allowed_nodes.is_empty() || self.allowed_nodes.contains(name)
    }

    fn attrs(&self, attributes: Vec<(String, String)>, in_svg: bool) -> Attrs {
        let mut attrs = Attrs::new();
        for (name, value) in attributes {
            let name = if in_svg {
                svg::attribute_name(name)
            } else {
                name
            };
            let (name, value) = self
                .transforms
                .iter()
                .fold((name, value), |(n, v), transform| transform(n, v));
            attrs.entry(name).or_insert(value);
        }
        attrs
    }

    pub fn decode(&self, markup: &str) -> Result<Tag, DecodeError> {
        let tokens = tokenize(markup)?;
        let mut roots: Vec<Tag> = Vec::new();
        let mut open: Vec<Open> = Vec::new();

        for token in tokens {
            let in_svg = open.last().is_some_and(|o| o.namespace.is_some());
            match token {
                Token::Comment(_) | Token::Doctype(_) => {}
                Token::Text(text) => {
                    if in_svg {
                        continue;
                    }
                    let text = text.trim();
                    if !text.is_empty() {
                        push(&mut open, &mut roots, Tag::Text(text.to_string()));
                    }
                }
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    if !in_svg && !is_html_element(&name) {
                        let attrs = self.attrs(attributes, false);
                        push(&mut open, &mut roots, Tag::Component { name, attrs });
                        continue;
                    }
                    if !self.allows(&name) {
                        return Err(DecodeError::NotAllowed(name));
                    }
                    let namespace = (in_svg || name == "svg").then_some(Namespace::Svg);
                    let void = is_void_element(&name);
                    let name = if namespace.is_some() {
                        svg::element_name(name)
                    } else {
                        name
                    };
                    let element = Open {
                        name,
                        namespace,
                        attrs: self.attrs(attributes, namespace.is_some()),
                        children: Vec::new(),
                    };
                    if self_closing || (void && !in_svg) {
                        push(&mut open, &mut roots, element.into_tag());
                    } else {
                        open.push(element);
                    }
                }
                Token::EndTag(name) => match open.last() {
                    Some(top) if top.name.eq_ignore_ascii_case(&name) => {
                        if let Some(closed) = open.pop() {
                            push(&mut open, &mut roots, closed.into_tag());
                        }
                    }
                    _ if !in_svg && is_void_element(&name) => {}
                    _ if !in_svg && !is_html_element(&name) => {}
                    Some(top) => {
                        return Err(DecodeError::MismatchedEndTag {
                            expected: top.name.clone(),
                            found: name,
                        });
                    }
                    None => return Err(DecodeError::StrayEndTag(name)),
                },
            }
        }

        if let Some(unclosed) = open.pop() {
            return Err(DecodeError::Unclosed(unclosed.name));
        }
        match roots.len() {
            0 => Err(DecodeError::Empty),
            1 => Ok(roots.remove(0)),
            n => Err(DecodeError::MultipleRoots(n)),
        }
    }
}

/// Decodes with no allow-list and no transforms.
pub fn decode(markup: &str) -> Result<Tag, DecodeError> {
    Decoder::new().decode(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_element_tree() {
        let tag = decode(r#"<div class="test">hello</div>"#).unwrap();
        assert_eq!(
            tag,
            Tag::element("div")
                .with_attr("class", "test")
                .with_child(Tag::text("hello"))
        );
    }

    #[test]
    fn trims_text_and_drops_whitespace_runs() {
        let tag = decode("<div>\n  <p>  hi  </p>\n</div>").unwrap();
        assert_eq!(
            tag,
            Tag::element("div").with_child(Tag::element("p").with_child(Tag::text("hi")))
        );
    }

    #[test]
    fn text_alone_is_a_valid_root() {
        assert_eq!(decode("  hello  ").unwrap(), Tag::text("hello"));
    }

    #[test]
    fn requires_exactly_one_root() {
        assert_eq!(decode("   "), Err(DecodeError::Empty));
        assert_eq!(decode("<!-- only -->"), Err(DecodeError::Empty));
        assert_eq!(decode("<p></p><p></p>"), Err(DecodeError::MultipleRoots(2)));
        assert_eq!(decode("<p></p>text"), Err(DecodeError::MultipleRoots(2)));
    }

    #[test]
    fn doctype_before_root_is_ignored() {
        assert_eq!(decode("<!DOCTYPE html>\n<p></p>").unwrap(), Tag::element("p"));
    }

    #[test]
    fn unknown_tags_are_childless_components() {
        let tag = decode(r#"<div><app.mur value="x"><p></p></div>"#).unwrap();
        assert_eq!(
            tag,
            Tag::element("div")
                .with_child(Tag::Component {
                    name: "app.mur".into(),
                    attrs: Attrs::from([("value".to_string(), "x".to_string())]),
                })
                .with_child(Tag::element("p"))
        );
    }

    #[test]
    fn component_end_tags_are_ignored() {
        let tag = decode("<div><hello></hello></div>").unwrap();
        assert_eq!(
            tag,
            Tag::element("div").with_child(Tag::Component {
                name: "hello".into(),
                attrs: Attrs::new(),
            })
        );
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let tag = decode("<div><br><img src=a.png><span/>x</div>").unwrap();
        let Tag::Element { children, .. } = tag else {
            panic!("expected element");
        };
        assert_eq!(children.len(), 4, "children: {children:?}");
        assert_eq!(children[3], Tag::text("x"));
    }

    #[test]
    fn stray_void_end_tag_is_ignored() {
        assert!(decode("<p><br></br></p>").is_ok());
    }

    #[test]
    fn svg_subtree_gets_namespace_and_canonical_names() {
        let tag = decode(r#"<svg viewbox="0 0 10 10"><lineargradient></lineargradient><path d="M0"></path>ignored</svg>"#)
            .unwrap();
        let Tag::Element {
            name,
            namespace,
            attrs,
            children,
        } = tag
        else {
            panic!("expected element");
        };
        assert_eq!(name, "svg");
        assert_eq!(namespace, Some(Namespace::Svg));
        assert_eq!(attrs.get("viewBox").map(String::as_str), Some("0 0 10 10"));
        assert_eq!(children.len(), 2, "text inside svg must be dropped: {children:?}");
        assert!(matches!(
            &children[0],
            Tag::Element { name, namespace: Some(Namespace::Svg), .. } if name == "linearGradient"
        ));
    }

    #[test]
    fn tags_inside_svg_are_never_components() {
        let tag = decode("<svg><foo></foo></svg>").unwrap();
        let Tag::Element { children, .. } = tag else {
            panic!("expected element");
        };
        assert!(matches!(&children[0], Tag::Element { name, .. } if name == "foo"));
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert_eq!(decode("<div><p></div>"), Err(DecodeError::MismatchedEndTag {
            expected: "p".into(),
            found: "div".into(),
        }));
        assert_eq!(decode("</div>"), Err(DecodeError::StrayEndTag("div".into())));
        assert_eq!(decode("<div><p>"), Err(DecodeError::Unclosed("p".into())));
    }

    #[test]
    fn allow_list_rejects_other_elements() {
        let mut decoder = Decoder::new();
        decoder.allow_nodes(["menu", "menuitem"]);
        assert!(decoder.decode("<menu><menuitem></menuitem></menu>").is_ok());
        assert_eq!(
            decoder.decode("<menu><div></div></menu>"),
            Err(DecodeError::NotAllowed("div".into()))
        );
        assert!(
            decoder.decode("<menu><hello></menu>").is_ok(),
            "components are not subject to the allow-list"
        );
    }

    #[test]
    fn transforms_apply_in_order() {
        let mut decoder = Decoder::new();
        decoder.add_transform(Box::new(|n: String, v: String| (n, format!("{v}-first"))));
        decoder.add_transform(Box::new(|n: String, v: String| {
            (n.to_uppercase(), format!("{v}-second"))
        }));
        let tag = decoder.decode(r#"<p title="t"></p>"#).unwrap();
        assert_eq!(tag, Tag::element("p").with_attr("TITLE", "t-first-second"));
    }

    #[test]
    fn first_duplicate_attribute_wins() {
        let tag = decode(r#"<p id="a" id="b"></p>"#).unwrap();
        assert_eq!(tag, Tag::element("p").with_attr("id", "a"));
    }
}
