//! Static element tables used to classify start tags.
//!
//! Invariants:
//! - `HTML_ELEMENTS` is sorted and deduplicated; lookups use binary search.
//! - Names are canonical ASCII-lowercase.

const HTML_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "applet", "area", "article", "aside", "audio", "b",
    "base", "basefont", "bdi", "bdo", "bgsound", "big", "blink", "blockquote", "body", "br",
    "button", "canvas", "caption", "center", "cite", "code", "col", "colgroup", "command",
    "content", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "dir", "div", "dl",
    "dt", "element", "em", "embed", "fieldset", "figcaption", "figure", "font", "footer",
    "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header",
    "hgroup", "hr", "html", "i", "iframe", "image", "img", "input", "ins", "isindex", "kbd",
    "keygen", "label", "legend", "li", "link", "listing", "main", "map", "mark", "marquee",
    "math", "menu", "menuitem", "meta", "meter", "nav", "nobr", "noembed", "noframes",
    "noscript", "object", "ol", "optgroup", "option", "output", "p", "param", "picture",
    "plaintext", "pre", "progress", "q", "rb", "rp", "rt", "rtc", "ruby", "s", "samp",
    "script", "search", "section", "select", "shadow", "slot", "small", "source", "spacer",
    "span", "strike", "strong", "style", "sub", "summary", "sup", "svg", "table", "tbody",
    "td", "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr", "track", "tt",
    "u", "ul", "var", "video", "wbr", "xmp",
];

/// Returns true when `name` is a standard HTML element name.
///
/// Anything else met outside an SVG subtree is treated as a component tag.
pub fn is_html_element(name: &str) -> bool {
    HTML_ELEMENTS.binary_search(&name).is_ok()
}

/// Elements that never have children or an end tag.
pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_element_table_is_sorted_for_binary_search() {
        for pair in HTML_ELEMENTS.windows(2) {
            assert!(pair[0] < pair[1], "table out of order at {pair:?}");
        }
    }

    #[test]
    fn classifies_standard_and_component_names() {
        assert!(is_html_element("div"));
        assert!(is_html_element("svg"));
        assert!(is_html_element("h6"));
        assert!(!is_html_element("hello"));
        assert!(!is_html_element("app.mur"));
        assert!(!is_html_element("DIV"), "lookups expect lowercase names");
    }

    #[test]
    fn void_elements_are_known_html() {
        for name in ["area", "br", "img", "input", "keygen", "wbr"] {
            assert!(is_void_element(name), "{name} should be void");
            assert!(is_html_element(name), "{name} should be html");
        }
        assert!(!is_void_element("div"));
    }
}
