//! Selector descriptors: one candidate way of locating a UI element.
//!
//! A descriptor is a semantic query (CSS, role + accessible name, visible
//! text, test id, attribute pattern, class, XPath). Candidate lists of
//! descriptors are handed to the [`crate::resolver`], which picks the first
//! one that matches in the live document.
//!
//! # String syntax
//!
//! | Input                          | Descriptor                      |
//! |--------------------------------|---------------------------------|
//! | `#start`, `.node.visited`      | `Css`                           |
//! | `css=div > span`               | `Css`                           |
//! | `text=Submit`                  | `Text` (case-insensitive)       |
//! | `role=button[name="Go"]`       | `Role`                          |
//! | `testid=score`                 | `TestId`                        |
//! | `xpath=//li[2]`, `//li[2]`     | `XPath`                         |
//! | `button:has-text("Submit")`    | `CssWithText`                   |
//!
//! Text matching ignores `<script>`, `<style>`, `<template>` and
//! `<noscript>` content. Deserializing never fails: a string that does not
//! parse is kept as [`SelectorDescriptor::Unparsed`], which the resolver
//! records as malformed and skips.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::{ProbeError, ProbeResult};

/// Longest selector text accepted (10KB)
pub const MAX_SELECTOR_LENGTH: usize = 10 * 1024;

/// Elements whose content is never rendered as text; text selectors skip
/// them and their contents
pub const NON_TEXT_TAGS: [&str; 4] = ["script", "style", "template", "noscript"];

// Defines `hidden(el)` and `textOf(el)`, the text content minus NON_TEXT_TAGS subtrees.
const VISIBLE_TEXT_JS: &str = "const skip = new Set(['SCRIPT', 'STYLE', 'TEMPLATE', 'NOSCRIPT']); \
    const hidden = el => skip.has(el.tagName.toUpperCase()); \
    const textOf = el => { let s = ''; for (const n of el.childNodes) { \
    if (n.nodeType === 3) s += n.data; else if (n.nodeType === 1 && !hidden(n)) s += textOf(n); } \
    return s; };";

/// Comparison applied by an attribute-pattern selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeOp {
    /// `[name]`
    Exists,
    /// `[name="v"]`
    Equals,
    /// `[name^="v"]`
    Prefix,
    /// `[name$="v"]`
    Suffix,
    /// `[name*="v"]`
    Contains,
}

impl AttributeOp {
    /// CSS operator text for this comparison
    #[must_use]
    pub const fn css_operator(self) -> &'static str {
        match self {
            Self::Exists => "",
            Self::Equals => "=",
            Self::Prefix => "^=",
            Self::Suffix => "$=",
            Self::Contains => "*=",
        }
    }

    /// Apply the comparison to an attribute value
    #[must_use]
    pub fn matches(self, actual: Option<&str>, expected: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let expected = expected.unwrap_or_default();
        match self {
            Self::Exists => true,
            Self::Equals => actual == expected,
            Self::Prefix => actual.starts_with(expected),
            Self::Suffix => actual.ends_with(expected),
            Self::Contains => actual.contains(expected),
        }
    }
}

/// One candidate way of locating an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectorDescriptor {
    /// CSS selector (e.g. "button.primary")
    Css(String),
    /// ARIA role, optionally filtered by accessible name
    Role {
        /// Role name ("button", "textbox", ...)
        role: String,
        /// Accessible name substring (case-insensitive)
        name: Option<String>,
    },
    /// Innermost element whose text contains the string (case-insensitive)
    Text(String),
    /// `data-testid` attribute
    TestId(String),
    /// Attribute pattern
    Attribute {
        /// Attribute name
        name: String,
        /// Comparison
        op: AttributeOp,
        /// Value compared against (ignored for `Exists`)
        value: Option<String>,
    },
    /// Single CSS class
    Class(String),
    /// CSS selector filtered by contained text (`css:has-text("...")`)
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// XPath expression
    XPath(String),
    /// Text that did not parse, kept as written; never matches
    Unparsed {
        /// Candidate as written
        raw: String,
        /// Why it was rejected
        reason: String,
    },
}

impl SelectorDescriptor {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test id selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a role selector without a name filter
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Create a role selector filtered by accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Create a class selector
    #[must_use]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Create an attribute-pattern selector
    #[must_use]
    pub fn attribute(name: impl Into<String>, op: AttributeOp, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            op,
            value: Some(value.into()),
        }
    }

    /// Create an attribute-presence selector
    #[must_use]
    pub fn has_attribute(name: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            op: AttributeOp::Exists,
            value: None,
        }
    }

    /// Create a CSS selector filtered by text
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Parse the string syntax described in the module docs.
    ///
    /// The result is validated; malformed input is an
    /// [`ProbeError::InvalidSelector`].
    pub fn parse(input: &str) -> ProbeResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ProbeError::invalid_selector(input, "empty selector"));
        }
        if trimmed.len() > MAX_SELECTOR_LENGTH {
            let head: String = trimmed.chars().take(32).collect();
            return Err(ProbeError::invalid_selector(
                format!("{head}..."),
                format!("longer than {MAX_SELECTOR_LENGTH} bytes"),
            ));
        }

        let descriptor = if let Some(rest) = trimmed.strip_prefix("css=") {
            Self::Css(rest.trim().to_string())
        } else if let Some(rest) = trimmed.strip_prefix("text=") {
            Self::Text(unquote(rest.trim()))
        } else if let Some(rest) = trimmed
            .strip_prefix("testid=")
            .or_else(|| trimmed.strip_prefix("data-testid="))
        {
            Self::TestId(unquote(rest.trim()))
        } else if let Some(rest) = trimmed.strip_prefix("xpath=") {
            Self::XPath(rest.trim().to_string())
        } else if trimmed.starts_with("//") || trimmed.starts_with("(//") {
            Self::XPath(trimmed.to_string())
        } else if let Some(rest) = trimmed.strip_prefix("role=") {
            parse_role(input, rest.trim())?
        } else if let Some(pos) = trimmed.find(":has-text(") {
            let css = trimmed[..pos].trim();
            let inner = &trimmed[pos + ":has-text(".len()..];
            let Some(inner) = inner.strip_suffix(')') else {
                return Err(ProbeError::invalid_selector(
                    input,
                    ":has-text( must close with ')'",
                ));
            };
            Self::CssWithText {
                css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                text: unquote(inner.trim()),
            }
        } else {
            Self::Css(trimmed.to_string())
        };

        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse a list of selector strings, failing on the first malformed one
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> ProbeResult<Vec<Self>> {
        inputs.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// Check that the descriptor can be turned into a query
    pub fn validate(&self) -> ProbeResult<()> {
        let reject = |reason: &str| Err(ProbeError::invalid_selector(self.to_string(), reason));
        match self {
            Self::Css(css) => {
                if css.trim().is_empty() {
                    return reject("empty CSS selector");
                }
                check_balanced(css).or_else(|r| reject(&r))
            }
            Self::CssWithText { css, text } => {
                if text.is_empty() {
                    return reject("empty :has-text() argument");
                }
                check_balanced(css).or_else(|r| reject(&r))
            }
            Self::XPath(path) => {
                if path.trim().is_empty() {
                    return reject("empty XPath");
                }
                check_balanced(path).or_else(|r| reject(&r))
            }
            Self::Text(text) | Self::TestId(text) => {
                if text.is_empty() {
                    reject("empty text")
                } else {
                    Ok(())
                }
            }
            Self::Role { role, .. } => {
                if role.is_empty() || !role.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    reject("role must be a single identifier")
                } else {
                    Ok(())
                }
            }
            Self::Class(class) => {
                if is_css_ident(class) {
                    Ok(())
                } else {
                    reject("class must be a CSS identifier")
                }
            }
            Self::Unparsed { raw, reason } => Err(ProbeError::invalid_selector(raw.clone(), reason.clone())),
            Self::Attribute { name, op, value } => {
                if !is_css_ident(name) {
                    return reject("attribute name must be a CSS identifier");
                }
                if *op != AttributeOp::Exists && value.is_none() {
                    return reject("attribute comparison needs a value");
                }
                Ok(())
            }
        }
    }

    /// Equivalent plain CSS selector, when one exists
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self {
            Self::Css(css) => Some(css.clone()),
            Self::Class(class) => Some(format!(".{class}")),
            Self::TestId(id) => Some(format!("[data-testid=\"{}\"]", escape_quotes(id))),
            Self::Attribute { name, op, value } => Some(match (op, value) {
                (AttributeOp::Exists, _) | (_, None) => format!("[{name}]"),
                (op, Some(v)) => format!("[{name}{}\"{}\"]", op.css_operator(), escape_quotes(v)),
            }),
            Self::Role { role, name: None } => Some(role_css(role)),
            Self::Role { .. }
            | Self::Text(_)
            | Self::CssWithText { .. }
            | Self::XPath(_)
            | Self::Unparsed { .. } => None,
        }
    }

    /// JavaScript expression evaluating to the array of matching elements
    /// in document order
    #[must_use]
    pub fn to_js_all(&self) -> String {
        match self {
            Self::XPath(path) => format!(
                "(() => {{ const r = document.evaluate({}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
                 for (let i = 0; i < r.snapshotLength; i++) {{ out.push(r.snapshotItem(i)); }} \
                 return out; }})()",
                js_string(path)
            ),
            Self::Text(text) => format!(
                "(() => {{ {VISIBLE_TEXT_JS} const t = {}; \
                 const has = el => !hidden(el) && textOf(el).toLowerCase().includes(t); \
                 return Array.from(document.querySelectorAll('body, body *')) \
                 .filter(el => has(el) && !Array.from(el.children).some(has)); }})()",
                js_string(&text.to_lowercase())
            ),
            Self::CssWithText { css, text } => format!(
                "(() => {{ {VISIBLE_TEXT_JS} const t = {}; \
                 return Array.from(document.querySelectorAll({})) \
                 .filter(el => !hidden(el) && textOf(el).toLowerCase().includes(t)); }})()",
                js_string(&text.to_lowercase()),
                js_string(css)
            ),
            Self::Unparsed { .. } => "[]".to_string(),
            Self::Role {
                role,
                name: Some(name),
            } => format!(
                "Array.from(document.querySelectorAll({})).filter(el => \
                 (el.getAttribute('aria-label') || el.textContent || el.value || '') \
                 .trim().toLowerCase().includes({}))",
                js_string(&role_css(role)),
                js_string(&name.to_lowercase())
            ),
            other => {
                let css = other.to_css().unwrap_or_default();
                format!("Array.from(document.querySelectorAll({}))", js_string(&css))
            }
        }
    }

    /// JavaScript expression evaluating to the number of matches
    #[must_use]
    pub fn to_js_count(&self) -> String {
        format!("({}).length", self.to_js_all())
    }

    /// JavaScript expression evaluating to the `index`-th match or `null`
    #[must_use]
    pub fn to_js_nth(&self, index: usize) -> String {
        format!("(({})[{index}] || null)", self.to_js_all())
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name=\"{}\"]", escape_quotes(name)),
            Self::Text(text) => write!(f, "text={}", quote_if_padded(text)),
            Self::TestId(id) => write!(f, "testid={}", quote_if_padded(id)),
            Self::CssWithText { css, text } => {
                write!(f, "{css}:has-text(\"{}\")", escape_quotes(text))
            }
            Self::XPath(path) => write!(f, "xpath={path}"),
            Self::Unparsed { raw, .. } => write!(f, "{raw}"),
            Self::Attribute { .. } | Self::Class(_) => {
                write!(f, "{}", self.to_css().unwrap_or_default())
            }
        }
    }
}

impl FromStr for SelectorDescriptor {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Infallible: text that does not parse becomes [`SelectorDescriptor::Unparsed`]
/// so a candidate list survives one bad entry
impl From<String> for SelectorDescriptor {
    fn from(value: String) -> Self {
        match Self::parse(&value) {
            Ok(descriptor) => descriptor,
            Err(ProbeError::InvalidSelector { reason, .. }) => Self::Unparsed { raw: value, reason },
            Err(other) => Self::Unparsed {
                raw: value,
                reason: other.to_string(),
            },
        }
    }
}

impl From<SelectorDescriptor> for String {
    fn from(value: SelectorDescriptor) -> Self {
        value.to_string()
    }
}

/// CSS selector list covering an ARIA role, including implicit roles of
/// native elements
#[must_use]
pub fn role_css(role: &str) -> String {
    let implicit = match role {
        "button" => "button, input[type=button], input[type=submit], input[type=reset], ",
        "link" => "a[href], ",
        "textbox" => "input:not([type]), input[type=text], input[type=email], input[type=search], textarea, ",
        "checkbox" => "input[type=checkbox], ",
        "radio" => "input[type=radio], ",
        "slider" => "input[type=range], ",
        "spinbutton" => "input[type=number], ",
        "combobox" => "select, ",
        "heading" => "h1, h2, h3, h4, h5, h6, ",
        "list" => "ul, ol, ",
        "listitem" => "li, ",
        "table" => "table, ",
        "img" => "img[alt], ",
        _ => "",
    };
    format!("{implicit}[role=\"{role}\"]")
}

/// Encode a string as a JavaScript string literal
#[must_use]
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn parse_role(input: &str, rest: &str) -> ProbeResult<SelectorDescriptor> {
    let Some(open) = rest.find('[') else {
        return Ok(SelectorDescriptor::role(rest));
    };
    let role = rest[..open].trim();
    let Some(attrs) = rest[open + 1..].strip_suffix(']') else {
        return Err(ProbeError::invalid_selector(input, "unclosed role filter"));
    };
    let Some(name) = attrs.trim().strip_prefix("name=") else {
        return Err(ProbeError::invalid_selector(
            input,
            "role filter only supports name=",
        ));
    };
    Ok(SelectorDescriptor::role_named(role, unquote(name.trim())))
}

fn unquote(s: &str) -> String {
    let inner = if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    };
    inner.replace("\\\"", "\"").replace("\\'", "'")
}

/// Quote text whose surrounding whitespace or quotes `parse` would strip
fn quote_if_padded(s: &str) -> String {
    let padded = s.trim() != s || s.starts_with(['"', '\'']) || s.ends_with(['"', '\'']);
    if padded {
        format!("\"{}\"", escape_quotes(s))
    } else {
        s.to_string()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn is_css_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii())
}

/// Brackets, parentheses and quotes must pair up
fn check_balanced(s: &str) -> Result<(), String> {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => stack.push(c),
            ']' | ')' => {
                let expected = if c == ']' { '[' } else { '(' };
                if stack.pop() != Some(expected) {
                    return Err(format!("unexpected '{c}'"));
                }
            }
            _ => {}
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if let Some(open) = stack.pop() {
        return Err(format!("unbalanced '{open}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_plain_css() {
            let sel = SelectorDescriptor::parse("#missingBtn").unwrap();
            assert_eq!(sel, SelectorDescriptor::css("#missingBtn"));
        }

        #[test]
        fn test_has_text() {
            let sel = SelectorDescriptor::parse(r#"button:has-text("Submit")"#).unwrap();
            assert_eq!(sel, SelectorDescriptor::css_with_text("button", "Submit"));
        }

        #[test]
        fn test_has_text_without_base_matches_any_element() {
            let sel = SelectorDescriptor::parse(":has-text('Next')").unwrap();
            assert_eq!(sel, SelectorDescriptor::css_with_text("*", "Next"));
        }

        #[test]
        fn test_text_prefix() {
            let sel = SelectorDescriptor::parse("text=\"Run BFS\"").unwrap();
            assert_eq!(sel, SelectorDescriptor::text("Run BFS"));
        }

        #[test]
        fn test_role_with_name() {
            let sel = SelectorDescriptor::parse(r#"role=button[name="Step"]"#).unwrap();
            assert_eq!(sel, SelectorDescriptor::role_named("button", "Step"));
        }

        #[test]
        fn test_role_without_name() {
            let sel = SelectorDescriptor::parse("role=slider").unwrap();
            assert_eq!(sel, SelectorDescriptor::role("slider"));
        }

        #[test]
        fn test_xpath_forms() {
            assert!(matches!(
                SelectorDescriptor::parse("//li[2]").unwrap(),
                SelectorDescriptor::XPath(_)
            ));
            assert!(matches!(
                SelectorDescriptor::parse("xpath=//div[@id='x']").unwrap(),
                SelectorDescriptor::XPath(_)
            ));
        }

        #[test]
        fn test_testid() {
            let sel = SelectorDescriptor::parse("testid=score").unwrap();
            assert_eq!(sel, SelectorDescriptor::test_id("score"));
        }

        #[test]
        fn test_css_prefix_keeps_combinators() {
            let sel = SelectorDescriptor::parse("css=#graph > .node").unwrap();
            assert_eq!(sel, SelectorDescriptor::css("#graph > .node"));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_empty_rejected() {
            assert!(SelectorDescriptor::parse("").is_err());
            assert!(SelectorDescriptor::parse("   ").is_err());
        }

        #[test]
        fn test_unbalanced_bracket_rejected() {
            let err = SelectorDescriptor::parse("button[data-x=\"1\"").unwrap_err();
            assert!(err.is_invalid_selector());
        }

        #[test]
        fn test_unterminated_quote_rejected() {
            assert!(SelectorDescriptor::parse("[title='oops]").is_err());
        }

        #[test]
        fn test_unclosed_has_text_rejected() {
            assert!(SelectorDescriptor::parse("button:has-text(\"Go\"").is_err());
        }

        #[test]
        fn test_overlong_rejected() {
            let long = "a".repeat(MAX_SELECTOR_LENGTH + 1);
            assert!(SelectorDescriptor::parse(&long).is_err());
        }

        #[test]
        fn test_brackets_inside_quotes_are_fine() {
            assert!(SelectorDescriptor::parse(r#"[data-name="a[b"]"#).is_ok());
        }

        #[test]
        fn test_class_must_be_identifier() {
            assert!(SelectorDescriptor::class("selected").validate().is_ok());
            assert!(SelectorDescriptor::class("two words").validate().is_err());
        }

        #[test]
        fn test_attribute_comparison_needs_value() {
            let sel = SelectorDescriptor::Attribute {
                name: "data-state".into(),
                op: AttributeOp::Equals,
                value: None,
            };
            assert!(sel.validate().is_err());
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_css_query_escapes_literal() {
            let js = SelectorDescriptor::css("a[title=\"x\"]").to_js_all();
            assert!(js.contains("querySelectorAll"));
            assert!(js.contains(r#"a[title=\"x\"]"#));
        }

        #[test]
        fn test_count_query() {
            let js = SelectorDescriptor::css(".node.visited").to_js_count();
            assert!(js.ends_with(".length"));
        }

        #[test]
        fn test_nth_query_falls_back_to_null() {
            let js = SelectorDescriptor::css("li").to_js_nth(2);
            assert!(js.contains("[2] || null"));
        }

        #[test]
        fn test_text_query_is_case_insensitive_and_innermost() {
            let js = SelectorDescriptor::text("Submit").to_js_all();
            assert!(js.contains("\"submit\""));
            assert!(js.contains("el.children"));
        }

        #[test]
        fn test_text_queries_skip_non_text_elements() {
            for sel in [
                SelectorDescriptor::text("Start"),
                SelectorDescriptor::css_with_text("*", "Start"),
            ] {
                let js = sel.to_js_all();
                assert!(js.contains("'SCRIPT', 'STYLE', 'TEMPLATE', 'NOSCRIPT'"));
                assert!(js.contains("!hidden(el)"));
                assert!(!js.contains("textContent"));
            }
        }

        #[test]
        fn test_role_query_includes_implicit_roles() {
            let js = SelectorDescriptor::role_named("button", "Go").to_js_all();
            assert!(js.contains("input[type=submit]"));
            assert!(js.contains("aria-label"));
        }

        #[test]
        fn test_xpath_query_uses_snapshot() {
            let js = SelectorDescriptor::XPath("//li".into()).to_js_all();
            assert!(js.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        }

        #[test]
        fn test_to_css_for_constructed_variants() {
            assert_eq!(
                SelectorDescriptor::class("selected").to_css().as_deref(),
                Some(".selected")
            );
            assert_eq!(
                SelectorDescriptor::attribute("data-state", AttributeOp::Prefix, "run")
                    .to_css()
                    .as_deref(),
                Some("[data-state^=\"run\"]")
            );
            assert!(SelectorDescriptor::text("x").to_css().is_none());
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_display_reparses_to_same_descriptor() {
            for input in [
                "#start",
                r#"button:has-text("Submit")"#,
                r#"role=button[name="Next"]"#,
                "text=Reset",
                "testid=score",
                "xpath=//li",
            ] {
                let sel = SelectorDescriptor::parse(input).unwrap();
                let again = SelectorDescriptor::parse(&sel.to_string()).unwrap();
                assert_eq!(sel, again, "{input}");
            }
        }

        #[test]
        fn test_serde_uses_string_form() {
            let sel = SelectorDescriptor::css_with_text("button", "Go");
            let json = serde_json::to_string(&sel).unwrap();
            assert_eq!(json, r#""button:has-text(\"Go\")""#);
            let back: SelectorDescriptor = serde_json::from_str(&json).unwrap();
            assert_eq!(back, sel);
        }

        #[test]
        fn test_serde_keeps_malformed_verbatim() {
            let sel: SelectorDescriptor = serde_json::from_str(r#""div[""#).unwrap();
            assert!(matches!(&sel, SelectorDescriptor::Unparsed { raw, reason } if raw == "div[" && reason.contains('[')));
            assert!(sel.validate().unwrap_err().is_invalid_selector());
            assert!(sel.to_css().is_none());
            assert_eq!(sel.to_js_all(), "[]");
            assert_eq!(serde_json::to_string(&sel).unwrap(), r#""div[""#);
        }

        #[test]
        fn test_padded_text_survives_display() {
            for text in ["  Start ", "\"quoted\"", "tab\t", "plain words"] {
                for sel in [SelectorDescriptor::text(text), SelectorDescriptor::test_id(text)] {
                    let again = SelectorDescriptor::parse(&sel.to_string()).unwrap();
                    assert_eq!(again, sel, "{sel}");
                }
            }
            assert_eq!(SelectorDescriptor::text("Reset").to_string(), "text=Reset");
            assert_eq!(SelectorDescriptor::text(" Reset").to_string(), "text=\" Reset\"");
        }
    }

    mod attribute_op_tests {
        use super::*;

        #[test]
        fn test_matches() {
            assert!(AttributeOp::Exists.matches(Some(""), None));
            assert!(!AttributeOp::Exists.matches(None, None));
            assert!(AttributeOp::Prefix.matches(Some("running"), Some("run")));
            assert!(AttributeOp::Suffix.matches(Some("node-3"), Some("-3")));
            assert!(AttributeOp::Contains.matches(Some("a b c"), Some("b")));
            assert!(!AttributeOp::Equals.matches(Some("idle"), Some("done")));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(input in ".{0,64}") {
                let _ = SelectorDescriptor::parse(&input);
            }

            #[test]
            fn accepted_selectors_always_validate(input in "[a-z#.\\[\\]=\"' ():-]{1,24}") {
                if let Ok(sel) = SelectorDescriptor::parse(&input) {
                    prop_assert!(sel.validate().is_ok());
                }
            }
        }
    }
}
