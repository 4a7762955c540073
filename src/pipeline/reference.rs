//! Locate and replace the embedded file reference inside a document body.
//!
//! Xournal++ stores a PDF background once, on the first page that uses it:
//!
//! ```xml
//! <background type="pdf" domain="absolute" filename="/home/ana/notes/lecture1.pdf" pageno="1"/>
//! ```
//!
//! Later pages refer back to it with `domain="clone"` and carry no path, so
//! only the first match in a document is ever extracted or rewritten. A
//! document that somehow embeds several stale references gets only the first
//! one repaired.
//!
//! Attribute values are XML-escaped on disk. They are decoded before being
//! treated as a path and the replacement path is escaped before it is
//! written, so names like `Notes & Slides/` survive the round trip.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;
use std::path::PathBuf;

/// Pattern for the default `.pdf` reference.
pub static PDF_REFERENCE: Lazy<ReferencePattern> =
    Lazy::new(|| ReferencePattern::new("pdf").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").unwrap());

/// A `filename="<dir>/<name>.<ext>"` attribute matcher for one extension.
#[derive(Debug, Clone)]
pub struct ReferencePattern {
    regex: Regex,
}

/// The first reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedReference {
    /// Byte range of the attribute value (between the quotes) in the body.
    pub span: Range<usize>,
    /// The value exactly as it appears in the XML.
    pub raw: String,
    /// The value with XML entities decoded.
    pub path: PathBuf,
}

impl ReferencePattern {
    /// Build a matcher for references ending in `.<extension>`.
    pub fn new(extension: &str) -> Result<Self, regex::Error> {
        let extension = extension.trim_start_matches('.');
        let regex = Regex::new(&format!(
            r#"filename="([^"]+?/[^/"]+\.{})""#,
            regex::escape(extension)
        ))?;
        Ok(Self { regex })
    }

    /// The first reference in `text`, if any.
    pub fn find_first(&self, text: &str) -> Option<EmbeddedReference> {
        let value = self.regex.captures(text)?.get(1)?;
        let span = value.range();
        let raw = value.as_str().to_string();
        let path = PathBuf::from(unescape_attr(&raw));
        Some(EmbeddedReference { span, raw, path })
    }
}

/// Replace the value of `reference` with `resolved`, leaving every other byte alone.
pub fn replace_first(text: &str, reference: &EmbeddedReference, resolved: &str) -> String {
    let escaped = escape_attr(resolved);
    let mut out = String::with_capacity(text.len() + escaped.len());
    out.push_str(&text[..reference.span.start]);
    out.push_str(&escaped);
    out.push_str(&text[reference.span.end..]);
    out
}

/// Escape a string for use inside a double-quoted XML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode the predefined XML entities and numeric character references.
///
/// Unknown or malformed references are left as written.
pub fn unescape_attr(value: &str) -> String {
    RE_ENTITY
        .replace_all(value, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"<?xml version="1.0" standalone="no"?>
<xournal creator="Xournal++ 1.2.2" fileversion="4">
<title>Xournal++ document - see https://xournalpp.github.io/</title>
<page width="595.28" height="841.89">
<background type="pdf" domain="absolute" filename="/home/ana/uni/shared/notes/lecture1.pdf" pageno="1"/>
<layer><stroke tool="pen" color="#000000ff" width="1.41">10 10 20 20</stroke></layer>
</page>
<page width="595.28" height="841.89">
<background type="pdf" pageno="2"/>
<layer/>
</page>
</xournal>
"##;

    #[test]
    fn finds_background_reference() {
        let found = PDF_REFERENCE.find_first(DOC).unwrap();
        assert_eq!(found.raw, "/home/ana/uni/shared/notes/lecture1.pdf");
        assert_eq!(found.path, PathBuf::from("/home/ana/uni/shared/notes/lecture1.pdf"));
        assert_eq!(&DOC[found.span.clone()], found.raw);
    }

    #[test]
    fn no_reference_in_plain_notebook() {
        let doc = r##"<xournal><page><background type="solid" color="#ffffffff" style="lined"/></page></xournal>"##;
        assert!(PDF_REFERENCE.find_first(doc).is_none());
    }

    #[test]
    fn bare_file_name_without_directory_is_ignored() {
        let doc = r#"<background type="pdf" filename="lecture1.pdf"/>"#;
        assert!(PDF_REFERENCE.find_first(doc).is_none());
    }

    #[test]
    fn other_extensions_are_ignored() {
        let doc = r#"<image filename="/pics/cat.png"/><background filename="/x/y.pdf"/>"#;
        let found = PDF_REFERENCE.find_first(doc).unwrap();
        assert_eq!(found.raw, "/x/y.pdf");
    }

    #[test]
    fn custom_extension_pattern() {
        let pattern = ReferencePattern::new(".xoj").unwrap();
        let doc = r#"<attach filename="/old/place/draft.xoj"/>"#;
        assert_eq!(pattern.find_first(doc).unwrap().raw, "/old/place/draft.xoj");
        assert!(pattern.find_first(DOC).is_none());
    }

    #[test]
    fn value_does_not_run_across_attributes() {
        let doc = r#"<background filename="/a/b.png" other="/c/d.pdf"/><x filename="/e/f.pdf"/>"#;
        assert_eq!(PDF_REFERENCE.find_first(doc).unwrap().raw, "/e/f.pdf");
    }

    #[test]
    fn replace_touches_only_first_occurrence() {
        let doc = r#"<b filename="/old/a/x.pdf"/><b filename="/old/b/x.pdf"/>"#;
        let found = PDF_REFERENCE.find_first(doc).unwrap();
        let out = replace_first(doc, &found, "/new/a/x.pdf");
        assert_eq!(out, r#"<b filename="/new/a/x.pdf"/><b filename="/old/b/x.pdf"/>"#);
    }

    #[test]
    fn replace_preserves_surrounding_bytes() {
        let found = PDF_REFERENCE.find_first(DOC).unwrap();
        let out = replace_first(DOC, &found, "/srv/notes/lecture1.pdf");
        assert_eq!(&out[..found.span.start], &DOC[..found.span.start]);
        assert!(out.ends_with(&DOC[found.span.end..]));
        assert!(out.contains(r#"filename="/srv/notes/lecture1.pdf" pageno="1""#));
    }

    #[test]
    fn entities_are_decoded_and_re_encoded() {
        let doc = r#"<background filename="/home/ana/Notes &amp; Slides/w&#233;ek1.pdf"/>"#;
        let found = PDF_REFERENCE.find_first(doc).unwrap();
        assert_eq!(found.path, PathBuf::from("/home/ana/Notes & Slides/wéek1.pdf"));

        let out = replace_first(doc, &found, "/srv/Notes & Slides/wéek1.pdf");
        assert!(out.contains(r#"filename="/srv/Notes &amp; Slides/wéek1.pdf""#));
    }

    #[test]
    fn unknown_entities_survive() {
        assert_eq!(unescape_attr("a&nbsp;b&#xZZ;"), "a&nbsp;b&#xZZ;");
        assert_eq!(unescape_attr("&amp;lt;"), "&lt;");
    }

    #[test]
    fn escape_attr_handles_quotes() {
        assert_eq!(escape_attr(r#"a"b<c>&"#), "a&quot;b&lt;c&gt;&amp;");
    }
}
