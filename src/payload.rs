//! Minimal XML and HTML document builders for response bodies

use crate::domain::RenderedList;
use std::fmt::Write;

/// XML declaration prefixed to every XML answer
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Escape text for use in XML/HTML content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Streaming XML writer
///
/// ```rust
/// use restbridge::payload::XmlWriter;
///
/// let mut xml = XmlWriter::new();
/// xml.open("Class", &[("id", "3")]);
/// xml.element("Name", &[], "D21 & up");
/// xml.close();
/// assert!(xml.finish().ends_with("<Class id=\"3\"><Name>D21 &amp; up</Name></Class>\n"));
/// ```
#[derive(Debug)]
pub struct XmlWriter {
    out: String,
    open: Vec<&'static str>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    /// Start a document with the XML declaration
    pub fn new() -> Self {
        Self {
            out: String::from(XML_DECLARATION),
            open: Vec::new(),
        }
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", name, escape(value));
        }
    }

    /// Open an element; must be matched by [`close`](Self::close)
    pub fn open(&mut self, tag: &'static str, attrs: &[(&str, &str)]) -> &mut Self {
        self.start_tag(tag, attrs);
        self.out.push('>');
        self.open.push(tag);
        self
    }

    /// Close the innermost open element
    pub fn close(&mut self) -> &mut Self {
        if let Some(tag) = self.open.pop() {
            let _ = write!(self.out, "</{}>", tag);
        }
        self
    }

    /// Write a complete element with text content; empty text gives `<tag/>`
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> &mut Self {
        self.start_tag(tag, attrs);
        if text.is_empty() {
            self.out.push_str("/>");
        } else {
            let _ = write!(self.out, ">{}</{}>", escape(text), tag);
        }
        self
    }

    /// Close all open elements and return the document
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.close();
        }
        self.out.push('\n');
        self.out
    }
}

/// Wrap an HTML body in a complete page
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

/// Render a list description as an HTML page
pub fn html_list(list: &RenderedList) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", escape(&list.title));
    for section in &list.sections {
        let _ = writeln!(body, "<h2>{}</h2>", escape(&section.heading));
        body.push_str("<table>\n<tr>");
        for column in &list.columns {
            let _ = write!(body, "<th>{}</th>", escape(column));
        }
        body.push_str("</tr>\n");
        for row in &section.rows {
            body.push_str("<tr>");
            for cell in row {
                let _ = write!(body, "<td>{}</td>", escape(cell));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</table>\n");
    }
    html_page(&list.title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListSection;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\"'"), "a&lt;b &amp; &quot;c&quot;&#39;");
        assert_eq!(escape("Åsa"), "Åsa");
    }

    #[test]
    fn test_nested_elements_closed_on_finish() {
        let mut xml = XmlWriter::new();
        xml.open("Competitors", &[]);
        xml.open("Competitor", &[("id", "1")]);
        xml.element("Name", &[], "Anna");
        xml.element("Card", &[], "");
        let doc = xml.finish();
        assert!(doc.starts_with(XML_DECLARATION));
        assert!(doc.ends_with(
            "<Competitors><Competitor id=\"1\"><Name>Anna</Name><Card/></Competitor></Competitors>\n"
        ));
    }

    #[test]
    fn test_html_list() {
        let list = RenderedList {
            title: "Results <D21>".to_string(),
            columns: vec!["Place".to_string(), "Name".to_string()],
            sections: vec![ListSection {
                heading: "D21".to_string(),
                rows: vec![vec!["1.".to_string(), "Berit".to_string()]],
            }],
        };
        let html = html_list(&list);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Results &lt;D21&gt;</title>"));
        assert!(html.contains("<tr><td>1.</td><td>Berit</td></tr>"));
    }
}
