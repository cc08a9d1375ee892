use crate::config::{PROGRESS_INTERVAL, READ_BUFFER_SIZE};
use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use indicatif::ProgressBar;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// An element of the export document.
///
/// `text` follows the usual tree-API convention: it holds the character data
/// that appears before the first child element, and is `None` when empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Direct children with the given tag, in document order.
    pub fn children_tagged<'a, 'b>(&'a self, tag: &'b str) -> impl Iterator<Item = &'a XmlNode> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Direct children with the given tag and `name` attribute.
    pub fn children_named<'a, 'b>(
        &'a self,
        tag: &'b str,
        name: &'b str,
    ) -> impl Iterator<Item = &'a XmlNode> + 'b
    where
        'a: 'b,
    {
        self.children_tagged(tag)
            .filter(move |c| c.attr("name") == Some(name))
    }

    /// All elements below this one in document (pre-)order, excluding itself.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

/// Pre-order walk that keeps its own stack, so deeply nested exports
/// cannot overflow the call stack.
pub struct Descendants<'a> {
    stack: Vec<&'a XmlNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A fully loaded export document.
///
/// Malformed markup is tolerated: stray end tags are dropped, mismatched end
/// tags close back to the nearest matching element, unclosed elements are
/// closed at end of input. A syntax error after the first element is logged
/// and skipped, and reading resumes at the next event.
#[derive(Debug, Default)]
pub struct XmlDocument {
    roots: Vec<XmlNode>,
}

impl XmlDocument {
    /// Loads the export at `path`; `.bz2` files are decompressed on the fly.
    pub fn open(path: &Path, show_progress: bool) -> Result<Self> {
        if !path.exists() {
            bail!("Input file '{}' not found", path.display());
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        let is_bz2 = path.extension().map(|e| e == "bz2").unwrap_or(false);

        let source: Box<dyn BufRead> = if is_bz2 {
            Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                BzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        };

        let pb = if show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };

        info!(path = %path.display(), compressed = is_bz2, "Parsing export document");
        let doc = Self::parse(Reader::from_reader(source), &pb)
            .with_context(|| format!("Failed to parse XML file: {}", path.display()));
        pb.finish_and_clear();
        doc
    }

    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::parse(Reader::from_reader(xml.as_bytes()), &ProgressBar::hidden())
    }

    fn parse<R: BufRead>(mut reader: Reader<R>, pb: &ProgressBar) -> Result<Self> {
        reader.trim_text(false).check_end_names(false);

        let mut builder = TreeBuilder::default();
        let mut buf = Vec::with_capacity(8192);
        let mut last_error = None;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = reader.buffer_position();
                    if builder.elements == 0 {
                        return Err(e).with_context(|| {
                            format!("Unrecoverable XML error at byte {}", position)
                        });
                    }
                    // Give up once the reader stops advancing past errors.
                    if matches!(e, quick_xml::Error::Io(_)) || last_error == Some(position) {
                        warn!(
                            error = %e,
                            position,
                            elements = builder.elements,
                            "Malformed XML, keeping the elements read so far"
                        );
                        break;
                    }
                    warn!(error = %e, position, "Skipping malformed XML");
                    last_error = Some(position);
                    buf.clear();
                    continue;
                }
            };

            match event {
                Event::Start(ref e) => {
                    builder.open(element(e));
                    if builder.elements % PROGRESS_INTERVAL == 0 {
                        pb.tick();
                    }
                }
                Event::Empty(ref e) => builder.leaf(element(e)),
                Event::End(ref e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !builder.close(&tag) {
                        debug!(tag = %tag, "Ignoring stray end tag");
                    }
                }
                Event::Text(ref e) => match e.unescape() {
                    Ok(text) => builder.text(&text),
                    Err(err) => {
                        debug!(error = %err, "Keeping text with an unresolvable escape as-is");
                        builder.text(&String::from_utf8_lossy(e));
                    }
                },
                Event::CData(ref e) => builder.text(&String::from_utf8_lossy(e)),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        builder.finish()
    }

    pub fn roots(&self) -> &[XmlNode] {
        &self.roots
    }

    /// Every element of the document in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.roots
            .iter()
            .flat_map(|root| std::iter::once(root).chain(root.descendants()))
    }
}

fn element(start: &BytesStart<'_>) -> XmlNode {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()));

    for attr in start.attributes().with_checks(false) {
        match attr {
            Ok(attr) => {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = match attr.unescape_value() {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                };
                node.attrs.push((key, value));
            }
            Err(e) => debug!(error = %e, tag = %node.tag, "Skipping malformed attribute"),
        }
    }

    node
}

#[derive(Default)]
struct TreeBuilder {
    open: Vec<XmlNode>,
    roots: Vec<XmlNode>,
    elements: u64,
}

impl TreeBuilder {
    fn open(&mut self, node: XmlNode) {
        self.elements += 1;
        self.open.push(node);
    }

    fn leaf(&mut self, node: XmlNode) {
        self.elements += 1;
        self.attach(node);
    }

    fn attach(&mut self, node: XmlNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Closes the innermost open element named `tag` along with anything
    /// still open inside it. Returns false if no such element is open.
    fn close(&mut self, tag: &str) -> bool {
        let Some(depth) = self.open.iter().rposition(|n| n.tag == tag) else {
            return false;
        };

        let unclosed = self.open.len() - depth - 1;
        if unclosed > 0 {
            debug!(tag, unclosed, "End tag closes elements that were left open");
        }

        while self.open.len() > depth {
            if let Some(node) = self.open.pop() {
                self.attach(node);
            }
        }
        true
    }

    fn text(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let Some(node) = self.open.last_mut() {
            if node.children.is_empty() {
                node.text.get_or_insert_with(String::new).push_str(chunk);
            }
        }
    }

    fn finish(mut self) -> Result<XmlDocument> {
        if !self.open.is_empty() {
            warn!(
                unclosed = self.open.len(),
                "Document ended with open elements, closing them"
            );
            while let Some(node) = self.open.pop() {
                self.attach(node);
            }
        }

        if self.roots.is_empty() {
            bail!("Document contains no XML elements");
        }

        debug!(elements = self.elements, "XML tree built");
        Ok(XmlDocument { roots: self.roots })
    }
}
