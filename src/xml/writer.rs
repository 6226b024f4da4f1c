use anyhow::{Result, anyhow};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Incremental writer producing prefixed EWS XML.
///
/// A start tag stays pending until the first child, text or end call so that
/// attributes can still be attached and childless elements come out as
/// `<t:Name/>`.
pub struct EwsXmlWriter {
    writer: Writer<Vec<u8>>,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
}

impl Default for EwsXmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl EwsXmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::with_capacity(4 * 1024)),
            pending: None,
            open: Vec::with_capacity(16),
        }
    }

    pub fn write_declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }

    /// Open `<prefix:name>`; an empty prefix writes an unqualified name.
    pub fn start_element(&mut self, prefix: &str, name: &str) -> Result<()> {
        self.flush_pending()?;
        let qualified = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}:{name}")
        };
        self.pending = Some(BytesStart::new(qualified.clone()));
        self.open.push(qualified);
        Ok(())
    }

    /// Attach an attribute to the element opened last. The value is escaped.
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        let start = self
            .pending
            .as_mut()
            .ok_or_else(|| anyhow!("attribute {name} written after element content"))?;
        start.push_attribute((name, value));
        Ok(())
    }

    pub fn namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        if prefix.is_empty() {
            self.attribute("xmlns", uri)
        } else {
            self.attribute(&format!("xmlns:{prefix}"), uri)
        }
    }

    pub fn text(&mut self, value: &str) -> Result<()> {
        self.flush_pending()?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        Ok(())
    }

    pub fn end_element(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| anyhow!("end_element without an open element"))?;
        match self.pending.take() {
            Some(start) => self.writer.write_event(Event::Empty(start))?,
            None => self.writer.write_event(Event::End(BytesEnd::new(name)))?,
        }
        Ok(())
    }

    /// `<prefix:name>value</prefix:name>`
    pub fn write_element_value(&mut self, prefix: &str, name: &str, value: &str) -> Result<()> {
        self.start_element(prefix, name)?;
        if !value.is_empty() {
            self.text(value)?;
        }
        self.end_element()
    }

    /// Copy an already serialized fragment verbatim.
    pub fn write_raw(&mut self, fragment: &str) -> Result<()> {
        self.flush_pending()?;
        self.writer.get_mut().extend_from_slice(fragment.as_bytes());
        Ok(())
    }

    /// Depth of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.flush_pending()?;
        if let Some(open) = self.open.last() {
            return Err(anyhow!("element {open} was never closed"));
        }
        Ok(self.writer.into_inner())
    }
}
