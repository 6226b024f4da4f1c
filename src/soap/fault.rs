use crate::xml::XmlNode;

/// A decoded SOAP fault.
///
/// Exchange puts the interesting part in `detail`: an EWS `ResponseCode`, a
/// human readable message and a free-form `MessageXml` block carrying things
/// like the throttling back-off or schema violation positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapFault {
    pub code: String,
    pub string: String,
    pub actor: Option<String>,
    pub response_code: Option<String>,
    pub message: Option<String>,
    pub exception_type: Option<String>,
    pub line: Option<u32>,
    pub position: Option<u32>,
    /// `MessageXml` entries as (name, value). `<t:Value Name="X">` entries
    /// are keyed by their `Name` attribute.
    pub message_xml: Vec<(String, String)>,
}

impl SoapFault {
    /// Decode a `Fault` element, SOAP 1.1 or SOAP 1.2.
    pub fn from_node(fault: &XmlNode) -> Self {
        let mut out = SoapFault::default();

        // SOAP 1.1
        if let Some(code) = fault.child_text("faultcode") {
            out.code = code.to_string();
        }
        if let Some(text) = fault.child_text("faultstring") {
            out.string = text.to_string();
        }
        out.actor = fault.child_text("faultactor").map(str::to_string);

        // SOAP 1.2
        if out.code.is_empty()
            && let Some(code) = fault.path(&["Code", "Value"])
        {
            out.code = code.trimmed_text().to_string();
        }
        if out.string.is_empty()
            && let Some(reason) = fault.path(&["Reason", "Text"])
        {
            out.string = reason.trimmed_text().to_string();
        }

        let detail = fault.child("detail").or_else(|| fault.child("Detail"));
        if let Some(detail) = detail {
            out.response_code = detail
                .child_text("ResponseCode")
                .or_else(|| detail.child_text("ErrorCode"))
                .map(str::to_string);
            out.message = detail.child_text("Message").map(str::to_string);
            out.exception_type = detail.child_text("ExceptionType").map(str::to_string);

            if let Some(xml) = detail.child("MessageXml") {
                for entry in &xml.children {
                    let key = match (entry.name.as_str(), entry.attribute("Name")) {
                        ("Value", Some(name)) => name.to_string(),
                        (other, _) => other.to_string(),
                    };
                    out.message_xml
                        .push((key, entry.trimmed_text().to_string()));
                }
                out.line = out.message_xml_value("LineNumber").and_then(|v| v.parse().ok());
                out.position = out.message_xml_value("LinePosition").and_then(|v| v.parse().ok());
            }
        }

        out
    }

    pub fn message_xml_value(&self, name: &str) -> Option<&str> {
        self.message_xml
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Back-off requested by a throttled server, in milliseconds.
    pub fn back_off_ms(&self) -> Option<u64> {
        self.message_xml_value("BackOffMilliseconds")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn is_server_busy(&self) -> bool {
        self.response_code.as_deref() == Some("ErrorServerBusy") || self.back_off_ms().is_some()
    }
}
