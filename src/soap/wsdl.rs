use std::collections::HashMap;

use quick_xml::{Reader, events::BytesStart, events::Event};

use crate::soap::envelope::EnvelopeError;

/// What a client needs from a WSDL document to address the service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceDescription {
    pub location: String,
    pub namespace: Option<String>,
    /// `soapAction` per operation name.
    pub actions: HashMap<String, String>,
}

impl ServiceDescription {
    pub fn action(&self, method: &str) -> Option<&str> {
        self.actions.get(method).map(String::as_str)
    }
}

fn attribute(start: &BytesStart, name: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attribute| attribute.key.local_name().as_ref() == name)
        .map(|attribute| String::from_utf8_lossy(&attribute.value).into_owned())
}

pub fn parse_wsdl(xml: &str) -> Result<ServiceDescription, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut location = None;
    let mut namespace = None;
    let mut actions = HashMap::new();
    let mut operation: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let start = match &event {
            Event::Start(start) | Event::Empty(start) => start,
            Event::Eof => break,
            _ => continue,
        };

        match start.local_name().as_ref() {
            b"definitions" => namespace = attribute(start, b"targetNamespace"),
            b"address" if location.is_none() => location = attribute(start, b"location"),
            b"operation" => {
                if let Some(name) = attribute(start, b"name") {
                    operation = Some(name);
                } else if let (Some(name), Some(action)) =
                    (&operation, attribute(start, b"soapAction"))
                {
                    actions.insert(name.clone(), action);
                }
            }
            _ => {}
        }
    }

    Ok(ServiceDescription {
        location: location.ok_or(EnvelopeError::MissingAddress)?,
        namespace,
        actions,
    })
}
