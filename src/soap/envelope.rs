use std::io::Cursor;

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{constants::SOAP_ENV_NS, soap::coerce::RawResponse};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("failed to write envelope: {0}")]
    Write(String),

    #[error("response has no SOAP body")]
    MissingBody,

    #[error("service description has no SOAP address")]
    MissingAddress,
}

/// Scalar parameter of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum SoapValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl SoapValue {
    fn to_wire(&self) -> String {
        match self {
            SoapValue::Str(value) => value.clone(),
            SoapValue::Int(value) => value.to_string(),
            SoapValue::Bool(value) => value.to_string(),
        }
    }
}

impl From<&str> for SoapValue {
    fn from(value: &str) -> Self {
        SoapValue::Str(value.to_string())
    }
}

impl From<String> for SoapValue {
    fn from(value: String) -> Self {
        SoapValue::Str(value)
    }
}

impl From<i64> for SoapValue {
    fn from(value: i64) -> Self {
        SoapValue::Int(value)
    }
}

impl From<i32> for SoapValue {
    fn from(value: i32) -> Self {
        SoapValue::Int(i64::from(value))
    }
}

impl From<bool> for SoapValue {
    fn from(value: bool) -> Self {
        SoapValue::Bool(value)
    }
}

/// One RPC call: the method wrapper element in `namespace` holding
/// unqualified, ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapCall {
    pub method: String,
    pub namespace: String,
    pub params: Vec<(String, SoapValue)>,
}

impl SoapCall {
    pub fn new(method: &str, namespace: &str) -> Self {
        Self {
            method: method.to_string(),
            namespace: namespace.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<SoapValue>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResponse {
    Response(RawResponse),
    Fault { code: String, message: String },
}

pub fn encode_call(call: &SoapCall) -> Result<String, EnvelopeError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let wrapper = format!("tns:{}", call.method);
    let values = call
        .params
        .iter()
        .map(|(name, value)| (name.as_str(), value.to_wire()))
        .collect::<Vec<_>>();

    let mut events = vec![
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        Event::Start(BytesStart::new("soapenv:Envelope").with_attributes([
            ("xmlns:soapenv", SOAP_ENV_NS),
            ("xmlns:tns", call.namespace.as_str()),
        ])),
        Event::Start(BytesStart::new("soapenv:Body")),
        Event::Start(BytesStart::new(wrapper.as_str())),
    ];
    for (name, value) in &values {
        events.push(Event::Start(BytesStart::new(*name)));
        events.push(Event::Text(BytesText::new(value)));
        events.push(Event::End(BytesEnd::new(*name)));
    }
    events.push(Event::End(BytesEnd::new(wrapper.as_str())));
    events.push(Event::End(BytesEnd::new("soapenv:Body")));
    events.push(Event::End(BytesEnd::new("soapenv:Envelope")));

    for event in events {
        writer
            .write_event(event)
            .map_err(|e| EnvelopeError::Write(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| EnvelopeError::Write(e.to_string()))
}

#[derive(Debug, Default)]
struct Frame {
    name: String,
    text: String,
    nil: bool,
    has_children: bool,
    key: Option<String>,
    value: Option<String>,
}

impl Frame {
    fn open(start: &BytesStart) -> Self {
        let nil = start.attributes().flatten().any(|attribute| {
            attribute.key.local_name().as_ref() == b"nil" && attribute.value.as_ref() == b"true"
        });
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            nil,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct Decoder {
    stack: Vec<Frame>,
    body_seen: bool,
    fault: Option<(String, String)>,
    response: RawResponse,
}

impl Decoder {
    fn start(&mut self, frame: Frame) {
        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        if frame.name == "Body" {
            self.body_seen = true;
        }
        if frame.name == "Fault" && self.in_body() {
            self.fault.get_or_insert_default();
        }
        self.stack.push(frame);
    }

    fn in_body(&self) -> bool {
        self.stack.iter().any(|frame| frame.name == "Body")
    }

    fn in_fault(&self) -> bool {
        self.stack.iter().any(|frame| frame.name == "Fault")
    }

    fn end(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if !self.in_body() {
            return;
        }

        if frame.name == "item" {
            if let Some(key) = frame.key {
                self.response
                    .entries
                    .push((key, frame.value.unwrap_or_default()));
            }
            return;
        }
        if frame.has_children || frame.nil {
            return;
        }

        let in_fault = self.in_fault();
        match (self.stack.last_mut(), frame.name.as_str()) {
            (Some(parent), "key") if parent.name == "item" => parent.key = Some(frame.text),
            (Some(parent), "value") if parent.name == "item" => parent.value = Some(frame.text),
            (_, "faultcode" | "Value") if in_fault => {
                if let Some(fault) = self.fault.as_mut() {
                    fault.0 = frame.text;
                }
            }
            (_, "faultstring" | "Text") if in_fault => {
                if let Some(fault) = self.fault.as_mut() {
                    fault.1 = frame.text;
                }
            }
            _ if in_fault => {}
            _ => {
                self.response.fields.insert(frame.name, frame.text);
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.text.push_str(text);
        }
    }

    fn finish(self) -> Result<DecodedResponse, EnvelopeError> {
        if !self.body_seen {
            return Err(EnvelopeError::MissingBody);
        }
        Ok(match self.fault {
            Some((code, message)) => DecodedResponse::Fault { code, message },
            None => DecodedResponse::Response(self.response),
        })
    }
}

/// Flattens a response envelope into its leaf fields and map entries,
/// or extracts the fault it carries. Leaf text is kept verbatim.
pub fn decode_response(xml: &str) -> Result<DecodedResponse, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    let mut decoder = Decoder::default();

    loop {
        match reader
            .read_event()
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?
        {
            Event::Start(start) => decoder.start(Frame::open(&start)),
            Event::Empty(start) => {
                decoder.start(Frame::open(&start));
                decoder.end();
            }
            Event::End(_) => decoder.end(),
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
                decoder.text(&text);
            }
            Event::CData(data) => decoder.text(&String::from_utf8_lossy(&data)),
            Event::Eof => break,
            _ => {}
        }
    }

    decoder.finish()
}
