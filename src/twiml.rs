//! Call-control markup returned to the voice provider's webhooks.

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

pub const CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Clone, PartialEq)]
pub enum DialTarget {
    Number(String),
    Client {
        identity: String,
        parameters: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Say(String),
    Dial {
        caller_id: Option<String>,
        timeout: Option<u32>,
        target: DialTarget,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn dial_number(mut self, number: impl Into<String>, caller_id: impl Into<String>) -> Self {
        self.verbs.push(Verb::Dial {
            caller_id: Some(caller_id.into()),
            timeout: None,
            target: DialTarget::Number(number.into()),
        });
        self
    }

    pub fn dial_client(
        mut self,
        identity: impl Into<String>,
        timeout: u32,
        parameters: Vec<(String, String)>,
    ) -> Self {
        self.verbs.push(Verb::Dial {
            caller_id: None,
            timeout: Some(timeout),
            target: DialTarget::Client {
                identity: identity.into(),
                parameters,
            },
        });
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("Response")))?;
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => write_text_element(&mut writer, "Say", text)?,
                Verb::Dial {
                    caller_id,
                    timeout,
                    target,
                } => {
                    let mut dial = BytesStart::new("Dial");
                    if let Some(caller_id) = caller_id {
                        dial.push_attribute(("callerId", caller_id.as_str()));
                    }
                    if let Some(timeout) = timeout {
                        dial.push_attribute(("timeout", timeout.to_string().as_str()));
                    }
                    writer.write_event(Event::Start(dial))?;
                    match target {
                        DialTarget::Number(number) => {
                            write_text_element(&mut writer, "Number", number)?
                        }
                        DialTarget::Client {
                            identity,
                            parameters,
                        } => {
                            writer.write_event(Event::Start(BytesStart::new("Client")))?;
                            write_text_element(&mut writer, "Identity", identity)?;
                            for (name, value) in parameters {
                                let mut parameter = BytesStart::new("Parameter");
                                parameter.push_attribute(("name", name.as_str()));
                                parameter.push_attribute(("value", value.as_str()));
                                writer.write_event(Event::Empty(parameter))?;
                            }
                            writer.write_event(Event::End(BytesEnd::new("Client")))?;
                        }
                    }
                    writer.write_event(Event::End(BytesEnd::new("Dial")))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("Response")))?;
        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

    #[test]
    fn test_say() {
        let xml = VoiceResponse::new().say("Invalid caller ID format.").to_xml().unwrap();
        assert_eq!(
            xml,
            format!("{}<Response><Say>Invalid caller ID format.</Say></Response>", DECL)
        );
    }

    #[test]
    fn test_dial_number() {
        let xml = VoiceResponse::new()
            .dial_number("+12125551234", "+15550001111")
            .to_xml()
            .unwrap();
        assert_eq!(
            xml,
            format!(
                r#"{}<Response><Dial callerId="+15550001111"><Number>+12125551234</Number></Dial></Response>"#,
                DECL
            )
        );
    }

    #[test]
    fn test_dial_client_with_parameter() {
        let xml = VoiceResponse::new()
            .dial_client(
                "browser-client-1000",
                30,
                vec![("CallSid".to_string(), "CA123".to_string())],
            )
            .to_xml()
            .unwrap();
        assert_eq!(
            xml,
            format!(
                r#"{}<Response><Dial timeout="30"><Client><Identity>browser-client-1000</Identity><Parameter name="CallSid" value="CA123"/></Client></Dial></Response>"#,
                DECL
            )
        );
    }

    #[test]
    fn test_markup_is_escaped() {
        let xml = VoiceResponse::new()
            .say("a < b & c")
            .dial_client("agent", 5, vec![("k".to_string(), "\"q\"".to_string())])
            .to_xml()
            .unwrap();
        assert!(xml.contains("<Say>a &lt; b &amp; c</Say>"));
        assert!(xml.contains(r#"value="&quot;q&quot;""#));
    }
}
