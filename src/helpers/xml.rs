//! Streaming XML helpers shared by the xlsx and ods decoders.
//! Wraps a quick-xml reader with the configuration both formats need and adds attribute/text accessors.

use crate::error::DecodeError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity '&{0};'")]
    ParseEntityError(String),

    #[error("Invalid value '{value}' for attribute '{name}'")]
    ParseAttributeValueError { name: String, value: String },
}

/// quick-xml reader owning its event buffer
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // `<c r="A1"/>` must still produce a Start/End pair
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event, `None` at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, DecodeError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(DecodeError::XmlError(error)),
        }
    }
}

/// Attribute access on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped value of the attribute `name`, if present.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError>;

    /// Parsed value of the attribute `name`, if present.
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, DecodeError>;

    /// True when the attribute `name` is present and equals `expected`.
    fn has_attribute_value(&'a self, name: &str, expected: &str) -> Result<bool, DecodeError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, DecodeError> {
        self.get_attribute_value(name)?
            .map(|value| {
                value.parse::<T>().map_err(|_| {
                    DecodeError::XmlHelperError(XmlError::ParseAttributeValueError {
                        name: name.to_owned(),
                        value: value.to_string(),
                    })
                })
            })
            .transpose()
    }

    fn has_attribute_value(&'a self, name: &str, expected: &str) -> Result<bool, DecodeError> {
        Ok(self
            .get_attribute_value(name)?
            .map(|value| value == expected)
            .unwrap_or(false))
    }
}

/// Accumulates character data from text and reference events.
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), DecodeError>;

    /// Resolves `&#NN;`, `&#xNN;` and predefined entities.
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), DecodeError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), DecodeError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), DecodeError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Loops over the events of an [`XmlReader`], dispatching to the given match arms.
/// Unmatched events are ignored and the loop ends at end of document.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
