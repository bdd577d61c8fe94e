//! Streaming JSON walker
//!
//! Drives a [`JsonSink`] with SAX-style events while serde_json consumes
//! the input buffer. No DOM is built; object keys and string values are
//! borrowed from the input where possible.

use serde::de::{DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

/// Receiver of SAX events. All methods default to ignoring the event.
pub trait JsonSink {
    fn start_object(&mut self) {}
    fn end_object(&mut self) {}
    fn start_array(&mut self) {}
    fn end_array(&mut self) {}
    fn key(&mut self, _key: &str) {}
    /// Numeric or boolean value. Booleans arrive as 0/1, floats truncated.
    fn uint(&mut self, _value: u64) {}
    fn string(&mut self, _value: &str) {}
}

/// Stream `data` through `sink`. Returns an error only for malformed JSON;
/// schema surprises are the sink's business.
pub fn walk(data: &[u8], sink: &mut dyn JsonSink) -> Result<(), serde_json::Error> {
    let mut de = serde_json::Deserializer::from_slice(data);
    ValueSeed(sink).deserialize(&mut de)?;
    de.end()
}

struct ValueSeed<'s>(&'s mut dyn JsonSink);

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor(self.0))
    }
}

struct ValueVisitor<'s>(&'s mut dyn JsonSink);

impl<'de> Visitor<'de> for ValueVisitor<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<(), E> {
        self.0.uint(u64::from(v));
        Ok(())
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<(), E> {
        self.0.uint(v);
        Ok(())
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<(), E> {
        self.0.uint(v.max(0) as u64);
        Ok(())
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<(), E> {
        self.0.uint(if v.is_sign_negative() { 0 } else { v as u64 });
        Ok(())
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<(), E> {
        self.0.string(v);
        Ok(())
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        self.0.start_object();
        while map.next_key_seed(KeySeed(&mut *self.0))?.is_some() {
            map.next_value_seed(ValueSeed(&mut *self.0))?;
        }
        self.0.end_object();
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        self.0.start_array();
        while seq.next_element_seed(ValueSeed(&mut *self.0))?.is_some() {}
        self.0.end_array();
        Ok(())
    }
}

struct KeySeed<'s>(&'s mut dyn JsonSink);

impl<'de> DeserializeSeed<'de> for KeySeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(KeyVisitor(self.0))
    }
}

struct KeyVisitor<'s>(&'s mut dyn JsonSink);

impl<'de> Visitor<'de> for KeyVisitor<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object key")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<(), E> {
        self.0.key(v);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl JsonSink for Recorder {
        fn start_object(&mut self) {
            self.events.push("{".into());
        }
        fn end_object(&mut self) {
            self.events.push("}".into());
        }
        fn start_array(&mut self) {
            self.events.push("[".into());
        }
        fn end_array(&mut self) {
            self.events.push("]".into());
        }
        fn key(&mut self, key: &str) {
            self.events.push(format!("k:{}", key));
        }
        fn uint(&mut self, value: u64) {
            self.events.push(format!("u:{}", value));
        }
        fn string(&mut self, value: &str) {
            self.events.push(format!("s:{}", value));
        }
    }

    #[test]
    fn test_event_order() {
        let mut sink = Recorder::default();
        walk(br#"{"a": 1, "b": [2, "x"], "c": {"d": true}}"#, &mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec!["{", "k:a", "u:1", "k:b", "[", "u:2", "s:x", "]", "k:c", "{", "k:d", "u:1", "}", "}"]
        );
    }

    #[test]
    fn test_null_ignored() {
        let mut sink = Recorder::default();
        walk(br#"{"a": null}"#, &mut sink).unwrap();
        assert_eq!(sink.events, vec!["{", "k:a", "}"]);
    }

    #[test]
    fn test_negative_clamped() {
        let mut sink = Recorder::default();
        walk(br#"[-5, 3.9]"#, &mut sink).unwrap();
        assert_eq!(sink.events, vec!["[", "u:0", "u:3", "]"]);
    }

    #[test]
    fn test_malformed_json_is_error() {
        let mut sink = Recorder::default();
        assert!(walk(br#"{"a": "#, &mut sink).is_err());
    }
}
