//! Result descriptor handed back to whoever dispatched a run
//!
//! The polling side expects `{"gif": "<file>", "frames": ["<file>", ...]}`
//! formatted the way Python's `json.dumps` writes it: `", "` and `": "`
//! separators and non-ASCII escaped as `\uXXXX`. A run without an animation
//! reports `"gif": ""`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io;

/// Files produced by one run, relative to its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// The looping animation, if one was encoded
    #[serde(rename = "gif", serialize_with = "none_as_empty", deserialize_with = "empty_as_none")]
    pub animation_path: Option<String>,
    /// Saved frames in cell-size order
    #[serde(rename = "frames")]
    pub frame_paths: Vec<String>,
}

fn none_as_empty<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl RunResult {
    /// True when the run neither saved frames nor encoded an animation.
    pub fn is_empty(&self) -> bool {
        self.animation_path.is_none() && self.frame_paths.is_empty()
    }

    /// Serialize in the polling endpoint's exact wire format.
    pub fn to_wire_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PyJsonFormatter);
        self.serialize(&mut ser)?;
        // Formatter only emits ASCII
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn from_wire_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// `serde_json` formatter matching `json.dumps` defaults.
struct PyJsonFormatter;

impl serde_json::ser::Formatter for PyJsonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
