//! # Domain Model: Annotation Records
//!
//! This module defines the value types stored by dirnotes: [`Annotation`] and [`Color`].
//!
//! An annotation is attached to a directory through its *stable identifier* (see
//! [`crate::resolver`]). The identifier is the key of the store's mapping, so it does not
//! appear inside the record itself.
//!
//! ## Text Fields
//!
//! `title` and `comment` are opaque text. They routinely carry inline rich-text markup
//! (`<b>`, `<i>`, `<color=#FF0000>`, `<size=14>`) and the comment may span several lines.
//! Nothing here parses or validates markup: whatever goes in comes back out byte-for-byte.
//!
//! ## Persisted Shape
//!
//! ```json
//! {
//!   "title": "<b>Scripts</b>",
//!   "comment": "Holds game logic\nand UI controllers",
//!   "titleColor": [0.4, 0.8, 1.0, 1.0],
//!   "createdAt": "2025-01-01T10:00:00Z",
//!   "updatedAt": "2025-01-02T08:30:00Z"
//! }
//! ```
//!
//! ## Forward Compatibility
//!
//! Records are read leniently so that files written by older or newer versions still load:
//! - Unknown fields are ignored.
//! - Missing or `null` text fields load as the empty string.
//! - A missing or malformed color loads as [`Color::DEFAULT`].
//! - Colors may be stored as `[r, g, b]`, `[r, g, b, a]` or `{"r":..,"g":..,"b":..,"a":..}`.
//! - Malformed timestamps are dropped.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// An RGBA color with channels in `[0, 1]`.
///
/// The fields are public, so a struct literal can hold anything. Records pass every
/// color through [`Color::clamped`] before storing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn clamp_channel(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Color {
    /// Neutral label color used when a caller does not pick one.
    pub const DEFAULT: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
            a: clamp_channel(a),
        }
    }

    /// The same color with every channel forced into `[0, 1]` (NaN becomes 0).
    pub fn clamped(self) -> Self {
        Self::rgba(self.r, self.g, self.b, self.a)
    }

    /// Hex form for rich-text markup, `#RRGGBB`, or `#RRGGBBAA` when translucent.
    pub fn to_hex(&self) -> String {
        let byte = |c: f32| (clamp_channel(c) * 255.0).round() as u8;
        if self.a < 1.0 {
            format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                byte(self.r),
                byte(self.g),
                byte(self.b),
                byte(self.a)
            )
        } else {
            format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::DEFAULT
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let c = self.clamped();
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&c.r)?;
        tuple.serialize_element(&c.g)?;
        tuple.serialize_element(&c.b)?;
        tuple.serialize_element(&c.a)?;
        tuple.end()
    }
}

fn opaque() -> f32 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Channels(Vec<f32>),
    Object {
        r: f32,
        g: f32,
        b: f32,
        #[serde(default = "opaque")]
        a: f32,
    },
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ColorRepr::deserialize(deserializer)? {
            ColorRepr::Channels(channels) => match channels.as_slice() {
                [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Color::rgba(*r, *g, *b, *a)),
                other => Err(de::Error::invalid_length(
                    other.len(),
                    &"three or four color channels",
                )),
            },
            ColorRepr::Object { r, g, b, a } => Ok(Color::rgba(r, g, b, a)),
        }
    }
}

/// The annotation attached to one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub title: String,
    pub comment: String,
    pub title_color: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn new(title: impl Into<String>, comment: impl Into<String>, title_color: Color) -> Self {
        Self {
            title: title.into(),
            comment: comment.into(),
            title_color: title_color.clamped(),
            created_at: None,
            updated_at: None,
        }
    }

    /// True when there is nothing worth showing: blank title and blank comment.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.comment.trim().is_empty()
    }

    /// Compares the user-visible content only, ignoring timestamps.
    pub fn same_content(&self, other: &Annotation) -> bool {
        self.title == other.title
            && self.comment == other.comment
            && self.title_color == other.title_color
    }

    /// Display label for the last modification, if known.
    pub fn updated_label(&self) -> Option<String> {
        self.updated_at.as_ref().map(format_timestamp)
    }
}

// Lenient reader: every field is optional and malformed values degrade to defaults.
impl<'de> Deserialize<'de> for Annotation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let helper = AnnotationHelper::deserialize(deserializer)?;

        let title_color = match helper.title_color {
            None | Some(serde_json::Value::Null) => Color::DEFAULT,
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Malformed titleColor ({}), using default", e);
                Color::DEFAULT
            }),
        };

        Ok(Annotation {
            title: helper.title.unwrap_or_default(),
            comment: helper.comment.unwrap_or_default(),
            title_color,
            created_at: helper.created_at.and_then(parse_timestamp),
            updated_at: helper.updated_at.and_then(parse_timestamp),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationHelper {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    title_color: Option<serde_json::Value>,
    #[serde(default)]
    created_at: Option<serde_json::Value>,
    #[serde(default)]
    updated_at: Option<serde_json::Value>,
}

fn parse_timestamp(value: serde_json::Value) -> Option<DateTime<Utc>> {
    serde_json::from_value(value).ok()
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
