//! Field glyphs for terminal rendering.
//!
//! A finite set of presentational glyphs keyed by field or symbolic name.
//! Unknown keys resolve to the explicit Generic variant.

use super::form::Field;

/// Presentational glyph shown next to a field or message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGlyph {
    Person,
    Envelope,
    Tag,
    Pencil,
    Speech,
    Paperclip,
    Microphone,
    Check,
    Cross,
    Generic,
}

impl FieldGlyph {
    /// Resolve a symbolic key; unknown keys get the Generic glyph.
    pub fn from_key(key: &str) -> Self {
        match key {
            "person" | "user" | "name" => Self::Person,
            "envelope" | "mail" | "email" => Self::Envelope,
            "tag" | "category" | "enquiry_type" => Self::Tag,
            "pencil" | "subject" => Self::Pencil,
            "speech" | "message" => Self::Speech,
            "paperclip" | "attachment" | "attachments" => Self::Paperclip,
            "microphone" | "mic" | "recording" => Self::Microphone,
            "check" | "success" => Self::Check,
            "cross" | "error" => Self::Cross,
            _ => Self::Generic,
        }
    }

    /// Glyph for a form field.
    pub fn for_field(field: Field) -> Self {
        match field {
            Field::Name => Self::Person,
            Field::Email => Self::Envelope,
            Field::EnquiryType => Self::Tag,
            Field::Subject => Self::Pencil,
            Field::Message => Self::Speech,
            Field::Attachments => Self::Paperclip,
            Field::Recording => Self::Microphone,
        }
    }

    /// Terminal-safe symbol for this glyph.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Person => "@",
            Self::Envelope => "✉",
            Self::Tag => "#",
            Self::Pencil => "✎",
            Self::Speech => "❝",
            Self::Paperclip => "📎",
            Self::Microphone => "🎙",
            Self::Check => "✔",
            Self::Cross => "✘",
            Self::Generic => "•",
        }
    }
}
