//! Content block types for messages.

use serde::{Deserialize, Serialize};

/// A block of content within a message
///
/// Binary payloads (`image_data`, `document_data`, `video_data`) are base64 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content
    Text { text: String },
    /// Inline image
    Image {
        image_data: String,
        /// Image format such as `jpeg` or `png`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    /// Inline document
    Document {
        document_data: String,
        /// Document format such as `txt` or `pdf`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Inline video
    Video {
        video_data: String,
        /// Video format such as `mp4`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}

impl ContentBlock {
    /// Create a new text content block
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a new image block from base64 data
    pub fn image<S: Into<String>>(image_data: S, format: Option<&str>) -> Self {
        Self::Image {
            image_data: image_data.into(),
            format: format.map(str::to_string),
        }
    }

    /// Create a new document block from base64 data
    pub fn document<S: Into<String>>(document_data: S, format: Option<&str>, name: Option<&str>) -> Self {
        Self::Document {
            document_data: document_data.into(),
            format: format.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    /// Create a new video block from base64 data
    pub fn video<S: Into<String>>(video_data: S, format: Option<&str>) -> Self {
        Self::Video {
            video_data: video_data.into(),
            format: format.map(str::to_string),
        }
    }

    /// The wire name of this block's type
    pub fn type_name(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Image { .. } => "image",
            ContentBlock::Document { .. } => "document",
            ContentBlock::Video { .. } => "video",
        }
    }

    /// Name of the field carrying this block's payload
    pub fn payload_field(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Image { .. } => "image_data",
            ContentBlock::Document { .. } => "document_data",
            ContentBlock::Video { .. } => "video_data",
        }
    }

    /// The payload of this block (text or base64 data)
    pub fn payload(&self) -> &str {
        match self {
            ContentBlock::Text { text } => text,
            ContentBlock::Image { image_data, .. } => image_data,
            ContentBlock::Document { document_data, .. } => document_data,
            ContentBlock::Video { video_data, .. } => video_data,
        }
    }

    /// Get text content if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Required payload field for a recognized block type name
pub(crate) fn required_field_for(block_type: &str) -> Option<&'static str> {
    match block_type {
        "text" => Some("text"),
        "image" => Some("image_data"),
        "document" => Some("document_data"),
        "video" => Some("video_data"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_wire_shape() {
        let block = ContentBlock::image("aGVsbG8=", Some("png"));
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "image", "image_data": "aGVsbG8=", "format": "png"})
        );

        let parsed: ContentBlock =
            serde_json::from_value(json!({"type": "document", "document_data": "eA=="})).unwrap();
        assert_eq!(parsed, ContentBlock::document("eA==", None, None));
    }

    #[test]
    fn test_payload_accessors() {
        let video = ContentBlock::video("AAAA", Some("mp4"));
        assert_eq!(video.type_name(), "video");
        assert_eq!(video.payload_field(), "video_data");
        assert_eq!(video.payload(), "AAAA");
        assert_eq!(ContentBlock::text("hi").as_text(), Some("hi"));
        assert_eq!(required_field_for("image"), Some("image_data"));
        assert_eq!(required_field_for("audio"), None);
    }
}
