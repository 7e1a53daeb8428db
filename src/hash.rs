//! Image content fingerprints
//!
//! An image is identified by its source URL and rendered size. The digest is
//! an identity fingerprint, not a security boundary: two images with the same
//! source and size are indistinguishable and the first one in document order
//! wins.

use md5::{Digest, Md5};

use crate::dom::{Document, Layout, NodeId};

/// Separator between the fingerprint fields
pub const FINGERPRINT_SEPARATOR: char = '|';

/// The hashed attributes of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFingerprint {
    pub src: String,
    pub width: u32,
    pub height: u32,
}

impl ImageFingerprint {
    /// Read the fingerprint of an `<img>`; `None` for other nodes or images without `src`
    pub fn of(doc: &Document, node: NodeId, layout: &dyn Layout) -> Option<Self> {
        if doc.tag_name(node) != Some("img") {
            return None;
        }
        let src = doc.attr(node, "src")?.to_string();
        let (width, height) = layout
            .bounding_box(doc, node)
            .map(|r| (r.width.round().max(0.0) as u32, r.height.round().max(0.0) as u32))
            .unwrap_or((0, 0));
        Some(Self { src, width, height })
    }

    /// Hex MD5 of `src|width|height`
    pub fn digest(&self) -> String {
        let input = format!(
            "{}{sep}{}{sep}{}",
            self.src,
            self.width,
            self.height,
            sep = FINGERPRINT_SEPARATOR
        );
        let mut hasher = Md5::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Content hash of an image element
pub fn content_hash(doc: &Document, node: NodeId, layout: &dyn Layout) -> Option<String> {
    ImageFingerprint::of(doc, node, layout).map(|f| f.digest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{AttributeLayout, FixedLayout, Rect};

    #[test]
    fn test_known_digest() {
        let fp = ImageFingerprint {
            src: "/a.png".to_string(),
            width: 100,
            height: 50,
        };
        let mut hasher = Md5::new();
        hasher.update(b"/a.png|100|50");
        assert_eq!(fp.digest(), hex::encode(hasher.finalize()));
        assert_eq!(fp.digest().len(), 32);
    }

    #[test]
    fn test_hash_uses_rendered_size() {
        let doc = Document::parse_fragment(r#"<img src="/a.png" width="10" height="10"/>"#).unwrap();
        let img = doc.children(doc.root())[0];
        let from_attrs = content_hash(&doc, img, &AttributeLayout).unwrap();
        let layout = FixedLayout::new().with(img, Rect::new(0.0, 0.0, 100.0, 50.0));
        let rendered = content_hash(&doc, img, &layout).unwrap();
        assert_ne!(from_attrs, rendered);
    }

    #[test]
    fn test_non_images_have_no_hash() {
        let doc = Document::parse_fragment("<p>text</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert!(content_hash(&doc, p, &AttributeLayout).is_none());
    }
}
