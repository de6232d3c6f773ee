// service/file_store.rs
//
// Media upload, thumbnailing and download belong to the external file-store
// collaborator. The core only carries the reference it hands back, so the
// contract here is validation of that reference plus the coarse kind tag.
use crate::models::chatmodel::MessageKind;

pub const MAX_MEDIA_REF_LEN: usize = 2048;

/// A media reference is an opaque URL/identifier minted by the file store.
/// Kind tags other than text require one; text forbids one.
pub fn validate_media_ref(kind: MessageKind, media_ref: Option<&str>) -> Result<(), String> {
    match (kind, media_ref) {
        (MessageKind::Text, None) => Ok(()),
        (MessageKind::Text, Some(_)) => {
            Err("text messages must not carry a media reference".to_string())
        }
        (_, None) => Err("media messages require a media reference".to_string()),
        (_, Some(r)) if r.is_empty() => Err("media reference must not be empty".to_string()),
        (_, Some(r)) if r.len() > MAX_MEDIA_REF_LEN => {
            Err("media reference is too long".to_string())
        }
        (_, Some(_)) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rejects_media_ref() {
        assert!(validate_media_ref(MessageKind::Text, None).is_ok());
        assert!(validate_media_ref(MessageKind::Text, Some("file://x")).is_err());
    }

    #[test]
    fn media_requires_reference() {
        assert!(validate_media_ref(MessageKind::Image, None).is_err());
        assert!(validate_media_ref(MessageKind::Image, Some("")).is_err());
        assert!(validate_media_ref(MessageKind::Video, Some("https://cdn/x.mp4")).is_ok());
        assert!(validate_media_ref(MessageKind::Document, Some("store://doc/1")).is_ok());
    }

    #[test]
    fn overlong_reference_is_rejected() {
        let long_ref = "x".repeat(MAX_MEDIA_REF_LEN + 1);
        assert!(validate_media_ref(MessageKind::Image, Some(&long_ref)).is_err());
    }
}
