//! Choosing which attachment renditions to keep for a post.

use crate::db::MediaKind;

use super::types::{Message, PhotoSize};

/// The thumb/full file ids picked from one message, before path lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPlan {
    pub kind: MediaKind,
    pub thumb_file_id: String,
    pub full_file_id: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

impl AttachmentPlan {
    /// Whether thumb and full point at the same provider file.
    #[must_use]
    pub fn single_file(&self) -> bool {
        self.thumb_file_id == self.full_file_id
    }
}

/// Pick the smallest and largest photo sizes by pixel area.
///
/// Ties keep the first size seen for the thumb and the last for the full
/// image, so a list of equal sizes still yields a stable pair.
#[must_use]
pub fn select_photo_variants(sizes: &[PhotoSize]) -> Option<(&PhotoSize, &PhotoSize)> {
    let mut iter = sizes.iter();
    let first = iter.next()?;
    let (mut smallest, mut largest) = (first, first);
    for size in iter {
        if size.area() < smallest.area() {
            smallest = size;
        }
        if size.area() >= largest.area() {
            largest = size;
        }
    }
    Some((smallest, largest))
}

/// Work out the media row a message should produce, if any.
#[must_use]
pub fn plan_attachment(message: &Message) -> Option<AttachmentPlan> {
    if let Some((thumb, full)) = select_photo_variants(&message.photo) {
        return Some(AttachmentPlan {
            kind: MediaKind::Photo,
            thumb_file_id: thumb.file_id.clone(),
            full_file_id: full.file_id.clone(),
            width: Some(full.width),
            height: Some(full.height),
        });
    }

    let document = message.document.as_ref().filter(|d| d.is_image())?;
    let thumb_file_id = document
        .thumbnail
        .as_ref()
        .map_or_else(|| document.file_id.clone(), |t| t.file_id.clone());

    Some(AttachmentPlan {
        kind: MediaKind::Document,
        thumb_file_id,
        full_file_id: document.file_id.clone(),
        width: None,
        height: None,
    })
}
