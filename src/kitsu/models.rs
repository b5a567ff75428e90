//! Models for the Kitsu metadata API responses.
//!
//! These types match the JSON structure returned by the Kitsu server and are
//! trimmed down to the fields the backup pipeline actually reads. Kitsu omits
//! null fields, hence the defaults.

use serde::Deserialize;

/// Comment stub embedded in an attachment listing.
///
/// `object_id` is the id of the task the comment was posted on.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentComment {
    pub object_id: String,
    pub object_type: String,
}

/// A file attached to a comment, the unit of backup.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
    pub size: u64,
    pub extension: String,
    pub mimetype: String,
    pub comment_id: String,
    pub comment: AttachmentComment,
}

impl Attachment {
    /// Whether the attachment is linked to a task through its comment.
    pub fn task_id(&self) -> Option<&str> {
        if self.comment.object_id.is_empty() {
            None
        } else {
            Some(&self.comment.object_id)
        }
    }
}

/// A work item belonging to an entity, categorized by a task type.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub task_type_id: String,
    pub entity_id: String,
}

/// A production item (shot, asset...), optionally nested under a parent
/// entity (sequence, episode).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub entity_type_id: String,
    pub parent_id: String,
}

/// Classification of an entity (e.g. Shot vs. a named asset category).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EntityType {
    pub id: String,
    pub name: String,
}

/// The workflow column a task belongs to.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TaskType {
    pub id: String,
    pub name: String,
    pub short_name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub name: String,
}
