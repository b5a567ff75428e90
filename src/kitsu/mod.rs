//! Kitsu metadata API client and models.

mod client;
mod models;

pub use client::{KitsuClient, MetadataClient};
pub use models::{Attachment, AttachmentComment, Entity, EntityType, Project, Task, TaskType};
