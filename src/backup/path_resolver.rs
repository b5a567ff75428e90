//! Destination key construction.
//!
//! Rebuilds a human-readable hierarchy for an attachment by walking its
//! task → entity → parent lineage in the metadata graph:
//!
//! `root/<project>/<episode>/<shots|assets/Type|_Unsorted>/<sequence>/<entity>/<task type>/<file>`
//!
//! Attachments with no task reference land under `root/LOST.FILES/<id>/`.

use tracing::warn;

use super::error::BackupError;
use super::sanitize::sanitize;
use crate::kitsu::{Attachment, MetadataClient};

/// Upper bound on the entity parent-chain ascent, purely a cycle guard for
/// malformed graph data. Real hierarchies are two or three levels deep.
const MAX_ANCESTRY_DEPTH: usize = 32;

/// Resolve the destination key for one attachment.
///
/// A missing entity (or an entity with no name) aborts resolution for this
/// attachment only, as [`BackupError::NotFound`]. Unresolvable task type or
/// project names are non-fatal and simply omit their segment.
pub async fn resolve(
    client: &dyn MetadataClient,
    attachment: &Attachment,
    root_folder: &str,
) -> Result<String, BackupError> {
    let file_name = sanitize(&attachment.name);

    let key = match attachment.task_id() {
        None => format!(
            "{}/LOST.FILES/{}/{}",
            root_folder, attachment.id, file_name
        ),
        Some(task_id) => {
            let task = client
                .get_task(task_id)
                .await
                .map_err(|e| BackupError::transfer("resolve", e))?;

            let entity = client
                .get_entity(&task.entity_id)
                .await
                .map_err(|e| BackupError::transfer("resolve", e))?;
            if entity.name.is_empty() {
                return Err(BackupError::NotFound {
                    what: "entity",
                    id: task.entity_id,
                });
            }
            let entity_segment = format!("{}/", sanitize(&entity.name));

            // The immediate parent names the sequence; anything above it
            // composes the episode position, outermost first.
            let ancestors = ancestor_names(client, &entity).await?;
            let sequence_segment = ancestors
                .first()
                .map(|name| format!("{}/", name))
                .unwrap_or_default();
            let episode_segment = ancestors
                .iter()
                .skip(1)
                .rev()
                .map(|name| format!("{}/", name))
                .collect::<String>();

            let entity_type = client
                .get_entity_type(&entity.entity_type_id)
                .await
                .map_err(|e| BackupError::transfer("resolve", e))?;
            let type_segment = if entity_type.name.is_empty() {
                "_Unsorted/".to_string()
            } else {
                let type_name = sanitize(&entity_type.name);
                // Shots get their own top-level bucket, everything else is an asset.
                if type_name == "Shot" {
                    "shots/".to_string()
                } else {
                    format!("assets/{}/", type_name)
                }
            };

            let task_type = client
                .get_task_type(&task.task_type_id)
                .await
                .map_err(|e| BackupError::transfer("resolve", e))?;
            let task_type_segment = if task_type.name.is_empty() {
                String::new()
            } else {
                format!("{}/", sanitize(&task_type.name))
            };

            let project = client
                .get_project(&task.project_id)
                .await
                .map_err(|e| BackupError::transfer("resolve", e))?;
            let project_segment = if project.name.is_empty() {
                String::new()
            } else {
                format!("{}/", sanitize(&project.name))
            };

            format!(
                "{}/{}{}{}{}{}{}{}",
                root_folder,
                project_segment,
                episode_segment,
                type_segment,
                sequence_segment,
                entity_segment,
                task_type_segment,
                file_name
            )
        }
    };

    Ok(with_created_at_suffix(&key, &attachment.created_at))
}

/// Ascend the entity parent chain, collecting sanitized ancestor names from
/// the closest parent outward. Stops when an entity has no parent.
async fn ancestor_names(
    client: &dyn MetadataClient,
    entity: &crate::kitsu::Entity,
) -> Result<Vec<String>, BackupError> {
    let mut names = Vec::new();
    let mut parent_id = entity.parent_id.clone();

    while !parent_id.is_empty() {
        if names.len() >= MAX_ANCESTRY_DEPTH {
            warn!(
                "Entity {} ancestry exceeds {} levels, truncating walk",
                entity.id, MAX_ANCESTRY_DEPTH
            );
            break;
        }
        let parent = client
            .get_entity(&parent_id)
            .await
            .map_err(|e| BackupError::transfer("resolve", e))?;
        if parent.name.is_empty() {
            break;
        }
        names.push(sanitize(&parent.name));
        parent_id = parent.parent_id;
    }

    Ok(names)
}

/// Insert `_<created_at>` (colons replaced by dashes) before the final
/// filename extension, or append it when there is none. Keeps two uploads of
/// logically different content for the same attachment id from colliding.
fn with_created_at_suffix(key: &str, created_at: &str) -> String {
    let datetime = created_at.replace(':', "-");
    let file_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = file_start + dot;
            format!("{}_{}{}", &key[..dot], datetime, &key[dot..])
        }
        _ => format!("{}_{}", key, datetime),
    }
}
