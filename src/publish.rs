//! Release publishing.
//!
//! Creates or updates the release for a tag. The release list is always
//! consulted first, so publishing the same tag twice updates the existing
//! release instead of creating a duplicate. Failures are returned with the
//! host's error detail and are not retried.

use tracing::info;

use crate::error::HeraldError;
use crate::github::{NewRelease, SourceHost};
use crate::models::{PublishOutcome, ReleaseDocument};

pub async fn publish(
    host: &dyn SourceHost,
    tag: &str,
    document: &ReleaseDocument,
) -> Result<PublishOutcome, HeraldError> {
    let fail = |source| HeraldError::Publish {
        tag: tag.to_string(),
        source,
    };

    let releases = host.list_releases().await.map_err(fail)?;
    let existing = releases
        .iter()
        .find(|r| r.tag_name == tag)
        .and_then(|r| r.id);

    let outcome = match existing {
        Some(id) => {
            host.update_release_body(id, &document.body)
                .await
                .map_err(fail)?;
            PublishOutcome::Updated { id }
        }
        None => {
            let created = host
                .create_release(&NewRelease::for_tag(tag, &document.body))
                .await
                .map_err(fail)?;
            PublishOutcome::Created {
                id: created.id.unwrap_or_default(),
            }
        }
    };

    info!(tag, id = outcome.id(), action = outcome.verb(), "published release");
    Ok(outcome)
}
