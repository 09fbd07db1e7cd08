pub mod lifecycle;
pub mod model;
pub mod version;

use crate::error::PublisherResult;
use crate::storage::PublisherStore;

use model::{ContentRelease, ReleaseStatus};

/// The live release of a site, if any.
pub async fn live_release<S: PublisherStore>(
    store: &S,
    site_code: &str,
) -> PublisherResult<Option<ContentRelease>> {
    Ok(store
        .list_releases(site_code)
        .await?
        .into_iter()
        .find(|release| release.is_live()))
}

/// The staged release of a site. When several are staged (scheduled go-lives), an
/// unscheduled one wins, then the earliest scheduled.
pub async fn stage_release<S: PublisherStore>(
    store: &S,
    site_code: &str,
) -> PublisherResult<Option<ContentRelease>> {
    Ok(store
        .list_releases(site_code)
        .await?
        .into_iter()
        .filter(|release| release.status == ReleaseStatus::Staged)
        .min_by_key(|release| {
            (
                release.publish_datetime.is_some(),
                release.publish_datetime,
                release.created_at,
            )
        }))
}
