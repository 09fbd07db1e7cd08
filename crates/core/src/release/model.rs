use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::version::Version;

/// Release status. Stored as its numeric discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Draft = 0,
    Staged = 1,
    Live = 2,
    Archived = 3,
}

impl ReleaseStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(ReleaseStatus::Draft),
            1 => Some(ReleaseStatus::Staged),
            2 => Some(ReleaseStatus::Live),
            3 => Some(ReleaseStatus::Archived),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReleaseStatus::Draft => "Draft",
            ReleaseStatus::Staged => "Staged",
            ReleaseStatus::Live => "Live",
            ReleaseStatus::Archived => "Archived",
        }
    }

    /// Any status other than draft is "frozen".
    pub fn is_frozen(self) -> bool {
        self != ReleaseStatus::Draft
    }
}

/// Which component of `MAJOR.MINOR` a release increments when it is versioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionType {
    Major = 0,
    #[default]
    Minor = 1,
}

impl VersionType {
    /// Index of the component to increment.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(VersionType::Major),
            1 => Some(VersionType::Minor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRelease {
    pub uuid: Uuid,
    pub site_code: String,
    pub title: String,
    pub version: Option<Version>,
    pub version_type: VersionType,
    pub status: ReleaseStatus,
    pub publish_datetime: Option<DateTime<Utc>>,
    /// Lineage fallback. Lookup only, resolved one hop at read time.
    pub base_release: Option<Uuid>,
    pub use_current_live_as_base_release: bool,
    pub restored: bool,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRelease {
    pub fn is_live(&self) -> bool {
        self.status == ReleaseStatus::Live
    }

    pub fn is_draft(&self) -> bool {
        self.status == ReleaseStatus::Draft
    }

    /// A staged release with a go-live time is waiting to be settled.
    pub fn is_scheduled(&self) -> bool {
        self.status == ReleaseStatus::Staged && self.publish_datetime.is_some()
    }
}

impl fmt::Display for ContentRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "[[{}]] {} - {}__{}",
            self.site_code,
            version,
            self.title,
            self.status.label()
        )
    }
}

/// Input for creating a release. Releases always start in draft.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRelease {
    pub site_code: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub version_type: VersionType,
    #[serde(default)]
    pub base_release: Option<Uuid>,
    #[serde(default)]
    pub use_current_live_as_base_release: bool,
    #[serde(default)]
    pub author: Option<String>,
}

impl NewRelease {
    pub fn new(site_code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            site_code: site_code.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn version_type(mut self, version_type: VersionType) -> Self {
        self.version_type = version_type;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn base_release(mut self, base: Uuid) -> Self {
        self.base_release = Some(base);
        self
    }

    pub fn use_current_live(mut self) -> Self {
        self.use_current_live_as_base_release = true;
        self
    }

    pub fn into_release(self, now: DateTime<Utc>) -> ContentRelease {
        ContentRelease {
            uuid: Uuid::new_v4(),
            site_code: self.site_code,
            title: self.title,
            version: self.version,
            version_type: self.version_type,
            status: ReleaseStatus::Draft,
            publish_datetime: None,
            base_release: self.base_release,
            use_current_live_as_base_release: self.use_current_live_as_base_release,
            restored: false,
            author: self.author,
            publisher: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_discriminant() {
        for status in [
            ReleaseStatus::Draft,
            ReleaseStatus::Staged,
            ReleaseStatus::Live,
            ReleaseStatus::Archived,
        ] {
            assert_eq!(ReleaseStatus::from_i16(status.as_i16()), Some(status));
        }
        assert_eq!(ReleaseStatus::from_i16(7), None);
    }

    #[test]
    fn display_matches_admin_listing() {
        let mut release = NewRelease::new("s1", "Spring").into_release(Utc::now());
        assert_eq!(release.to_string(), "[[s1]] None - Spring__Draft");

        release.version = Some(Version::new(1, 2));
        release.status = ReleaseStatus::Live;
        assert_eq!(release.to_string(), "[[s1]] 1.2 - Spring__Live");
    }

    #[test]
    fn new_release_defaults_to_minor_draft() {
        let release = NewRelease::new("s1", "t").into_release(Utc::now());
        assert_eq!(release.version_type, VersionType::Minor);
        assert!(release.is_draft());
        assert!(!release.restored);
    }
}
