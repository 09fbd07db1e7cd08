//! `MAJOR.MINOR` release versions.
//!
//! A release is versioned when it first leaves draft, relative to the releases of its
//! site scheduled at or before it. Out-of-order scheduling can produce duplicates;
//! [`fix_version_conflicts`] reflows every version from the smallest duplicate upward.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use super::model::ContentRelease;

/// Ordered numerically, so `1.10 > 1.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version must look like MAJOR.MINOR, got {0:?}")]
    Malformed(String),
    #[error("version component {0:?} is not a number")]
    NotANumber(String),
}

impl Version {
    pub const ZERO: Version = Version { major: 0, minor: 0 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Increment the component at `index` and zero every component after it.
    pub fn bump(self, index: usize) -> Self {
        let mut parts = [self.major, self.minor];
        for (i, part) in parts.iter_mut().enumerate() {
            if i == index {
                *part += 1;
            } else if i > index {
                *part = 0;
            }
        }
        Version::new(parts[0], parts[1])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| VersionParseError::Malformed(s.to_string()))?;
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| VersionParseError::NotANumber(part.to_string()))
        };
        Ok(Version::new(parse(major)?, parse(minor)?))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the version `release` would get among `site_releases`.
///
/// Candidates are the other non-draft, versioned releases of the site. A scheduled
/// release only looks at releases scheduled at or before its own `publish_datetime`.
pub fn next_version(release: &ContentRelease, site_releases: &[ContentRelease]) -> Version {
    let previous = site_releases
        .iter()
        .filter(|other| other.uuid != release.uuid)
        .filter(|other| other.site_code == release.site_code && !other.is_draft())
        .filter(|other| match release.publish_datetime {
            Some(at) => other.publish_datetime.is_some_and(|theirs| theirs <= at),
            None => true,
        })
        .filter_map(|other| other.version)
        .max()
        .unwrap_or(Version::ZERO);

    previous.bump(release.version_type.index())
}

/// Assign a version to a release leaving draft. Returns the new version, or `None` when
/// the release is still a draft or was already versioned.
pub fn assign_version(
    release: &mut ContentRelease,
    site_releases: &[ContentRelease],
) -> Option<Version> {
    if release.version.is_some() || release.is_draft() {
        return None;
    }
    let version = next_version(release, site_releases);
    release.version = Some(version);
    Some(version)
}

/// Detect duplicate versions among the non-draft releases of one site and reflow them.
///
/// Every non-draft release at or above the smallest duplicated version is reset and
/// re-assigned in ascending `publish_datetime` order. Releases without a
/// `publish_datetime` are left out of that ordering and re-assigned afterwards, in their
/// previous version order, against the full set.
///
/// A reflow can land a dated release on the version of an undated one below the floor,
/// so the pass repeats until no duplicate is left. When that does not settle within one
/// pass per release, every versioned release is reflowed at once, which always yields
/// distinct versions.
///
/// Returns the uuids of releases whose version changed. Not safe to run concurrently
/// for the same site.
pub fn fix_version_conflicts(site_releases: &mut [ContentRelease]) -> Vec<Uuid> {
    let previous: Vec<Option<Version>> = site_releases.iter().map(|r| r.version).collect();

    let mut passes = 0;
    while let Some(min_conflict) = smallest_duplicate(site_releases) {
        if passes < site_releases.len() {
            reflow(site_releases, Some(min_conflict));
            passes += 1;
        } else {
            reflow(site_releases, None);
            break;
        }
    }

    site_releases
        .iter()
        .zip(previous)
        .filter(|(release, before)| release.version != *before)
        .map(|(release, _)| release.uuid)
        .collect()
}

fn smallest_duplicate(site_releases: &[ContentRelease]) -> Option<Version> {
    let mut counts: BTreeMap<Version, usize> = BTreeMap::new();
    for release in site_releases.iter().filter(|r| !r.is_draft()) {
        if let Some(version) = release.version {
            *counts.entry(version).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .find(|(_, count)| *count > 1)
        .map(|(version, _)| version)
}

/// Reassign every non-draft version at or above `floor`, or all of them without one.
fn reflow(site_releases: &mut [ContentRelease], floor: Option<Version>) {
    let affected: Vec<usize> = site_releases
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            !r.is_draft() && r.version.is_some_and(|v| floor.is_none_or(|floor| v >= floor))
        })
        .map(|(i, _)| i)
        .collect();

    let mut dated: Vec<usize> = affected
        .iter()
        .copied()
        .filter(|&i| site_releases[i].publish_datetime.is_some())
        .collect();
    dated.sort_by_key(|&i| (site_releases[i].publish_datetime, site_releases[i].created_at));

    let mut undated: Vec<usize> = affected
        .iter()
        .copied()
        .filter(|&i| site_releases[i].publish_datetime.is_none())
        .collect();
    undated.sort_by_key(|&i| (site_releases[i].version, site_releases[i].created_at));

    for &i in &affected {
        site_releases[i].version = None;
    }

    for i in dated.into_iter().chain(undated) {
        let version = next_version(&site_releases[i], site_releases);
        site_releases[i].version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::release::model::{NewRelease, ReleaseStatus, VersionType};

    fn staged(version_type: VersionType, days_ago: Option<i64>) -> ContentRelease {
        let now = Utc::now();
        let mut release = NewRelease::new("s1", "r")
            .version_type(version_type)
            .into_release(now);
        release.status = ReleaseStatus::Staged;
        release.publish_datetime = days_ago.map(|d| now - Duration::days(d));
        release
    }

    #[test]
    fn parses_and_orders_numerically() {
        let nine: Version = "1.9".parse().unwrap();
        let ten: Version = "1.10".parse().unwrap();
        assert!(ten > nine);
        assert_eq!(ten.to_string(), "1.10");
        assert!("1".parse::<Version>().is_err());
        assert_eq!(
            "1.x".parse::<Version>(),
            Err(VersionParseError::NotANumber("x".into()))
        );
    }

    #[test]
    fn bump_zeroes_trailing_components() {
        assert_eq!(Version::new(1, 4).bump(0), Version::new(2, 0));
        assert_eq!(Version::new(1, 4).bump(1), Version::new(1, 5));
    }

    #[test]
    fn first_release_starts_from_zero() {
        let mut major = staged(VersionType::Major, None);
        assert_eq!(assign_version(&mut major, &[]), Some(Version::new(1, 0)));

        let mut minor = staged(VersionType::Minor, None);
        assert_eq!(assign_version(&mut minor, &[]), Some(Version::new(0, 1)));
    }

    #[test]
    fn drafts_and_versioned_releases_are_untouched() {
        let mut draft = NewRelease::new("s1", "d").into_release(Utc::now());
        assert_eq!(assign_version(&mut draft, &[]), None);
        assert_eq!(draft.version, None);

        let mut versioned = staged(VersionType::Major, None);
        versioned.version = Some(Version::new(3, 1));
        assert_eq!(assign_version(&mut versioned, &[]), None);
        assert_eq!(versioned.version, Some(Version::new(3, 1)));
    }

    #[test]
    fn scheduled_release_ignores_later_releases() {
        let mut later = staged(VersionType::Major, Some(1));
        later.version = Some(Version::new(5, 0));
        let mut earlier = staged(VersionType::Minor, Some(3));

        assign_version(&mut earlier, std::slice::from_ref(&later));
        assert_eq!(earlier.version, Some(Version::new(0, 1)));
    }

    #[test]
    fn versions_compare_numerically_not_lexically() {
        let mut nine = staged(VersionType::Minor, None);
        nine.version = Some(Version::new(0, 9));
        let mut ten = staged(VersionType::Minor, None);
        ten.version = Some(Version::new(0, 10));
        let mut next = staged(VersionType::Minor, None);

        assign_version(&mut next, &[nine, ten]);
        assert_eq!(next.version, Some(Version::new(0, 11)));
    }

    #[test]
    fn out_of_order_major_reflows_later_releases() {
        let mut releases = Vec::new();

        let mut r_major = staged(VersionType::Major, Some(10));
        assign_version(&mut r_major, &releases);
        releases.push(r_major);

        let mut r_minor = staged(VersionType::Minor, Some(5));
        assign_version(&mut r_minor, &releases);
        releases.push(r_minor);

        assert_eq!(releases[0].version, Some(Version::new(1, 0)));
        assert_eq!(releases[1].version, Some(Version::new(1, 1)));

        let mut r_early = staged(VersionType::Major, Some(11));
        assign_version(&mut r_early, &releases);
        assert_eq!(r_early.version, Some(Version::new(1, 0)));
        releases.push(r_early);

        let changed = fix_version_conflicts(&mut releases);
        assert_eq!(changed.len(), 2);
        assert_eq!(releases[2].version, Some(Version::new(1, 0)));
        assert_eq!(releases[0].version, Some(Version::new(2, 0)));
        assert_eq!(releases[1].version, Some(Version::new(2, 1)));
    }

    #[test]
    fn no_conflict_is_a_noop() {
        let mut a = staged(VersionType::Major, Some(2));
        a.version = Some(Version::new(1, 0));
        let mut b = staged(VersionType::Minor, Some(1));
        b.version = Some(Version::new(1, 1));
        let mut releases = vec![a, b];
        assert!(fix_version_conflicts(&mut releases).is_empty());
    }

    #[test]
    fn undated_duplicates_are_placed_after_dated_ones() {
        let mut dated = staged(VersionType::Minor, Some(1));
        dated.version = Some(Version::new(0, 1));
        let mut undated = staged(VersionType::Minor, None);
        undated.version = Some(Version::new(0, 1));
        let mut releases = vec![undated, dated];

        fix_version_conflicts(&mut releases);
        assert_eq!(releases[1].version, Some(Version::new(0, 1)));
        assert_eq!(releases[0].version, Some(Version::new(0, 2)));
    }

    #[test]
    fn reflow_repeats_until_undated_duplicates_are_gone() {
        let mut releases = Vec::new();

        let mut x = staged(VersionType::Major, Some(-1));
        assign_version(&mut x, &releases);
        releases.push(x);

        let mut u = staged(VersionType::Minor, None);
        assign_version(&mut u, &releases);
        releases.push(u);

        for days_ahead in [5, 6] {
            let mut pinned = staged(VersionType::Minor, Some(-days_ahead));
            pinned.version = Some(Version::new(2, 0));
            releases.push(pinned);
        }
        assert_eq!(releases[1].version, Some(Version::new(1, 1)));

        let changed = fix_version_conflicts(&mut releases);
        assert_eq!(changed.len(), 3);

        let versions: Vec<_> = releases.iter().map(|r| r.version.unwrap()).collect();
        assert_eq!(
            versions,
            vec![
                Version::new(1, 0),
                Version::new(1, 3),
                Version::new(1, 1),
                Version::new(1, 2),
            ]
        );
        assert!(smallest_duplicate(&releases).is_none());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_value(Version::new(2, 1)).unwrap();
        assert_eq!(json, "2.1");
        let back: Version = serde_json::from_value(json).unwrap();
        assert_eq!(back, Version::new(2, 1));
    }
}
