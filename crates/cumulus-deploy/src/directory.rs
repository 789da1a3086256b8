// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Index of existing platform objects in the target folder.
//!
//! Populated by one `find_objects_by_property` query per compilation
//! (folder-scoped, or project-wide when reuse is extended) and cached in
//! memory for the rest of the run. The planner is the only owner; cache
//! mutation happens from its single code path.

use crate::digest::CHECKSUM_PROPERTY;
use crate::platform::{ObjectClass, ObjectDescriptor, ObjectId, PlatformApi, Result, with_retries};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One known platform object under a compiled name.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// Object name.
    pub name: String,
    /// Platform object ID.
    pub id: ObjectId,
    /// The digest recorded on the object, when present.
    pub digest: Option<String>,
    /// Creation timestamp, for most-recent preference.
    pub created: DateTime<Utc>,
    /// Folder the object lives in.
    pub folder: String,
    /// Applet or workflow.
    pub class: ObjectClass,
}

impl ObjectRecord {
    fn from_descriptor(descriptor: &ObjectDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            id: descriptor.id.clone(),
            digest: descriptor.properties.get(CHECKSUM_PROPERTY).cloned(),
            created: descriptor.created,
            folder: descriptor.folder.clone(),
            class: descriptor.class,
        }
    }
}

/// The in-memory index of compiled objects in the target folder.
pub struct ObjectDirectory {
    platform: Arc<dyn PlatformApi>,
    project: String,
    folder: String,
    project_wide: bool,
    entries: HashMap<String, Vec<ObjectRecord>>,
    populated: bool,
}

impl ObjectDirectory {
    /// Create an unpopulated directory over the target folder.
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        project: impl Into<String>,
        folder: impl Into<String>,
        project_wide: bool,
    ) -> Self {
        Self {
            platform,
            project: project.into(),
            folder: folder.into(),
            project_wide,
            entries: HashMap::new(),
            populated: false,
        }
    }

    /// Run the population query once; later calls are no-ops.
    pub async fn ensure_populated(&mut self) -> Result<()> {
        if self.populated {
            return Ok(());
        }
        let folder = if self.project_wide {
            None
        } else {
            Some(self.folder.as_str())
        };
        let platform = self.platform.clone();
        let project = self.project.clone();
        let descriptors = with_retries("find-objects", || {
            let platform = platform.clone();
            let project = project.clone();
            async move {
                platform
                    .find_objects_by_property(&project, folder, CHECKSUM_PROPERTY)
                    .await
            }
        })
        .await?;

        for descriptor in &descriptors {
            self.entries
                .entry(descriptor.name.clone())
                .or_default()
                .push(ObjectRecord::from_descriptor(descriptor));
        }
        self.populated = true;
        info!(
            project = %self.project,
            folder = %self.folder,
            project_wide = self.project_wide,
            objects = descriptors.len(),
            "populated object directory"
        );
        Ok(())
    }

    /// The record to reuse for `name` at `digest`, if any: an exact digest
    /// match is preferred, the most recently created wins among several.
    pub fn lookup_in_project(&self, name: &str, digest: &str) -> Option<&ObjectRecord> {
        self.entries
            .get(name)?
            .iter()
            .filter(|record| record.digest.as_deref() == Some(digest))
            .max_by_key(|record| record.created)
    }

    /// Every known record under `name`, regardless of digest.
    pub fn lookup(&self, name: &str) -> &[ObjectRecord] {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Archive the given records on the platform and drop them from the
    /// cache.
    pub async fn archive(&mut self, records: &[ObjectRecord]) -> Result<()> {
        let ids: Vec<ObjectId> = records.iter().map(|record| record.id.clone()).collect();
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "archiving stale executables");
        let platform = self.platform.clone();
        let project = self.project.clone();
        with_retries("archive", || {
            let platform = platform.clone();
            let project = project.clone();
            let ids = ids.clone();
            async move { platform.archive(&project, &ids).await }
        })
        .await?;
        self.forget(&ids);
        Ok(())
    }

    /// Remove the given records on the platform and drop them from the
    /// cache.
    pub async fn remove(&mut self, records: &[ObjectRecord]) -> Result<()> {
        let ids: Vec<ObjectId> = records.iter().map(|record| record.id.clone()).collect();
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "removing stale executables");
        let platform = self.platform.clone();
        let project = self.project.clone();
        with_retries("remove", || {
            let platform = platform.clone();
            let project = project.clone();
            let ids = ids.clone();
            async move { platform.remove(&project, &ids).await }
        })
        .await?;
        self.forget(&ids);
        Ok(())
    }

    /// Record a freshly built object.
    pub fn insert(&mut self, name: &str, id: ObjectId, digest: &str, class: ObjectClass) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .push(ObjectRecord {
                name: name.to_string(),
                id,
                digest: Some(digest.to_string()),
                created: Utc::now(),
                folder: self.folder.clone(),
                class,
            });
    }

    fn forget(&mut self, ids: &[ObjectId]) {
        for records in self.entries.values_mut() {
            records.retain(|record| !ids.contains(&record.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;
    use chrono::TimeZone;

    fn descriptor(
        id: &str,
        name: &str,
        folder: &str,
        digest: Option<&str>,
        created: DateTime<Utc>,
    ) -> ObjectDescriptor {
        let mut properties = HashMap::new();
        if let Some(digest) = digest {
            properties.insert(CHECKSUM_PROPERTY.to_string(), digest.to_string());
        }
        ObjectDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            class: ObjectClass::Applet,
            folder: folder.to_string(),
            created,
            properties,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_populate_indexes_by_name() {
        let platform = Arc::new(MockPlatform::new());
        platform
            .seed(descriptor("applet-1", "align", "/apps", Some("d1"), at(1)))
            .await;
        platform
            .seed(descriptor("applet-2", "align", "/apps", Some("d2"), at(2)))
            .await;

        let mut directory = ObjectDirectory::new(platform, "project-1", "/apps", false);
        directory.ensure_populated().await.unwrap();
        assert_eq!(directory.lookup("align").len(), 2);
        assert!(directory.lookup("missing").is_empty());
    }

    #[tokio::test]
    async fn test_folder_scoping_and_project_wide() {
        let platform = Arc::new(MockPlatform::new());
        platform
            .seed(descriptor("applet-1", "align", "/apps", Some("d1"), at(1)))
            .await;
        platform
            .seed(descriptor("applet-2", "align", "/other", Some("d1"), at(2)))
            .await;

        let mut scoped = ObjectDirectory::new(platform.clone(), "project-1", "/apps", false);
        scoped.ensure_populated().await.unwrap();
        assert_eq!(scoped.lookup("align").len(), 1);

        let mut wide = ObjectDirectory::new(platform, "project-1", "/apps", true);
        wide.ensure_populated().await.unwrap();
        assert_eq!(wide.lookup("align").len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_prefers_exact_digest_then_most_recent() {
        let platform = Arc::new(MockPlatform::new());
        platform
            .seed(descriptor("applet-1", "align", "/apps", Some("d1"), at(1)))
            .await;
        platform
            .seed(descriptor("applet-2", "align", "/apps", Some("d1"), at(3)))
            .await;
        platform
            .seed(descriptor("applet-3", "align", "/apps", Some("d2"), at(2)))
            .await;

        let mut directory = ObjectDirectory::new(platform, "project-1", "/apps", false);
        directory.ensure_populated().await.unwrap();

        let record = directory.lookup_in_project("align", "d1").unwrap();
        assert_eq!(record.id, "applet-2");
        assert!(directory.lookup_in_project("align", "d9").is_none());
    }

    #[tokio::test]
    async fn test_insert_makes_later_lookups_hit() {
        let platform = Arc::new(MockPlatform::new());
        let mut directory = ObjectDirectory::new(platform, "project-1", "/apps", false);
        directory.ensure_populated().await.unwrap();

        directory.insert("align", "applet-9".to_string(), "d1", ObjectClass::Applet);
        assert_eq!(
            directory.lookup_in_project("align", "d1").unwrap().id,
            "applet-9"
        );
    }

    #[tokio::test]
    async fn test_archive_drops_from_cache() {
        let platform = Arc::new(MockPlatform::new());
        platform
            .seed(descriptor("applet-1", "align", "/apps", Some("d1"), at(1)))
            .await;
        let mut directory = ObjectDirectory::new(platform.clone(), "project-1", "/apps", false);
        directory.ensure_populated().await.unwrap();

        let stale: Vec<ObjectRecord> = directory.lookup("align").to_vec();
        directory.archive(&stale).await.unwrap();
        assert!(directory.lookup("align").is_empty());
        assert_eq!(platform.live_count().await, 0);
    }
}
