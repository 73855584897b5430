use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Workspaces keyed by slug. A workspace's slug doubles as its vector namespace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceStore {
    inner: Arc<RwLock<BTreeMap<String, Workspace>>>,
}

impl WorkspaceStore {
    pub async fn create(&self, name: &str) -> Workspace {
        let base = slugify(name);
        let mut map = self.inner.write().await;

        let mut slug = base.clone();
        let mut n = 2;
        while map.contains_key(&slug) {
            slug = format!("{base}-{n}");
            n += 1;
        }

        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            slug: slug.clone(),
            created_at: Utc::now(),
        };
        map.insert(slug, workspace.clone());
        workspace
    }

    pub async fn get(&self, slug: &str) -> Option<Workspace> {
        self.inner.read().await.get(slug).cloned()
    }

    pub async fn list(&self) -> Vec<Workspace> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, slug: &str) -> Option<Workspace> {
        self.inner.write().await.remove(slug)
    }
}

/// Lowercase ASCII alphanumerics, every other run of characters collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "workspace".to_string()
    } else {
        slug
    }
}
