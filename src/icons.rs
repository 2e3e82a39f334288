//! Icon resolution for classified processes.
//!
//! Bitmap loading belongs to the rendering layer; this module only decides
//! which image a row shows and memoizes the decision per
//! (classification, bundle) pair.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::process::bundle::bundle_root;
use crate::process::{ProcessRecord, ProcessType};

/// Image handle handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IconHandle {
    /// Icon of the application bundle at this path.
    Bundle(String),
    /// Named symbol for the process type.
    Symbol(&'static str),
}

/// Maps a classified process to a displayable image.
pub trait IconResolver: Send + Sync {
    fn resolve(&self, record: &ProcessRecord) -> IconHandle;
}

/// Type-symbol fallback with a bundle-icon preference for applications.
#[derive(Debug, Default)]
pub struct CachedIconResolver {
    cache: DashMap<(ProcessType, Option<String>), IconHandle>,
}

impl CachedIconResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Resolves icons for `records` so later lookups are cache hits.
    pub fn prefetch(&self, records: &[ProcessRecord]) {
        for record in records {
            self.resolve(record);
        }
        debug!("Prefetched icons for {} processes ({} cached)", records.len(), self.len());
    }
}

impl IconResolver for CachedIconResolver {
    fn resolve(&self, record: &ProcessRecord) -> IconHandle {
        let root = record
            .is_application()
            .then(|| bundle_root(&record.executable_path).map(str::to_string))
            .flatten();
        let key = (record.process_type(), root);
        self.cache
            .entry(key.clone())
            .or_insert_with(|| match key.1 {
                Some(root) => IconHandle::Bundle(root),
                None => IconHandle::Symbol(key.0.icon_name()),
            })
            .clone()
    }
}

/// Fire-and-forget prefetch on the blocking pool.
pub fn spawn_prefetch(resolver: Arc<CachedIconResolver>, records: Vec<ProcessRecord>) {
    tokio::task::spawn_blocking(move || resolver.prefetch(&records));
}
