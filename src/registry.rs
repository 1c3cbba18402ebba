//! Process-wide module table.
//!
//! Records are published as `Arc<ModuleRecord>`. A compilation that looked up
//! a record keeps it alive even if the module is unloaded mid-compilation;
//! the unload only removes the table entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::emitter::ModuleRecord;
use crate::error::EmitError;
use crate::integration::Integration;
use crate::metadata::{ModuleFlags, ModuleId, ModuleMetadata};

/// A module-load notification from the host.
pub struct ModuleLoad {
    pub module_id: ModuleId,
    pub assembly_name: String,
    pub flags: ModuleFlags,
    /// Metadata opened with `ofRead | ofWrite`.
    pub metadata: Arc<dyn ModuleMetadata>,
}

/// What happened to a module on load.
#[derive(Debug)]
pub enum ModuleLoadOutcome {
    /// Windows Runtime or otherwise read-only metadata.
    Unsupported,
    /// No replacement applies to this assembly.
    NoMatchingRules,
    /// Every applicable replacement failed to emit its wrapper reference.
    AllRulesFailed { errors: Vec<EmitError> },
    Tracked {
        enabled: usize,
        /// Replacements dropped because their wrapper could not be emitted.
        dropped: Vec<EmitError>,
    },
}

impl ModuleLoadOutcome {
    pub fn is_tracked(&self) -> bool {
        matches!(self, ModuleLoadOutcome::Tracked { .. })
    }
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<ModuleId, Arc<ModuleRecord>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters `catalog` for the loaded module, emits wrapper references and
    /// publishes the record. Failures are per replacement.
    pub fn module_loaded(&self, catalog: &[Integration], load: ModuleLoad) -> ModuleLoadOutcome {
        let ModuleLoad {
            module_id,
            assembly_name,
            flags,
            metadata,
        } = load;

        if !flags.is_instrumentable() {
            debug!(module = %module_id, assembly = %assembly_name, flags = flags.0, "skipping non-instrumentable module");
            return ModuleLoadOutcome::Unsupported;
        }

        let candidates: Vec<_> = catalog
            .iter()
            .flat_map(|integration| integration.method_replacements.iter())
            .filter(|replacement| replacement.caller.matches_assembly(&assembly_name))
            .collect();

        if candidates.is_empty() {
            return ModuleLoadOutcome::NoMatchingRules;
        }

        info!(
            module = %module_id,
            assembly = %assembly_name,
            candidates = candidates.len(),
            "emitting instrumentation metadata"
        );

        let mut record = ModuleRecord::new(module_id, assembly_name, metadata);
        let mut dropped = Vec::new();
        for replacement in candidates {
            match record.emit_or_get(&replacement.wrapper) {
                Ok(_) => record.enable(replacement.clone()),
                Err(err) => {
                    warn!(module = %module_id, wrapper = %replacement.wrapper.cache_key(), error = %err, "dropping replacement");
                    dropped.push(err);
                }
            }
        }

        if record.replacements.is_empty() {
            return ModuleLoadOutcome::AllRulesFailed { errors: dropped };
        }

        let enabled = record.replacements.len();
        if self.insert(record).is_some() {
            debug!(module = %module_id, "replaced existing module record");
        }
        ModuleLoadOutcome::Tracked { enabled, dropped }
    }

    /// Forgets a module. Returns the removed record, if it was tracked.
    pub fn module_unloaded(&self, module_id: ModuleId) -> Option<Arc<ModuleRecord>> {
        let removed = self.modules.write().remove(&module_id);
        if removed.is_some() {
            debug!(module = %module_id, "released module record");
        }
        removed
    }

    pub fn insert(&self, record: ModuleRecord) -> Option<Arc<ModuleRecord>> {
        self.modules.write().insert(record.module_id(), Arc::new(record))
    }

    pub fn get(&self, module_id: ModuleId) -> Option<Arc<ModuleRecord>> {
        self.modules.read().get(&module_id).cloned()
    }

    pub fn contains(&self, module_id: ModuleId) -> bool {
        self.modules.read().contains_key(&module_id)
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Drops every record (process detach).
    pub fn clear(&self) {
        self.modules.write().clear();
    }
}
