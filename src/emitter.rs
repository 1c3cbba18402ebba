//! Materializes wrapper method references inside a module's metadata.
//!
//! Every emitted row is cached on the [`ModuleRecord`], so asking twice for the
//! same wrapper, the same wrapper assembly or the same wrapper type never
//! writes a second row.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::EmitError;
use crate::integration::{AssemblyRef, MethodReplacement, WrapperKey, WrapperSpec};
use crate::metadata::{ModuleId, ModuleMetadata, Token};

/// Per-module instrumentation state.
///
/// Built while a module loads, then frozen behind an `Arc` in the registry.
pub struct ModuleRecord {
    pub(crate) module_id: ModuleId,
    pub(crate) assembly_name: String,
    pub(crate) metadata: Arc<dyn ModuleMetadata>,
    pub(crate) replacements: Vec<MethodReplacement>,
    pub(crate) wrapper_refs: HashMap<WrapperKey, Token>,
    assembly_refs: HashMap<AssemblyRef, Token>,
    type_refs: HashMap<(Token, String), Token>,
}

impl ModuleRecord {
    pub fn new(module_id: ModuleId, assembly_name: impl Into<String>, metadata: Arc<dyn ModuleMetadata>) -> Self {
        Self {
            module_id,
            assembly_name: assembly_name.into(),
            metadata,
            replacements: Vec::new(),
            wrapper_refs: HashMap::new(),
            assembly_refs: HashMap::new(),
            type_refs: HashMap::new(),
        }
    }

    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    pub fn metadata(&self) -> &dyn ModuleMetadata {
        self.metadata.as_ref()
    }

    /// Replacements enabled for this module, in catalog order.
    pub fn replacements(&self) -> &[MethodReplacement] {
        &self.replacements
    }

    /// Cached member reference for `wrapper`, if it was emitted.
    pub fn wrapper_ref(&self, wrapper: &WrapperSpec) -> Option<Token> {
        self.wrapper_refs.get(wrapper.cache_key()).copied()
    }

    /// Appends `replacement` to the enabled set. Compilations skip it while
    /// its wrapper has no cached reference.
    pub fn enable(&mut self, replacement: MethodReplacement) {
        self.replacements.push(replacement);
    }

    pub fn wrapper_ref_count(&self) -> usize {
        self.wrapper_refs.len()
    }

    /// Returns the member reference for `wrapper`, emitting it on first use.
    pub fn emit_or_get(&mut self, wrapper: &WrapperSpec) -> Result<Token, EmitError> {
        if let Some(token) = self.wrapper_refs.get(wrapper.cache_key()) {
            return Ok(*token);
        }

        let assembly_ref = self.assembly_ref(wrapper.assembly())?;
        let type_ref = self.type_ref(assembly_ref, wrapper.type_name())?;
        let member_ref = self
            .metadata
            .define_member_ref(type_ref, wrapper.method_name(), wrapper.signature())
            .map_err(|source| EmitError::MemberRef {
                type_name: wrapper.type_name().to_owned(),
                method: wrapper.method_name().to_owned(),
                source,
            })?;

        debug!(
            module = %self.module_id,
            wrapper = %wrapper.cache_key(),
            token = %member_ref,
            "emitted wrapper member reference"
        );
        self.wrapper_refs.insert(wrapper.cache_key().clone(), member_ref);
        Ok(member_ref)
    }

    fn assembly_ref(&mut self, assembly: &AssemblyRef) -> Result<Token, EmitError> {
        if let Some(token) = self.assembly_refs.get(assembly) {
            return Ok(*token);
        }
        let token = self
            .metadata
            .define_assembly_ref(assembly)
            .map_err(|source| EmitError::AssemblyRef {
                assembly: assembly.to_string(),
                source,
            })?;
        self.assembly_refs.insert(assembly.clone(), token);
        Ok(token)
    }

    fn type_ref(&mut self, scope: Token, type_name: &str) -> Result<Token, EmitError> {
        let key = (scope, type_name.to_owned());
        if let Some(token) = self.type_refs.get(&key) {
            return Ok(*token);
        }
        let token = self
            .metadata
            .define_type_ref(scope, type_name)
            .map_err(|source| EmitError::TypeRef {
                type_name: type_name.to_owned(),
                source,
            })?;
        self.type_refs.insert(key, token);
        Ok(token)
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("module_id", &self.module_id)
            .field("assembly_name", &self.assembly_name)
            .field("replacements", &self.replacements.len())
            .field("wrapper_refs", &self.wrapper_refs)
            .finish_non_exhaustive()
    }
}
