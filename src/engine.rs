//! The instrumentation engine: one explicit context object per attached
//! process, built at attach time and torn down at detach.
//!
//! The typed entry points (`on_*`) return structured outcomes for hosts and
//! tests. The [`Profiler`] implementation wraps them for the callback
//! boundary: it logs, maps failures to HRESULTs, and never lets a failure
//! escape into the host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{ConfigError, Error};
use crate::il::{FunctionBody, MethodBody};
use crate::integration::{Integration, WrapperKey};
use crate::metadata::{ModuleId, Token};
use crate::registry::{ModuleLoad, ModuleLoadOutcome, ModuleRegistry};
use crate::resolver::{self, NameBuffers};
use crate::rewriter;
use crate::sys::cor::{self, HRESULT};
use crate::Profiler;

/// Why a compilation left the method unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoChangeReason {
    /// The module was never tracked, or has been unloaded.
    ModuleNotTracked,
    /// No enabled replacement's caller pattern matches the method.
    NoMatchingCaller,
    /// Matching replacements found no call site to redirect.
    NoMatchingCallSite,
}

/// Result of one compilation-started event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationOutcome {
    NoChange(NoChangeReason),
    Committed {
        /// Index into the module's enabled replacements.
        replacement: usize,
        wrapper: WrapperKey,
        call_sites: usize,
    },
}

impl CompilationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CompilationOutcome::Committed { .. })
    }
}

pub struct InstrumentationEngine {
    config: AgentConfig,
    integrations: Arc<[Integration]>,
    registry: ModuleRegistry,
    attached: AtomicBool,
}

impl InstrumentationEngine {
    pub fn new(integrations: Vec<Integration>, config: AgentConfig) -> Self {
        Self {
            config,
            integrations: integrations.into(),
            registry: ModuleRegistry::new(),
            attached: AtomicBool::new(false),
        }
    }

    /// Reads the environment and loads the configured integration files.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = AgentConfig::from_env();
        let integrations = config.load_integrations()?;
        Ok(Self::new(integrations, config))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn integrations(&self) -> &[Integration] {
        &self.integrations
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Attaches if the process passes the configured filter.
    pub fn attach(&self, process_name: &str) -> bool {
        if !self.config.should_attach(process_name) {
            info!(
                process = process_name,
                allowed = ?self.config.processes,
                "profiler disabled: process name is not in the allowed list"
            );
            return false;
        }
        self.attached.store(true, Ordering::Release);
        info!(
            process = process_name,
            integrations = self.integrations.len(),
            "profiler attached"
        );
        true
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        self.registry.clear();
    }

    pub fn on_module_load(&self, load: ModuleLoad) -> ModuleLoadOutcome {
        self.registry.module_loaded(&self.integrations, load)
    }

    /// Returns whether the module had been tracked.
    pub fn on_module_unload(&self, module_id: ModuleId) -> bool {
        self.registry.module_unloaded(module_id).is_some()
    }

    /// Runs the rewrite state machine for one method compilation.
    ///
    /// Replacements are tried in catalog order and the first one that
    /// redirects at least one call site is committed; later replacements are
    /// not applied in the same compilation.
    pub fn on_compilation_started(
        &self,
        module_id: ModuleId,
        function: Token,
        body: &mut dyn FunctionBody,
    ) -> Result<CompilationOutcome, Error> {
        let Some(record) = self.registry.get(module_id) else {
            return Ok(CompilationOutcome::NoChange(NoChangeReason::ModuleNotTracked));
        };
        let import = record.metadata();

        let mut buffers = NameBuffers::with_capacity(256);
        let (caller_type, caller_method) = resolver::resolve_method_def(import, function, &mut buffers)?;

        let candidates: Vec<_> = record
            .replacements()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.caller.matches(record.assembly_name(), &caller_type, &caller_method))
            .collect();
        if candidates.is_empty() {
            return Ok(CompilationOutcome::NoChange(NoChangeReason::NoMatchingCaller));
        }

        // Decoded once; a pass that rewrites nothing leaves it unchanged for
        // the next replacement.
        let mut method_body = MethodBody::decode(body.il_bytes()?)?;

        for (index, replacement) in candidates {
            let Some(wrapper_ref) = record.wrapper_ref(&replacement.wrapper) else {
                warn!(
                    module = %module_id,
                    wrapper = %replacement.wrapper.cache_key(),
                    "no cached wrapper reference, skipping replacement"
                );
                continue;
            };

            let call_sites =
                rewriter::rewrite_call_sites(&mut method_body, import, &replacement.target, wrapper_ref, &mut buffers)?;
            if call_sites == 0 {
                continue;
            }

            body.set_il_bytes(method_body.encode()?)?;
            info!(
                module = %module_id,
                caller_type = %caller_type,
                caller_method = %caller_method,
                wrapper = %replacement.wrapper.cache_key(),
                call_sites,
                "rewrote method"
            );
            return Ok(CompilationOutcome::Committed {
                replacement: index,
                wrapper: replacement.wrapper.cache_key().clone(),
                call_sites,
            });
        }

        Ok(CompilationOutcome::NoChange(NoChangeReason::NoMatchingCallSite))
    }
}

impl Profiler for InstrumentationEngine {
    fn initialize(&self, process_name: &str) -> HRESULT {
        if self.attach(process_name) {
            cor::S_OK
        } else {
            cor::E_FAIL
        }
    }

    fn shutdown(&self) {
        self.detach();
    }

    fn module_load_finished(&self, load: ModuleLoad, status: HRESULT) -> HRESULT {
        if !self.is_attached() || cor::FAILED(status) {
            return cor::S_OK;
        }
        let module_id = load.module_id;
        match self.on_module_load(load) {
            ModuleLoadOutcome::Tracked { enabled, dropped } => {
                debug!(module = %module_id, enabled, dropped = dropped.len(), "module tracked");
            }
            ModuleLoadOutcome::AllRulesFailed { errors } => {
                warn!(module = %module_id, failures = errors.len(), "no wrapper reference could be emitted");
            }
            ModuleLoadOutcome::Unsupported | ModuleLoadOutcome::NoMatchingRules => {}
        }
        cor::S_OK
    }

    fn module_unload_finished(&self, module_id: ModuleId, _status: HRESULT) -> HRESULT {
        self.on_module_unload(module_id);
        cor::S_OK
    }

    fn jit_compilation_started(
        &self,
        module_id: ModuleId,
        function: Token,
        body: &mut dyn FunctionBody,
        _is_safe_to_block: bool,
    ) -> HRESULT {
        if !self.is_attached() {
            return cor::S_OK;
        }
        if let Err(err) = self.on_compilation_started(module_id, function, body) {
            warn!(
                module = %module_id,
                function = %function,
                hr = err.hresult(),
                error = %err,
                "method left unmodified"
            );
        }
        cor::S_OK
    }
}
