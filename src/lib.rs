//! # callsite-rewriter
//!
//! Call-site matching and IL rewriting for in-process CLR profiler agents.
//!
//! The crate redirects selected call sites in managed code to pre-registered
//! wrapper methods at JIT time. Nothing is recompiled or relinked: when a
//! module loads, references to the wrapper methods are emitted into its
//! metadata; when a method is about to be compiled, its IL is scanned and
//! every `call`/`callvirt` to a configured target becomes a `call` to the
//! wrapper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Host shim (COM profiler)                │
//! │   ICorProfilerCallback → Profiler trait, metadata impls  │
//! ├─────────────────────────────────────────────────────────┤
//! │                  InstrumentationEngine                   │
//! │      attach filter, load/unload/compile state machine    │
//! ├─────────────────────────────────────────────────────────┤
//! │   ModuleRegistry / ModuleRecord   │   rewriter + resolver │
//! │   wrapper reference emission      │   CIL body codec (il) │
//! ├─────────────────────────────────────────────────────────┤
//! │           Raw definitions (sys module)                   │
//! │   sys::cor - tokens, module flags, HRESULTs              │
//! │   sys::cil - opcodes, operand encodings, method headers  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys`] | Raw CLR constants |
//! | [`metadata`] | [`Token`](metadata::Token) and the metadata import/emit traits a host implements |
//! | [`integration`] | Rule catalog: integrations, method patterns, wrapper specs |
//! | [`loader`] / [`config`] | Integration JSON and environment configuration |
//! | [`il`] | Method body decoding and encoding |
//! | [`resolver`] | Call operand → (type, method) resolution |
//! | [`emitter`] | Per-module record and wrapper reference emission |
//! | [`registry`] | Process-wide module table |
//! | [`rewriter`] | Call-site redirection over a decoded body |
//! | [`engine`] | [`InstrumentationEngine`](engine::InstrumentationEngine) |
//!
//! ## Example
//!
//! ```rust,ignore
//! use callsite_rewriter::prelude::*;
//!
//! let engine = InstrumentationEngine::from_env()?;
//! if engine.initialize("MyService.exe") != cor::S_OK {
//!     return Ok(()); // filtered out; the host unloads the profiler
//! }
//!
//! // From ICorProfilerCallback::ModuleLoadFinished:
//! engine.module_load_finished(
//!     ModuleLoad {
//!         module_id,
//!         assembly_name: "Sample".into(),
//!         flags: ModuleFlags(module_flags),
//!         metadata: Arc::new(shim_metadata),
//!     },
//!     hr_status,
//! );
//!
//! // From ICorProfilerCallback::JITCompilationStarted:
//! engine.jit_compilation_started(module_id, Token(function_token), &mut shim_body, true);
//! ```
//!
//! ## Limitations
//!
//! A redirected `callvirt` becomes a non-virtual `call` to the wrapper, so
//! overrides of the original target are no longer dispatched to. Only the
//! first replacement that rewrites anything is applied per compilation.

pub mod sys;

pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod il;
pub mod integration;
pub mod loader;
pub mod metadata;
pub mod prelude;
pub mod registry;
pub mod resolver;
pub mod rewriter;

pub use crate::engine::{CompilationOutcome, InstrumentationEngine, NoChangeReason};
pub use crate::error::{Error, Result};

use crate::il::FunctionBody;
use crate::metadata::{ModuleId, Token};
use crate::registry::ModuleLoad;
use crate::sys::cor::{self, HRESULT};

/// Profiler event callbacks, as delivered by the host shim.
///
/// Mirrors the subset of `ICorProfilerCallback` the engine needs. Every
/// method returns an HRESULT for the shim to hand back to the runtime; all
/// event methods default to doing nothing.
///
/// # Thread Safety
///
/// The runtime raises these callbacks on arbitrary threads, concurrently.
/// Implementations must be `Send + Sync`.
pub trait Profiler: Send + Sync {
    /// `ICorProfilerCallback::Initialize`.
    ///
    /// Returning a failure HRESULT tells the runtime to unload the profiler.
    fn initialize(&self, process_name: &str) -> HRESULT;

    /// `ICorProfilerCallback::Shutdown`.
    fn shutdown(&self) {}

    /// `ICorProfilerCallback::ModuleLoadFinished`.
    fn module_load_finished(&self, _load: ModuleLoad, _status: HRESULT) -> HRESULT {
        cor::S_OK
    }

    /// `ICorProfilerCallback::ModuleUnloadFinished`.
    fn module_unload_finished(&self, _module_id: ModuleId, _status: HRESULT) -> HRESULT {
        cor::S_OK
    }

    /// `ICorProfilerCallback::JITCompilationStarted`, with the function already
    /// resolved to its module and MethodDef token.
    fn jit_compilation_started(
        &self,
        _module_id: ModuleId,
        _function: Token,
        _body: &mut dyn FunctionBody,
        _is_safe_to_block: bool,
    ) -> HRESULT {
        cor::S_OK
    }
}
