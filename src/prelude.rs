//! Common imports for host shims.
//!
//! Covers the engine, the host-facing traits and the event types; rule and
//! codec internals stay behind their modules.

pub use crate::config::AgentConfig;
pub use crate::engine::{CompilationOutcome, InstrumentationEngine, NoChangeReason};
pub use crate::il::FunctionBody;
pub use crate::integration::{AssemblyRef, Integration, MethodPattern, MethodReplacement, WrapperSpec};
pub use crate::metadata::{MetadataEmit, MetadataImport, ModuleFlags, ModuleId, ModuleMetadata, Token, TokenKind};
pub use crate::registry::{ModuleLoad, ModuleLoadOutcome};
pub use crate::sys::cor;
pub use crate::Profiler;
