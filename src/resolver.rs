//! Resolves the (declaring type, method) identity behind a call operand.
//!
//! Resolution is ordered cheapest first. A MemberRef's own name is read and
//! compared before its parent scope is touched, so the common case of an
//! unrelated call costs a single metadata read.

use crate::error::HostError;
use crate::metadata::{MetadataImport, Token, TokenKind};

/// Reusable name storage for one scan.
#[derive(Debug, Default)]
pub struct NameBuffers {
    method: String,
    type_name: String,
}

impl NameBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            method: String::with_capacity(capacity),
            type_name: String::with_capacity(capacity),
        }
    }
}

/// Resolved call target, borrowing the scan's name buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTarget<'b> {
    pub type_name: &'b str,
    pub method_name: &'b str,
}

/// Resolves `operand` if, and only if, the method it names is called
/// `expected_method`.
///
/// `Ok(None)` is the normal negative result: wrong name, or a parent scope
/// kind that cannot name a concrete type (TypeSpec, ModuleRef, ...).
pub fn resolve<'b, M>(
    import: &M,
    operand: Token,
    expected_method: &str,
    buffers: &'b mut NameBuffers,
) -> Result<Option<CallTarget<'b>>, HostError>
where
    M: MetadataImport + ?Sized,
{
    let NameBuffers { method, type_name } = buffers;

    match operand.kind() {
        TokenKind::MemberRef => {
            let parent = import.member_ref_props(operand, method)?;
            if method.as_str() != expected_method {
                return Ok(None);
            }

            match parent.kind() {
                TokenKind::TypeRef => import.type_ref_props(parent, type_name)?,
                TokenKind::TypeDef => import.type_def_props(parent, type_name)?,
                // A MemberRef parented by a MethodDef (vararg call sites):
                // the definition's own name and owner are authoritative.
                TokenKind::MethodDef => {
                    let owner = import.method_props(parent, method)?;
                    if method.as_str() != expected_method {
                        return Ok(None);
                    }
                    import.type_def_props(owner, type_name)?;
                }
                _ => return Ok(None),
            }
        }
        TokenKind::MethodDef => {
            let owner = import.method_props(operand, method)?;
            if method.as_str() != expected_method {
                return Ok(None);
            }
            import.type_def_props(owner, type_name)?;
        }
        _ => return Ok(None),
    }

    Ok(Some(CallTarget {
        type_name: type_name.as_str(),
        method_name: method.as_str(),
    }))
}

/// Resolves the identity of a method being compiled from its MethodDef token.
pub fn resolve_method_def<M>(
    import: &M,
    method_def: Token,
    buffers: &mut NameBuffers,
) -> Result<(String, String), HostError>
where
    M: MetadataImport + ?Sized,
{
    let owner = import.method_props(method_def, &mut buffers.method)?;
    import.type_def_props(owner, &mut buffers.type_name)?;
    Ok((buffers.type_name.clone(), buffers.method.clone()))
}
