//! Call-site rewriting over a decoded method body.

use tracing::trace;

use crate::error::HostError;
use crate::il::MethodBody;
use crate::integration::MethodPattern;
use crate::metadata::{MetadataImport, Token};
use crate::resolver::{self, NameBuffers};

/// Redirects every call in `body` that resolves to `target` so it calls
/// `wrapper_ref` instead. Returns the number of rewritten instructions.
///
/// The scan walks the stream once in order and keeps going after a match, so
/// all call sites of the target in one method are rewritten together. A
/// `callvirt` becomes a plain `call`: the wrapper is a concrete static method.
///
/// On a host error the body may be partially rewritten; callers must discard
/// it rather than commit.
pub fn rewrite_call_sites<M>(
    body: &mut MethodBody,
    import: &M,
    target: &MethodPattern,
    wrapper_ref: Token,
    buffers: &mut NameBuffers,
) -> Result<usize, HostError>
where
    M: MetadataImport + ?Sized,
{
    // A target without a method name cannot be matched without resolving
    // every call's parent; rules always name the target method.
    let Some(expected_method) = target.method_name() else {
        return Ok(0);
    };
    let expected_type = target.type_name();

    let mut rewritten = 0;
    for instr in body.instructions.iter_mut() {
        let Some(operand) = instr.call_target() else {
            continue;
        };

        let Some(call) = resolver::resolve(import, operand, expected_method, buffers)? else {
            continue;
        };

        if expected_type.map_or(true, |expected| expected == call.type_name) {
            trace!(
                offset = instr.offset,
                target_type = call.type_name,
                target_method = call.method_name,
                wrapper = %wrapper_ref,
                "redirecting call site"
            );
            instr.redirect_call(wrapper_ref);
            rewritten += 1;
        }
    }

    Ok(rewritten)
}
