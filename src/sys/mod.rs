//! Raw CLR-level definitions.
//!
//! These mirror the values in `corhdr.h`, `corprof.h` and `opcode.def` so the
//! typed layers and host shims agree on the numbers without pulling in the
//! Windows SDK.

pub mod cil;
pub mod cor;
