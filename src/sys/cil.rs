// callsite-rewriter/src/sys/cil.rs
//
// CIL opcode values and operand encodings (ECMA-335 Partition III, opcode.def).
//
// One-byte opcodes are stored as their byte value. Opcodes on the 0xFE page
// are stored as 0xFE00 | second byte, so every opcode fits a u16 and the
// encoded length is 1 for values below 0x100 and 2 otherwise.

#![allow(non_upper_case_globals)]

pub type OPCODE = u16;

pub const CEE_PREFIX1: u8 = 0xFE;

pub const CEE_NOP: OPCODE = 0x00;
pub const CEE_BREAK: OPCODE = 0x01;
pub const CEE_LDARG_0: OPCODE = 0x02;
pub const CEE_LDARG_1: OPCODE = 0x03;
pub const CEE_LDARG_2: OPCODE = 0x04;
pub const CEE_LDARG_3: OPCODE = 0x05;
pub const CEE_LDLOC_0: OPCODE = 0x06;
pub const CEE_STLOC_0: OPCODE = 0x0A;
pub const CEE_LDARG_S: OPCODE = 0x0E;
pub const CEE_LDLOC_S: OPCODE = 0x11;
pub const CEE_STLOC_S: OPCODE = 0x13;
pub const CEE_LDNULL: OPCODE = 0x14;
pub const CEE_LDC_I4_M1: OPCODE = 0x15;
pub const CEE_LDC_I4_0: OPCODE = 0x16;
pub const CEE_LDC_I4_1: OPCODE = 0x17;
pub const CEE_LDC_I4_2: OPCODE = 0x18;
pub const CEE_LDC_I4_8: OPCODE = 0x1E;
pub const CEE_LDC_I4_S: OPCODE = 0x1F;
pub const CEE_LDC_I4: OPCODE = 0x20;
pub const CEE_LDC_I8: OPCODE = 0x21;
pub const CEE_LDC_R4: OPCODE = 0x22;
pub const CEE_LDC_R8: OPCODE = 0x23;
pub const CEE_DUP: OPCODE = 0x25;
pub const CEE_POP: OPCODE = 0x26;
pub const CEE_JMP: OPCODE = 0x27;
pub const CEE_CALL: OPCODE = 0x28;
pub const CEE_CALLI: OPCODE = 0x29;
pub const CEE_RET: OPCODE = 0x2A;
pub const CEE_BR_S: OPCODE = 0x2B;
pub const CEE_BRFALSE_S: OPCODE = 0x2C;
pub const CEE_BRTRUE_S: OPCODE = 0x2D;
pub const CEE_BLT_UN_S: OPCODE = 0x37;
pub const CEE_BR: OPCODE = 0x38;
pub const CEE_BRFALSE: OPCODE = 0x39;
pub const CEE_BRTRUE: OPCODE = 0x3A;
pub const CEE_BLT_UN: OPCODE = 0x44;
pub const CEE_SWITCH: OPCODE = 0x45;
pub const CEE_ADD: OPCODE = 0x58;
pub const CEE_CALLVIRT: OPCODE = 0x6F;
pub const CEE_LDSTR: OPCODE = 0x72;
pub const CEE_NEWOBJ: OPCODE = 0x73;
pub const CEE_THROW: OPCODE = 0x7A;
pub const CEE_LDFLD: OPCODE = 0x7B;
pub const CEE_STFLD: OPCODE = 0x7D;
pub const CEE_BOX: OPCODE = 0x8C;
pub const CEE_LDTOKEN: OPCODE = 0xD0;
pub const CEE_ENDFINALLY: OPCODE = 0xDC;
pub const CEE_LEAVE: OPCODE = 0xDD;
pub const CEE_LEAVE_S: OPCODE = 0xDE;

pub const CEE_ARGLIST: OPCODE = 0xFE00;
pub const CEE_CEQ: OPCODE = 0xFE01;
pub const CEE_LDFTN: OPCODE = 0xFE06;
pub const CEE_LDVIRTFTN: OPCODE = 0xFE07;
pub const CEE_LDARG: OPCODE = 0xFE09;
pub const CEE_LDLOC: OPCODE = 0xFE0C;
pub const CEE_STLOC: OPCODE = 0xFE0E;
pub const CEE_LOCALLOC: OPCODE = 0xFE0F;
pub const CEE_ENDFILTER: OPCODE = 0xFE11;
pub const CEE_UNALIGNED: OPCODE = 0xFE12;
pub const CEE_VOLATILE: OPCODE = 0xFE13;
pub const CEE_TAILCALL: OPCODE = 0xFE14;
pub const CEE_INITOBJ: OPCODE = 0xFE15;
pub const CEE_CONSTRAINED: OPCODE = 0xFE16;
pub const CEE_NO: OPCODE = 0xFE19;
pub const CEE_RETHROW: OPCODE = 0xFE1A;
pub const CEE_SIZEOF: OPCODE = 0xFE1C;
pub const CEE_READONLY: OPCODE = 0xFE1E;

/// Operand encoding that follows an opcode (the `OPCODE` column of opcode.def).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandParam {
    InlineNone,
    ShortInlineVar,
    ShortInlineI,
    ShortInlineBrTarget,
    InlineVar,
    InlineI,
    InlineI8,
    ShortInlineR,
    InlineR,
    InlineBrTarget,
    InlineSwitch,
    /// Any 4-byte metadata token: method, field, type, string or signature.
    InlineToken,
}

/// Operand encoding for `opcode`, or `None` for an undefined opcode.
pub const fn operand_param(opcode: OPCODE) -> Option<OperandParam> {
    use OperandParam::*;
    let param = match opcode {
        0x00..=0x0D => InlineNone,
        0x0E..=0x13 => ShortInlineVar,
        0x14..=0x1E => InlineNone,
        0x1F => ShortInlineI,
        0x20 => InlineI,
        0x21 => InlineI8,
        0x22 => ShortInlineR,
        0x23 => InlineR,
        0x25 | 0x26 => InlineNone,
        0x27..=0x29 => InlineToken,
        0x2A => InlineNone,
        0x2B..=0x37 => ShortInlineBrTarget,
        0x38..=0x44 => InlineBrTarget,
        0x45 => InlineSwitch,
        0x46..=0x6E => InlineNone,
        0x6F..=0x75 => InlineToken,
        0x76 => InlineNone,
        0x79 => InlineToken,
        0x7A => InlineNone,
        0x7B..=0x81 => InlineToken,
        0x82..=0x8B => InlineNone,
        0x8C | 0x8D => InlineToken,
        0x8E => InlineNone,
        0x8F => InlineToken,
        0x90..=0xA2 => InlineNone,
        0xA3..=0xA5 => InlineToken,
        0xB3..=0xBA => InlineNone,
        0xC2 => InlineToken,
        0xC3 => InlineNone,
        0xC6 => InlineToken,
        0xD0 => InlineToken,
        0xD1..=0xDC => InlineNone,
        0xDD => InlineBrTarget,
        0xDE => ShortInlineBrTarget,
        0xDF | 0xE0 => InlineNone,

        0xFE00..=0xFE05 => InlineNone,
        0xFE06 | 0xFE07 => InlineToken,
        0xFE09..=0xFE0E => InlineVar,
        0xFE0F => InlineNone,
        0xFE11 => InlineNone,
        0xFE12 => ShortInlineI,
        0xFE13 | 0xFE14 => InlineNone,
        0xFE15 | 0xFE16 => InlineToken,
        0xFE17 | 0xFE18 => InlineNone,
        0xFE19 => ShortInlineI,
        0xFE1A => InlineNone,
        0xFE1C => InlineToken,
        0xFE1D | 0xFE1E => InlineNone,
        _ => return None,
    };
    Some(param)
}

/// Encoded length of the opcode itself (1 or 2 bytes).
#[inline]
pub const fn opcode_len(opcode: OPCODE) -> usize {
    if opcode > 0xFF {
        2
    } else {
        1
    }
}

// --- Method header (CorILMethodFlags) ---
pub const CorILMethod_InitLocals: u16 = 0x0010;
pub const CorILMethod_MoreSects: u16 = 0x0008;
pub const CorILMethod_FormatShift: u16 = 3;
pub const CorILMethod_FormatMask: u16 = (1 << CorILMethod_FormatShift) - 1;
pub const CorILMethod_TinyFormat: u16 = 0x0002;
pub const CorILMethod_FatFormat: u16 = 0x0003;
pub const CorILMethod_SmallFormat: u16 = 0x0000;

pub const CorILMethod_TinyMaxCodeSize: u32 = 0x3F;
pub const CorILMethod_TinyMaxStack: u16 = 8;
pub const CorILMethod_FatHeaderDwords: u8 = 3;
