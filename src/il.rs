//! CIL method body decoder and encoder.
//!
//! A body is decoded into a header, a flat `Vec<Instruction>` in stream order,
//! and the raw bytes that follow the code (alignment padding plus extra data
//! sections such as exception clauses). Encoding writes the header back with
//! the recomputed code size, re-emits every instruction, and appends the
//! trailing bytes untouched.
//!
//! Offsets in branch operands and exception clauses are byte offsets, so a
//! rewrite must keep every instruction's encoded size. [`Instruction::redirect_call`]
//! is the only mutation this crate performs and it swaps a 5-byte
//! `call`/`callvirt` for a 5-byte `call`.

use crate::error::{HostError, IlError};
use crate::metadata::{Token, TokenKind};
use crate::sys::cil::{self, OperandParam, OPCODE};

/// Method header, tiny or fat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodHeader {
    /// One byte: code size in the upper six bits. Max stack 8, no locals.
    Tiny,
    Fat {
        flags: u16,
        header_dwords: u8,
        max_stack: u16,
        local_var_sig: Token,
        /// Header words past the standard three, verbatim.
        extra: Vec<u8>,
    },
}

impl MethodHeader {
    pub fn max_stack(&self) -> u16 {
        match self {
            MethodHeader::Tiny => cil::CorILMethod_TinyMaxStack,
            MethodHeader::Fat { max_stack, .. } => *max_stack,
        }
    }

    pub fn has_more_sections(&self) -> bool {
        matches!(self, MethodHeader::Fat { flags, .. } if flags & cil::CorILMethod_MoreSects != 0)
    }
}

/// Inline operand of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    ShortVar(u8),
    Var(u16),
    ShortInt(i8),
    Int(i32),
    Long(i64),
    /// `ldc.r4` bits, kept raw so encoding is exact.
    Single(u32),
    /// `ldc.r8` bits.
    Double(u64),
    ShortBranch(i8),
    Branch(i32),
    Switch(Vec<i32>),
    Token(Token),
}

impl Operand {
    fn encoded_len(&self) -> usize {
        match self {
            Operand::None => 0,
            Operand::ShortVar(_) | Operand::ShortInt(_) | Operand::ShortBranch(_) => 1,
            Operand::Var(_) => 2,
            Operand::Int(_) | Operand::Single(_) | Operand::Branch(_) | Operand::Token(_) => 4,
            Operand::Long(_) | Operand::Double(_) => 8,
            Operand::Switch(targets) => 4 + 4 * targets.len(),
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset from the start of the code.
    pub offset: u32,
    pub opcode: OPCODE,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: OPCODE, operand: Operand) -> Self {
        Self { offset: 0, opcode, operand }
    }

    pub fn encoded_len(&self) -> usize {
        cil::opcode_len(self.opcode) + self.operand.encoded_len()
    }

    pub fn is_call(&self) -> bool {
        self.opcode == cil::CEE_CALL || self.opcode == cil::CEE_CALLVIRT
    }

    pub fn token(&self) -> Option<Token> {
        match self.operand {
            Operand::Token(token) => Some(token),
            _ => None,
        }
    }

    /// The method token of a `call`/`callvirt` whose target is a MemberRef or
    /// MethodDef. MethodSpec (generic instantiation) targets are not candidates.
    pub fn call_target(&self) -> Option<Token> {
        if !self.is_call() {
            return None;
        }
        self.token()
            .filter(|t| matches!(t.kind(), TokenKind::MemberRef | TokenKind::MethodDef))
    }

    /// Turns this call into a non-virtual `call` to `target`.
    pub fn redirect_call(&mut self, target: Token) {
        debug_assert!(self.is_call());
        self.opcode = cil::CEE_CALL;
        self.operand = Operand::Token(target);
    }
}

/// A decoded method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub header: MethodHeader,
    pub instructions: Vec<Instruction>,
    /// Everything after the code: padding and extra sections, verbatim.
    pub trailer: Vec<u8>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], IlError> {
        if self.remaining() < len {
            return Err(IlError::UnexpectedEof(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u1(&mut self) -> Result<u8, IlError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, IlError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, IlError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u8(&mut self) -> Result<u64, IlError> {
        let b = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }
}

impl MethodBody {
    /// Decodes a complete method body as returned by `GetILFunctionBody`.
    pub fn decode(bytes: &[u8]) -> Result<Self, IlError> {
        let mut r = Reader::new(bytes);
        let first = r.read_u1()?;

        let (header, code_size) = match u16::from(first) & (cil::CorILMethod_FormatMask >> 1) {
            cil::CorILMethod_TinyFormat => (MethodHeader::Tiny, usize::from(first >> 2)),
            cil::CorILMethod_FatFormat => {
                let second = r.read_u1()?;
                let flags_and_size = u16::from_le_bytes([first, second]);
                let flags = flags_and_size & 0x0FFF;
                let header_dwords = (flags_and_size >> 12) as u8;
                if header_dwords < cil::CorILMethod_FatHeaderDwords {
                    return Err(IlError::InvalidHeader(first));
                }
                let max_stack = r.read_u2()?;
                let code_size = r.read_u4()? as usize;
                let local_var_sig = Token(r.read_u4()?);
                let extra = r
                    .read_bytes((usize::from(header_dwords) - 3) * 4)?
                    .to_vec();
                let header = MethodHeader::Fat {
                    flags,
                    header_dwords,
                    max_stack,
                    local_var_sig,
                    extra,
                };
                (header, code_size)
            }
            _ => return Err(IlError::InvalidHeader(first)),
        };

        let code = r.read_bytes(code_size)?;
        let instructions = decode_instructions(code)?;
        let trailer = r.read_bytes(r.remaining())?.to_vec();

        Ok(Self {
            header,
            instructions,
            trailer,
        })
    }

    /// Size of the code section implied by the current instructions.
    pub fn code_size(&self) -> usize {
        self.instructions.iter().map(Instruction::encoded_len).sum()
    }

    /// Encodes the body back into the host's byte format.
    pub fn encode(&self) -> Result<Vec<u8>, IlError> {
        let code_size = self.code_size();
        let mut out = Vec::with_capacity(12 + code_size + self.trailer.len());

        match &self.header {
            MethodHeader::Tiny => {
                if code_size > cil::CorILMethod_TinyMaxCodeSize as usize {
                    return Err(IlError::CodeTooLarge(code_size));
                }
                out.push(((code_size as u8) << 2) | cil::CorILMethod_TinyFormat as u8);
            }
            MethodHeader::Fat {
                flags,
                header_dwords,
                max_stack,
                local_var_sig,
                extra,
            } => {
                let code_size = u32::try_from(code_size).map_err(|_| IlError::CodeTooLarge(code_size))?;
                let flags_and_size = (u16::from(*header_dwords) << 12) | (flags & 0x0FFF);
                out.extend_from_slice(&flags_and_size.to_le_bytes());
                out.extend_from_slice(&max_stack.to_le_bytes());
                out.extend_from_slice(&code_size.to_le_bytes());
                out.extend_from_slice(&local_var_sig.raw().to_le_bytes());
                out.extend_from_slice(extra);
            }
        }

        for instr in &self.instructions {
            encode_instruction(&mut out, instr);
        }
        out.extend_from_slice(&self.trailer);
        Ok(out)
    }
}

fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, IlError> {
    let mut r = Reader::new(code);
    // Most instructions are 1-5 bytes; this avoids regrowth for typical bodies.
    let mut instructions = Vec::with_capacity(code.len() / 3 + 1);

    while r.remaining() > 0 {
        let offset = r.pos;
        let first = r.read_u1()?;
        let opcode: OPCODE = if first == cil::CEE_PREFIX1 {
            0xFE00 | u16::from(r.read_u1()?)
        } else {
            u16::from(first)
        };

        let param = cil::operand_param(opcode).ok_or(IlError::InvalidOpcode { opcode, offset })?;
        let operand = match param {
            OperandParam::InlineNone => Operand::None,
            OperandParam::ShortInlineVar => Operand::ShortVar(r.read_u1()?),
            OperandParam::ShortInlineI => Operand::ShortInt(r.read_u1()? as i8),
            OperandParam::ShortInlineBrTarget => Operand::ShortBranch(r.read_u1()? as i8),
            OperandParam::InlineVar => Operand::Var(r.read_u2()?),
            OperandParam::InlineI => Operand::Int(r.read_u4()? as i32),
            OperandParam::InlineI8 => Operand::Long(r.read_u8()? as i64),
            OperandParam::ShortInlineR => Operand::Single(r.read_u4()?),
            OperandParam::InlineR => Operand::Double(r.read_u8()?),
            OperandParam::InlineBrTarget => Operand::Branch(r.read_u4()? as i32),
            OperandParam::InlineToken => Operand::Token(Token(r.read_u4()?)),
            OperandParam::InlineSwitch => {
                let count = r.read_u4()? as usize;
                if count > r.remaining() / 4 {
                    return Err(IlError::UnexpectedEof(r.pos));
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(r.read_u4()? as i32);
                }
                Operand::Switch(targets)
            }
        };

        instructions.push(Instruction {
            offset: offset as u32,
            opcode,
            operand,
        });
    }

    Ok(instructions)
}

fn encode_instruction(out: &mut Vec<u8>, instr: &Instruction) {
    if instr.opcode > 0xFF {
        out.push(cil::CEE_PREFIX1);
        out.push(instr.opcode as u8);
    } else {
        out.push(instr.opcode as u8);
    }

    match &instr.operand {
        Operand::None => {}
        Operand::ShortVar(v) => out.push(*v),
        Operand::ShortInt(v) => out.push(*v as u8),
        Operand::ShortBranch(v) => out.push(*v as u8),
        Operand::Var(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Long(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Single(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Branch(v) => out.extend_from_slice(&v.to_le_bytes()),
        Operand::Token(t) => out.extend_from_slice(&t.raw().to_le_bytes()),
        Operand::Switch(targets) => {
            out.extend_from_slice(&(targets.len() as u32).to_le_bytes());
            for target in targets {
                out.extend_from_slice(&target.to_le_bytes());
            }
        }
    }
}

/// Host handle to the IL of the method being compiled.
///
/// A shim implements this over `GetILFunctionBody` and
/// `GetILFunctionBodyAllocator` + `SetILFunctionBody`.
pub trait FunctionBody {
    fn il_bytes(&self) -> Result<&[u8], HostError>;

    /// Replaces the method's IL. Called at most once per compilation.
    fn set_il_bytes(&mut self, body: Vec<u8>) -> Result<(), HostError>;
}

/// An owned body, for offline rewriting.
impl FunctionBody for Vec<u8> {
    fn il_bytes(&self) -> Result<&[u8], HostError> {
        Ok(self.as_slice())
    }

    fn set_il_bytes(&mut self, body: Vec<u8>) -> Result<(), HostError> {
        *self = body;
        Ok(())
    }
}
