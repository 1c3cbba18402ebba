use callsite_rewriter::error::IlError;
use callsite_rewriter::il::{FunctionBody, Instruction, MethodBody, MethodHeader, Operand};
use callsite_rewriter::metadata::{Token, TokenKind};
use callsite_rewriter::sys::cil;

struct Code {
    bytes: Vec<u8>,
}

impl Code {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn op(&mut self, opcode: u8) -> &mut Self {
        self.bytes.push(opcode);
        self
    }

    fn op2(&mut self, second: u8) -> &mut Self {
        self.bytes.push(cil::CEE_PREFIX1);
        self.bytes.push(second);
        self
    }

    fn with_token(&mut self, opcode: u8, token: Token) -> &mut Self {
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&token.raw().to_le_bytes());
        self
    }

    fn call(&mut self, token: Token) -> &mut Self {
        self.with_token(cil::CEE_CALL as u8, token)
    }

    fn callvirt(&mut self, token: Token) -> &mut Self {
        self.with_token(cil::CEE_CALLVIRT as u8, token)
    }

    fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn tiny(&self) -> Vec<u8> {
        assert!(self.bytes.len() < 64);
        let mut out = vec![((self.bytes.len() as u8) << 2) | 0x02];
        out.extend_from_slice(&self.bytes);
        out
    }

    fn fat(&self, max_stack: u16, local_sig: Token, trailer: &[u8]) -> Vec<u8> {
        let mut flags: u16 = 0x0003 | 0x0010;
        if !trailer.is_empty() {
            flags |= 0x0008;
        }
        let mut out = Vec::new();
        out.extend_from_slice(&((3u16 << 12) | flags).to_le_bytes());
        out.extend_from_slice(&max_stack.to_le_bytes());
        out.extend_from_slice(&(self.bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&local_sig.raw().to_le_bytes());
        out.extend_from_slice(&self.bytes);
        out.extend_from_slice(trailer);
        out
    }
}

fn member_ref(rid: u32) -> Token {
    Token::new(TokenKind::MemberRef, rid)
}

/// `pad` bytes of alignment padding followed by a small-format exception
/// section with one clause.
fn exception_section(pad: usize) -> Vec<u8> {
    let mut out = vec![0u8; pad];
    out.extend_from_slice(&[0x01, 0x10, 0x00, 0x00]);
    out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);
    out
}

#[test]
fn decodes_tiny_body() {
    let target = member_ref(1);
    let bytes = Code::new()
        .op(cil::CEE_LDARG_0 as u8)
        .op(cil::CEE_LDARG_1 as u8)
        .call(target)
        .op(cil::CEE_RET as u8)
        .tiny();

    let body = MethodBody::decode(&bytes).expect("decode tiny body");
    assert_eq!(body.header, MethodHeader::Tiny);
    assert_eq!(body.header.max_stack(), 8);
    assert!(body.trailer.is_empty());

    let offsets: Vec<u32> = body.instructions.iter().map(|i| i.offset).collect();
    assert_eq!(offsets, vec![0, 1, 2, 7]);
    assert_eq!(body.instructions[2].opcode, cil::CEE_CALL);
    assert_eq!(body.instructions[2].operand, Operand::Token(target));
    assert_eq!(body.code_size(), 8);

    assert_eq!(body.encode().expect("encode"), bytes);
}

#[test]
fn decodes_fat_body_with_every_operand_shape() {
    let local_sig = Token::new(TokenKind::Signature, 2);
    let mut code = Code::new();
    code.op(cil::CEE_LDARG_S as u8)
        .raw(&[1])
        .op(cil::CEE_LDC_I4_S as u8)
        .raw(&[0xF6])
        .op(cil::CEE_LDC_I4 as u8)
        .raw(&1000i32.to_le_bytes())
        .op(cil::CEE_LDC_I8 as u8)
        .raw(&(-2i64).to_le_bytes())
        .op(cil::CEE_LDC_R4 as u8)
        .raw(&1.5f32.to_bits().to_le_bytes())
        .op(cil::CEE_LDC_R8 as u8)
        .raw(&2.25f64.to_bits().to_le_bytes())
        .with_token(cil::CEE_LDSTR as u8, Token::new(TokenKind::String, 9))
        .op2(0x01) // ceq
        .op2(0x0C) // ldloc
        .raw(&3u16.to_le_bytes())
        .op(cil::CEE_SWITCH as u8)
        .raw(&2u32.to_le_bytes())
        .raw(&0i32.to_le_bytes())
        .raw(&5i32.to_le_bytes())
        .op(cil::CEE_BR as u8)
        .raw(&0i32.to_le_bytes())
        .op(cil::CEE_BR_S as u8)
        .raw(&[0xFE])
        .callvirt(member_ref(4))
        .op(cil::CEE_RET as u8);
    let trailer = exception_section(1);
    let bytes = code.fat(6, local_sig, &trailer);

    let body = MethodBody::decode(&bytes).expect("decode fat body");
    match &body.header {
        MethodHeader::Fat {
            flags,
            header_dwords,
            max_stack,
            local_var_sig,
            extra,
        } => {
            assert_eq!(flags & cil::CorILMethod_InitLocals, cil::CorILMethod_InitLocals);
            assert_eq!(*header_dwords, 3);
            assert_eq!(*max_stack, 6);
            assert_eq!(*local_var_sig, local_sig);
            assert!(extra.is_empty());
        }
        MethodHeader::Tiny => panic!("expected fat header"),
    }
    assert!(body.header.has_more_sections());
    assert_eq!(body.trailer, trailer);

    let operands: Vec<&Operand> = body.instructions.iter().map(|i| &i.operand).collect();
    assert_eq!(operands[0], &Operand::ShortVar(1));
    assert_eq!(operands[1], &Operand::ShortInt(-10));
    assert_eq!(operands[2], &Operand::Int(1000));
    assert_eq!(operands[3], &Operand::Long(-2));
    assert_eq!(operands[4], &Operand::Single(1.5f32.to_bits()));
    assert_eq!(operands[5], &Operand::Double(2.25f64.to_bits()));
    assert_eq!(operands[6], &Operand::Token(Token::new(TokenKind::String, 9)));
    assert_eq!(body.instructions[7].opcode, cil::CEE_CEQ);
    assert_eq!(body.instructions[8].opcode, cil::CEE_LDLOC);
    assert_eq!(operands[8], &Operand::Var(3));
    assert_eq!(operands[9], &Operand::Switch(vec![0, 5]));
    assert_eq!(operands[10], &Operand::Branch(0));
    assert_eq!(operands[11], &Operand::ShortBranch(-2));
    assert_eq!(body.instructions.len(), 14);

    assert_eq!(body.encode().expect("encode"), bytes);
}

#[test]
fn keeps_header_words_past_the_standard_three() {
    let mut code = Code::new();
    code.callvirt(member_ref(1)).op(cil::CEE_RET as u8);
    let standard = code.fat(1, Token::NIL, &[]);

    // Same body with a four-dword header carrying one extra word.
    let mut bytes = standard[..12].to_vec();
    bytes[1] = (bytes[1] & 0x0F) | 0x40;
    bytes.extend_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
    bytes.extend_from_slice(&standard[12..]);

    let mut body = MethodBody::decode(&bytes).expect("decode");
    match &body.header {
        MethodHeader::Fat { header_dwords, extra, .. } => {
            assert_eq!(*header_dwords, 4);
            assert_eq!(extra, &0xDEAD_BEEF_u32.to_le_bytes().to_vec());
        }
        MethodHeader::Tiny => panic!("expected fat header"),
    }
    assert_eq!(body.instructions[0].offset, 0);
    assert_eq!(body.encode().expect("encode"), bytes);

    body.instructions[0].redirect_call(member_ref(9));
    let rewritten = body.encode().expect("encode rewritten");
    assert_eq!(&rewritten[..16], &bytes[..16]);
    assert_eq!(rewritten.len(), bytes.len());
}

#[test]
fn redirect_keeps_offsets_and_sections() {
    let wrapper = member_ref(0x20);
    let mut code = Code::new();
    code.op(cil::CEE_LDARG_0 as u8)
        .callvirt(member_ref(1))
        .op(cil::CEE_BRTRUE_S as u8)
        .raw(&[0x01])
        .op(cil::CEE_NOP as u8)
        .op(cil::CEE_RET as u8);
    let trailer = exception_section(2);
    let bytes = code.fat(2, Token::NIL, &trailer);

    let mut body = MethodBody::decode(&bytes).expect("decode");
    body.instructions[1].redirect_call(wrapper);
    let rewritten = body.encode().expect("encode");

    assert_eq!(rewritten.len(), bytes.len());
    let code_start = 12;
    let diff: Vec<usize> = (0..bytes.len()).filter(|&i| bytes[i] != rewritten[i]).collect();
    assert!(diff.iter().all(|&i| (code_start + 1..code_start + 6).contains(&i)));
    assert_eq!(rewritten[code_start + 1], cil::CEE_CALL as u8);
    assert_eq!(&rewritten[code_start + 2..code_start + 6], &wrapper.raw().to_le_bytes());
    assert!(rewritten.ends_with(&trailer));

    let again = MethodBody::decode(&rewritten).expect("decode rewritten");
    let offsets: Vec<u32> = again.instructions.iter().map(|i| i.offset).collect();
    let original: Vec<u32> = MethodBody::decode(&bytes)
        .expect("decode")
        .instructions
        .iter()
        .map(|i| i.offset)
        .collect();
    assert_eq!(offsets, original);
}

#[test]
fn rejects_truncated_streams() {
    // Header claims five bytes of code, only three follow.
    let bytes = vec![(5 << 2) | 0x02, 0x00, 0x00, 0x00];
    assert_eq!(MethodBody::decode(&bytes), Err(IlError::UnexpectedEof(1)));

    // Operand cut off by the end of the code section.
    let bytes = Code::new().op(cil::CEE_CALL as u8).raw(&[0x01, 0x00]).tiny();
    assert!(matches!(MethodBody::decode(&bytes), Err(IlError::UnexpectedEof(_))));

    // Switch count larger than the remaining code.
    let bytes = Code::new()
        .op(cil::CEE_SWITCH as u8)
        .raw(&100u32.to_le_bytes())
        .raw(&0i32.to_le_bytes())
        .tiny();
    assert!(matches!(MethodBody::decode(&bytes), Err(IlError::UnexpectedEof(_))));

    assert_eq!(MethodBody::decode(&[]), Err(IlError::UnexpectedEof(0)));
}

#[test]
fn rejects_unknown_opcodes_and_headers() {
    let bytes = Code::new().op(cil::CEE_NOP as u8).op(0x24).op(cil::CEE_RET as u8).tiny();
    assert_eq!(
        MethodBody::decode(&bytes),
        Err(IlError::InvalidOpcode { opcode: 0x24, offset: 1 })
    );

    let bytes = Code::new().op2(0x08).tiny();
    assert_eq!(
        MethodBody::decode(&bytes),
        Err(IlError::InvalidOpcode { opcode: 0xFE08, offset: 0 })
    );

    assert_eq!(MethodBody::decode(&[0x00]), Err(IlError::InvalidHeader(0x00)));
    assert_eq!(MethodBody::decode(&[0x01]), Err(IlError::InvalidHeader(0x01)));

    // Fat header that declares fewer than three dwords.
    let mut bytes = Code::new().op(cil::CEE_RET as u8).fat(1, Token::NIL, &[]);
    bytes[1] = 0x20;
    assert_eq!(MethodBody::decode(&bytes), Err(IlError::InvalidHeader(bytes[0])));
}

#[test]
fn tiny_header_cannot_grow_past_63_bytes() {
    let body = MethodBody {
        header: MethodHeader::Tiny,
        instructions: (0..64).map(|_| Instruction::new(cil::CEE_NOP, Operand::None)).collect(),
        trailer: Vec::new(),
    };
    assert_eq!(body.encode(), Err(IlError::CodeTooLarge(64)));
}

#[test]
fn only_method_calls_are_call_targets() {
    let method_def = Token::new(TokenKind::MethodDef, 3);
    let method_spec = Token::new(TokenKind::MethodSpec, 1);

    assert_eq!(
        Instruction::new(cil::CEE_CALL, Operand::Token(method_def)).call_target(),
        Some(method_def)
    );
    assert_eq!(
        Instruction::new(cil::CEE_CALLVIRT, Operand::Token(member_ref(2))).call_target(),
        Some(member_ref(2))
    );
    assert_eq!(
        Instruction::new(cil::CEE_CALL, Operand::Token(method_spec)).call_target(),
        None
    );
    assert_eq!(
        Instruction::new(cil::CEE_NEWOBJ, Operand::Token(member_ref(2))).call_target(),
        None
    );
    assert_eq!(
        Instruction::new(cil::CEE_LDTOKEN, Operand::Token(member_ref(2))).call_target(),
        None
    );
}

#[test]
fn owned_bytes_act_as_function_body() {
    let mut body: Vec<u8> = Code::new().op(cil::CEE_RET as u8).tiny();
    assert_eq!(body.il_bytes().expect("read"), &[0x06, 0x2A]);
    body.set_il_bytes(vec![0x0A, 0x00, 0x2A]).expect("write");
    assert_eq!(body, vec![0x0A, 0x00, 0x2A]);
}
