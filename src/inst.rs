use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inst {
    ADC,
    AND,
    ASL,
    BCC,
    BCS,
    BEQ,
    BIT,
    BMI,
    BNE,
    BPL,
    BRK,
    BVC,
    BVS,
    CLC,
    CLD,
    CLI,
    CLV,
    CMP,
    CPX,
    CPY,
    DEC,
    DEX,
    DEY,
    EOR,
    INC,
    INX,
    INY,
    JMP,
    JSR,
    LDA,
    LDX,
    LDY,
    LSR,
    NOP,
    ORA,
    PHA,
    PHP,
    PLA,
    PLP,
    ROL,
    ROR,
    RTI,
    RTS,
    SBC,
    SEC,
    SED,
    SEI,
    STA,
    STX,
    STY,
    TAX,
    TAY,
    TSX,
    TXA,
    TXS,
    TYA,

    /// Any byte the processor does not define. Executes as a no-op.
    XXX,
}
impl Inst {
    pub fn mnemonic(self) -> &'static str {
        use Inst::*;
        match self {
            ADC => "ADC",
            AND => "AND",
            ASL => "ASL",
            BCC => "BCC",
            BCS => "BCS",
            BEQ => "BEQ",
            BIT => "BIT",
            BMI => "BMI",
            BNE => "BNE",
            BPL => "BPL",
            BRK => "BRK",
            BVC => "BVC",
            BVS => "BVS",
            CLC => "CLC",
            CLD => "CLD",
            CLI => "CLI",
            CLV => "CLV",
            CMP => "CMP",
            CPX => "CPX",
            CPY => "CPY",
            DEC => "DEC",
            DEX => "DEX",
            DEY => "DEY",
            EOR => "EOR",
            INC => "INC",
            INX => "INX",
            INY => "INY",
            JMP => "JMP",
            JSR => "JSR",
            LDA => "LDA",
            LDX => "LDX",
            LDY => "LDY",
            LSR => "LSR",
            NOP => "NOP",
            ORA => "ORA",
            PHA => "PHA",
            PHP => "PHP",
            PLA => "PLA",
            PLP => "PLP",
            ROL => "ROL",
            ROR => "ROR",
            RTI => "RTI",
            RTS => "RTS",
            SBC => "SBC",
            SEC => "SEC",
            SED => "SED",
            SEI => "SEI",
            STA => "STA",
            STX => "STX",
            STY => "STY",
            TAX => "TAX",
            TAY => "TAY",
            TSX => "TSX",
            TXA => "TXA",
            TXS => "TXS",
            TYA => "TYA",
            XXX => "???",
        }
    }
}
impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Implied,
    Immediate,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    XIndirect,
    IndirectY,
    Relative,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
}
impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> u16 {
        use AddressingMode::*;
        match self {
            Implied => 0,
            Immediate | Relative | ZeroPage | ZeroPageX | ZeroPageY | XIndirect | IndirectY => 1,
            Absolute | AbsoluteX | AbsoluteY | Indirect => 2,
        }
    }
}

/// One entry of the decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub inst: Inst,
    pub mode: AddressingMode,
    pub cycles: u8,
}

impl Opcode {
    /// Assembler text for this opcode at `addr`, given the bytes that follow
    /// it. Missing operand bytes read as zero.
    pub fn disassemble(self, addr: u16, operand: &[u8]) -> String {
        use AddressingMode::*;

        let byte = operand.first().copied().unwrap_or(0);
        let word = u16::from_le_bytes([byte, operand.get(1).copied().unwrap_or(0)]);
        let arg = match self.mode {
            Implied => String::new(),
            Immediate => format!(" #${byte:02X}"),
            ZeroPage => format!(" ${byte:02X}"),
            ZeroPageX => format!(" ${byte:02X},X"),
            ZeroPageY => format!(" ${byte:02X},Y"),
            Absolute => format!(" ${word:04X}"),
            AbsoluteX => format!(" ${word:04X},X"),
            AbsoluteY => format!(" ${word:04X},Y"),
            Indirect => format!(" (${word:04X})"),
            XIndirect => format!(" (${byte:02X},X)"),
            IndirectY => format!(" (${byte:02X}),Y"),
            Relative => {
                let next = addr.wrapping_add(1 + self.mode.operand_len());
                format!(" ${:04X}", next.wrapping_add(byte as i8 as u16))
            }
        };
        format!("{}{arg}", self.inst)
    }
}

const fn op(inst: Inst, mode: AddressingMode, cycles: u8) -> Opcode {
    Opcode { inst, mode, cycles }
}

// Undefined bytes take the cycle count of NOP and consume no operand.
const ILLEGAL: Opcode = op(Inst::XXX, AddressingMode::Implied, 2);

#[rustfmt::skip]
pub static OPCODES: [Opcode; 256] = {
    use AddressingMode::*;
    use Inst::*;
    const X: Opcode = ILLEGAL;
    [
        // 0x0_
        op(BRK, Implied, 7), op(ORA, XIndirect, 6), X, X, X, op(ORA, ZeroPage, 3), op(ASL, ZeroPage, 5), X,
        op(PHP, Implied, 3), op(ORA, Immediate, 2), op(ASL, Implied, 2), X, X, op(ORA, Absolute, 4), op(ASL, Absolute, 6), X,
        // 0x1_
        op(BPL, Relative, 2), op(ORA, IndirectY, 5), X, X, X, op(ORA, ZeroPageX, 4), op(ASL, ZeroPageX, 6), X,
        op(CLC, Implied, 2), op(ORA, AbsoluteY, 4), X, X, X, op(ORA, AbsoluteX, 4), op(ASL, AbsoluteX, 7), X,
        // 0x2_
        op(JSR, Absolute, 6), op(AND, XIndirect, 6), X, X, op(BIT, ZeroPage, 3), op(AND, ZeroPage, 3), op(ROL, ZeroPage, 5), X,
        op(PLP, Implied, 4), op(AND, Immediate, 2), op(ROL, Implied, 2), X, op(BIT, Absolute, 4), op(AND, Absolute, 4), op(ROL, Absolute, 6), X,
        // 0x3_
        op(BMI, Relative, 2), op(AND, IndirectY, 5), X, X, X, op(AND, ZeroPageX, 4), op(ROL, ZeroPageX, 6), X,
        op(SEC, Implied, 2), op(AND, AbsoluteY, 4), X, X, X, op(AND, AbsoluteX, 4), op(ROL, AbsoluteX, 7), X,
        // 0x4_
        op(RTI, Implied, 6), op(EOR, XIndirect, 6), X, X, X, op(EOR, ZeroPage, 3), op(LSR, ZeroPage, 5), X,
        op(PHA, Implied, 3), op(EOR, Immediate, 2), op(LSR, Implied, 2), X, op(JMP, Absolute, 3), op(EOR, Absolute, 4), op(LSR, Absolute, 6), X,
        // 0x5_
        op(BVC, Relative, 2), op(EOR, IndirectY, 5), X, X, X, op(EOR, ZeroPageX, 4), op(LSR, ZeroPageX, 6), X,
        op(CLI, Implied, 2), op(EOR, AbsoluteY, 4), X, X, X, op(EOR, AbsoluteX, 4), op(LSR, AbsoluteX, 7), X,
        // 0x6_
        op(RTS, Implied, 6), op(ADC, XIndirect, 6), X, X, X, op(ADC, ZeroPage, 3), op(ROR, ZeroPage, 5), X,
        op(PLA, Implied, 4), op(ADC, Immediate, 2), op(ROR, Implied, 2), X, op(JMP, Indirect, 5), op(ADC, Absolute, 4), op(ROR, Absolute, 6), X,
        // 0x7_
        op(BVS, Relative, 2), op(ADC, IndirectY, 5), X, X, X, op(ADC, ZeroPageX, 4), op(ROR, ZeroPageX, 6), X,
        op(SEI, Implied, 2), op(ADC, AbsoluteY, 4), X, X, X, op(ADC, AbsoluteX, 4), op(ROR, AbsoluteX, 7), X,
        // 0x8_
        X, op(STA, XIndirect, 6), X, X, op(STY, ZeroPage, 3), op(STA, ZeroPage, 3), op(STX, ZeroPage, 3), X,
        op(DEY, Implied, 2), X, op(TXA, Implied, 2), X, op(STY, Absolute, 4), op(STA, Absolute, 4), op(STX, Absolute, 4), X,
        // 0x9_
        op(BCC, Relative, 2), op(STA, IndirectY, 6), X, X, op(STY, ZeroPageX, 4), op(STA, ZeroPageX, 4), op(STX, ZeroPageY, 4), X,
        op(TYA, Implied, 2), op(STA, AbsoluteY, 5), op(TXS, Implied, 2), X, X, op(STA, AbsoluteX, 5), X, X,
        // 0xA_
        op(LDY, Immediate, 2), op(LDA, XIndirect, 6), op(LDX, Immediate, 2), X, op(LDY, ZeroPage, 3), op(LDA, ZeroPage, 3), op(LDX, ZeroPage, 3), X,
        op(TAY, Implied, 2), op(LDA, Immediate, 2), op(TAX, Implied, 2), X, op(LDY, Absolute, 4), op(LDA, Absolute, 4), op(LDX, Absolute, 4), X,
        // 0xB_
        op(BCS, Relative, 2), op(LDA, IndirectY, 5), X, X, op(LDY, ZeroPageX, 4), op(LDA, ZeroPageX, 4), op(LDX, ZeroPageY, 4), X,
        op(CLV, Implied, 2), op(LDA, AbsoluteY, 4), op(TSX, Implied, 2), X, op(LDY, AbsoluteX, 4), op(LDA, AbsoluteX, 4), op(LDX, AbsoluteY, 4), X,
        // 0xC_
        op(CPY, Immediate, 2), op(CMP, XIndirect, 6), X, X, op(CPY, ZeroPage, 3), op(CMP, ZeroPage, 3), op(DEC, ZeroPage, 5), X,
        op(INY, Implied, 2), op(CMP, Immediate, 2), op(DEX, Implied, 2), X, op(CPY, Absolute, 4), op(CMP, Absolute, 4), op(DEC, Absolute, 6), X,
        // 0xD_
        op(BNE, Relative, 2), op(CMP, IndirectY, 5), X, X, X, op(CMP, ZeroPageX, 4), op(DEC, ZeroPageX, 6), X,
        op(CLD, Implied, 2), op(CMP, AbsoluteY, 4), X, X, X, op(CMP, AbsoluteX, 4), op(DEC, AbsoluteX, 7), X,
        // 0xE_
        op(CPX, Immediate, 2), op(SBC, XIndirect, 6), X, X, op(CPX, ZeroPage, 3), op(SBC, ZeroPage, 3), op(INC, ZeroPage, 5), X,
        op(INX, Implied, 2), op(SBC, Immediate, 2), op(NOP, Implied, 2), X, op(CPX, Absolute, 4), op(SBC, Absolute, 4), op(INC, Absolute, 6), X,
        // 0xF_
        op(BEQ, Relative, 2), op(SBC, IndirectY, 5), X, X, X, op(SBC, ZeroPageX, 4), op(INC, ZeroPageX, 6), X,
        op(SED, Implied, 2), op(SBC, AbsoluteY, 4), X, X, X, op(SBC, AbsoluteX, 4), op(INC, AbsoluteX, 7), X,
    ]
};

pub fn decode_inst(byte: u8) -> Opcode {
    OPCODES[byte as usize]
}
