//! Instruction encoders
//!
//! Builders for RV64I, Zicsr and machine-mode instruction words, used
//! by the unit tests to assemble small programs. Only produces valid
//! words when the arguments are in range; register numbers are the
//! plain indices 0..=31.

use crate::opcodes::*;
use crate::utils::extract_field;

/// Make an I-type instruction
pub fn itype(imm: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (imm & 0xfff) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

/// Make an R- or S-type instruction. These formats have the same
/// field layout; the meaning of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
pub fn rstype(a: u32, rs2: u32, rs1: u32, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | b << 7 | opcode
}

/// Make a U- or J-type instruction (for J-type, shuffle the
/// immediate with [`jtype_imm_field`] first)
pub fn ujtype(imm: u32, rd: u32, opcode: u32) -> u32 {
    imm << 12 | rd << 7 | opcode
}

/// Shuffle a byte offset into the 20-bit immediate field layout of
/// the J-type format
pub fn jtype_imm_field(offset: i32) -> u32 {
    let imm = offset as u32;
    let imm20 = extract_field(imm, 20, 20);
    let imm19_12 = extract_field(imm, 19, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_1 = extract_field(imm, 10, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) for [`rstype`] encoding a conditional branch offset
pub fn btype_imm_fields(offset: i32) -> (u32, u32) {
    let imm = offset as u32;
    let imm12 = extract_field(imm, 12, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_5 = extract_field(imm, 10, 5);
    let imm4_1 = extract_field(imm, 4, 1);
    ((imm12 << 6) | imm10_5, (imm4_1 << 1) | imm11)
}

/// The 12-bit immediate of a 64-bit shift instruction: the shift
/// amount occupies the low six bits, the upper six distinguish
/// logical from arithmetic right shifts
fn shift_imm(shamt: u32, upper: u32) -> u32 {
    upper << 6 | (shamt & 0x3f)
}

macro_rules! utype_instr {
    ($name:ident, $opcode:expr) => {
        pub fn $name(rd: u32, imm: u32) -> u32 {
            ujtype(imm & 0xfffff, rd, $opcode)
        }
    };
}

macro_rules! itype_instr {
    ($name:ident, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u32, rs1: u32, imm: i32) -> u32 {
            itype(imm as u32, rs1, $funct3, rd, $opcode)
        }
    };
}

macro_rules! btype_instr {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rs1: u32, rs2: u32, offset: i32) -> u32 {
            let (a, b) = btype_imm_fields(offset);
            rstype(a, rs2, rs1, $funct3, b, OP_BRANCH)
        }
    };
}

macro_rules! stype_instr {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rs2: u32, rs1: u32, offset: i32) -> u32 {
            let imm = offset as u32;
            let imm11_5 = extract_field(imm, 11, 5);
            let imm4_0 = extract_field(imm, 4, 0);
            rstype(imm11_5, rs2, rs1, $funct3, imm4_0, OP_STORE)
        }
    };
}

macro_rules! shift_instr {
    ($name:ident, $upper:expr, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u32, rs1: u32, shamt: u32) -> u32 {
            itype(shift_imm(shamt, $upper), rs1, $funct3, rd, $opcode)
        }
    };
}

macro_rules! rtype_instr {
    ($name:ident, $funct7:expr, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u32, rs1: u32, rs2: u32) -> u32 {
            rstype($funct7, rs2, rs1, $funct3, rd, $opcode)
        }
    };
}

/// CSR instructions reuse the I-type layout with the CSR number in
/// the immediate field; the register forms put a register index in
/// rs1, the immediate forms a 5-bit zimm.
macro_rules! csr_instr {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rd: u32, csr: u32, src: u32) -> u32 {
            itype(csr, src, $funct3, rd, OP_SYSTEM)
        }
    };
}

utype_instr!(lui, OP_LUI);
utype_instr!(auipc, OP_AUIPC);

pub fn jal(rd: u32, offset: i32) -> u32 {
    ujtype(jtype_imm_field(offset), rd, OP_JAL)
}

itype_instr!(jalr, 0b000, OP_JALR);

btype_instr!(beq, FUNCT3_BEQ);
btype_instr!(bne, FUNCT3_BNE);
btype_instr!(blt, FUNCT3_BLT);
btype_instr!(bge, FUNCT3_BGE);
btype_instr!(bltu, FUNCT3_BLTU);
btype_instr!(bgeu, FUNCT3_BGEU);

itype_instr!(lb, FUNCT3_B, OP_LOAD);
itype_instr!(lh, FUNCT3_H, OP_LOAD);
itype_instr!(lw, FUNCT3_W, OP_LOAD);
itype_instr!(ld, FUNCT3_D, OP_LOAD);
itype_instr!(lbu, FUNCT3_BU, OP_LOAD);
itype_instr!(lhu, FUNCT3_HU, OP_LOAD);
itype_instr!(lwu, FUNCT3_WU, OP_LOAD);

stype_instr!(sb, FUNCT3_B);
stype_instr!(sh, FUNCT3_H);
stype_instr!(sw, FUNCT3_W);
stype_instr!(sd, FUNCT3_D);

itype_instr!(addi, FUNCT3_ADD, OP_IMM);
itype_instr!(slti, FUNCT3_SLT, OP_IMM);
itype_instr!(sltiu, FUNCT3_SLTU, OP_IMM);
itype_instr!(xori, FUNCT3_XOR, OP_IMM);
itype_instr!(ori, FUNCT3_OR, OP_IMM);
itype_instr!(andi, FUNCT3_AND, OP_IMM);

shift_instr!(slli, 0b000000, FUNCT3_SLL, OP_IMM);
shift_instr!(srli, 0b000000, FUNCT3_SR, OP_IMM);
shift_instr!(srai, 0b010000, FUNCT3_SR, OP_IMM);

rtype_instr!(add, FUNCT7_BASE, FUNCT3_ADD, OP);
rtype_instr!(sub, FUNCT7_ALT, FUNCT3_ADD, OP);
rtype_instr!(sll, FUNCT7_BASE, FUNCT3_SLL, OP);
rtype_instr!(slt, FUNCT7_BASE, FUNCT3_SLT, OP);
rtype_instr!(sltu, FUNCT7_BASE, FUNCT3_SLTU, OP);
rtype_instr!(xor, FUNCT7_BASE, FUNCT3_XOR, OP);
rtype_instr!(srl, FUNCT7_BASE, FUNCT3_SR, OP);
rtype_instr!(sra, FUNCT7_ALT, FUNCT3_SR, OP);
rtype_instr!(or, FUNCT7_BASE, FUNCT3_OR, OP);
rtype_instr!(and, FUNCT7_BASE, FUNCT3_AND, OP);

itype_instr!(addiw, FUNCT3_ADD, OP_IMM_32);
// The W-form shift amounts are five bits, so the whole funct7 field
// is the discriminator
pub fn slliw(rd: u32, rs1: u32, shamt: u32) -> u32 {
    rstype(FUNCT7_BASE, shamt & 0x1f, rs1, FUNCT3_SLL, rd, OP_IMM_32)
}
pub fn srliw(rd: u32, rs1: u32, shamt: u32) -> u32 {
    rstype(FUNCT7_BASE, shamt & 0x1f, rs1, FUNCT3_SR, rd, OP_IMM_32)
}
pub fn sraiw(rd: u32, rs1: u32, shamt: u32) -> u32 {
    rstype(FUNCT7_ALT, shamt & 0x1f, rs1, FUNCT3_SR, rd, OP_IMM_32)
}

rtype_instr!(addw, FUNCT7_BASE, FUNCT3_ADD, OP_32);
rtype_instr!(subw, FUNCT7_ALT, FUNCT3_ADD, OP_32);
rtype_instr!(sllw, FUNCT7_BASE, FUNCT3_SLL, OP_32);
rtype_instr!(srlw, FUNCT7_BASE, FUNCT3_SR, OP_32);
rtype_instr!(sraw, FUNCT7_ALT, FUNCT3_SR, OP_32);

csr_instr!(csrrw, FUNCT3_CSRRW);
csr_instr!(csrrs, FUNCT3_CSRRS);
csr_instr!(csrrc, FUNCT3_CSRRC);
csr_instr!(csrrwi, FUNCT3_CSRRWI);
csr_instr!(csrrsi, FUNCT3_CSRRSI);
csr_instr!(csrrci, FUNCT3_CSRRCI);

pub fn ecall() -> u32 {
    itype(IMM_ECALL, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn ebreak() -> u32 {
    itype(IMM_EBREAK, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn mret() -> u32 {
    itype(IMM_MRET, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn fence() -> u32 {
    itype(0, 0, 0, 0, OP_MISC_MEM)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_known_words() {
        // Cross-checked against an external assembler
        assert_eq!(addi(1, 0, -1), 0xfff0_0093);
        assert_eq!(lui(2, 0xfffff), 0xffff_f137);
        assert_eq!(ecall(), 0x0000_0073);
        assert_eq!(ebreak(), 0x0010_0073);
        assert_eq!(mret(), 0x3020_0073);
    }

    #[test]
    fn check_jal_offset_shuffle() {
        // jal x1, 8 => imm[20|10:1|11|19:12] over ins[31:12]
        assert_eq!(jal(1, 8), 0x0080_00ef);
    }

    #[test]
    fn check_branch_offset_shuffle() {
        // beq x0, x0, -8
        assert_eq!(beq(0, 0, -8), 0xfe00_0ce3);
    }
}
