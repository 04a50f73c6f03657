//! Instruction decoder
//!
//! [`decode`] is a pure function from a 32-bit instruction word to a
//! [`Decoded`] record. Dispatch is a match on opcode bits [6:0],
//! then on funct3 and, where two instructions share a funct3 slot,
//! on funct7.
//!
//! Words that match no table entry yield the reset record with
//! [`Kind::Default`]; the executor retires them without effect rather
//! than raising illegal-instruction. This deviates from the
//! architecture manual but is kept for bitwise compatibility with the
//! behaviour this simulator models.

use crate::instr::{Decoded, Format, Kind};
use crate::opcodes::*;
use crate::utils::extract_field;

fn r_type(ins: u32, kind: Kind) -> Decoded {
    Decoded {
        kind,
        format: Format::R,
        rd: extract_field(ins, 11, 7) as u8,
        rs1: extract_field(ins, 19, 15) as u8,
        rs2: extract_field(ins, 24, 20) as u8,
        funct3: extract_field(ins, 14, 12) as u8,
        funct7: extract_field(ins, 31, 25) as u8,
        ..Decoded::default()
    }
}

fn i_type(ins: u32, kind: Kind) -> Decoded {
    Decoded {
        kind,
        format: Format::I,
        rd: extract_field(ins, 11, 7) as u8,
        rs1: extract_field(ins, 19, 15) as u8,
        funct3: extract_field(ins, 14, 12) as u8,
        funct7: extract_field(ins, 31, 25) as u8,
        imm: extract_field(ins, 31, 20).into(),
        ..Decoded::default()
    }
}

fn s_type(ins: u32, kind: Kind) -> Decoded {
    // imm = ins[31:25] . ins[11:7]
    let imm = extract_field(ins, 31, 25) << 5 | extract_field(ins, 11, 7);
    Decoded {
        kind,
        format: Format::S,
        rs1: extract_field(ins, 19, 15) as u8,
        rs2: extract_field(ins, 24, 20) as u8,
        funct3: extract_field(ins, 14, 12) as u8,
        funct7: extract_field(ins, 31, 25) as u8,
        imm: imm.into(),
        ..Decoded::default()
    }
}

fn b_type(ins: u32, kind: Kind) -> Decoded {
    // imm = ins[31] . ins[7] . ins[30:25] . ins[11:8], low zero bit elided
    let imm = extract_field(ins, 31, 31) << 11
        | extract_field(ins, 7, 7) << 10
        | extract_field(ins, 30, 25) << 4
        | extract_field(ins, 11, 8);
    Decoded {
        kind,
        format: Format::B,
        rs1: extract_field(ins, 19, 15) as u8,
        rs2: extract_field(ins, 24, 20) as u8,
        funct3: extract_field(ins, 14, 12) as u8,
        funct7: extract_field(ins, 31, 25) as u8,
        imm: imm.into(),
        ..Decoded::default()
    }
}

fn u_type(ins: u32, kind: Kind) -> Decoded {
    Decoded {
        kind,
        format: Format::U,
        rd: extract_field(ins, 11, 7) as u8,
        imm: extract_field(ins, 31, 12).into(),
        ..Decoded::default()
    }
}

fn j_type(ins: u32, kind: Kind) -> Decoded {
    // imm = ins[31] . ins[19:12] . ins[20] . ins[30:21], low zero bit elided
    let imm = extract_field(ins, 31, 31) << 19
        | extract_field(ins, 19, 12) << 11
        | extract_field(ins, 20, 20) << 10
        | extract_field(ins, 30, 21);
    Decoded {
        kind,
        format: Format::J,
        rd: extract_field(ins, 11, 7) as u8,
        imm: imm.into(),
        ..Decoded::default()
    }
}

fn system(ins: u32) -> Decoded {
    match extract_field(ins, 14, 12) {
        FUNCT3_PRIV => {
            let kind = match ins >> 20 {
                IMM_ECALL => Kind::Ecall,
                IMM_MRET => Kind::Mret,
                _ => Kind::Ebreak,
            };
            Decoded {
                kind,
                ..Decoded::default()
            }
        }
        FUNCT3_CSRRW => i_type(ins, Kind::Csrrw),
        FUNCT3_CSRRS => i_type(ins, Kind::Csrrs),
        FUNCT3_CSRRC => i_type(ins, Kind::Csrrc),
        FUNCT3_CSRRWI => i_type(ins, Kind::Csrrwi),
        FUNCT3_CSRRSI => i_type(ins, Kind::Csrrsi),
        FUNCT3_CSRRCI => i_type(ins, Kind::Csrrci),
        _ => Decoded::default(),
    }
}

/// Decode a 32-bit instruction word
pub fn decode(ins: u32) -> Decoded {
    let funct3 = extract_field(ins, 14, 12);
    let funct7 = extract_field(ins, 31, 25);
    match extract_field(ins, 6, 0) {
        OP_LOAD => match funct3 {
            FUNCT3_B => i_type(ins, Kind::Lb),
            FUNCT3_H => i_type(ins, Kind::Lh),
            FUNCT3_W => i_type(ins, Kind::Lw),
            FUNCT3_D => i_type(ins, Kind::Ld),
            FUNCT3_BU => i_type(ins, Kind::Lbu),
            FUNCT3_HU => i_type(ins, Kind::Lhu),
            FUNCT3_WU => i_type(ins, Kind::Lwu),
            _ => Decoded::default(),
        },
        OP_MISC_MEM => Decoded {
            kind: Kind::Fence,
            ..Decoded::default()
        },
        OP_IMM => match funct3 {
            FUNCT3_ADD => i_type(ins, Kind::Addi),
            // The shift immediates decode as R-format: the shift
            // amount spans rs2 and funct7 bit 0
            FUNCT3_SLL => r_type(ins, Kind::Slli),
            FUNCT3_SLT => i_type(ins, Kind::Slti),
            FUNCT3_SLTU => i_type(ins, Kind::Sltiu),
            FUNCT3_XOR => i_type(ins, Kind::Xori),
            FUNCT3_SR => {
                if funct7 >> 1 == 0 {
                    r_type(ins, Kind::Srli)
                } else {
                    r_type(ins, Kind::Srai)
                }
            }
            FUNCT3_OR => i_type(ins, Kind::Ori),
            FUNCT3_AND => i_type(ins, Kind::Andi),
            _ => Decoded::default(),
        },
        OP_AUIPC => u_type(ins, Kind::Auipc),
        OP_IMM_32 => match funct3 {
            FUNCT3_ADD => i_type(ins, Kind::Addiw),
            FUNCT3_SLL => r_type(ins, Kind::Slliw),
            FUNCT3_SR => {
                if funct7 == 0 {
                    r_type(ins, Kind::Srliw)
                } else {
                    r_type(ins, Kind::Sraiw)
                }
            }
            _ => Decoded::default(),
        },
        OP_STORE => match funct3 {
            FUNCT3_B => s_type(ins, Kind::Sb),
            FUNCT3_H => s_type(ins, Kind::Sh),
            FUNCT3_W => s_type(ins, Kind::Sw),
            FUNCT3_D => s_type(ins, Kind::Sd),
            _ => Decoded::default(),
        },
        OP => match funct3 {
            FUNCT3_ADD => {
                if funct7 == 0 {
                    r_type(ins, Kind::Add)
                } else {
                    r_type(ins, Kind::Sub)
                }
            }
            FUNCT3_SLL => r_type(ins, Kind::Sll),
            FUNCT3_SLT => r_type(ins, Kind::Slt),
            FUNCT3_SLTU => r_type(ins, Kind::Sltu),
            FUNCT3_XOR => r_type(ins, Kind::Xor),
            FUNCT3_SR => {
                if funct7 == 0 {
                    r_type(ins, Kind::Srl)
                } else {
                    r_type(ins, Kind::Sra)
                }
            }
            FUNCT3_OR => r_type(ins, Kind::Or),
            FUNCT3_AND => r_type(ins, Kind::And),
            _ => Decoded::default(),
        },
        OP_LUI => u_type(ins, Kind::Lui),
        OP_32 => match funct3 {
            FUNCT3_ADD => {
                if funct7 == 0 {
                    r_type(ins, Kind::Addw)
                } else {
                    r_type(ins, Kind::Subw)
                }
            }
            FUNCT3_SLL => r_type(ins, Kind::Sllw),
            FUNCT3_SR => {
                if funct7 == 0 {
                    r_type(ins, Kind::Srlw)
                } else {
                    r_type(ins, Kind::Sraw)
                }
            }
            _ => Decoded::default(),
        },
        OP_BRANCH => match funct3 {
            FUNCT3_BEQ => b_type(ins, Kind::Beq),
            FUNCT3_BNE => b_type(ins, Kind::Bne),
            FUNCT3_BLT => b_type(ins, Kind::Blt),
            FUNCT3_BGE => b_type(ins, Kind::Bge),
            FUNCT3_BLTU => b_type(ins, Kind::Bltu),
            FUNCT3_BGEU => b_type(ins, Kind::Bgeu),
            _ => Decoded::default(),
        },
        OP_JALR => i_type(ins, Kind::Jalr),
        OP_JAL => j_type(ins, Kind::Jal),
        OP_SYSTEM => system(ins),
        _ => Decoded::default(),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::encode;

    #[test]
    fn check_decode_addi() {
        // addi x1, x0, -1 => 0xfff00093
        let d = decode(0xfff0_0093);
        assert_eq!(d.kind, Kind::Addi);
        assert_eq!(d.format, Format::I);
        assert_eq!(d.rd, 1);
        assert_eq!(d.rs1, 0);
        assert_eq!(d.imm, 0xfff);
    }

    #[test]
    fn check_decode_lui() {
        // lui x2, 0xfffff => 0xfffff137
        let d = decode(0xffff_f137);
        assert_eq!(d.kind, Kind::Lui);
        assert_eq!(d.format, Format::U);
        assert_eq!(d.rd, 2);
        assert_eq!(d.imm, 0xfffff);
    }

    #[test]
    fn check_decode_loads() {
        for (ins, kind) in [
            (encode::lb(1, 2, 8), Kind::Lb),
            (encode::lh(1, 2, 8), Kind::Lh),
            (encode::lw(1, 2, 8), Kind::Lw),
            (encode::ld(1, 2, 8), Kind::Ld),
            (encode::lbu(1, 2, 8), Kind::Lbu),
            (encode::lhu(1, 2, 8), Kind::Lhu),
            (encode::lwu(1, 2, 8), Kind::Lwu),
        ] {
            let d = decode(ins);
            assert_eq!(d.kind, kind);
            assert_eq!(d.format, Format::I);
            assert_eq!(d.rd, 1);
            assert_eq!(d.rs1, 2);
            assert_eq!(d.imm, 8);
        }
    }

    #[test]
    fn check_decode_store_immediate() {
        // sw x7, -12(x3): imm splits across ins[31:25] and ins[11:7]
        let d = decode(encode::sw(7, 3, -12));
        assert_eq!(d.kind, Kind::Sw);
        assert_eq!(d.format, Format::S);
        assert_eq!(d.rs1, 3);
        assert_eq!(d.rs2, 7);
        assert_eq!(d.imm, 0xff4);
    }

    #[test]
    fn check_decode_branch_immediate() {
        // beq x1, x2, -4: raw imm is the 12-bit offset with bit 0 elided
        let d = decode(encode::beq(1, 2, -4));
        assert_eq!(d.kind, Kind::Beq);
        assert_eq!(d.format, Format::B);
        assert_eq!(d.rs1, 1);
        assert_eq!(d.rs2, 2);
        // -4 >> 1 = -2 in 12 bits = 0xffe
        assert_eq!(d.imm, 0xffe);
    }

    #[test]
    fn check_decode_jal_immediate() {
        let d = decode(encode::jal(1, 8));
        assert_eq!(d.kind, Kind::Jal);
        assert_eq!(d.format, Format::J);
        assert_eq!(d.rd, 1);
        // 8 >> 1 = 4
        assert_eq!(d.imm, 4);

        let d = decode(encode::jal(1, -4));
        // -4 >> 1 = -2 in 20 bits
        assert_eq!(d.imm, 0xffffe);
    }

    #[test]
    fn check_decode_shift_immediates() {
        let d = decode(encode::slli(1, 1, 63));
        assert_eq!(d.kind, Kind::Slli);
        assert_eq!(d.format, Format::R);
        // 6-bit shift amount: bit 5 lands in funct7 bit 0
        assert_eq!(d.funct7 & 1, 1);
        assert_eq!(d.rs2, 31);

        assert_eq!(decode(encode::srli(1, 1, 3)).kind, Kind::Srli);
        assert_eq!(decode(encode::srai(1, 1, 3)).kind, Kind::Srai);
        assert_eq!(decode(encode::srai(1, 1, 33)).kind, Kind::Srai);
    }

    #[test]
    fn check_decode_add_sub_discriminator() {
        assert_eq!(decode(encode::add(1, 2, 3)).kind, Kind::Add);
        assert_eq!(decode(encode::sub(1, 2, 3)).kind, Kind::Sub);
        assert_eq!(decode(encode::srl(1, 2, 3)).kind, Kind::Srl);
        assert_eq!(decode(encode::sra(1, 2, 3)).kind, Kind::Sra);
    }

    #[test]
    fn check_decode_word_forms() {
        assert_eq!(decode(encode::addiw(1, 2, 5)).kind, Kind::Addiw);
        assert_eq!(decode(encode::slliw(1, 2, 5)).kind, Kind::Slliw);
        assert_eq!(decode(encode::srliw(1, 2, 5)).kind, Kind::Srliw);
        assert_eq!(decode(encode::sraiw(1, 2, 5)).kind, Kind::Sraiw);
        assert_eq!(decode(encode::addw(1, 2, 3)).kind, Kind::Addw);
        assert_eq!(decode(encode::subw(1, 2, 3)).kind, Kind::Subw);
        assert_eq!(decode(encode::sllw(1, 2, 3)).kind, Kind::Sllw);
        assert_eq!(decode(encode::srlw(1, 2, 3)).kind, Kind::Srlw);
        assert_eq!(decode(encode::sraw(1, 2, 3)).kind, Kind::Sraw);
    }

    #[test]
    fn check_decode_system() {
        assert_eq!(decode(encode::ecall()).kind, Kind::Ecall);
        assert_eq!(decode(encode::ebreak()).kind, Kind::Ebreak);
        assert_eq!(decode(encode::mret()).kind, Kind::Mret);
        assert_eq!(decode(encode::fence()).kind, Kind::Fence);
    }

    #[test]
    fn check_decode_csr_fields() {
        // csrrw x3, mscratch, x5: imm holds the CSR number, rs1 the
        // source register index
        let d = decode(encode::csrrw(3, 0x340, 5));
        assert_eq!(d.kind, Kind::Csrrw);
        assert_eq!(d.rd, 3);
        assert_eq!(d.rs1, 5);
        assert_eq!(d.imm, 0x340);

        // csrrsi x0, mip, 0x11: rs1 holds the zimm
        let d = decode(encode::csrrsi(0, 0x344, 0x11));
        assert_eq!(d.kind, Kind::Csrrsi);
        assert_eq!(d.rs1, 0x11);
        assert_eq!(d.imm, 0x344);

        assert_eq!(decode(encode::csrrs(1, 0x300, 2)).kind, Kind::Csrrs);
        assert_eq!(decode(encode::csrrc(1, 0x300, 2)).kind, Kind::Csrrc);
        assert_eq!(decode(encode::csrrwi(1, 0x300, 2)).kind, Kind::Csrrwi);
        assert_eq!(decode(encode::csrrci(1, 0x300, 2)).kind, Kind::Csrrci);
    }

    #[test]
    fn check_unknown_opcode_resets_record() {
        // 0x5b is not a valid major opcode
        let d = decode(0x0000_005b);
        assert_eq!(d, Decoded::default());
        assert_eq!(d.kind, Kind::Default);

        // all-ones and all-zeros words are also unknown
        assert_eq!(decode(0x0000_0000).kind, Kind::Default);
    }

    #[test]
    fn check_unknown_funct3_resets_record() {
        // opcode OP_LOAD with funct3 = 7 matches no load
        let ins = 0x7003; // funct3 = 7, opcode = 0x03
        assert_eq!(decode(ins).kind, Kind::Default);
        // OP_IMM_32 with funct3 = 2
        let ins = 0x201b;
        assert_eq!(decode(ins).kind, Kind::Default);
    }
}
