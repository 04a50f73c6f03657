//! Instruction execution
//!
//! Realises the architectural semantics of each decoded instruction.
//! All arithmetic wraps modulo 2^64; signed comparison and arithmetic
//! right shifts go through i64 casts. Every handler falls through to
//! the trailing `pc += 4` except the jumps and taken branches, which
//! set pc directly and return early; trap entry relies on the
//! trailing increment to land on the handler (see the trap module).

use crate::instr::{Decoded, Kind};
use crate::utils::{mask, sign_extend};

use super::csr::{self, MSTATUS_MIE_BIT, MSTATUS_MPIE_BIT, MSTATUS_MPP_BIT};
use super::trap::Exception;
use super::{Hart, PrivilegeLevel};

/// Branch and JAL offsets: sign-extend the raw field, shift the
/// elided zero bit back in, then sign-extend the 32-bit result. The
/// two extensions must happen in this order.
fn pc_offset(imm: u64, bits: u32) -> u64 {
    sign_extend(sign_extend(imm, bits) << 1, 32)
}

impl Hart {
    /// Execute the current decode record
    pub(crate) fn execute_decoded(&mut self) {
        let d = self.decoded;
        match d.kind {
            // Unknown words retire with no effect
            Kind::Default => {}

            Kind::Lui => self
                .registers
                .write(d.rd, sign_extend(d.imm << 12, 32)),
            Kind::Auipc => self
                .registers
                .write(d.rd, self.pc.wrapping_add(sign_extend(d.imm << 12, 32))),

            Kind::Jal => {
                self.registers.write(d.rd, self.pc.wrapping_add(4));
                self.pc = self.pc.wrapping_add(pc_offset(d.imm, 20));
                self.pc &= !1;
                return;
            }
            Kind::Jalr => {
                let link = self.pc.wrapping_add(4);
                self.pc = sign_extend(
                    self.registers
                        .read(d.rs1)
                        .wrapping_add(sign_extend(d.imm, 12)),
                    32,
                );
                self.registers.write(d.rd, link);
                self.pc &= !1;
                return;
            }

            Kind::Beq | Kind::Bne | Kind::Blt | Kind::Bge | Kind::Bltu | Kind::Bgeu => {
                if self.branch_taken(d) {
                    self.pc = self.pc.wrapping_add(pc_offset(d.imm, 12));
                    return;
                }
            }

            Kind::Lb | Kind::Lh | Kind::Lw | Kind::Ld | Kind::Lbu | Kind::Lhu | Kind::Lwu => {
                self.execute_load(d)
            }
            Kind::Sb | Kind::Sh | Kind::Sw | Kind::Sd => self.execute_store(d),

            Kind::Addi => {
                let value = self
                    .registers
                    .read(d.rs1)
                    .wrapping_add(sign_extend(d.imm, 12));
                self.registers.write(d.rd, value);
            }
            Kind::Slti => {
                let taken = (self.registers.read(d.rs1) as i64) < (sign_extend(d.imm, 12) as i64);
                self.registers.write(d.rd, taken.into());
            }
            Kind::Sltiu => {
                // The immediate is sign-extended to 64 bits first,
                // then compared unsigned
                let taken = self.registers.read(d.rs1) < sign_extend(d.imm, 12);
                self.registers.write(d.rd, taken.into());
            }
            Kind::Xori => {
                let value = self.registers.read(d.rs1) ^ sign_extend(d.imm, 12);
                self.registers.write(d.rd, value);
            }
            Kind::Ori => {
                let value = self.registers.read(d.rs1) | sign_extend(d.imm, 12);
                self.registers.write(d.rd, value);
            }
            Kind::Andi => {
                let value = self.registers.read(d.rs1) & sign_extend(d.imm, 12);
                self.registers.write(d.rd, value);
            }

            // The immediate shift amount is six bits: bit 5 comes
            // from funct7 bit 0
            Kind::Slli => {
                let shamt = shamt6(&d);
                self.registers.write(d.rd, self.registers.read(d.rs1) << shamt);
            }
            Kind::Srli => {
                let shamt = shamt6(&d);
                self.registers.write(d.rd, self.registers.read(d.rs1) >> shamt);
            }
            Kind::Srai => {
                let shamt = shamt6(&d);
                let value = (self.registers.read(d.rs1) as i64) >> shamt;
                self.registers.write(d.rd, value as u64);
            }

            Kind::Add => self.reg_reg(d, u64::wrapping_add),
            Kind::Sub => self.reg_reg(d, u64::wrapping_sub),
            Kind::Sll => self.reg_reg(d, |a, b| a << (b & 0x3f)),
            Kind::Slt => self.reg_reg(d, |a, b| ((a as i64) < b as i64).into()),
            Kind::Sltu => self.reg_reg(d, |a, b| (a < b).into()),
            Kind::Xor => self.reg_reg(d, |a, b| a ^ b),
            Kind::Srl => self.reg_reg(d, |a, b| a >> (b & 0x3f)),
            Kind::Sra => self.reg_reg(d, |a, b| ((a as i64) >> (b & 0x3f)) as u64),
            Kind::Or => self.reg_reg(d, |a, b| a | b),
            Kind::And => self.reg_reg(d, |a, b| a & b),

            // W-forms operate on the low 32 bits and sign-extend the
            // 32-bit result
            Kind::Addiw => {
                let sum = self
                    .registers
                    .read(d.rs1)
                    .wrapping_add(sign_extend(d.imm, 12));
                self.registers.write(d.rd, sign_extend(sum, 32));
            }
            Kind::Slliw => {
                let value = self.registers.read(d.rs1) << d.rs2;
                self.registers.write(d.rd, sign_extend(value, 32));
            }
            Kind::Srliw => {
                let value = (self.registers.read(d.rs1) & 0xffff_ffff) >> d.rs2;
                self.registers.write(d.rd, sign_extend(value, 32));
            }
            Kind::Sraiw => {
                let value = (sign_extend(self.registers.read(d.rs1), 32) as i64) >> d.rs2;
                self.registers.write(d.rd, value as u64);
            }
            Kind::Addw => self.reg_reg(d, |a, b| sign_extend(a.wrapping_add(b), 32)),
            Kind::Subw => self.reg_reg(d, |a, b| sign_extend(a.wrapping_sub(b), 32)),
            Kind::Sllw => self.reg_reg(d, |a, b| sign_extend(a << (b & 0x1f), 32)),
            Kind::Srlw => {
                self.reg_reg(d, |a, b| sign_extend((a & 0xffff_ffff) >> (b & 0x1f), 32))
            }
            Kind::Sraw => self.reg_reg(d, |a, b| {
                ((sign_extend(a, 32) as i64) >> (b & 0x1f)) as u64
            }),

            Kind::Fence => {}

            Kind::Ecall => match self.prv {
                PrivilegeLevel::User => self.except(Exception::UmodeEcall),
                PrivilegeLevel::Machine => self.except(Exception::MmodeEcall),
            },
            Kind::Ebreak => self.except(Exception::Breakpoint),
            Kind::Mret => self.execute_mret(),

            Kind::Csrrw
            | Kind::Csrrs
            | Kind::Csrrc
            | Kind::Csrrwi
            | Kind::Csrrsi
            | Kind::Csrrci => self.execute_csr(d),
        }
        self.pc = self.pc.wrapping_add(4);
    }

    fn reg_reg(&mut self, d: Decoded, op: impl Fn(u64, u64) -> u64) {
        let value = op(self.registers.read(d.rs1), self.registers.read(d.rs2));
        self.registers.write(d.rd, value);
    }

    fn branch_taken(&self, d: Decoded) -> bool {
        let lhs = self.registers.read(d.rs1);
        let rhs = self.registers.read(d.rs2);
        match d.kind {
            Kind::Beq => lhs == rhs,
            Kind::Bne => lhs != rhs,
            Kind::Blt => (lhs as i64) < rhs as i64,
            Kind::Bge => (lhs as i64) >= rhs as i64,
            Kind::Bltu => lhs < rhs,
            Kind::Bgeu => lhs >= rhs,
            _ => unreachable!("branch_taken called for non-branch"),
        }
    }

    fn execute_load(&mut self, d: Decoded) {
        let (size, signed) = match d.kind {
            Kind::Lb => (1, true),
            Kind::Lh => (2, true),
            Kind::Lw => (4, true),
            Kind::Ld => (8, true),
            Kind::Lbu => (1, false),
            Kind::Lhu => (2, false),
            Kind::Lwu => (4, false),
            _ => unreachable!("execute_load called for non-load"),
        };
        let address = self
            .registers
            .read(d.rs1)
            .wrapping_add(sign_extend(d.imm, 12));
        if address % size != 0 {
            self.except(Exception::LoadAddressMisaligned);
            return;
        }
        let shift = address % 8 * 8;
        let raw = self.memory.read_doubleword(address) >> shift;
        let value = match (size, signed) {
            (8, _) => raw,
            (_, true) => sign_extend(raw, 8 * size as u32),
            (_, false) => raw & mask::<u64>(8 * size),
        };
        self.registers.write(d.rd, value);
    }

    fn execute_store(&mut self, d: Decoded) {
        let size = match d.kind {
            Kind::Sb => 1,
            Kind::Sh => 2,
            Kind::Sw => 4,
            Kind::Sd => 8,
            _ => unreachable!("execute_store called for non-store"),
        };
        let address = self
            .registers
            .read(d.rs1)
            .wrapping_add(sign_extend(d.imm, 12));
        if address % size != 0 {
            self.except(Exception::StoreAddressMisaligned);
            return;
        }
        let shift = address % 8 * 8;
        let lane_mask = if size == 8 {
            u64::MAX
        } else {
            mask::<u64>(8 * size) << shift
        };
        self.memory
            .write_doubleword(address, self.registers.read(d.rs2) << shift, lane_mask);
    }

    fn execute_mret(&mut self) {
        if self.prv != PrivilegeLevel::Machine {
            self.except(Exception::IllegalInstruction);
            return;
        }
        // The trailing increment turns this into pc = mepc
        self.pc = self.csrs.get(csr::MEPC).wrapping_sub(4);

        let status = self.csrs.get(csr::MSTATUS);
        let mpp = status >> MSTATUS_MPP_BIT & 0b11;
        self.prv = if mpp == PrivilegeLevel::Machine as u64 {
            PrivilegeLevel::Machine
        } else {
            PrivilegeLevel::User
        };

        // Pop the interrupt stack: MIE restores from MPIE, MPIE sets,
        // MPP clears
        let mpie = status >> MSTATUS_MPIE_BIT & 1;
        let mut status = status & !(0b11 << MSTATUS_MPP_BIT) & !(1 << MSTATUS_MIE_BIT);
        status |= mpie << MSTATUS_MIE_BIT;
        status |= 1 << MSTATUS_MPIE_BIT;
        self.csrs.set(csr::MSTATUS, status);
    }

    fn execute_csr(&mut self, d: Decoded) {
        let number = d.imm as u32;
        // The rs1 field is the source register index for the register
        // forms and the zimm for the immediate forms; either way a
        // zero field suppresses the write for the set/clear variants
        let source = d.rs1;
        if self.prv == PrivilegeLevel::User
            || !self.csrs.contains(number)
            || (csr::read_only(number) && source != 0)
        {
            self.except(Exception::IllegalInstruction);
            return;
        }

        let old = self.csrs.get(number);
        let operand = match d.kind {
            Kind::Csrrw | Kind::Csrrs | Kind::Csrrc => self.registers.read(source),
            _ => source.into(),
        };
        let (value, write) = match d.kind {
            Kind::Csrrw | Kind::Csrrwi => (operand, true),
            Kind::Csrrs | Kind::Csrrsi => (old | operand, source != 0),
            Kind::Csrrc | Kind::Csrrci => (old & !operand, source != 0),
            _ => unreachable!("execute_csr called for non-CSR instruction"),
        };
        // Only the user-level pending bits of mip are writable from
        // software
        let value = if number == csr::MIP {
            value & 0x111
        } else {
            value
        };

        self.registers.write(d.rd, old);
        if write {
            // A zero-source write targeting a read-only CSR is
            // dropped without trapping
            let _ = self.csrs.write(number, value);
        }
    }
}

fn shamt6(d: &Decoded) -> u32 {
    u32::from(d.funct7 & 1) << 5 | u32::from(d.rs2)
}
