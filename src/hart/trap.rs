//! Trap delivery
//!
//! Synchronous exceptions and asynchronous interrupts share the
//! machine trap registers: the faulting pc goes to mepc, the cause to
//! mcause (with bit 63 set for interrupts), the cause-specific value
//! to mtval, and the mstatus interrupt stack is pushed (MIE saved to
//! MPIE, MIE cleared, the interrupted privilege recorded in MPP).
//!
//! References to the privileged spec refer to version 20211203.

use log::debug;

use super::csr::{self, MSTATUS_MIE_BIT, MSTATUS_MPIE_BIT, MSTATUS_MPP_BIT};
use super::{Hart, PrivilegeLevel};

/// Synchronous exception causes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    InstructionAddressMisaligned,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    StoreAddressMisaligned,
    UmodeEcall,
    MmodeEcall,
}

impl Exception {
    /// The mcause exception code
    pub fn cause(&self) -> u64 {
        match self {
            Exception::InstructionAddressMisaligned => 0,
            Exception::IllegalInstruction => 2,
            Exception::Breakpoint => 3,
            Exception::LoadAddressMisaligned => 4,
            Exception::StoreAddressMisaligned => 6,
            Exception::UmodeEcall => 8,
            Exception::MmodeEcall => 11,
        }
    }
}

/// Asynchronous interrupt causes
///
/// The exception code of an interrupt is also its bit position in
/// mip and mie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    UserSoftware,
    MachineSoftware,
    UserTimer,
    MachineTimer,
    UserExternal,
    MachineExternal,
}

impl Interrupt {
    /// Service order, highest priority first
    pub const PRIORITY: [Interrupt; 6] = [
        Interrupt::MachineExternal,
        Interrupt::MachineSoftware,
        Interrupt::MachineTimer,
        Interrupt::UserExternal,
        Interrupt::UserSoftware,
        Interrupt::UserTimer,
    ];

    /// The mcause exception code and mip/mie bit position
    pub fn cause(&self) -> u64 {
        match self {
            Interrupt::UserSoftware => 0,
            Interrupt::MachineSoftware => 3,
            Interrupt::UserTimer => 4,
            Interrupt::MachineTimer => 7,
            Interrupt::UserExternal => 8,
            Interrupt::MachineExternal => 11,
        }
    }

    /// The value of the mcause CSR for this interrupt
    pub fn mcause(&self) -> u64 {
        1 << 63 | self.cause()
    }
}

impl Hart {
    /// Raise a synchronous exception
    ///
    /// Called from the execute path, where the step loop still
    /// applies the trailing `pc += 4` and retire increment, so this
    /// function leaves pc four short of the handler and the count one
    /// short; the increments land the step on the handler with the
    /// count unchanged. The misaligned-fetch exception is raised
    /// before fetch, where no trailing increments happen, and
    /// compensates internally.
    pub(crate) fn except(&mut self, ex: Exception) {
        let cause = ex.cause();
        debug!(
            "exception raised: cause = {}, pc = {:016x}, val = {:08x}",
            cause, self.pc, self.ins
        );

        let old_pc = self.pc;
        self.csrs.set(csr::MEPC, old_pc);
        self.csrs.set(csr::MCAUSE, cause);
        // Synchronous traps land on the vector base in both mtvec
        // modes; only interrupts use the vectored offset
        self.pc = self.trap_vector(None);
        self.push_trap_status();

        match ex {
            Exception::InstructionAddressMisaligned => {
                self.csrs.set(csr::MTVAL, old_pc);
                self.ins_count = self.ins_count.wrapping_add(1);
                self.pc = self.pc.wrapping_add(4);
            }
            Exception::IllegalInstruction => self.csrs.set(csr::MTVAL, self.ins.into()),
            // Breakpoint leaves mtval untouched and always enters
            // machine mode
            Exception::Breakpoint => self.prv = PrivilegeLevel::Machine,
            Exception::LoadAddressMisaligned | Exception::StoreAddressMisaligned => {
                self.csrs
                    .set(csr::MTVAL, self.registers.read(self.decoded.rs1));
            }
            Exception::UmodeEcall => {
                self.csrs.set(csr::MTVAL, 0);
                self.prv = PrivilegeLevel::Machine;
            }
            Exception::MmodeEcall => self.csrs.set(csr::MTVAL, 0),
        }

        self.pc = self.pc.wrapping_sub(4);
        self.ins_count = self.ins_count.wrapping_sub(1);
    }

    /// Take a pending interrupt
    ///
    /// Runs at the top of a step, before fetch; the step ends after
    /// delivery, so pc is set to the handler directly and the retire
    /// count is untouched.
    pub(crate) fn interrupt(&mut self, int: Interrupt) {
        debug!(
            "interrupt taken: cause = {}, pc = {:016x}",
            int.cause(),
            self.pc
        );

        self.csrs.set(csr::MEPC, self.pc);
        self.csrs.set(csr::MCAUSE, int.mcause());
        self.pc = self.trap_vector(Some(int.cause()));
        self.push_trap_status();
        self.prv = PrivilegeLevel::Machine;
    }

    /// Push the mstatus interrupt stack: MIE saves to MPIE, MIE
    /// clears, MPP records the interrupted privilege. Must run before
    /// any privilege switch so MPP sees the old level.
    fn push_trap_status(&mut self) {
        let status = self.csrs.get(csr::MSTATUS);
        let mie = status >> MSTATUS_MIE_BIT & 1;
        let mut status = status
            & !(1 << MSTATUS_MIE_BIT)
            & !(1 << MSTATUS_MPIE_BIT)
            & !(0b11 << MSTATUS_MPP_BIT);
        status |= mie << MSTATUS_MPIE_BIT;
        status |= (self.prv as u64) << MSTATUS_MPP_BIT;
        self.csrs.set(csr::MSTATUS, status);
    }

    /// The handler address for a trap; `interrupt_cause` is None for
    /// synchronous exceptions
    fn trap_vector(&self, interrupt_cause: Option<u64>) -> u64 {
        let mtvec = self.csrs.get(csr::MTVEC);
        let base = mtvec & !0x3;
        match interrupt_cause {
            Some(cause) if mtvec & 1 == 1 => base + 4 * cause,
            _ => base,
        }
    }

    /// The highest-priority interrupt that is pending, enabled, and
    /// deliverable at the current privilege
    ///
    /// Interrupts are deliverable when mstatus.MIE is set or the hart
    /// runs in user mode; an individual interrupt fires when its bit
    /// is set in both mip and mie.
    pub(crate) fn pending_interrupt(&self) -> Option<Interrupt> {
        let status = self.csrs.get(csr::MSTATUS);
        if status >> MSTATUS_MIE_BIT & 1 == 0 && self.prv != PrivilegeLevel::User {
            return None;
        }
        let ready = self.csrs.get(csr::MIP) & self.csrs.get(csr::MIE);
        Interrupt::PRIORITY
            .into_iter()
            .find(|int| ready >> int.cause() & 1 == 1)
    }
}
