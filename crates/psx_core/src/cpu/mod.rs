//! Emulation of the MIPS R3000 used by the original Sony Playstation.

mod cop0;

pub mod opcode;

use psx_util::Bit;
use thiserror::Error;

use crate::bus::bios::Bios;
use crate::bus::{AddrUnit, Bus, BusError, Byte, HalfWord, Word};

pub use cop0::{Cop0, Exception};
pub use opcode::{Opcode, RegIdx};

/// Host faults. Something the emulator can't handle, as opposed to exceptions which are handled
/// by the guest.
#[derive(Error, Debug)]
pub enum CpuError {
    #[error("bus error at pc {pc:#010x}: {source}")]
    Bus {
        pc: u32,
        #[source]
        source: BusError,
    },

    #[error("GTE instruction {opcode:08x} at pc {pc:#010x} isn't supported")]
    UnimplementedGte { pc: u32, opcode: u32 },
}

/// A load waiting to be written to a register.
#[derive(Default, Clone, Copy)]
struct DelaySlot {
    reg: RegIdx,
    val: u32,
}

pub struct Cpu {
    /// The address of the instruction being executed. Used for EPC when raising exceptions.
    current_pc: u32,
    /// Points to the opcode about to be executed at the start of each step. During the
    /// instruction it points at the next opcode, which is the delay slot of a branch.
    pc: u32,
    /// Always one step ahead of `pc`. Branches change `next_pc` instead of `pc`, so the
    /// instruction after a branch is always executed.
    next_pc: u32,
    /// Set if the current instruction is in a branch delay slot. If an exception is raised, EPC
    /// points to the branch before it.
    in_delay_slot: bool,
    /// Set by branches taken. Moves into `in_delay_slot` at the next step.
    branching: bool,
    /// Results of multiply and divide instructions.
    hi: u32,
    lo: u32,
    /// # Registers
    ///
    /// All registers besides $r0 are general purpose, although used for specific purposes by
    /// convention.
    ///
    /// | Number  | Name    | Usage                 |
    /// |---------|---------|-----------------------|
    /// | r0      | $zero   | Always 0              |
    /// | r1      | $at     | Reserved by assembler |
    /// | r2-r3   | $v0-$v1 | Results               |
    /// | r4-r7   | $a0-$a3 | Arguments             |
    /// | r8-r15  | $t0-$t7 | Temporaries           |
    /// | r16-r23 | $s0-$s7 | Storing               |
    /// | r24-r25 | $t8-$t9 | Temporaries           |
    /// | r26-r27 | $k0-$k1 | Reserved by kernel    |
    /// | r28     | $gp     | Global pointer        |
    /// | r29     | $sp     | Stack pointer         |
    /// | r30     | $fp     | Frame pointer         |
    /// | r31     | $ra     | Return address        |
    ///
    /// Instructions read from `regs` and write to `out_regs`, which gets copied back at the end
    /// of each step.
    regs: [u32; 32],
    out_regs: [u32; 32],
    /// # Load Delay Slot
    ///
    /// A value loaded from memory or COP0 isn't visible to the instruction right after the
    /// load. It gets written to `out_regs` before that instruction executes, so the instruction
    /// can still overwrite it, but reads the old value.
    ///
    /// An empty slot targets $r0, which makes writing it a no-op.
    load_delay: DelaySlot,
    cop0: Cop0,
    bus: Bus,
}

const PC_START_ADDRESS: u32 = 0xbfc0_0000;

impl Cpu {
    pub fn new(bios: Bios) -> Box<Self> {
        Box::new(Cpu {
            current_pc: PC_START_ADDRESS,
            pc: PC_START_ADDRESS,
            next_pc: PC_START_ADDRESS + 4,
            in_delay_slot: false,
            branching: false,
            hi: 0x0,
            lo: 0x0,
            regs: [0x0; 32],
            out_regs: [0x0; 32],
            load_delay: DelaySlot::default(),
            cop0: Cop0::default(),
            bus: Bus::new(bios),
        })
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn next_pc(&self) -> u32 {
        self.next_pc
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    pub fn cop0(&self) -> &Cop0 {
        &self.cop0
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn read_reg(&self, idx: RegIdx) -> u32 {
        self.regs[idx.0 as usize]
    }

    fn set_reg(&mut self, idx: RegIdx, val: u32) {
        self.out_regs[idx.0 as usize] = val;
        self.out_regs[0] = 0;
    }

    /// The opcode at `pc`, without running it.
    #[cfg(test)]
    pub(crate) fn curr_ins(&mut self) -> Result<Opcode, CpuError> {
        self.bus
            .peek::<Word>(self.pc)
            .map(Opcode::new)
            .map_err(|err| self.bus_error(err))
    }

    fn bus_error(&self, source: BusError) -> CpuError {
        CpuError::Bus { pc: self.current_pc, source }
    }

    /// Load data for an instruction. Returns `None` if an address error was raised.
    fn load<T: AddrUnit>(&mut self, addr: u32) -> Result<Option<u32>, CpuError> {
        if !T::is_aligned(addr) {
            self.cop0.set_bad_vaddr(addr);
            self.throw_exception(Exception::AddressLoadError);
            return Ok(None);
        }
        match self.bus.load::<T>(addr) {
            Ok(val) => Ok(Some(val)),
            Err(err) => Err(self.bus_error(err)),
        }
    }

    /// Store data for an instruction. Stores are dropped while the cache is isolated.
    fn store<T: AddrUnit>(&mut self, addr: u32, val: u32) -> Result<(), CpuError> {
        if !T::is_aligned(addr) {
            self.cop0.set_bad_vaddr(addr);
            self.throw_exception(Exception::AddressStoreError);
            return Ok(());
        }
        if self.cop0.cache_isolated() {
            trace!("store {val:08x} to {addr:08x} with cache isolated ignored");
            return Ok(());
        }
        self.bus
            .store::<T>(addr, val)
            .map_err(|err| self.bus_error(err))
    }

    /// Read the aligned word SWL and SWR merge into. Devices don't see the read.
    fn peek_word(&mut self, addr: u32) -> Result<u32, CpuError> {
        self.bus
            .peek::<Word>(addr)
            .map_err(|err| self.bus_error(err))
    }

    /// Put a load in the delay slot. It lands in the register at the next step.
    fn pipeline_load(&mut self, reg: RegIdx, val: u32) {
        self.load_delay = DelaySlot { reg, val };
    }

    /// Write the pending load, if any, to the output registers.
    fn fetch_load_slot(&mut self) {
        self.set_reg(self.load_delay.reg, self.load_delay.val);
        self.load_delay = DelaySlot::default();
    }

    /// Branch to relative offset from the delay slot.
    fn branch(&mut self, offset: u32) {
        // Offset is shifted 2 bits since PC addresses must be 32-bit aligned anyway.
        self.next_pc = self.pc.wrapping_add(offset << 2);
        self.branching = true;
    }

    /// Jump to absolute address.
    fn jump(&mut self, addr: u32) {
        self.next_pc = addr;
        self.branching = true;
    }

    /// Enter the exception handler.
    fn throw_exception(&mut self, ex: Exception) {
        trace!("exception {:?} at {:08x}", ex, self.current_pc);

        let handler = self.cop0.enter_exception(self.current_pc, self.in_delay_slot, ex);

        self.pc = handler;
        self.next_pc = handler.wrapping_add(4);
    }

    /// Fetch and execute the next instruction.
    pub fn step(&mut self) -> Result<(), CpuError> {
        self.current_pc = self.pc;
        self.in_delay_slot = self.branching;
        self.branching = false;

        if !Word::is_aligned(self.pc) {
            self.cop0.set_bad_vaddr(self.pc);
            self.fetch_load_slot();
            self.throw_exception(Exception::AddressLoadError);
            self.regs = self.out_regs;
            return Ok(());
        }

        let opcode = match self.bus.load::<Word>(self.pc) {
            Ok(val) => Opcode::new(val),
            Err(err) => return Err(self.bus_error(err)),
        };

        self.pc = self.next_pc;
        self.next_pc = self.next_pc.wrapping_add(4);

        self.fetch_load_slot();

        trace!("{:08x}: {}", self.current_pc, opcode);

        let res = self.exec(opcode);
        self.regs = self.out_regs;
        res
    }

    /// Execute opcode.
    fn exec(&mut self, opcode: Opcode) -> Result<(), CpuError> {
        match opcode.op() {
            0x0 => match opcode.special() {
                0x00 => self.op_sll(opcode),
                0x02 => self.op_srl(opcode),
                0x03 => self.op_sra(opcode),
                0x04 => self.op_sllv(opcode),
                0x06 => self.op_srlv(opcode),
                0x07 => self.op_srav(opcode),
                0x08 => self.op_jr(opcode),
                0x09 => self.op_jalr(opcode),
                0x0c => self.op_syscall(),
                0x0d => self.op_break(),
                0x10 => self.op_mfhi(opcode),
                0x11 => self.op_mthi(opcode),
                0x12 => self.op_mflo(opcode),
                0x13 => self.op_mtlo(opcode),
                0x18 => self.op_mult(opcode),
                0x19 => self.op_multu(opcode),
                0x1a => self.op_div(opcode),
                0x1b => self.op_divu(opcode),
                0x20 => self.op_add(opcode),
                0x21 => self.op_addu(opcode),
                0x22 => self.op_sub(opcode),
                0x23 => self.op_subu(opcode),
                0x24 => self.op_and(opcode),
                0x25 => self.op_or(opcode),
                0x26 => self.op_xor(opcode),
                0x27 => self.op_nor(opcode),
                0x2a => self.op_slt(opcode),
                0x2b => self.op_sltu(opcode),
                _ => self.op_illegal(opcode),
            },
            0x01 => self.op_bcondz(opcode),
            0x02 => self.op_j(opcode),
            0x03 => self.op_jal(opcode),
            0x04 => self.op_beq(opcode),
            0x05 => self.op_bne(opcode),
            0x06 => self.op_blez(opcode),
            0x07 => self.op_bgtz(opcode),
            0x08 => self.op_addi(opcode),
            0x09 => self.op_addiu(opcode),
            0x0a => self.op_slti(opcode),
            0x0b => self.op_sltiu(opcode),
            0x0c => self.op_andi(opcode),
            0x0d => self.op_ori(opcode),
            0x0e => self.op_xori(opcode),
            0x0f => self.op_lui(opcode),
            0x10 => self.op_cop0(opcode),
            0x11 | 0x13 => self.op_cop_unusable(),
            0x12 | 0x32 | 0x3a => return self.op_gte(opcode),
            0x20 => self.op_lb(opcode)?,
            0x21 => self.op_lh(opcode)?,
            0x22 => self.op_lwl(opcode)?,
            0x23 => self.op_lw(opcode)?,
            0x24 => self.op_lbu(opcode)?,
            0x25 => self.op_lhu(opcode)?,
            0x26 => self.op_lwr(opcode)?,
            0x28 => self.op_sb(opcode)?,
            0x29 => self.op_sh(opcode)?,
            0x2a => self.op_swl(opcode)?,
            0x2b => self.op_sw(opcode)?,
            0x2e => self.op_swr(opcode)?,
            0x30 | 0x31 | 0x33 | 0x38 | 0x39 | 0x3b => self.op_cop_unusable(),
            _ => self.op_illegal(opcode),
        }
        Ok(())
    }
}

/// CPU opcode implementation.
impl Cpu {
    /// SLL - Shift left logical.
    fn op_sll(&mut self, op: Opcode) {
        let val = self.read_reg(op.rt()) << op.shift();
        self.set_reg(op.rd(), val);
    }

    /// SRL - Shift right logical. Same as SRA, but unsigned.
    fn op_srl(&mut self, op: Opcode) {
        let val = self.read_reg(op.rt()) >> op.shift();
        self.set_reg(op.rd(), val);
    }

    /// SRA - Shift right arithmetic.
    fn op_sra(&mut self, op: Opcode) {
        let val = (self.read_reg(op.rt()) as i32) >> op.shift();
        self.set_reg(op.rd(), val as u32);
    }

    /// SLLV - Shift left logical variable.
    fn op_sllv(&mut self, op: Opcode) {
        let val = self.read_reg(op.rt()) << self.read_reg(op.rs()).bit_range(0, 4);
        self.set_reg(op.rd(), val);
    }

    /// SRLV - Shift right logical variable.
    fn op_srlv(&mut self, op: Opcode) {
        let val = self.read_reg(op.rt()) >> self.read_reg(op.rs()).bit_range(0, 4);
        self.set_reg(op.rd(), val);
    }

    /// SRAV - Shift right arithmetic variable.
    fn op_srav(&mut self, op: Opcode) {
        let val = (self.read_reg(op.rt()) as i32) >> self.read_reg(op.rs()).bit_range(0, 4);
        self.set_reg(op.rd(), val as u32);
    }

    /// JR - Jump register.
    fn op_jr(&mut self, op: Opcode) {
        self.jump(self.read_reg(op.rs()));
    }

    /// JALR - Jump and link register.
    fn op_jalr(&mut self, op: Opcode) {
        let ra = self.next_pc;
        self.jump(self.read_reg(op.rs()));
        self.set_reg(op.rd(), ra);
    }

    /// SYSCALL - Throws syscall exception.
    fn op_syscall(&mut self) {
        trace!("syscall with $a0 = {:08x}", self.read_reg(RegIdx::A0));
        self.throw_exception(Exception::Syscall);
    }

    /// BREAK - Throws break exception.
    fn op_break(&mut self) {
        self.throw_exception(Exception::Breakpoint);
    }

    /// MFHI - Move from high.
    fn op_mfhi(&mut self, op: Opcode) {
        self.set_reg(op.rd(), self.hi);
    }

    /// MTHI - Move to high.
    fn op_mthi(&mut self, op: Opcode) {
        self.hi = self.read_reg(op.rs());
    }

    /// MFLO - Move from low.
    fn op_mflo(&mut self, op: Opcode) {
        self.set_reg(op.rd(), self.lo);
    }

    /// MTLO - Move to low.
    fn op_mtlo(&mut self, op: Opcode) {
        self.lo = self.read_reg(op.rs());
    }

    /// MULT - Signed multiplication.
    fn op_mult(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs()) as i32;
        let rhs = self.read_reg(op.rt()) as i32;

        let val = (i64::from(lhs) * i64::from(rhs)) as u64;

        self.hi = (val >> 32) as u32;
        self.lo = val as u32;
    }

    /// MULTU - Unsigned multiplication.
    fn op_multu(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs());
        let rhs = self.read_reg(op.rt());

        let val = u64::from(lhs) * u64::from(rhs);

        self.hi = (val >> 32) as u32;
        self.lo = val as u32;
    }

    /// # DIV - Signed division
    ///
    /// Doesn't raise an exception when dividing by zero, but returns garbage values.
    fn op_div(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs()) as i32;
        let rhs = self.read_reg(op.rt()) as i32;

        if rhs == 0 {
            self.hi = lhs as u32;
            self.lo = if lhs < 0 { 1 } else { 0xffff_ffff };
        } else if rhs == -1 && lhs == i32::MIN {
            self.hi = 0;
            self.lo = 0x8000_0000;
        } else {
            self.hi = (lhs % rhs) as u32;
            self.lo = (lhs / rhs) as u32;
        }
    }

    /// DIVU - Unsigned division.
    fn op_divu(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs());
        let rhs = self.read_reg(op.rt());

        if rhs == 0 {
            self.hi = lhs;
            self.lo = 0xffff_ffff;
        } else {
            self.hi = lhs % rhs;
            self.lo = lhs / rhs;
        }
    }

    /// ADD - Add signed. Raises an exception on overflow.
    fn op_add(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs()) as i32;
        let rhs = self.read_reg(op.rt()) as i32;

        match lhs.checked_add(rhs) {
            Some(val) => self.set_reg(op.rd(), val as u32),
            None => self.throw_exception(Exception::ArithmeticOverflow),
        }
    }

    /// ADDU - Add unsigned.
    fn op_addu(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()).wrapping_add(self.read_reg(op.rt()));
        self.set_reg(op.rd(), val);
    }

    /// SUB - Signed subtraction. Raises an exception on overflow.
    fn op_sub(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs()) as i32;
        let rhs = self.read_reg(op.rt()) as i32;

        match lhs.checked_sub(rhs) {
            Some(val) => self.set_reg(op.rd(), val as u32),
            None => self.throw_exception(Exception::ArithmeticOverflow),
        }
    }

    /// SUBU - Subtract unsigned.
    fn op_subu(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()).wrapping_sub(self.read_reg(op.rt()));
        self.set_reg(op.rd(), val);
    }

    /// AND - Bitwise and.
    fn op_and(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) & self.read_reg(op.rt());
        self.set_reg(op.rd(), val);
    }

    /// OR - Bitwise or.
    fn op_or(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) | self.read_reg(op.rt());
        self.set_reg(op.rd(), val);
    }

    /// XOR - Bitwise exclusive or.
    fn op_xor(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) ^ self.read_reg(op.rt());
        self.set_reg(op.rd(), val);
    }

    /// NOR - Bitwise not or.
    fn op_nor(&mut self, op: Opcode) {
        let val = !(self.read_reg(op.rs()) | self.read_reg(op.rt()));
        self.set_reg(op.rd(), val);
    }

    /// SLT - Set if less than.
    fn op_slt(&mut self, op: Opcode) {
        let val = (self.read_reg(op.rs()) as i32) < (self.read_reg(op.rt()) as i32);
        self.set_reg(op.rd(), val as u32);
    }

    /// SLTU - Set if less than unsigned.
    fn op_sltu(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) < self.read_reg(op.rt());
        self.set_reg(op.rd(), val as u32);
    }

    /// # BCONDZ - Conditional branching
    ///
    /// Multiple conditional branch instructions combined into one opcode. Bit 16 selects
    /// between branching on less than zero and greater than or equal to zero. If bits 17..20
    /// equal 0x8 the return address is written, whether the branch is taken or not.
    ///
    /// - BLTZ: Branch if less than zero.
    /// - BLTZAL: Branch if less than zero and set return register.
    /// - BGEZ: Branch if greater than or equal to zero.
    /// - BGEZAL: Branch if greater than or equal to zero and set return register.
    fn op_bcondz(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) as i32;

        // Greater or equal is the opposite of less than.
        let cond = (val < 0) ^ op.bgez();

        if op.update_ra_on_branch() {
            self.set_reg(RegIdx::RA, self.next_pc);
        }

        if cond {
            self.branch(op.signed_imm());
        }
    }

    /// J - Jump.
    fn op_j(&mut self, op: Opcode) {
        self.jump((self.pc & 0xf000_0000) | (op.target() << 2));
    }

    /// JAL - Jump and link.
    fn op_jal(&mut self, op: Opcode) {
        let ra = self.next_pc;
        self.op_j(op);
        self.set_reg(RegIdx::RA, ra);
    }

    /// BEQ - Branch if equal.
    fn op_beq(&mut self, op: Opcode) {
        if self.read_reg(op.rs()) == self.read_reg(op.rt()) {
            self.branch(op.signed_imm());
        }
    }

    /// BNE - Branch if not equal.
    fn op_bne(&mut self, op: Opcode) {
        if self.read_reg(op.rs()) != self.read_reg(op.rt()) {
            self.branch(op.signed_imm());
        }
    }

    /// BLEZ - Branch if less than or equal to zero.
    fn op_blez(&mut self, op: Opcode) {
        if self.read_reg(op.rs()) as i32 <= 0 {
            self.branch(op.signed_imm());
        }
    }

    /// BGTZ - Branch if greater than zero.
    fn op_bgtz(&mut self, op: Opcode) {
        if self.read_reg(op.rs()) as i32 > 0 {
            self.branch(op.signed_imm());
        }
    }

    /// ADDI - Add immediate signed. Raises an exception on overflow.
    fn op_addi(&mut self, op: Opcode) {
        let lhs = self.read_reg(op.rs()) as i32;

        match lhs.checked_add(op.signed_imm() as i32) {
            Some(val) => self.set_reg(op.rt(), val as u32),
            None => self.throw_exception(Exception::ArithmeticOverflow),
        }
    }

    /// # ADDIU - Add immediate unsigned
    ///
    /// The immediate is still sign extended. Unsigned only means wrapping on overflow.
    fn op_addiu(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()).wrapping_add(op.signed_imm());
        self.set_reg(op.rt(), val);
    }

    /// SLTI - Set if less than immediate signed.
    fn op_slti(&mut self, op: Opcode) {
        let val = (self.read_reg(op.rs()) as i32) < (op.signed_imm() as i32);
        self.set_reg(op.rt(), val as u32);
    }

    /// SLTIU - Set if less than sign extended immediate, compared unsigned.
    fn op_sltiu(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) < op.signed_imm();
        self.set_reg(op.rt(), val as u32);
    }

    /// ANDI - Bitwise and immediate.
    fn op_andi(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) & op.imm();
        self.set_reg(op.rt(), val);
    }

    /// ORI - Bitwise or immediate.
    fn op_ori(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) | op.imm();
        self.set_reg(op.rt(), val);
    }

    /// XORI - Bitwise exclusive or immediate.
    fn op_xori(&mut self, op: Opcode) {
        let val = self.read_reg(op.rs()) ^ op.imm();
        self.set_reg(op.rt(), val);
    }

    /// LUI - Load upper immediate.
    fn op_lui(&mut self, op: Opcode) {
        self.set_reg(op.rt(), op.imm() << 16);
    }

    /// COP0 - Coprocessor0 instruction.
    fn op_cop0(&mut self, op: Opcode) {
        match op.cop_op() {
            // MFC0 - Move from Co-Processor0. Goes through the load delay slot.
            0x0 => match self.cop0.read_reg(op.cop_reg()) {
                Some(val) => self.pipeline_load(op.rt(), val),
                None => self.throw_exception(Exception::IllegalInstruction),
            },
            // MTC0 - Move to Co-Processor0.
            0x4 => {
                let val = self.read_reg(op.rt());
                if let Err(ex) = self.cop0.write_reg(op.cop_reg(), val) {
                    self.throw_exception(ex);
                }
            }
            // RFE - Restore from exception.
            0x10 if op.special() == 0x10 => self.cop0.exit_exception(),
            _ => self.op_illegal(op),
        }
    }

    /// COP1, COP3, LWC0, LWC1, LWC3, SWC0, SWC1 and SWC3. Only COP0 and COP2 exist.
    fn op_cop_unusable(&mut self) {
        self.throw_exception(Exception::CopUnusable);
    }

    /// COP2, LWC2 and SWC2. The GTE isn't emulated.
    fn op_gte(&mut self, op: Opcode) -> Result<(), CpuError> {
        Err(CpuError::UnimplementedGte { pc: self.current_pc, opcode: op.0 })
    }

    /// Address of load and store instructions.
    fn mem_addr(&self, op: Opcode) -> u32 {
        self.read_reg(op.rs()).wrapping_add(op.signed_imm())
    }

    /// LB - Load byte.
    fn op_lb(&mut self, op: Opcode) -> Result<(), CpuError> {
        if let Some(val) = self.load::<Byte>(self.mem_addr(op))? {
            self.pipeline_load(op.rt(), val as i8 as u32);
        }
        Ok(())
    }

    /// LH - Load half word.
    fn op_lh(&mut self, op: Opcode) -> Result<(), CpuError> {
        if let Some(val) = self.load::<HalfWord>(self.mem_addr(op))? {
            self.pipeline_load(op.rt(), val as i16 as u32);
        }
        Ok(())
    }

    /// # LWL - Load word left
    ///
    /// Used to load words which aren't 4 byte aligned, together with LWR. It merges the most
    /// significant bytes of the aligned word with the value in the target register. The value
    /// includes a load from the previous instruction, so LWL and LWR can be used back to back.
    fn op_lwl(&mut self, op: Opcode) -> Result<(), CpuError> {
        let addr = self.mem_addr(op);
        let val = self.out_regs[op.rt().0 as usize];

        if let Some(word) = self.load::<Word>(addr & !0x3)? {
            let val = match addr & 0x3 {
                0 => (val & 0x00ff_ffff) | (word << 24),
                1 => (val & 0x0000_ffff) | (word << 16),
                2 => (val & 0x0000_00ff) | (word << 8),
                _ => word,
            };
            self.pipeline_load(op.rt(), val);
        }
        Ok(())
    }

    /// LW - Load word.
    fn op_lw(&mut self, op: Opcode) -> Result<(), CpuError> {
        if let Some(val) = self.load::<Word>(self.mem_addr(op))? {
            self.pipeline_load(op.rt(), val);
        }
        Ok(())
    }

    /// LBU - Load byte unsigned.
    fn op_lbu(&mut self, op: Opcode) -> Result<(), CpuError> {
        if let Some(val) = self.load::<Byte>(self.mem_addr(op))? {
            self.pipeline_load(op.rt(), val);
        }
        Ok(())
    }

    /// LHU - Load half word unsigned.
    fn op_lhu(&mut self, op: Opcode) -> Result<(), CpuError> {
        if let Some(val) = self.load::<HalfWord>(self.mem_addr(op))? {
            self.pipeline_load(op.rt(), val);
        }
        Ok(())
    }

    /// # LWR - Load word right
    ///
    /// See `op_lwl`.
    fn op_lwr(&mut self, op: Opcode) -> Result<(), CpuError> {
        let addr = self.mem_addr(op);
        let val = self.out_regs[op.rt().0 as usize];

        if let Some(word) = self.load::<Word>(addr & !0x3)? {
            let val = match addr & 0x3 {
                0 => word,
                1 => (val & 0xff00_0000) | (word >> 8),
                2 => (val & 0xffff_0000) | (word >> 16),
                _ => (val & 0xffff_ff00) | (word >> 24),
            };
            self.pipeline_load(op.rt(), val);
        }
        Ok(())
    }

    /// SB - Store byte.
    fn op_sb(&mut self, op: Opcode) -> Result<(), CpuError> {
        let val = self.read_reg(op.rt()) & 0xff;
        self.store::<Byte>(self.mem_addr(op), val)
    }

    /// SH - Store half word.
    fn op_sh(&mut self, op: Opcode) -> Result<(), CpuError> {
        let val = self.read_reg(op.rt()) & 0xffff;
        self.store::<HalfWord>(self.mem_addr(op), val)
    }

    /// # SWL - Store word left
    ///
    /// Stores to addresses which aren't 32 bit aligned. It's the same idea as `op_lwl`.
    fn op_swl(&mut self, op: Opcode) -> Result<(), CpuError> {
        let addr = self.mem_addr(op);
        let val = self.read_reg(op.rt());
        let aligned = addr & !0x3;

        let word = self.peek_word(aligned)?;
        let val = match addr & 0x3 {
            0 => (word & 0xffff_ff00) | (val >> 24),
            1 => (word & 0xffff_0000) | (val >> 16),
            2 => (word & 0xff00_0000) | (val >> 8),
            _ => val,
        };
        self.store::<Word>(aligned, val)
    }

    /// SW - Store word.
    fn op_sw(&mut self, op: Opcode) -> Result<(), CpuError> {
        let val = self.read_reg(op.rt());
        self.store::<Word>(self.mem_addr(op), val)
    }

    /// # SWR - Store word right
    ///
    /// See `op_swl`.
    fn op_swr(&mut self, op: Opcode) -> Result<(), CpuError> {
        let addr = self.mem_addr(op);
        let val = self.read_reg(op.rt());
        let aligned = addr & !0x3;

        let word = self.peek_word(aligned)?;
        let val = match addr & 0x3 {
            0 => val,
            1 => (word & 0x0000_00ff) | (val << 8),
            2 => (word & 0x0000_ffff) | (val << 16),
            _ => (word & 0x00ff_ffff) | (val << 24),
        };
        self.store::<Word>(aligned, val)
    }

    /// Illegal or undefined opcode.
    fn op_illegal(&mut self, op: Opcode) {
        warn!("illegal instruction {:08x} at {:08x}", op.0, self.current_pc);
        self.throw_exception(Exception::IllegalInstruction);
    }
}
