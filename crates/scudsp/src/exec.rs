use crate::{
    Dsp,
    ins::{AluOp, D1Op, D1Src, Dest, Dma, Jmp, Mvi, Operation, XOp, YOp},
};

const MASK48: i64 = 0xFFFF_FFFF_FFFF;

#[inline(always)]
fn sext48(value: i64) -> i64 {
    (value << 16) >> 16
}

impl Dsp {
    /// Sets zero/sign from a 32-bit result.
    fn flags32(&mut self, result: u32) {
        self.regs.flags.zero = result == 0;
        self.regs.flags.sign = (result as i32) < 0;
    }

    /// Replaces the low 32 bits of the ALU result, keeping bits 32..48 of the
    /// pre-instruction accumulator (32-bit ALU operations leave the upper
    /// word untouched).
    fn set_alu_low(&mut self, high_src: i64, result: u32) {
        self.regs.alu = (high_src & !0xFFFF_FFFF) | result as i64;
    }

    fn exec_alu(&mut self, alu: AluOp, ac: i64, p: i64) {
        let acl = ac as u32;
        let pl = p as u32;

        match alu {
            AluOp::Nop => (),
            AluOp::And | AluOp::Or | AluOp::Xor => {
                let result = match alu {
                    AluOp::And => acl & pl,
                    AluOp::Or => acl | pl,
                    _ => acl ^ pl,
                };

                self.set_alu_low(ac, result);
                self.regs.flags.carry = false;
                self.flags32(result);
            }
            AluOp::Add => {
                let (result, carry) = acl.overflowing_add(pl);
                let (_, overflow) = (acl as i32).overflowing_add(pl as i32);

                self.set_alu_low(ac, result);
                self.regs.flags.carry = carry;
                self.regs.flags.overflow = overflow;
                self.flags32(result);
            }
            AluOp::Sub => {
                let (result, borrow) = acl.overflowing_sub(pl);
                let (_, overflow) = (acl as i32).overflowing_sub(pl as i32);

                self.set_alu_low(ac, result);
                self.regs.flags.carry = borrow;
                self.regs.flags.overflow = overflow;
                self.flags32(result);
            }
            AluOp::Ad2 => {
                let sum = sext48(ac) + sext48(p);
                let result = sext48(sum);

                self.regs.alu = result;
                self.regs.flags.carry = ((ac & MASK48) + (p & MASK48)) >> 48 != 0;
                self.regs.flags.overflow = result != sum;
                self.regs.flags.zero = result == 0;
                self.regs.flags.sign = result < 0;
            }
            AluOp::Sr => {
                let result = ((acl as i32) >> 1) as u32;

                self.set_alu_low(ac, result);
                self.regs.flags.carry = acl & 1 != 0;
                self.flags32(result);
            }
            AluOp::Rr => {
                let result = acl.rotate_right(1);

                self.set_alu_low(ac, result);
                self.regs.flags.carry = acl & 1 != 0;
                self.flags32(result);
            }
            AluOp::Sl => {
                let result = acl << 1;

                self.set_alu_low(ac, result);
                self.regs.flags.carry = (acl as i32) < 0;
                self.flags32(result);
            }
            AluOp::Rl => {
                let result = acl.rotate_left(1);

                self.set_alu_low(ac, result);
                self.regs.flags.carry = (acl as i32) < 0;
                self.flags32(result);
            }
            AluOp::Rl8 => {
                let result = acl.rotate_left(8);

                self.set_alu_low(ac, result);
                self.regs.flags.carry = acl & (1 << 24) != 0;
                self.flags32(result);
            }
        }
    }

    fn write_dest(&mut self, dest: Dest, value: u32) {
        match dest {
            Dest::Mc0 | Dest::Mc1 | Dest::Mc2 | Dest::Mc3 => {
                self.write_ram(dest as usize, value);
            }
            Dest::Rx => self.regs.rx = value,
            Dest::Pl => self.regs.p = (value as i32) as i64,
            Dest::Ra0 => self.regs.ra0 = value,
            Dest::Wa0 => self.regs.wa0 = value,
            Dest::Lop => self.regs.lop = (value & 0xFFF) as u16,
            Dest::Top => self.regs.top = value as u8,
            Dest::Ct0 | Dest::Ct1 | Dest::Ct2 | Dest::Ct3 => {
                self.regs.ct[dest as usize - Dest::Ct0 as usize] = (value & 0x3F) as u8;
            }
        }
    }

    fn eval_cond(&self, cond: Option<crate::ins::Cond>) -> bool {
        let flags = self.regs.flags;
        cond.is_none_or(|c| c.eval(flags.zero, flags.sign, flags.carry, self.dma.run))
    }

    /// The three bus slots and the ALU all source their register operands
    /// from the pre-instruction snapshot; only the `CT` cursors chain, in
    /// X -> Y -> D1 order, since the banks are read once per bus.
    pub(crate) fn exec_operation(&mut self, op: &Operation) {
        let snap = self.regs;

        self.exec_alu(op.alu, snap.ac, snap.p);

        // X bus
        if op.x_to_x || op.x_op == XOp::SrcToP {
            let value = self.read_ram(op.x_src);
            if op.x_to_x {
                self.regs.rx = value;
            }
            if op.x_op == XOp::SrcToP {
                self.regs.p = (value as i32) as i64;
            }
        }
        if op.x_op == XOp::MulToP {
            self.regs.p = sext48((snap.rx as i32 as i64) * (snap.ry as i32 as i64));
        }

        // Y bus
        if op.y_to_y || op.y_op == YOp::SrcToA {
            let value = self.read_ram(op.y_src);
            if op.y_to_y {
                self.regs.ry = value;
            }
            if op.y_op == YOp::SrcToA {
                self.regs.ac = (value as i32) as i64;
            }
        }
        match op.y_op {
            YOp::ClrA => self.regs.ac = 0,
            YOp::AluToA => self.regs.ac = self.regs.alu,
            _ => (),
        }

        // D1 bus
        match op.d1_op {
            D1Op::Nop => (),
            D1Op::MovImm => {
                if let Some(dest) = op.d1_dest {
                    self.write_dest(dest, op.d1_imm as u32);
                }
            }
            D1Op::MovSrc => {
                let value = match op.d1_src {
                    Some(D1Src::All) => self.regs.alu as u32,
                    Some(D1Src::Alh) => (self.regs.alu >> 16) as u32,
                    Some(src) => self.read_ram(crate::ins::RamSrc::new(src as u8)),
                    None => 0,
                };

                if let Some(dest) = op.d1_dest {
                    self.write_dest(dest, value);
                }
            }
        }
    }

    pub(crate) fn exec_mvi(&mut self, mvi: &Mvi) {
        if !self.eval_cond(mvi.cond) {
            return;
        }

        if let Some(dest) = mvi.dest {
            self.write_dest(dest, mvi.imm as u32);
        }
    }

    pub(crate) fn exec_jmp(&mut self, jmp: &Jmp) {
        if self.eval_cond(jmp.cond) {
            self.jump = Some((1, jmp.target));
        }
    }

    pub(crate) fn exec_dma(&mut self, dma: &Dma) {
        let count = match dma.count_src {
            Some(src) => self.read_ram(src),
            None => dma.imm_count,
        };

        self.dma = crate::DmaState {
            run: true,
            to_d0: dma.to_d0,
            hold: dma.hold,
            count,
            add: dma.add,
            program_ram: dma.program_ram,
            bank: dma.bank,
            read_addr: self.regs.ra0 << 2,
            write_addr: self.regs.wa0 << 2,
            program_addr: 0,
        };
    }
}

#[cfg(test)]
mod test {
    use crate::{Dsp, ins::Dest};

    /// `MVI imm,[dest]` (unconditional, 25-bit immediate).
    fn mvi(dest: Dest, imm: i32) -> u32 {
        (0b10 << 30) | ((dest as u32) << 26) | (imm as u32 & 0x1FF_FFFF)
    }

    fn run(dsp: &mut Dsp, steps: usize) {
        dsp.control.executing = true;
        for _ in 0..steps {
            if !dsp.can_step() {
                break;
            }
            dsp.step();
        }
    }

    #[test]
    fn mvi_and_end() {
        let mut dsp = Dsp::default();
        dsp.program[0] = mvi(Dest::Rx, -5);
        dsp.program[1] = mvi(Dest::Lop, 0x123);
        dsp.program[2] = 0xF000_0000; // END

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.rx, -5i32 as u32);
        assert_eq!(dsp.regs.lop, 0x123);
        assert!(dsp.control.ended);
        assert!(!dsp.control.executing);
        assert!(!dsp.control.end_interrupt);
    }

    #[test]
    fn endi_latches_interrupt() {
        let mut dsp = Dsp::default();
        dsp.program[0] = 0xF800_0000; // ENDI

        run(&mut dsp, 1);

        assert!(dsp.control.ended);
        assert!(dsp.control.end_interrupt);
    }

    #[test]
    fn jmp_has_delay_slot() {
        let mut dsp = Dsp::default();
        dsp.program[0] = 0xD000_0000 | 0x10; // JMP 0x10
        dsp.program[1] = mvi(Dest::Rx, 1); // delay slot, still executes
        dsp.program[2] = mvi(Dest::Rx, 2); // skipped
        dsp.program[0x10] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.rx, 1);
        assert_eq!(dsp.regs.pc, 0x11);
    }

    #[test]
    fn conditional_jmp_not_taken() {
        let mut dsp = Dsp::default();
        // JMP Z,0x10 with zero flag clear
        dsp.program[0] = 0xD000_0000 | (1 << 25) | (0b100001 << 19) | 0x10;
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.pc, 0x2);
    }

    #[test]
    fn lps_repeats_next_instruction() {
        let mut dsp = Dsp::default();
        dsp.regs.lop = 3;
        dsp.program[0] = 0xE800_0000; // LPS
        // ADD with P=1: increments ACL via ALU, MOV ALU,A
        dsp.program[1] = (0x4 << 26) | (0b10 << 17); // ALU ADD, Y: MOV ALU,A
        dsp.program[2] = 0xF000_0000;

        dsp.regs.p = 1;

        run(&mut dsp, 16);

        // executed 1 + LOP times
        assert_eq!(dsp.regs.ac, 4);
        assert_eq!(dsp.regs.lop, 0);
    }

    #[test]
    fn btm_loops_to_top() {
        let mut dsp = Dsp::default();
        dsp.regs.lop = 2;
        dsp.regs.top = 1;
        dsp.regs.p = 1;
        dsp.program[0] = 0;
        dsp.program[1] = (0x4 << 26) | (0b10 << 17); // ADD; MOV ALU,A
        dsp.program[2] = 0xE000_0000; // BTM
        dsp.program[3] = 0xF000_0000;

        run(&mut dsp, 32);

        // body runs once, then twice more via BTM
        assert_eq!(dsp.regs.ac, 3);
        assert_eq!(dsp.regs.lop, 0);
    }

    #[test]
    fn parallel_slots_use_preinstruction_values() {
        let mut dsp = Dsp::default();

        // X: MOV M0,X (also writes RX), D1: MOV M0,RA0 - both read bank 0
        // without increment, so both destinations observe the same word.
        dsp.data[0][0] = 0xCAFE;
        dsp.program[0] = (0b100 << 23) // MOV [s],X
            | (0b11 << 12) // MOV [s],[d]
            | ((Dest::Ra0 as u32) << 8)
            | 0x0; // M0
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.rx, 0xCAFE);
        assert_eq!(dsp.regs.ra0, 0xCAFE);
    }

    #[test]
    fn multiply_uses_preinstruction_operands() {
        let mut dsp = Dsp::default();

        dsp.regs.rx = 3;
        dsp.regs.ry = 1000;
        dsp.data[0][0] = 7;

        // X: MOV MC0,X (overwrites RX) while MOV MUL,P multiplies - the
        // product must use the old RX.
        dsp.program[0] = (0b110 << 23) | (0b100 << 20); // MOV MUL,P + MOV MC0,X
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.rx, 7);
        assert_eq!(dsp.regs.p, 3000);
        assert_eq!(dsp.regs.ct[0], 1);
    }

    #[test]
    fn ad2_is_48_bit() {
        let mut dsp = Dsp::default();

        dsp.regs.ac = 0x7FFF_FFFF_FFFF; // 48-bit max
        dsp.regs.p = 1;
        dsp.program[0] = (0x6 << 26) | (0b10 << 17); // AD2; MOV ALU,A
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.ac, -0x8000_0000_0000); // wrapped, sign extended
        assert!(dsp.regs.flags.overflow);
        assert!(dsp.regs.flags.sign);
        assert!(!dsp.regs.flags.zero);
    }

    #[test]
    fn add_sets_carry_and_overflow() {
        let mut dsp = Dsp::default();

        dsp.regs.ac = 0xFFFF_FFFF; // ACL = -1
        dsp.regs.p = 1;
        dsp.program[0] = 0x4 << 26; // ADD
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert_eq!(dsp.regs.alu as u32, 0);
        assert!(dsp.regs.flags.carry);
        assert!(!dsp.regs.flags.overflow);
        assert!(dsp.regs.flags.zero);
    }

    #[test]
    fn invalid_opcode_is_noop() {
        let mut dsp = Dsp::default();
        dsp.program[0] = 0x4000_0000;
        dsp.program[1] = 0xF000_0000;

        run(&mut dsp, 16);

        assert!(dsp.control.ended);
        assert_eq!(dsp.regs, crate::Registers { pc: 2, ..Default::default() });
    }

    #[test]
    fn determinism_from_reset() {
        let program: Vec<u32> = vec![
            mvi(Dest::Rx, 123),
            mvi(Dest::Pl, 77),
            (0x4 << 26) | (0b10 << 17), // ADD; MOV ALU,A
            0xD000_0000 | 0x02,         // JMP 2
            0,                          // delay slot
        ];

        let run_once = || {
            let mut dsp = Dsp::default();
            for (i, word) in program.iter().enumerate() {
                dsp.program[i] = *word;
            }
            dsp.control.executing = true;
            for _ in 0..1000 {
                dsp.step();
            }
            (dsp.regs, *dsp.data[0], *dsp.program)
        };

        assert_eq!(run_once(), run_once());
    }
}
