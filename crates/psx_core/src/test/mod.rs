mod cpu;

use crate::bus::bios::Bios;
use crate::bus::Bus;
use crate::cpu::Cpu;

use asm::Asm;

/// Where the CPU starts running after reset.
const BASE: u32 = 0xbfc0_0000;

/// The exception handler while BEV is set.
const ROM_HANDLER: u32 = 0xbfc0_0180;

/// Status register value with BEV set, so exceptions go to [`ROM_HANDLER`].
const SR_BEV: u32 = 1 << 22;

fn run_cpu(cpu: &mut Cpu) {
    for _ in 0..100_000 {
        // Stop if the current instruction is break. A failed fetch is left for `step` to raise.
        if let Ok(ins) = cpu.curr_ins() {
            if ins.op() == 0x0 && ins.special() == 0xd {
                return;
            }
        }

        if let Err(err) = cpu.step() {
            panic!("{err}");
        }
    }
    panic!("program didn't reach a break instruction");
}

fn load_program(asm: &Asm) -> Box<Cpu> {
    let bios = Bios::from_code(BASE & 0x1fff_ffff, &asm.assemble());
    Cpu::new(bios)
}

/// Run `asm` from reset until the next instruction is BREAK.
fn run_code(asm: &Asm) -> Box<Cpu> {
    let mut cpu = load_program(asm);
    run_cpu(&mut cpu);
    cpu
}

/// A bus with an empty BIOS.
fn empty_bus() -> Bus {
    Bus::new(Bios::from_code(BASE & 0x1fff_ffff, &[]))
}
