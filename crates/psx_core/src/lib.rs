#[macro_use]
extern crate log;

#[cfg(test)]
mod test;

pub mod bus;
pub mod cpu;
pub mod gpu;
pub mod spu;

pub use bus::bios::{Bios, BiosError};
pub use cpu::{Cpu, CpuError};

/// The whole system is owned by the [`Cpu`]. This struct is used to drive it from the frontend.
pub struct System {
    cpu: Box<Cpu>,
}

impl System {
    pub fn new(bios: Bios) -> Self {
        Self { cpu: Cpu::new(bios) }
    }

    /// Run `steps` instructions, or until a host fault.
    pub fn run(&mut self, steps: u64) -> Result<(), CpuError> {
        for _ in 0..steps {
            self.cpu.step()?;
        }
        Ok(())
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }
}
