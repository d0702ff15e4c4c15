//! End-to-end determinism: two systems driven the same way stay bit-identical,
//! and a save state restored into a fresh system continues bit-identically.

use cassini::{
    Address, Cassini,
    cores::{Cores, CpuCore, Executed, Limits},
    system::{Config, System, bus::Mmio},
};

/// A placeholder core that consumes exactly the cycles it is offered and
/// acknowledges any pending interrupt.
struct TestCpu;

impl CpuCore for TestCpu {
    fn exec(&mut self, sys: &mut System, limits: Limits) -> Executed {
        if let Some(pending) = sys.pending_interrupt() {
            sys.acknowledge_interrupt(pending.source);
        }

        Executed {
            instructions: 1,
            cycles: limits.cycles.max(1),
        }
    }
}

/// Builds a system with a running DSP loop and an in-flight DMA transfer.
fn busy_system() -> Cassini {
    let mut cassini = Cassini::new(
        Config::default(),
        Cores {
            master: Box::new(TestCpu),
            slave: None,
        },
    );
    let system = &mut cassini.system;

    // unmask everything
    system.write(Mmio::InterruptMask.address(), 0u32);

    // an endless loop that walks data RAM banks 0 and 1:
    //   0: MVI 1,MC0
    //   1: JMP 0
    //   2: MVI 2,MC1  (delay slot)
    system.write(Mmio::DspProgramControl.address(), 0x0000_8000u32);
    system.write(Mmio::DspProgramData.address(), 0x8000_0001u32);
    system.write(Mmio::DspProgramData.address(), 0xD000_0000u32);
    system.write(Mmio::DspProgramData.address(), 0x8400_0002u32);
    system.write(Mmio::DspProgramControl.address(), 0x0001_8000u32);

    // a software-triggered DMA transfer over some patterned RAM
    for i in 0..32u32 {
        system.write(Address(0x0600_0000 + i * 4), i.wrapping_mul(0x0101_0101));
    }
    system.write(Mmio::Dma0Read.address(), 0x0600_0000u32);
    system.write(Mmio::Dma0Write.address(), 0x0600_1000u32);
    system.write(Mmio::Dma0Count.address(), 32u32);
    system.write(Mmio::Dma0Add.address(), 0x0000_0102u32);
    system.write(Mmio::Dma0Mode.address(), 0x0000_0007u32);
    system.write(Mmio::Dma0Enable.address(), 0x0000_0101u32);

    cassini
}

fn snapshot(cassini: &Cassini) -> Vec<u8> {
    let mut buffer = Vec::new();
    cassini
        .save_state()
        .write_to(&mut buffer)
        .expect("state must serialize");
    buffer
}

#[test]
fn identical_runs_stay_bit_identical() {
    let mut a = busy_system();
    let mut b = busy_system();

    a.exec(10_000);
    b.exec(10_000);

    assert_eq!(snapshot(&a), snapshot(&b));

    // the run actually did something
    assert_eq!(a.system.scu.dsp.data[0][0], 1);
    assert_eq!(a.system.scu.dsp.data[1][0], 2);
    let copied: u32 = a.system.read(Address(0x0600_1000 + 31 * 4));
    assert_eq!(copied, 31u32.wrapping_mul(0x0101_0101));
}

#[test]
fn restored_state_continues_bit_identically() {
    let mut original = busy_system();
    original.exec(5_000);

    let state = original.save_state();
    let mut restored = Cassini::new(
        Config::default(),
        Cores {
            master: Box::new(TestCpu),
            slave: None,
        },
    );
    restored.load_state(&state).expect("state must load");

    original.exec(10_000);
    restored.exec(10_000);

    assert_eq!(snapshot(&original), snapshot(&restored));
}

#[test]
fn state_survives_an_encode_decode_cycle() {
    use cassini::system::state::SaveState;

    let mut cassini = busy_system();
    cassini.exec(12_345);

    let buffer = snapshot(&cassini);
    let decoded = SaveState::read_from(buffer.as_slice()).expect("state must decode");

    let mut restored = Cassini::new(
        Config::default(),
        Cores {
            master: Box::new(TestCpu),
            slave: None,
        },
    );
    restored.load_state(&decoded).expect("state must load");

    assert_eq!(snapshot(&cassini), snapshot(&restored));
}
