//! Execution of single routines and of the routine-to-routine flow

use pulse_gen::flow::routine;
use pulse_gen::layout::{
    DUTY_COUNT, SLOTS_PER_PAGE, VISUAL_BUF, entry_offset, hi, lo, page_of, slot_origin,
};
use pulse_gen::{FlowTracer, MemContext, MemoryBus, PageSet, SampleCode};

use super::test_utils::*;
use crate::machine::MachineConfig;
use crate::net::w5100::RECEIVED_SIZE;

const SUCCESSOR_DUTY: u8 = 7;

/// Run one routine from its entry to its successor's entry.
///
/// Returns the cycles taken and the first two toggle stamps.
fn run_routine(
    image: &pulse_gen::PlayerImage,
    network: bool,
    set: PageSet,
    slot: u8,
    duty: u8,
) -> (Option<u64>, Vec<u64>) {
    let mut machine = machine_with(image, MachineConfig::default());
    if network {
        machine.bus.net.push(&[0; 300]);
        machine.bus.net.set_address_high(hi(RECEIVED_SIZE));
        machine.bus.net.set_address_low(lo(RECEIVED_SIZE));
    }
    let memory = &mut machine.bus.memory;
    memory.select_read(MemContext::Aux);
    memory.select_write(MemContext::Aux);

    let sample = page_of(set.index(), SUCCESSOR_DUTY);
    machine.cpu.sp = 0x7F;
    memory.poke(MemContext::Main, 0x0180, sample);
    memory.poke(MemContext::Main, 0x0181, hi(VISUAL_BUF));

    let next = routine(set, slot).unwrap().next;
    let target = u16::from_be_bytes([sample, entry_offset(next)]);
    machine.cpu.pc = slot_origin(set.index(), duty, slot) + entry_offset(0) as u16;

    let cycles = machine.run_until(target, 200).unwrap();
    (cycles, machine.bus.speaker_toggles().to_vec())
}

#[test]
fn test_every_routine_is_cycle_exact() {
    for network in [false, true] {
        let image = build_image(!network);
        for set in PageSet::ALL {
            for slot in 0..SLOTS_PER_PAGE {
                for duty in 0..DUTY_COUNT {
                    let (cycles, toggles) = run_routine(&image, network, set, slot, duty);
                    let context = (network, set, slot, duty);
                    assert_eq!(cycles, Some(46), "{context:?}");
                    assert!(toggles.len() >= 2, "{context:?}");
                    assert_eq!(toggles[1] - toggles[0], duty as u64 + 4, "{context:?}");
                }
            }
        }
    }
}

/// Page and slot of a regular routine entry, if `pc` is one
fn routine_entry(pc: u16) -> Option<(u8, u8)> {
    let page = hi(pc);
    if !(page_of(0, 0)..=page_of(1, DUTY_COUNT - 1)).contains(&page) {
        return None;
    }
    (0..SLOTS_PER_PAGE)
        .find(|&slot| entry_offset(slot) == lo(pc))
        .map(|slot| (page, slot))
}

#[test]
fn test_execution_follows_flow_tracer() {
    let image = build_image(true);
    let mut machine = machine_with(&image, MachineConfig::default());
    machine.enter().unwrap();

    let mut tracer = FlowTracer::new();
    let mut entries = 0;
    let mut visualized = false;

    while entries < 3000 {
        if let Some((page, slot)) = routine_entry(machine.cpu.pc) {
            let step = if entries == 0 {
                tracer.current()
            } else {
                let code = SampleCode::from_page(page).unwrap();
                tracer.advance(code)
            };
            assert_eq!(page, page_of(step.set.index(), step.duty), "entry {entries}");
            assert_eq!(slot, step.slot, "entry {entries}");
            visualized |= step.set == PageSet::Visualize;
            entries += 1;
        }
        machine.step().unwrap();
    }

    assert!(visualized);
}
