//! Pulse generator synthesizer
//!
//! Schedules one task routine's payload into a routine that takes exactly
//! [`CYCLE_BUDGET`] cycles, with the output toggled at the start and again
//! `duty + 4` cycles later. Every routine begins with the same five byte
//! prologue (toggle, NOP, NOP) and is normally entered right behind it.
//!
//! Two duties need help:
//!
//! - When the closing toggle would have to start one cycle after an
//!   instruction boundary, the five cycle `STA (zp)` form is used instead of
//!   the four cycle absolute store. This always happens for duty 1 and may
//!   happen elsewhere depending on the payload.
//! - Duty 34 would need its closing toggle earlier than the jump allows. It
//!   jumps into the successor's prologue instead and borrows its toggle.

use tracing::trace;

use crate::catalog::{MicroOp, NOP, PLX, bra, jmp, sta_abs, sta_ind, stx_abs};
use crate::error::SynthError;
use crate::image::OutputSink;
use crate::layout::{
    BORROWED_DUTY, CYCLE_BUDGET, DUTY_COUNT, SLOTS_PER_PAGE, SLOT_SIZE, SPEAKER_PTR, entry_offset,
    slot_offset,
};
use crate::patch::{PatchKind, PatchSite};

/// Cycles spent in the shared prologue
pub const PROLOGUE_CYCLES: u8 = 8;

/// The closing toggle starts at cycle `duty + DUTY_LEAD`
const DUTY_LEAD: u8 = 4;

/// Cycle the terminal jump must start at
const JUMP_AT: u8 = CYCLE_BUDGET - jmp(0).cycles();

/// Sample store placeholder; the operand is linked later
const STORE: MicroOp = stx_abs(0);

/// Purpose of a scheduled instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Shared prologue, only executed when borrowed by a duty 34 predecessor
    Prologue,
    DutyStart,
    DutyEnd,
    /// Closing toggle through the zero page pointer, one cycle longer
    StretchedDutyEnd,
    /// Pull the next sample from the ring
    Pull,
    /// Store the sample into the terminal jump's page byte
    Store,
    Payload,
    Filler,
    /// Three cycle branch fixing an odd remainder
    Parity,
    Jump,
}

/// One instruction placed in a routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    pub op: MicroOp,
    pub role: Role,
    /// Byte offset from the routine origin
    pub offset: usize,
    /// Start cycle counted from the regular entry point (0 for prologue ops)
    pub cycle: u8,
}

#[derive(Default)]
struct Schedule {
    placed: Vec<Placed>,
    offset: usize,
    cycle: u8,
}

impl Schedule {
    fn place(&mut self, op: MicroOp, role: Role) {
        self.placed.push(Placed {
            op,
            role,
            offset: self.offset,
            cycle: self.cycle,
        });
        self.offset += op.size() as usize;
        if role != Role::Prologue {
            // Saturates on runaway payloads; verify() reports the real total
            self.cycle = self.cycle.saturating_add(op.cycles());
        }
    }
}

/// Schedules payloads into cycle-exact routines for one output sink
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    toggle: MicroOp,
    stretched: MicroOp,
}

impl Synthesizer {
    pub fn new(sink: OutputSink) -> Self {
        Self {
            toggle: sta_abs(sink.register()),
            stretched: sta_ind(SPEAKER_PTR),
        }
    }

    /// The four cycle toggle used by prologues and regular duty edges
    pub fn toggle(&self) -> MicroOp {
        self.toggle
    }

    /// Synthesize the routine for `duty` that continues at slot `successor`.
    ///
    /// The result is verified before it is returned.
    pub fn pulse(
        &self,
        payload: &[MicroOp],
        duty: u8,
        successor: u8,
    ) -> Result<PulseGenerator, SynthError> {
        if duty >= DUTY_COUNT {
            return Err(SynthError::DutyOutOfRange(duty));
        }
        if successor >= SLOTS_PER_PAGE {
            return Err(SynthError::SlotOutOfRange(successor));
        }

        let mut schedule = Schedule::default();
        schedule.place(self.toggle, Role::Prologue);
        schedule.place(NOP, Role::Prologue);
        schedule.place(NOP, Role::Prologue);
        schedule.place(self.toggle, Role::DutyStart);

        if duty == BORROWED_DUTY {
            self.borrowed(&mut schedule, payload, successor);
        } else {
            self.greedy(&mut schedule, payload, duty, successor);
        }

        let pulse = PulseGenerator::assemble(duty, successor, payload.len(), schedule.placed);
        pulse.verify()?;
        trace!(duty, successor, body = pulse.body_len(), "synthesized pulse generator");
        Ok(pulse)
    }

    fn greedy(&self, s: &mut Schedule, payload: &[MicroOp], duty: u8, successor: u8) {
        let end = duty + DUTY_LEAD;
        // Before the closing toggle an op must finish in time for it
        let fits = |cycle: u8, cost: u8| cycle + cost <= end || cycle > end;

        let mut pending = payload.iter().copied().peekable();
        let mut pulled = false;
        let mut stored = false;

        while s.cycle < JUMP_AT {
            let cycle = s.cycle;
            if cycle == end {
                s.place(self.toggle, Role::DutyEnd);
            } else if cycle + 1 == end {
                s.place(self.stretched, Role::StretchedDutyEnd);
            } else if !pulled && fits(cycle, PLX.cycles()) {
                s.place(PLX, Role::Pull);
                pulled = true;
            } else if pulled && !stored && fits(cycle, STORE.cycles()) {
                s.place(STORE, Role::Store);
                stored = true;
            } else if let Some(op) = pending.next_if(|op| fits(cycle, op.cycles())) {
                s.place(op, Role::Payload);
            } else if (cycle < end && (end - cycle) % 2 == 1)
                || (cycle > end && (JUMP_AT - cycle) % 2 == 1)
            {
                s.place(bra(0), Role::Parity);
            } else {
                s.place(NOP, Role::Filler);
            }
        }

        s.place(jmp(entry_offset(successor) as u16), Role::Jump);
    }

    fn borrowed(&self, s: &mut Schedule, payload: &[MicroOp], successor: u8) {
        s.place(PLX, Role::Pull);
        s.place(STORE, Role::Store);
        for &op in payload {
            s.place(op, Role::Payload);
        }

        // The successor's prologue runs after our jump
        let jump_at = JUMP_AT - PROLOGUE_CYCLES;
        if s.cycle < jump_at && (jump_at - s.cycle) % 2 == 1 {
            s.place(bra(0), Role::Parity);
        }
        while s.cycle < jump_at {
            s.place(NOP, Role::Filler);
        }

        s.place(jmp(slot_offset(successor) as u16), Role::Jump);
    }
}

/// One generated routine for a (page-set, task routine, duty) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseGenerator {
    duty: u8,
    successor: u8,
    payload_len: usize,
    bytes: Vec<u8>,
    placed: Vec<Placed>,
    sites: Vec<PatchSite>,
}

impl PulseGenerator {
    fn assemble(duty: u8, successor: u8, payload_len: usize, placed: Vec<Placed>) -> Self {
        let mut bytes = Vec::with_capacity(SLOT_SIZE as usize);
        let mut sites = Vec::with_capacity(2);
        for p in &placed {
            match p.role {
                Role::Store => sites.push(PatchSite::new(PatchKind::SampleStore, p.offset + 1)),
                Role::Jump => sites.push(PatchSite::new(PatchKind::JumpPage, p.offset + 2)),
                _ => {}
            }
            bytes.extend_from_slice(p.op.bytes());
        }
        Self {
            duty,
            successor,
            payload_len,
            bytes,
            placed,
            sites,
        }
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Slot of the successor routine
    pub fn successor(&self) -> u8 {
        self.successor
    }

    /// Whether the closing toggle is borrowed from the successor's prologue
    pub fn is_borrowed(&self) -> bool {
        self.duty == BORROWED_DUTY
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn placed(&self) -> &[Placed] {
        &self.placed
    }

    pub fn sites(&self) -> &[PatchSite] {
        &self.sites
    }

    /// Routine length without the jump page byte, which is written at run time
    pub fn body_len(&self) -> usize {
        self.bytes.len().saturating_sub(1)
    }

    /// Offset of the terminal jump's page byte
    pub fn jump_page_offset(&self) -> usize {
        self.body_len()
    }

    /// Cycles on the executed path, including a borrowed prologue
    pub fn cycles(&self) -> u32 {
        let body: u32 = self
            .placed
            .iter()
            .filter(|p| p.role != Role::Prologue)
            .map(|p| p.op.cycles() as u32)
            .sum();
        if self.is_borrowed() {
            body + PROLOGUE_CYCLES as u32
        } else {
            body
        }
    }

    fn role_count(&self, role: Role) -> usize {
        self.placed.iter().filter(|p| p.role == role).count()
    }

    /// Cycle at which the closing toggle's write lands
    pub fn duty_end(&self) -> Option<u8> {
        if self.is_borrowed() {
            let toggle = self.placed.first()?.op.cycles();
            let body = self.cycles() - PROLOGUE_CYCLES as u32;
            return u8::try_from(body).ok()?.checked_add(toggle);
        }
        self.placed
            .iter()
            .find(|p| matches!(p.role, Role::DutyEnd | Role::StretchedDutyEnd))
            .map(|p| p.cycle + p.op.cycles())
    }

    /// Cycles between the two toggle writes
    pub fn duty_width(&self) -> Option<u8> {
        let start = self
            .placed
            .iter()
            .find(|p| p.role == Role::DutyStart)
            .map(|p| p.cycle + p.op.cycles())?;
        self.duty_end()?.checked_sub(start)
    }

    /// Re-derive the routine's post-conditions from its placed instructions.
    pub fn verify(&self) -> Result<(), SynthError> {
        let duty = self.duty;

        let pulls = self.role_count(Role::Pull);
        let stores = self.role_count(Role::Store);
        if pulls != 1 || stores != 1 {
            return Err(SynthError::SampleOps { duty, pulls, stores });
        }

        let left = self.payload_len.saturating_sub(self.role_count(Role::Payload));
        if left > 0 {
            return Err(SynthError::PayloadPending { duty, left });
        }

        if self.placed.last().map(|p| p.role) != Some(Role::Jump) {
            return Err(SynthError::MissingJump { duty });
        }

        let cycles = self.cycles();
        if cycles != CYCLE_BUDGET as u32 {
            return Err(SynthError::CycleMismatch {
                duty,
                cycles,
                expected: CYCLE_BUDGET,
            });
        }

        if self.body_len() >= SLOT_SIZE as usize {
            return Err(SynthError::BodyTooLong {
                duty,
                len: self.body_len(),
                max: SLOT_SIZE,
            });
        }

        let expected = duty + 2 * DUTY_LEAD;
        let actual = self.duty_end().unwrap_or(0);
        if actual != expected {
            return Err(SynthError::DutyWidth {
                duty,
                actual,
                expected,
            });
        }

        Ok(())
    }

    /// Write the recorded patch sites for a routine placed at `origin`.
    ///
    /// The sample store is pointed at this routine's jump page byte and the
    /// jump starts out on `page`.
    pub fn link(&mut self, origin: u16, page: u8) {
        let jump_page = self.jump_page_offset();
        let own_page_byte = origin.wrapping_add(jump_page as u16);
        let jump_low = self.bytes[jump_page - 1];
        for site in &self.sites {
            let target = match site.kind {
                PatchKind::SampleStore => own_page_byte,
                PatchKind::JumpPage => u16::from_le_bytes([jump_low, page]),
            };
            site.apply(&mut self.bytes, target);
        }
    }

    /// Current target of the terminal jump
    pub fn jump_target(&self) -> u16 {
        let site = PatchSite::new(PatchKind::JumpPage, self.jump_page_offset());
        site.decode(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{PageSet, TaskKind};
    use crate::layout::{PROLOGUE_LEN, SILENCE};

    fn synth() -> Synthesizer {
        Synthesizer::new(OutputSink::Speaker)
    }

    fn all_payloads() -> Vec<(Vec<MicroOp>, u8)> {
        let mut out = Vec::new();
        for mock in [false, true] {
            for set in PageSet::ALL {
                for routine in set.routines() {
                    out.push((routine.kind.payload(mock), routine.next));
                }
            }
        }
        out
    }

    #[test]
    fn test_every_routine_is_cycle_exact() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            for duty in 0..DUTY_COUNT {
                let pulse = synth.pulse(&payload, duty, next).unwrap();
                assert_eq!(pulse.cycles(), CYCLE_BUDGET as u32, "duty {duty}");
                assert!(pulse.body_len() < SLOT_SIZE as usize, "duty {duty}");
                assert_eq!(pulse.bytes().len(), pulse.body_len() + 1);
            }
        }
    }

    #[test]
    fn test_duty_width_tracks_duty() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            for duty in 0..DUTY_COUNT {
                let pulse = synth.pulse(&payload, duty, next).unwrap();
                assert_eq!(pulse.duty_width(), Some(duty + 4), "duty {duty}");
            }
        }
    }

    #[test]
    fn test_one_pull_one_store() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            for duty in 0..DUTY_COUNT {
                let pulse = synth.pulse(&payload, duty, next).unwrap();
                assert_eq!(pulse.role_count(Role::Pull), 1);
                assert_eq!(pulse.role_count(Role::Store), 1);
                assert_eq!(pulse.role_count(Role::Payload), payload.len());
                let pull = pulse.placed().iter().position(|p| p.role == Role::Pull);
                let store = pulse.placed().iter().position(|p| p.role == Role::Store);
                assert!(pull < store);
            }
        }
    }

    #[test]
    fn test_payload_order_preserved() {
        let synth = synth();
        let payload = TaskKind::LocateCommit.payload(false);
        for duty in 0..DUTY_COUNT {
            let pulse = synth.pulse(&payload, duty, 2).unwrap();
            let emitted: Vec<MicroOp> = pulse
                .placed()
                .iter()
                .filter(|p| p.role == Role::Payload)
                .map(|p| p.op)
                .collect();
            assert_eq!(emitted, payload);
        }
    }

    #[test]
    fn test_stretched_toggle_for_duty_one() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            let pulse = synth.pulse(&payload, 1, next).unwrap();
            let closing = pulse
                .placed()
                .iter()
                .find(|p| p.role == Role::StretchedDutyEnd)
                .unwrap();
            // Directly behind the opening toggle, one cycle late
            assert_eq!(closing.cycle, 4);
            assert_eq!(closing.op.cycles(), 5);
            assert_eq!(pulse.role_count(Role::DutyEnd), 0);
        }
    }

    #[test]
    fn test_duty_34_borrows_successor_prologue() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            let pulse = synth.pulse(&payload, BORROWED_DUTY, next).unwrap();
            assert_eq!(pulse.role_count(Role::DutyEnd), 0);
            assert_eq!(pulse.role_count(Role::StretchedDutyEnd), 0);
            assert_eq!(pulse.jump_target() & 0xFF, slot_offset(next) as u16);
            // The neighbouring duty closes one cycle earlier
            let neighbour = synth.pulse(&payload, BORROWED_DUTY - 1, next).unwrap();
            assert_eq!(pulse.duty_end().unwrap(), neighbour.duty_end().unwrap() + 1);
        }
    }

    #[test]
    fn test_regular_jump_skips_prologue() {
        let synth = synth();
        let pulse = synth.pulse(&TaskKind::TransferOne.payload(false), 10, 1).unwrap();
        assert_eq!(pulse.jump_target() & 0xFF, (slot_offset(1) + PROLOGUE_LEN) as u16);
    }

    #[test]
    fn test_prologue_is_shared() {
        let synth = synth();
        for (payload, next) in all_payloads() {
            for duty in 0..DUTY_COUNT {
                let pulse = synth.pulse(&payload, duty, next).unwrap();
                assert_eq!(&pulse.bytes()[..5], &[0x8D, 0x30, 0xC0, 0xEA, 0xEA]);
            }
        }
    }

    #[test]
    fn test_pull_never_splits_flag_test() {
        // The keyboard and starvation checks branch on the flags of the load
        // right before them; nothing that sets flags may sit in between.
        let synth = synth();
        for kind in [TaskKind::AcquireStatus, TaskKind::FetchReadPointer] {
            let payload = kind.payload(false);
            for duty in 0..DUTY_COUNT {
                let pulse = synth.pulse(&payload, duty, 3).unwrap();
                let placed = pulse.placed();
                let branch = placed
                    .iter()
                    .position(|p| matches!(p.op.opcode(), 0x10 | 0xD0))
                    .unwrap();
                let load = placed[..branch]
                    .iter()
                    .rposition(|p| p.role == Role::Payload)
                    .unwrap();
                assert!(
                    placed[load + 1..branch].iter().all(|p| p.role != Role::Pull),
                    "{kind:?} duty {duty}"
                );
            }
        }
    }

    #[test]
    fn test_link_writes_only_sites() {
        let synth = synth();
        let mut pulse = synth.pulse(&TaskKind::TransferTwo.payload(false), 7, 2).unwrap();
        let before = pulse.bytes().to_vec();

        pulse.link(SILENCE, 0x52);

        let changed: Vec<usize> = (0..before.len())
            .filter(|&i| before[i] != pulse.bytes()[i])
            .collect();
        let store = pulse.sites()[0];
        assert_eq!(store.kind, PatchKind::SampleStore);
        assert_eq!(changed, vec![store.offset, store.offset + 1, pulse.jump_page_offset()]);
        assert_eq!(
            store.decode(pulse.bytes()),
            SILENCE + pulse.jump_page_offset() as u16
        );
        assert_eq!(pulse.jump_target() >> 8, 0x52);
    }

    #[test]
    fn test_tape_sink_changes_toggle_target() {
        let synth = Synthesizer::new(OutputSink::TapeOut);
        let pulse = synth.pulse(&TaskKind::PlotUpper.payload(false), 20, 4).unwrap();
        assert_eq!(&pulse.bytes()[..3], &[0x8D, 0x20, 0xC0]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let synth = synth();
        assert_eq!(
            synth.pulse(&[], DUTY_COUNT, 0).unwrap_err(),
            SynthError::DutyOutOfRange(DUTY_COUNT)
        );
        assert_eq!(
            synth.pulse(&[], 3, SLOTS_PER_PAGE).unwrap_err(),
            SynthError::SlotOutOfRange(SLOTS_PER_PAGE)
        );
    }

    #[test]
    fn test_oversized_payload_is_an_error() {
        let synth = synth();
        let payload = vec![crate::catalog::sta_abs_y(0x2000); 12];
        assert!(synth.pulse(&payload, 10, 0).is_err());
        assert!(synth.pulse(&payload, BORROWED_DUTY, 0).is_err());
    }

    #[test]
    fn test_borrowed_payload_past_u8_cycles_is_a_mismatch() {
        let synth = synth();
        // 60 five-cycle stores: 300 payload cycles
        let payload = vec![crate::catalog::sta_abs_y(0x2000); 60];

        let err = synth.pulse(&payload, BORROWED_DUTY, 0).unwrap_err();

        // toggle + pull + store + payload + jump + borrowed prologue
        assert_eq!(
            err,
            SynthError::CycleMismatch {
                duty: BORROWED_DUTY,
                cycles: 4 + 4 + 4 + 300 + 3 + 8,
                expected: CYCLE_BUDGET,
            }
        );
    }
}
