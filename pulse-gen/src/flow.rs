//! Flow graph
//!
//! Ten task routines split over two page-sets of five. Each routine names
//! its successor slot, which is the only place control flow between tasks
//! is decided statically. The wire value only picks the duty and which
//! page-set the successor slot is taken from.
//!
//! Page-set 0 keeps the receive ring filled from the network interface,
//! page-set 1 commits the consumed bytes back to the interface and plots
//! visualization data. Slot numbers are shared across sets, so switching
//! sets lands on a fixed task: `TransferOne` continues at slot 1
//! (`LocateCommit`), the visualization loop continues at slot 0
//! (`AcquireStatus`).

use serde::Serialize;

use crate::catalog::{
    INC_A, INY, MicroOp, PLA, TAY, and_imm, bne_jmp, bpl_jmp, lda_abs, lda_abs_y, lda_imm, lda_ind,
    lda_ind_y, lda_net, ldy_imm, ldy_net, ora_imm, sta_abs_y, sta_net, sta_zp, sty_net,
};
use crate::layout::{
    HIRES_SCANLINES, KEYBOARD, LEAVE, MOCK_BUF, NET_ADDR_HI, NET_ADDR_LO, NET_DATA, PAGE_1,
    RING_BUF, SLOTS_PER_PAGE, VISUAL_PTR,
};

/// One of the two closed task loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSet {
    Receive = 0,
    Visualize = 1,
}

impl PageSet {
    pub const ALL: [PageSet; 2] = [PageSet::Receive, PageSet::Visualize];

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(PageSet::Receive),
            1 => Some(PageSet::Visualize),
            _ => None,
        }
    }

    /// The five task routines of this set, indexed by slot
    pub fn routines(self) -> &'static [TaskRoutine; SLOTS_PER_PAGE as usize] {
        &FLOW[self as usize]
    }
}

/// Functional step performed by a task routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Poll the keyboard (operator abort) and point the interface at the
    /// received-size register
    AcquireStatus,
    /// Move two bytes from the interface into the ring
    TransferTwo,
    /// Move one byte from the interface into the ring
    TransferOne,
    /// Read the received size (leaving when starved) and the read pointer
    FetchReadPointer,
    /// Turn the read pointer into a receive-ring address
    ComputeReadAddress,
    /// Plot the first three scanlines of a visualization column
    PlotUpper,
    /// Point the interface at the read pointer and fetch its high byte
    LocateCommit,
    /// Advance the read pointer by one page and issue RECV
    CommitPage,
    /// Pull the visualization page from the ring and flip display pages
    SeedVisualPointer,
    /// Plot the last three scanlines and advance the column
    PlotLower,
}

impl TaskKind {
    pub const fn name(self) -> &'static str {
        match self {
            TaskKind::AcquireStatus => "acquire-status",
            TaskKind::TransferTwo => "transfer-two",
            TaskKind::TransferOne => "transfer-one",
            TaskKind::FetchReadPointer => "fetch-read-pointer",
            TaskKind::ComputeReadAddress => "compute-read-address",
            TaskKind::PlotUpper => "plot-upper",
            TaskKind::LocateCommit => "locate-commit",
            TaskKind::CommitPage => "commit-page",
            TaskKind::SeedVisualPointer => "seed-visual-pointer",
            TaskKind::PlotLower => "plot-lower",
        }
    }

    /// Payload instructions, before slot relocation.
    ///
    /// In mock mode the transfers read the mock receive buffer instead of
    /// the data register and the starvation check is left out.
    pub fn payload(self, mock: bool) -> Vec<MicroOp> {
        let read = if mock {
            lda_abs_y(MOCK_BUF)
        } else {
            lda_net(NET_DATA)
        };
        let [upper_0, upper_1, upper_2, lower_0, lower_1, lower_2] = HIRES_SCANLINES;

        match self {
            TaskKind::AcquireStatus => vec![
                lda_abs(KEYBOARD),
                bpl_jmp(LEAVE),
                lda_imm(0x04),
                sta_net(NET_ADDR_HI),
                ldy_imm(0x26),
                sty_net(NET_ADDR_LO),
            ],
            TaskKind::TransferTwo => vec![
                read,
                sta_abs_y(RING_BUF),
                INY,
                read,
                sta_abs_y(RING_BUF),
            ],
            TaskKind::TransferOne => vec![INY, read, sta_abs_y(RING_BUF), INY],
            TaskKind::FetchReadPointer => {
                let mut ops = vec![lda_net(NET_DATA)];
                if !mock {
                    ops.push(bne_jmp(LEAVE));
                }
                ops.extend([
                    ldy_imm(0x28),
                    sty_net(NET_ADDR_LO),
                    lda_net(NET_DATA),
                    ldy_net(NET_DATA),
                ]);
                ops
            }
            TaskKind::ComputeReadAddress => vec![
                and_imm(0x1F),
                ora_imm(0x60),
                sta_net(NET_ADDR_HI),
                sty_net(NET_ADDR_LO),
                ldy_imm(0x03),
            ],
            TaskKind::PlotUpper => vec![
                lda_ind_y(VISUAL_PTR),
                sta_abs_y(upper_0),
                sta_abs_y(upper_1),
                sta_abs_y(upper_2),
            ],
            TaskKind::LocateCommit => vec![
                lda_imm(0x04),
                sta_net(NET_ADDR_HI),
                ldy_imm(0x28),
                sty_net(NET_ADDR_LO),
                lda_net(NET_DATA),
                sty_net(NET_ADDR_LO),
            ],
            TaskKind::CommitPage => vec![
                INC_A,
                sta_net(NET_DATA),
                ldy_imm(0x01),
                sty_net(NET_ADDR_LO),
                lda_imm(0x40),
                sta_net(NET_DATA),
            ],
            TaskKind::SeedVisualPointer => vec![
                PLA,
                sta_zp(VISUAL_PTR + 1),
                lda_ind(VISUAL_PTR),
                TAY,
                sta_abs_y(PAGE_1),
                ldy_imm(0x01),
            ],
            TaskKind::PlotLower => vec![
                sta_abs_y(lower_0),
                sta_abs_y(lower_1),
                sta_abs_y(lower_2),
                INY,
            ],
        }
    }
}

/// A task routine and its statically fixed successor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskRoutine {
    pub kind: TaskKind,
    pub next: u8,
}

const fn task(kind: TaskKind, next: u8) -> TaskRoutine {
    TaskRoutine { kind, next }
}

/// Flow table, indexed by page-set then slot
pub const FLOW: [[TaskRoutine; SLOTS_PER_PAGE as usize]; 2] = [
    [
        task(TaskKind::AcquireStatus, 3),
        task(TaskKind::TransferTwo, 2),
        task(TaskKind::TransferOne, 1),
        task(TaskKind::FetchReadPointer, 4),
        task(TaskKind::ComputeReadAddress, 2),
    ],
    [
        task(TaskKind::PlotUpper, 4),
        task(TaskKind::LocateCommit, 2),
        task(TaskKind::CommitPage, 3),
        task(TaskKind::SeedVisualPointer, 0),
        task(TaskKind::PlotLower, 0),
    ],
];

/// Task routine at `slot` of `set`
pub fn routine(set: PageSet, slot: u8) -> Option<TaskRoutine> {
    set.routines().get(slot as usize).copied()
}
