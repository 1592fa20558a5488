//! Wire values and flow tracing
//!
//! A wire value is the page byte a routine jumps through, minus the image
//! base page: `set * 36 + duty`. [`FlowTracer`] follows the fixed successor
//! chain under a sequence of wire values without executing anything.

use std::fmt;

use serde::Serialize;

use crate::error::SynthError;
use crate::flow::{PageSet, TaskKind, TaskRoutine, routine};
use crate::layout::{DUTY_COUNT, PAGE_SET_COUNT, PLAY_BUF, hi};

/// One byte of the audio body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SampleCode(u8);

impl SampleCode {
    /// Number of valid wire values
    pub const COUNT: u8 = PAGE_SET_COUNT * DUTY_COUNT;

    /// Mid-scale duty of page-set 0
    pub const SILENCE: SampleCode = SampleCode(DUTY_COUNT / 2);

    pub const fn new(value: u8) -> Option<Self> {
        if value < Self::COUNT {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn from_parts(set: PageSet, duty: u8) -> Option<Self> {
        if duty < DUTY_COUNT {
            Some(Self(set.index() * DUTY_COUNT + duty))
        } else {
            None
        }
    }

    /// Decode a jump page byte
    pub const fn from_page(page: u8) -> Option<Self> {
        match page.checked_sub(hi(PLAY_BUF)) {
            Some(value) => Self::new(value),
            None => None,
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Page byte the sample store writes into a jump
    pub const fn page(self) -> u8 {
        hi(PLAY_BUF) + self.0
    }

    pub fn set(self) -> PageSet {
        if self.0 < DUTY_COUNT {
            PageSet::Receive
        } else {
            PageSet::Visualize
        }
    }

    pub const fn duty(self) -> u8 {
        self.0 % DUTY_COUNT
    }
}

impl TryFrom<u8> for SampleCode {
    type Error = SynthError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(SynthError::InvalidSample(value))
    }
}

impl fmt::Display for SampleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.set().index(), self.duty())
    }
}

/// The routine executing during one sample period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub set: PageSet,
    pub slot: u8,
    pub duty: u8,
    pub task: TaskKind,
}

/// Follows the flow graph under a sequence of wire values
#[derive(Debug, Clone)]
pub struct FlowTracer {
    set: PageSet,
    slot: u8,
    duty: u8,
}

impl Default for FlowTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTracer {
    /// Start at the silence entry point
    pub fn new() -> Self {
        Self {
            set: SampleCode::SILENCE.set(),
            slot: 0,
            duty: SampleCode::SILENCE.duty(),
        }
    }

    pub fn current(&self) -> Step {
        self.step()
    }

    /// Consume one wire value and return the routine it selects.
    pub fn advance(&mut self, code: SampleCode) -> Step {
        self.slot = self.task_routine().next;
        self.set = code.set();
        self.duty = code.duty();
        self.step()
    }

    pub fn trace<I>(&mut self, codes: I) -> Vec<Step>
    where
        I: IntoIterator<Item = SampleCode>,
    {
        codes.into_iter().map(|code| self.advance(code)).collect()
    }

    fn task_routine(&self) -> TaskRoutine {
        // Slots only ever come from the flow table
        self.set.routines()[self.slot as usize]
    }

    fn step(&self) -> Step {
        Step {
            set: self.set,
            slot: self.slot,
            duty: self.duty,
            task: self.task_routine().kind,
        }
    }
}

/// Successor chain of one page-set starting at `slot`, `len` steps long
pub fn loop_order(set: PageSet, slot: u8, len: usize) -> Vec<TaskKind> {
    let mut out = Vec::with_capacity(len);
    let mut current = routine(set, slot);
    while let Some(r) = current {
        if out.len() == len {
            break;
        }
        out.push(r.kind);
        current = routine(set, r.next);
    }
    out
}
