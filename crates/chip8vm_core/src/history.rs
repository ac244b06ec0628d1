use std::collections::VecDeque;
use std::fmt;

use crate::decode::Instruction;

pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// One executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub cycle: u64,
    pub pc: u16,
    pub opcode: u16,
    pub instruction: Instruction,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<8} {:#05X}: {:04X}  {}",
            self.cycle, self.pc, self.opcode, self.instruction
        )
    }
}

/// Bounded log of the most recently executed instructions, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    records: VecDeque<Record>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, record: Record) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.back()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
