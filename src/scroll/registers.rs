//! Packs a set of sounding pipes into shift-register bytes.
//!
//! Register `r` bit `b` drives pipe `8 * r + b`. The whole array is clocked
//! out in order, register 0 first.

use crate::midi::{NoteId, NOTE_COUNT};
use std::collections::BTreeSet;

/// Number of 8-bit output registers in the chain.
pub const REGISTER_COUNT: usize = NOTE_COUNT as usize / 8;

/// One complete register state.
pub type Registers = [u8; REGISTER_COUNT];

/// All pipes closed.
pub const ALL_OFF: Registers = [0; REGISTER_COUNT];

/// Sets one bit per active pipe. Bits are OR-ed so a repeated id can never
/// carry into a neighbouring bit.
pub fn encode<'a, I>(active: I) -> Registers
where
    I: IntoIterator<Item = &'a NoteId>,
{
    let mut registers = ALL_OFF;
    for id in active {
        registers[id.register()] |= 1 << id.bit();
    }
    registers
}

/// Recovers the set of pipes a register state opens.
pub fn decode(registers: &Registers) -> BTreeSet<NoteId> {
    registers
        .iter()
        .enumerate()
        .flat_map(|(reg, &byte)| {
            (0..8u8)
                .filter(move |bit| byte & (1 << bit) != 0)
                .filter_map(move |bit| NoteId::new(reg as u8 * 8 + bit))
        })
        .collect()
}

/// Renders registers as a bit string, register 0 first, for logs.
pub fn to_bit_string(registers: &Registers) -> String {
    registers
        .iter()
        .map(|byte| format!("{:08b}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
