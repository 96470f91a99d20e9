//! Common test utilities for protocol integration tests.

#![allow(dead_code)]

use shelfsense_core::{UnitId, UnitName};
use shelfsense_protocol::{Command, Opcode};

/// Build a representative command for `opcode` addressed to `unit`.
///
/// Directives carry `amount`, `InitUnit` carries a short fixed name and
/// `amount` as its weight.
pub fn command_for(opcode: Opcode, unit: u8, amount: u8) -> Command {
    let unit = UnitId::new(unit);
    match opcode {
        Opcode::Sync => Command::Sync { unit },
        Opcode::InitUnit => Command::InitUnit {
            unit,
            name: UnitName::new("Test bin").expect("valid name"),
            weight: amount,
        },
        Opcode::Calibrate => Command::Calibrate { unit },
        Opcode::TakeOut => Command::TakeOut { unit, amount },
        Opcode::PutIn => Command::PutIn { unit, amount },
        Opcode::OpenLock => Command::OpenLock { unit },
        Opcode::DenySignal => Command::DenySignal { unit },
        Opcode::QueryProgress => Command::QueryProgress { unit },
        Opcode::CloseLock => Command::CloseLock { unit },
    }
}

/// The frame sequence a single put-in item produces on the wire.
pub fn put_in_item_bytes(unit: u8, amount: u8) -> Vec<u8> {
    [
        command_for(Opcode::PutIn, unit, amount),
        command_for(Opcode::OpenLock, unit, 0),
        command_for(Opcode::QueryProgress, unit, 0),
        command_for(Opcode::CloseLock, unit, 0),
    ]
    .iter()
    .flat_map(|command| command.to_frame().as_bytes().to_vec())
    .collect()
}
