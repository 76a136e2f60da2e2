use alloc::boxed::Box;

use super::state::Vm;

/// Host callback signature: given the VM and the trap's operand register
/// value, return whether execution should continue.
pub type Trap = Box<dyn FnMut(&mut Vm, u64) -> bool + Send>;

/// Maps 32-bit trap ids to host callbacks, mirroring the way the executor
/// dispatches external function calls through `HostError`/import linkage.
#[derive(Default)]
pub struct TrapTable {
    traps: hashbrown::HashMap<u32, Trap>,
}

impl TrapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: u32, handler: Trap) {
        self.traps.insert(id, handler);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.traps.contains_key(&id)
    }

    pub fn invoke(&mut self, vm: &mut Vm, id: u32, operand: u64) -> Option<bool> {
        let handler = self.traps.get_mut(&id)?;
        Some(handler(vm, operand))
    }
}
