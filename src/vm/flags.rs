use bitvec::prelude::*;

/// The VM's flags register: zero, carry, negative, overflow, interrupt.
/// Backed by a `bitvec` array rather than five `bool` fields so it packs
/// the way the register file's other 32-bit registers do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    bits: u8,
}

const ZERO: usize = 0;
const CARRY: usize = 1;
const NEGATIVE: usize = 2;
const OVERFLOW: usize = 3;
const INTERRUPT: usize = 4;

impl Flags {
    fn view(&self) -> &BitSlice<u8, Lsb0> {
        self.bits.view_bits::<Lsb0>()
    }

    fn view_mut(&mut self) -> &mut BitSlice<u8, Lsb0> {
        self.bits.view_bits_mut::<Lsb0>()
    }

    pub fn zero(&self) -> bool {
        self.view()[ZERO]
    }

    pub fn carry(&self) -> bool {
        self.view()[CARRY]
    }

    pub fn negative(&self) -> bool {
        self.view()[NEGATIVE]
    }

    pub fn overflow(&self) -> bool {
        self.view()[OVERFLOW]
    }

    pub fn interrupt(&self) -> bool {
        self.view()[INTERRUPT]
    }

    pub fn set_zero(&mut self, v: bool) {
        self.view_mut().set(ZERO, v);
    }

    pub fn set_carry(&mut self, v: bool) {
        self.view_mut().set(CARRY, v);
    }

    pub fn set_negative(&mut self, v: bool) {
        self.view_mut().set(NEGATIVE, v);
    }

    pub fn set_overflow(&mut self, v: bool) {
        self.view_mut().set(OVERFLOW, v);
    }

    pub fn set_interrupt(&mut self, v: bool) {
        self.view_mut().set(INTERRUPT, v);
    }

    /// Updates Z/N from a result value; arithmetic ops additionally set
    /// C/V themselves since those depend on the operation, not just the
    /// result.
    pub fn update_zn(&mut self, result: i64) {
        self.set_zero(result == 0);
        self.set_negative(result < 0);
    }

    pub fn reset(&mut self) {
        self.bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent() {
        let mut f = Flags::default();
        f.set_zero(true);
        f.set_carry(true);
        assert!(f.zero());
        assert!(f.carry());
        assert!(!f.negative());
        f.set_zero(false);
        assert!(!f.zero());
        assert!(f.carry());
    }
}
