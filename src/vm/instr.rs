use bincode::{Decode, Encode};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// One bytecode opcode. Grouped exactly as the operation-category table
/// names them; each group carries both the type and signedness that the
/// original expresses as extra dispatch-table axes, folded here into the
/// variant name (`AddS` vs `AddU`) the way a two-level `[signed][encoding]`
/// table collapses once the encoding is carried on `Instr` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, Encode, Decode)]
#[repr(u8)]
pub enum Opcode {
    // arithmetic
    AddU = 0,
    AddS = 1,
    SubU = 2,
    SubS = 3,
    MulU = 4,
    MulS = 5,
    DivU = 6,
    DivS = 7,
    ModU = 8,
    ModS = 9,
    PowU = 10,
    PowS = 11,
    // bitwise
    And = 12,
    Or = 13,
    Xor = 14,
    Not = 15,
    Neg = 16,
    Shl = 17,
    Shr = 18,
    // compare
    Cmp = 19,
    CmpS = 20,
    // branches
    Br = 21,
    Bra = 22,
    Beq = 23,
    Bne = 24,
    Bl = 25,
    Bg = 26,
    Ble = 27,
    Bge = 28,
    BlS = 29,
    BgS = 30,
    BleS = 31,
    BgeS = 32,
    // set-on-condition
    Seq = 33,
    Sne = 34,
    Sl = 35,
    Sg = 36,
    Sle = 37,
    Sge = 38,
    // call/return
    Blr = 39,
    Ret = 40,
    // memory map
    Mma = 41,
    // stack
    Push = 42,
    Pop = 43,
    // move/load/store
    Move = 44,
    LoadReg2 = 45,
    LoadOffset = 46,
    LoadIndexed = 47,
    StoreReg2 = 48,
    StoreOffset = 49,
    StoreIndexed = 50,
    Lea = 51,
    // host bridge
    Trap = 52,
    // exit
    Exit = 53,
    // lisp-integrated
    Cons = 54,
    Car = 55,
    Cdr = 56,
    SetCar = 57,
    SetCdr = 58,
    Fix = 59,
    Flo = 60,
    Env = 61,
    TypeOf = 62,
    ListOp = 63,
    Eval = 64,
    Apply = 65,
    ErrorOp = 66,
    Write = 67,
    Qt = 68,
    Qq = 69,
    Gc = 70,
    GcPush = 71,
    GcPop = 72,
    Const = 73,
    Get = 74,
    Set = 75,
    PairP = 76,
    ListP = 77,
    SymP = 78,
    AtomP = 79,
    TrueP = 80,
    FalseP = 81,
    LNot = 82,
    LCmp = 83,
    LAdd = 84,
    LSub = 85,
    LMul = 86,
    LDiv = 87,
    LMod = 88,
    Unreachable = 89,
    /// never produced by the assembler; selected for any `(type, encoding)`
    /// pair with no dispatch-table entry.
    Error = 255,
}

/// The operand shape. Distinct from `Opcode` since several opcodes (e.g.
/// `Load`/`Store`) accept more than one encoding depending on addressing
/// mode, matching the original's `[type][signed][encoding]` split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Encoding {
    None,
    Imm,
    Reg1,
    Reg2,
    Reg3,
    Reg4,
    Offset,
    Indexed,
    Reg2Imm,
}

/// One fixed-size instruction record: opcode, operand shape, up to four
/// register operands, and one immediate word. Packed little-endian per the
/// wire format; `bincode` supplies the actual (de)serialization the way it
/// already does for this crate's other binary records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Instr {
    pub opcode: Opcode,
    pub encoding: Encoding,
    pub regs: [u8; 4],
    pub imm: i64,
}

impl Instr {
    pub const fn none(opcode: Opcode) -> Self {
        Self {
            opcode,
            encoding: Encoding::None,
            regs: [0; 4],
            imm: 0,
        }
    }

    pub const fn imm(opcode: Opcode, value: i64) -> Self {
        Self {
            opcode,
            encoding: Encoding::Imm,
            regs: [0; 4],
            imm: value,
        }
    }

    pub const fn reg1(opcode: Opcode, r0: u8) -> Self {
        Self {
            opcode,
            encoding: Encoding::Reg1,
            regs: [r0, 0, 0, 0],
            imm: 0,
        }
    }

    pub const fn reg2(opcode: Opcode, dst: u8, src: u8) -> Self {
        Self {
            opcode,
            encoding: Encoding::Reg2,
            regs: [dst, src, 0, 0],
            imm: 0,
        }
    }

    pub const fn reg3(opcode: Opcode, dst: u8, a: u8, b: u8) -> Self {
        Self {
            opcode,
            encoding: Encoding::Reg3,
            regs: [dst, a, b, 0],
            imm: 0,
        }
    }

    pub const fn reg2_imm(opcode: Opcode, dst: u8, src: u8, value: i64) -> Self {
        Self {
            opcode,
            encoding: Encoding::Reg2Imm,
            regs: [dst, src, 0, 0],
            imm: value,
        }
    }

    pub const fn offset(opcode: Opcode, dst: u8, base: u8, value: i64) -> Self {
        Self {
            opcode,
            encoding: Encoding::Offset,
            regs: [dst, base, 0, 0],
            imm: value,
        }
    }
}
