//! Opcode table for the CIL-style instruction set.
//!
//! Every opcode carries its encoding value, mnemonic and operand kind. The
//! buffer only needs two things from it: the encoded byte size of an
//! instruction and whether the opcode is a single-byte prefix (prefixes are
//! rendered on the same trace line as the instruction they modify).
//!
//! # Encoding
//!
//! Single-byte opcodes occupy `0x00 - 0xE0`. Two-byte opcodes start with the
//! `0xFE` escape byte, so the discriminant is the big-endian pair:
//! ```text
//! ┌────────────┬────────────┐
//! │    0xFE    │  Low byte  │   e.g. ceq = 0xFE01
//! └────────────┴────────────┘
//! ```
//! The operand follows the opcode bytes; its width is given by
//! [`OperandKind::size`].

use core::fmt;

/// Operand layout that follows an opcode in the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// No operand.
    None,
    /// 8-bit signed branch displacement.
    ShortBrTarget,
    /// 32-bit signed branch displacement.
    BrTarget,
    /// 8-bit immediate.
    ShortI,
    /// 32-bit immediate.
    I,
    /// 64-bit immediate.
    I8,
    /// 32-bit float.
    ShortR,
    /// 64-bit float.
    R,
    /// Metadata token of a method or constructor.
    Method,
    /// Metadata token of a field.
    Field,
    /// Metadata token of a type.
    Type,
    /// Metadata token of a string literal.
    String,
    /// Metadata token of a stand-alone call signature.
    Sig,
    /// Metadata token of any kind (`ldtoken`).
    Tok,
    /// 8-bit local or argument index.
    ShortVar,
    /// 16-bit local or argument index.
    Var,
    /// Target count followed by one 32-bit displacement per target.
    Switch,
}

impl OperandKind {
    /// Operand width in bytes.
    ///
    /// For [`OperandKind::Switch`] this is only the count word; each target
    /// adds [`SWITCH_TARGET_SIZE`] more.
    pub const fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::ShortBrTarget | Self::ShortI | Self::ShortVar => 1,
            Self::Var => 2,
            Self::BrTarget
            | Self::I
            | Self::ShortR
            | Self::Method
            | Self::Field
            | Self::Type
            | Self::String
            | Self::Sig
            | Self::Tok
            | Self::Switch => 4,
            Self::I8 | Self::R => 8,
        }
    }
}

/// Bytes added to a `switch` instruction per jump target.
pub const SWITCH_TARGET_SIZE: usize = 4;

/// How a local load/store instruction addresses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSlot {
    /// The slot is part of the opcode (`ldloc.0` .. `stloc.3`).
    Fixed(u16),
    /// The slot is the instruction's operand (`ldloc.s`, `stloc`, ...).
    Operand,
}

macro_rules! opcodes {
    ($( $(#[$meta:meta])* $variant:ident = $value:literal, $name:literal, $operand:ident; )*) => {
        /// An instruction opcode.
        ///
        /// The discriminant is the encoded opcode value (see the module docs).
        #[repr(u16)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $( $(#[$meta])* $variant = $value, )*
        }

        impl OpCode {
            /// Every opcode in the table, in encoding order.
            pub const ALL: &'static [OpCode] = &[$( OpCode::$variant, )*];

            /// The assembler mnemonic, e.g. `ldloc.0`.
            pub const fn name(self) -> &'static str {
                match self {
                    $( OpCode::$variant => $name, )*
                }
            }

            /// Layout of the operand that follows the opcode.
            pub const fn operand(self) -> OperandKind {
                match self {
                    $( OpCode::$variant => OperandKind::$operand, )*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "nop", None;
    Break = 0x01, "break", None;
    Ldarg0 = 0x02, "ldarg.0", None;
    Ldarg1 = 0x03, "ldarg.1", None;
    Ldarg2 = 0x04, "ldarg.2", None;
    Ldarg3 = 0x05, "ldarg.3", None;
    Ldloc0 = 0x06, "ldloc.0", None;
    Ldloc1 = 0x07, "ldloc.1", None;
    Ldloc2 = 0x08, "ldloc.2", None;
    Ldloc3 = 0x09, "ldloc.3", None;
    Stloc0 = 0x0A, "stloc.0", None;
    Stloc1 = 0x0B, "stloc.1", None;
    Stloc2 = 0x0C, "stloc.2", None;
    Stloc3 = 0x0D, "stloc.3", None;
    LdargS = 0x0E, "ldarg.s", ShortVar;
    LdargaS = 0x0F, "ldarga.s", ShortVar;
    StargS = 0x10, "starg.s", ShortVar;
    LdlocS = 0x11, "ldloc.s", ShortVar;
    LdlocaS = 0x12, "ldloca.s", ShortVar;
    StlocS = 0x13, "stloc.s", ShortVar;
    Ldnull = 0x14, "ldnull", None;
    LdcI4M1 = 0x15, "ldc.i4.m1", None;
    LdcI40 = 0x16, "ldc.i4.0", None;
    LdcI41 = 0x17, "ldc.i4.1", None;
    LdcI42 = 0x18, "ldc.i4.2", None;
    LdcI43 = 0x19, "ldc.i4.3", None;
    LdcI44 = 0x1A, "ldc.i4.4", None;
    LdcI45 = 0x1B, "ldc.i4.5", None;
    LdcI46 = 0x1C, "ldc.i4.6", None;
    LdcI47 = 0x1D, "ldc.i4.7", None;
    LdcI48 = 0x1E, "ldc.i4.8", None;
    LdcI4S = 0x1F, "ldc.i4.s", ShortI;
    LdcI4 = 0x20, "ldc.i4", I;
    LdcI8 = 0x21, "ldc.i8", I8;
    LdcR4 = 0x22, "ldc.r4", ShortR;
    LdcR8 = 0x23, "ldc.r8", R;
    Dup = 0x25, "dup", None;
    Pop = 0x26, "pop", None;
    Jmp = 0x27, "jmp", Method;
    Call = 0x28, "call", Method;
    Calli = 0x29, "calli", Sig;
    Ret = 0x2A, "ret", None;
    BrS = 0x2B, "br.s", ShortBrTarget;
    BrfalseS = 0x2C, "brfalse.s", ShortBrTarget;
    BrtrueS = 0x2D, "brtrue.s", ShortBrTarget;
    BeqS = 0x2E, "beq.s", ShortBrTarget;
    BgeS = 0x2F, "bge.s", ShortBrTarget;
    BgtS = 0x30, "bgt.s", ShortBrTarget;
    BleS = 0x31, "ble.s", ShortBrTarget;
    BltS = 0x32, "blt.s", ShortBrTarget;
    BneUnS = 0x33, "bne.un.s", ShortBrTarget;
    BgeUnS = 0x34, "bge.un.s", ShortBrTarget;
    BgtUnS = 0x35, "bgt.un.s", ShortBrTarget;
    BleUnS = 0x36, "ble.un.s", ShortBrTarget;
    BltUnS = 0x37, "blt.un.s", ShortBrTarget;
    Br = 0x38, "br", BrTarget;
    Brfalse = 0x39, "brfalse", BrTarget;
    Brtrue = 0x3A, "brtrue", BrTarget;
    Beq = 0x3B, "beq", BrTarget;
    Bge = 0x3C, "bge", BrTarget;
    Bgt = 0x3D, "bgt", BrTarget;
    Ble = 0x3E, "ble", BrTarget;
    Blt = 0x3F, "blt", BrTarget;
    BneUn = 0x40, "bne.un", BrTarget;
    BgeUn = 0x41, "bge.un", BrTarget;
    BgtUn = 0x42, "bgt.un", BrTarget;
    BleUn = 0x43, "ble.un", BrTarget;
    BltUn = 0x44, "blt.un", BrTarget;
    Switch = 0x45, "switch", Switch;
    LdindI1 = 0x46, "ldind.i1", None;
    LdindU1 = 0x47, "ldind.u1", None;
    LdindI2 = 0x48, "ldind.i2", None;
    LdindU2 = 0x49, "ldind.u2", None;
    LdindI4 = 0x4A, "ldind.i4", None;
    LdindU4 = 0x4B, "ldind.u4", None;
    LdindI8 = 0x4C, "ldind.i8", None;
    LdindI = 0x4D, "ldind.i", None;
    LdindR4 = 0x4E, "ldind.r4", None;
    LdindR8 = 0x4F, "ldind.r8", None;
    LdindRef = 0x50, "ldind.ref", None;
    StindRef = 0x51, "stind.ref", None;
    StindI1 = 0x52, "stind.i1", None;
    StindI2 = 0x53, "stind.i2", None;
    StindI4 = 0x54, "stind.i4", None;
    StindI8 = 0x55, "stind.i8", None;
    StindR4 = 0x56, "stind.r4", None;
    StindR8 = 0x57, "stind.r8", None;
    Add = 0x58, "add", None;
    Sub = 0x59, "sub", None;
    Mul = 0x5A, "mul", None;
    Div = 0x5B, "div", None;
    DivUn = 0x5C, "div.un", None;
    Rem = 0x5D, "rem", None;
    RemUn = 0x5E, "rem.un", None;
    And = 0x5F, "and", None;
    Or = 0x60, "or", None;
    Xor = 0x61, "xor", None;
    Shl = 0x62, "shl", None;
    Shr = 0x63, "shr", None;
    ShrUn = 0x64, "shr.un", None;
    Neg = 0x65, "neg", None;
    Not = 0x66, "not", None;
    ConvI1 = 0x67, "conv.i1", None;
    ConvI2 = 0x68, "conv.i2", None;
    ConvI4 = 0x69, "conv.i4", None;
    ConvI8 = 0x6A, "conv.i8", None;
    ConvR4 = 0x6B, "conv.r4", None;
    ConvR8 = 0x6C, "conv.r8", None;
    ConvU4 = 0x6D, "conv.u4", None;
    ConvU8 = 0x6E, "conv.u8", None;
    Callvirt = 0x6F, "callvirt", Method;
    Cpobj = 0x70, "cpobj", Type;
    Ldobj = 0x71, "ldobj", Type;
    Ldstr = 0x72, "ldstr", String;
    Newobj = 0x73, "newobj", Method;
    Castclass = 0x74, "castclass", Type;
    Isinst = 0x75, "isinst", Type;
    ConvRUn = 0x76, "conv.r.un", None;
    Unbox = 0x79, "unbox", Type;
    Throw = 0x7A, "throw", None;
    Ldfld = 0x7B, "ldfld", Field;
    Ldflda = 0x7C, "ldflda", Field;
    Stfld = 0x7D, "stfld", Field;
    Ldsfld = 0x7E, "ldsfld", Field;
    Ldsflda = 0x7F, "ldsflda", Field;
    Stsfld = 0x80, "stsfld", Field;
    Stobj = 0x81, "stobj", Type;
    ConvOvfI1Un = 0x82, "conv.ovf.i1.un", None;
    ConvOvfI2Un = 0x83, "conv.ovf.i2.un", None;
    ConvOvfI4Un = 0x84, "conv.ovf.i4.un", None;
    ConvOvfI8Un = 0x85, "conv.ovf.i8.un", None;
    ConvOvfU1Un = 0x86, "conv.ovf.u1.un", None;
    ConvOvfU2Un = 0x87, "conv.ovf.u2.un", None;
    ConvOvfU4Un = 0x88, "conv.ovf.u4.un", None;
    ConvOvfU8Un = 0x89, "conv.ovf.u8.un", None;
    ConvOvfIUn = 0x8A, "conv.ovf.i.un", None;
    ConvOvfUUn = 0x8B, "conv.ovf.u.un", None;
    Box = 0x8C, "box", Type;
    Newarr = 0x8D, "newarr", Type;
    Ldlen = 0x8E, "ldlen", None;
    Ldelema = 0x8F, "ldelema", Type;
    LdelemI1 = 0x90, "ldelem.i1", None;
    LdelemU1 = 0x91, "ldelem.u1", None;
    LdelemI2 = 0x92, "ldelem.i2", None;
    LdelemU2 = 0x93, "ldelem.u2", None;
    LdelemI4 = 0x94, "ldelem.i4", None;
    LdelemU4 = 0x95, "ldelem.u4", None;
    LdelemI8 = 0x96, "ldelem.i8", None;
    LdelemI = 0x97, "ldelem.i", None;
    LdelemR4 = 0x98, "ldelem.r4", None;
    LdelemR8 = 0x99, "ldelem.r8", None;
    LdelemRef = 0x9A, "ldelem.ref", None;
    StelemI = 0x9B, "stelem.i", None;
    StelemI1 = 0x9C, "stelem.i1", None;
    StelemI2 = 0x9D, "stelem.i2", None;
    StelemI4 = 0x9E, "stelem.i4", None;
    StelemI8 = 0x9F, "stelem.i8", None;
    StelemR4 = 0xA0, "stelem.r4", None;
    StelemR8 = 0xA1, "stelem.r8", None;
    StelemRef = 0xA2, "stelem.ref", None;
    Ldelem = 0xA3, "ldelem", Type;
    Stelem = 0xA4, "stelem", Type;
    UnboxAny = 0xA5, "unbox.any", Type;
    ConvOvfI1 = 0xB3, "conv.ovf.i1", None;
    ConvOvfU1 = 0xB4, "conv.ovf.u1", None;
    ConvOvfI2 = 0xB5, "conv.ovf.i2", None;
    ConvOvfU2 = 0xB6, "conv.ovf.u2", None;
    ConvOvfI4 = 0xB7, "conv.ovf.i4", None;
    ConvOvfU4 = 0xB8, "conv.ovf.u4", None;
    ConvOvfI8 = 0xB9, "conv.ovf.i8", None;
    ConvOvfU8 = 0xBA, "conv.ovf.u8", None;
    Refanyval = 0xC2, "refanyval", Type;
    Ckfinite = 0xC3, "ckfinite", None;
    Mkrefany = 0xC6, "mkrefany", Type;
    Ldtoken = 0xD0, "ldtoken", Tok;
    ConvU2 = 0xD1, "conv.u2", None;
    ConvU1 = 0xD2, "conv.u1", None;
    ConvI = 0xD3, "conv.i", None;
    ConvOvfI = 0xD4, "conv.ovf.i", None;
    ConvOvfU = 0xD5, "conv.ovf.u", None;
    AddOvf = 0xD6, "add.ovf", None;
    AddOvfUn = 0xD7, "add.ovf.un", None;
    MulOvf = 0xD8, "mul.ovf", None;
    MulOvfUn = 0xD9, "mul.ovf.un", None;
    SubOvf = 0xDA, "sub.ovf", None;
    SubOvfUn = 0xDB, "sub.ovf.un", None;
    Endfinally = 0xDC, "endfinally", None;
    Leave = 0xDD, "leave", BrTarget;
    LeaveS = 0xDE, "leave.s", ShortBrTarget;
    StindI = 0xDF, "stind.i", None;
    ConvU = 0xE0, "conv.u", None;
    Arglist = 0xFE00, "arglist", None;
    Ceq = 0xFE01, "ceq", None;
    Cgt = 0xFE02, "cgt", None;
    CgtUn = 0xFE03, "cgt.un", None;
    Clt = 0xFE04, "clt", None;
    CltUn = 0xFE05, "clt.un", None;
    Ldftn = 0xFE06, "ldftn", Method;
    Ldvirtftn = 0xFE07, "ldvirtftn", Method;
    Ldarg = 0xFE09, "ldarg", Var;
    Ldarga = 0xFE0A, "ldarga", Var;
    Starg = 0xFE0B, "starg", Var;
    Ldloc = 0xFE0C, "ldloc", Var;
    Ldloca = 0xFE0D, "ldloca", Var;
    Stloc = 0xFE0E, "stloc", Var;
    Localloc = 0xFE0F, "localloc", None;
    Endfilter = 0xFE11, "endfilter", None;
    /// Prefix: the next pointer access may be unaligned.
    Unaligned = 0xFE12, "unaligned.", ShortI;
    /// Prefix: the next pointer access is volatile.
    Volatile = 0xFE13, "volatile.", None;
    /// Prefix: the next call is a tail call.
    Tail = 0xFE14, "tail.", None;
    Initobj = 0xFE15, "initobj", Type;
    /// Prefix: constrains the receiver of the next `callvirt`.
    Constrained = 0xFE16, "constrained.", Type;
    Cpblk = 0xFE17, "cpblk", None;
    Initblk = 0xFE18, "initblk", None;
    /// Prefix: skips the listed runtime checks of the next instruction.
    No = 0xFE19, "no.", ShortI;
    Rethrow = 0xFE1A, "rethrow", None;
    Sizeof = 0xFE1C, "sizeof", Type;
    Refanytype = 0xFE1D, "refanytype", None;
    /// Prefix: the next `ldelema` yields a read-only address.
    Readonly = 0xFE1E, "readonly.", None;
}
static_assertions::assert_eq_size!(OpCode, u16);

impl OpCode {
    /// The encoded opcode value (`0xFExx` for two-byte opcodes).
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Number of bytes taken by the opcode itself.
    pub const fn opcode_size(self) -> usize {
        if self.value() > 0xFF { 2 } else { 1 }
    }

    /// Encoded size of the instruction: opcode plus operand.
    ///
    /// `switch` targets are not included, see [`SWITCH_TARGET_SIZE`].
    pub const fn size(self) -> usize {
        self.opcode_size() + self.operand().size()
    }

    /// Whether the opcode is a prefix modifying the instruction after it.
    pub const fn is_prefix(self) -> bool {
        matches!(
            self,
            Self::Unaligned
                | Self::Volatile
                | Self::Tail
                | Self::Constrained
                | Self::No
                | Self::Readonly
        )
    }

    /// Whether the opcode takes a branch target.
    pub const fn is_branch(self) -> bool {
        matches!(
            self.operand(),
            OperandKind::ShortBrTarget | OperandKind::BrTarget
        )
    }

    /// The long-displacement form of a short branch (`br.s` -> `br`).
    pub const fn long_form(self) -> Option<OpCode> {
        Some(match self {
            Self::BrS => Self::Br,
            Self::BrfalseS => Self::Brfalse,
            Self::BrtrueS => Self::Brtrue,
            Self::BeqS => Self::Beq,
            Self::BgeS => Self::Bge,
            Self::BgtS => Self::Bgt,
            Self::BleS => Self::Ble,
            Self::BltS => Self::Blt,
            Self::BneUnS => Self::BneUn,
            Self::BgeUnS => Self::BgeUn,
            Self::BgtUnS => Self::BgtUn,
            Self::BleUnS => Self::BleUn,
            Self::BltUnS => Self::BltUn,
            Self::LeaveS => Self::Leave,
            _ => return None,
        })
    }

    /// The short-displacement form of a long branch (`br` -> `br.s`).
    pub fn short_form(self) -> Option<OpCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|short| short.long_form() == Some(self))
    }

    /// Slot addressing of local load/store instructions.
    ///
    /// Address loads (`ldloca`) are not included.
    pub const fn local_slot(self) -> Option<LocalSlot> {
        match self {
            Self::Ldloc0 | Self::Stloc0 => Some(LocalSlot::Fixed(0)),
            Self::Ldloc1 | Self::Stloc1 => Some(LocalSlot::Fixed(1)),
            Self::Ldloc2 | Self::Stloc2 => Some(LocalSlot::Fixed(2)),
            Self::Ldloc3 | Self::Stloc3 => Some(LocalSlot::Fixed(3)),
            Self::LdlocS | Self::StlocS | Self::Ldloc | Self::Stloc => Some(LocalSlot::Operand),
            _ => None,
        }
    }

    /// Look up an opcode by its mnemonic.
    pub fn from_name(name: &str) -> Option<OpCode> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.value())
    }
}

/// Byte sizes of the block markers.
///
/// A backend emits hidden instructions when exception regions open and close
/// (a `leave` out of the protected region, `endfinally` at the end of a
/// finally handler). These hooks account for them so offsets stay exact.
pub mod block_size {
    use super::OpCode;

    pub const fn begin_exception_block() -> usize {
        0
    }

    pub const fn begin_catch_block() -> usize {
        OpCode::Leave.size()
    }

    pub const fn end_exception_block() -> usize {
        OpCode::Leave.size()
    }

    pub const fn end_catch_block() -> usize {
        0
    }

    pub const fn begin_finally_block() -> usize {
        OpCode::Leave.size()
    }

    pub const fn end_finally_block() -> usize {
        OpCode::Endfinally.size()
    }

    pub const fn define_label() -> usize {
        0
    }

    pub const fn mark_label() -> usize {
        0
    }

    pub const fn declare_local() -> usize {
        0
    }
}
