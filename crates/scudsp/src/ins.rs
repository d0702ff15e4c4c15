use bitos::BitUtils;
use strum::{FromRepr, VariantArray};

#[derive(Clone, Copy)]
struct ClassInfo {
    mask: u32,
    target: u32,
}

impl ClassInfo {
    #[inline(always)]
    fn matches(self, value: u32) -> bool {
        (value & self.mask) == self.target
    }

    const fn parse(s: &'static str) -> Self {
        assert!(s.is_ascii());

        let bytes = s.as_bytes();

        let mut mask = 0;
        let mut target = 0;

        let mut char_index = 0;
        let mut bit_index = 31;
        loop {
            let char = bytes[char_index];
            match char {
                b'0' => {
                    mask |= 1 << bit_index;
                }
                b'1' => {
                    mask |= 1 << bit_index;
                    target |= 1 << bit_index;
                }
                b'x' | b'_' => (),
                _ => panic!("unknown character"),
            }

            char_index += 1;
            if char != b'_' {
                if bit_index == 0 {
                    break;
                }

                bit_index -= 1;
            }
        }

        Self { mask, target }
    }
}

macro_rules! class {
    (
        $e:ident;
        $($name:ident = $pattern:literal),*
        $(,)?
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, VariantArray)]
        pub enum $e {
            $(
                $name,
            )*
            Illegal,
        }

        impl $e {
            pub fn new(value: u32) -> Self {
                $(
                    let info = const { ClassInfo::parse($pattern) };
                    if info.matches(value) {
                        return Self::$name;
                    }
                )*

                Self::Illegal
            }

            #[cfg(test)]
            fn info(self) -> Option<ClassInfo> {
                match self {
                    $(
                        Self::$name => Some(const { ClassInfo::parse($pattern) }),
                    )*
                    Self::Illegal => None,
                }
            }
        }
    };
}

class! {
    Class;
    Operation = "00xx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Mvi       = "10xx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Dma       = "1100_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Jmp       = "1101_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Btm       = "1110_0xxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Lps       = "1110_1xxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    End       = "1111_0xxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
    Endi      = "1111_1xxx_xxxx_xxxx_xxxx_xxxx_xxxx_xxxx",
}

/// ALU operation of an [`Operation`] instruction. Encodings without a defined
/// operation (0x7, 0xC..=0xE) behave as [`AluOp::Nop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum AluOp {
    Nop = 0x0,
    And = 0x1,
    Or = 0x2,
    Xor = 0x3,
    Add = 0x4,
    Sub = 0x5,
    Ad2 = 0x6,
    Sr = 0x8,
    Rr = 0x9,
    Sl = 0xA,
    Rl = 0xB,
    Rl8 = 0xF,
}

impl AluOp {
    pub fn new(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(AluOp::Nop)
    }
}

/// A data RAM read selector. `M0..=M3` read the bank at its `CT` cursor;
/// `Mc0..=Mc3` additionally post-increment the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum RamSrc {
    M0 = 0,
    M1,
    M2,
    M3,
    Mc0,
    Mc1,
    Mc2,
    Mc3,
}

impl RamSrc {
    pub fn new(value: u8) -> Self {
        Self::from_repr(value & 0x7).unwrap()
    }

    #[inline(always)]
    pub fn bank(self) -> usize {
        self as usize & 0x3
    }

    #[inline(always)]
    pub fn increments(self) -> bool {
        self as u8 >= 4
    }
}

/// X-bus micro-operation (besides the optional `MOV [s],X`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XOp {
    Nop,
    /// `MOV MUL,P`
    MulToP,
    /// `MOV [s],P`
    SrcToP,
}

impl XOp {
    pub fn new(value: u8) -> Self {
        match value & 0x3 {
            0b10 => Self::MulToP,
            0b11 => Self::SrcToP,
            _ => Self::Nop,
        }
    }
}

/// Y-bus micro-operation (besides the optional `MOV [s],Y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YOp {
    Nop,
    /// `CLR A`
    ClrA,
    /// `MOV ALU,A`
    AluToA,
    /// `MOV [s],A`
    SrcToA,
}

impl YOp {
    pub fn new(value: u8) -> Self {
        match value & 0x3 {
            0b01 => Self::ClrA,
            0b10 => Self::AluToA,
            0b11 => Self::SrcToA,
            _ => Self::Nop,
        }
    }
}

/// D1-bus micro-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum D1Op {
    Nop,
    /// `MOV SImm,[d]`
    MovImm,
    /// `MOV [s],[d]`
    MovSrc,
}

impl D1Op {
    pub fn new(value: u8) -> Self {
        match value & 0x3 {
            0b01 => Self::MovImm,
            0b11 => Self::MovSrc,
            _ => Self::Nop,
        }
    }
}

/// D1-bus source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum D1Src {
    M0 = 0x0,
    M1 = 0x1,
    M2 = 0x2,
    M3 = 0x3,
    Mc0 = 0x4,
    Mc1 = 0x5,
    Mc2 = 0x6,
    Mc3 = 0x7,
    /// Low 32 bits of the ALU result.
    All = 0x9,
    /// Bits 16..48 of the ALU result.
    Alh = 0xA,
}

/// Destination selector, shared by the D1-bus and MVI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Dest {
    Mc0 = 0x0,
    Mc1 = 0x1,
    Mc2 = 0x2,
    Mc3 = 0x3,
    Rx = 0x4,
    Pl = 0x5,
    Ra0 = 0x6,
    Wa0 = 0x7,
    Lop = 0xA,
    Top = 0xB,
    Ct0 = 0xC,
    Ct1 = 0xD,
    Ct2 = 0xE,
    Ct3 = 0xF,
}

/// A condition code, as used by conditional MVI and JMP.
///
/// Bits 0..4 select the Z, S, C and T0 flags respectively; bit 5 picks the
/// sense: set means "any selected flag set", clear means "none set".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cond(pub u8);

impl Cond {
    pub fn eval(self, zero: bool, sign: bool, carry: bool, t0: bool) -> bool {
        let bits = self.0;
        let state = (zero && bits.bit(0))
            || (sign && bits.bit(1))
            || (carry && bits.bit(2))
            || (t0 && bits.bit(3));

        if bits.bit(5) { state } else { !state }
    }
}

/// Decoded `Operation` instruction: an ALU operation plus up to three
/// parallel bus micro-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub alu: AluOp,
    /// `MOV [s],X`
    pub x_to_x: bool,
    pub x_op: XOp,
    pub x_src: RamSrc,
    /// `MOV [s],Y`
    pub y_to_y: bool,
    pub y_op: YOp,
    pub y_src: RamSrc,
    pub d1_op: D1Op,
    pub d1_dest: Option<Dest>,
    pub d1_src: Option<D1Src>,
    pub d1_imm: i32,
}

/// Decoded `MVI` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mvi {
    pub dest: Option<Dest>,
    pub imm: i32,
    pub cond: Option<Cond>,
}

/// Decoded `DMA`/`DMAH` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dma {
    /// Do not advance the bus-side address.
    pub hold: bool,
    /// Transfer direction: DSP memory towards the D0 bus.
    pub to_d0: bool,
    /// Take the transfer count from a data RAM read instead of the immediate.
    pub count_src: Option<RamSrc>,
    /// Bus-side address increment, in words.
    pub add: u8,
    /// DSP-side target: data RAM bank 0..=3, or program RAM.
    pub program_ram: bool,
    pub bank: usize,
    pub imm_count: u32,
}

/// Decoded `JMP` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jmp {
    pub cond: Option<Cond>,
    pub target: u8,
}

/// A decoded SCU DSP instruction.
///
/// Decoding is total: every 32-bit word produces either a valid variant or
/// [`Ins::Invalid`], which executes as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ins {
    Operation(Operation),
    Mvi(Mvi),
    Dma(Dma),
    Jmp(Jmp),
    Lps,
    Btm,
    End { interrupt: bool },
    Invalid,
}

#[inline(always)]
fn sign_extend(value: u32, bits: u32) -> i32 {
    ((value << (32 - bits)) as i32) >> (32 - bits)
}

impl Ins {
    pub fn decode(raw: u32) -> Self {
        match Class::new(raw) {
            Class::Operation => Self::Operation(Operation {
                alu: AluOp::new(raw.bits(26, 30) as u8),
                x_to_x: raw.bit(25),
                x_op: XOp::new(raw.bits(23, 25) as u8),
                x_src: RamSrc::new(raw.bits(20, 23) as u8),
                y_to_y: raw.bit(19),
                y_op: YOp::new(raw.bits(17, 19) as u8),
                y_src: RamSrc::new(raw.bits(14, 17) as u8),
                d1_op: D1Op::new(raw.bits(12, 14) as u8),
                d1_dest: Dest::from_repr(raw.bits(8, 12) as u8),
                d1_src: D1Src::from_repr(raw.bits(0, 4) as u8),
                d1_imm: sign_extend(raw.bits(0, 8), 8),
            }),
            Class::Mvi => {
                let conditional = raw.bit(25);
                Self::Mvi(Mvi {
                    dest: Dest::from_repr(raw.bits(26, 30) as u8),
                    imm: if conditional {
                        sign_extend(raw.bits(0, 19), 19)
                    } else {
                        sign_extend(raw.bits(0, 25), 25)
                    },
                    cond: conditional.then(|| Cond(raw.bits(19, 25) as u8)),
                })
            }
            Class::Dma => Self::Dma(Dma {
                hold: raw.bit(14),
                to_d0: raw.bit(12),
                count_src: raw.bit(13).then(|| RamSrc::new(raw.bits(0, 3) as u8)),
                add: [0, 1, 2, 4, 8, 16, 32, 64][raw.bits(15, 18) as usize],
                program_ram: raw.bits(8, 11) >= 4,
                bank: raw.bits(8, 10) as usize,
                imm_count: raw.bits(0, 8),
            }),
            Class::Jmp => {
                let conditional = raw.bit(25);
                Self::Jmp(Jmp {
                    cond: conditional.then(|| Cond(raw.bits(19, 25) as u8)),
                    target: raw.bits(0, 8) as u8,
                })
            }
            Class::Lps => Self::Lps,
            Class::Btm => Self::Btm,
            Class::End => Self::End { interrupt: false },
            Class::Endi => Self::End { interrupt: true },
            Class::Illegal => Self::Invalid,
        }
    }
}
