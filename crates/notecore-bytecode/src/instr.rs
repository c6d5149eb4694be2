use thiserror::Error;

/// A note identifier, as carried on the wire (`u16 noteId` per the
/// bytecode format). Id 0 is reserved for the base note.
pub type NoteId = u16;

/// Sentinel `noteId` operand meaning "the base note" for `LOAD_TEMPO` /
/// `LOAD_MEASURE_LEN`, which may target either an explicit note or the base.
pub const BASE_SENTINEL: NoteId = u16::MAX;

/// The six named properties a note can expose, in the fixed order the
/// format encodes them (0-5). Dense arrays keyed by this enum replace the
/// source's map-lookup-by-name dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum VarIndex {
    StartTime = 0,
    Duration = 1,
    Frequency = 2,
    Tempo = 3,
    BeatsPerMeasure = 4,
    MeasureLength = 5,
}

impl VarIndex {
    pub const ALL: [VarIndex; 6] = [
        VarIndex::StartTime,
        VarIndex::Duration,
        VarIndex::Frequency,
        VarIndex::Tempo,
        VarIndex::BeatsPerMeasure,
        VarIndex::MeasureLength,
    ];

    pub fn from_u8(v: u8) -> Result<VarIndex, DecodeError> {
        match v {
            0 => Ok(VarIndex::StartTime),
            1 => Ok(VarIndex::Duration),
            2 => Ok(VarIndex::Frequency),
            3 => Ok(VarIndex::Tempo),
            4 => Ok(VarIndex::BeatsPerMeasure),
            5 => Ok(VarIndex::MeasureLength),
            other => Err(DecodeError::BadVarIndex(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The DSL property name this var index decompiles to (full form; the
    /// compiler also accepts the shortcut spellings on the way in).
    pub fn dsl_name(self) -> &'static str {
        match self {
            VarIndex::StartTime => "startTime",
            VarIndex::Duration => "duration",
            VarIndex::Frequency => "frequency",
            VarIndex::Tempo => "tempo",
            VarIndex::BeatsPerMeasure => "beatsPerMeasure",
            VarIndex::MeasureLength => "measureLength",
        }
    }

    /// The legacy `getVariable('name')` spelling this var index decompiles to.
    pub fn legacy_name(self) -> &'static str {
        self.dsl_name()
    }
}

/// One instruction in a compiled expression's operand-stack program.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    LoadConst(u16),
    LoadBase(VarIndex),
    LoadRef(NoteId, VarIndex),
    /// `None` means "walk from the base note".
    LoadTempo(Option<NoteId>),
    /// `None` means "walk from the base note".
    LoadMeasureLen(Option<NoteId>),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
}

mod opcode {
    pub const LOAD_CONST: u8 = 0x00;
    pub const LOAD_BASE: u8 = 0x01;
    pub const LOAD_REF: u8 = 0x02;
    pub const LOAD_TEMPO: u8 = 0x03;
    pub const LOAD_MEASURE_LEN: u8 = 0x04;
    pub const ADD: u8 = 0x05;
    pub const SUB: u8 = 0x06;
    pub const MUL: u8 = 0x07;
    pub const DIV: u8 = 0x08;
    pub const POW: u8 = 0x09;
    pub const NEG: u8 = 0x0A;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode byte 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("truncated operand for opcode at offset {0}")]
    TruncatedOperand(usize),
    #[error("invalid var index byte {0}")]
    BadVarIndex(u8),
    #[error("operand stack underflow while decoding/executing bytecode")]
    StackUnderflow,
    #[error("trailing values left on the stack after decoding bytecode")]
    TrailingValues,
}

/// Serializes a straight-line instruction sequence into the single-byte
/// opcode format (`notecore-bytecode`'s C3 wire representation).
pub fn encode(instrs: &[Instr]) -> Vec<u8> {
    let mut out = Vec::new();
    for instr in instrs {
        match instr {
            Instr::LoadConst(idx) => {
                out.push(opcode::LOAD_CONST);
                out.extend_from_slice(&idx.to_le_bytes());
            }
            Instr::LoadBase(var) => {
                out.push(opcode::LOAD_BASE);
                out.push(var.as_u8());
            }
            Instr::LoadRef(note, var) => {
                out.push(opcode::LOAD_REF);
                out.extend_from_slice(&note.to_le_bytes());
                out.push(var.as_u8());
            }
            Instr::LoadTempo(note) => {
                out.push(opcode::LOAD_TEMPO);
                out.extend_from_slice(&note.unwrap_or(BASE_SENTINEL).to_le_bytes());
            }
            Instr::LoadMeasureLen(note) => {
                out.push(opcode::LOAD_MEASURE_LEN);
                out.extend_from_slice(&note.unwrap_or(BASE_SENTINEL).to_le_bytes());
            }
            Instr::Add => out.push(opcode::ADD),
            Instr::Sub => out.push(opcode::SUB),
            Instr::Mul => out.push(opcode::MUL),
            Instr::Div => out.push(opcode::DIV),
            Instr::Pow => out.push(opcode::POW),
            Instr::Neg => out.push(opcode::NEG),
        }
    }
    out
}

/// Decodes bytes back into the instruction sequence. The empty byte slice
/// decodes to an empty instruction sequence (evaluates to rational 0).
pub fn decode(bytes: &[u8]) -> Result<Vec<Instr>, DecodeError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let op = bytes[pos];
        let start = pos;
        pos += 1;
        let instr = match op {
            opcode::LOAD_CONST => {
                let idx = read_u16(bytes, &mut pos, start)?;
                Instr::LoadConst(idx)
            }
            opcode::LOAD_BASE => {
                let var = read_u8(bytes, &mut pos, start)?;
                Instr::LoadBase(VarIndex::from_u8(var)?)
            }
            opcode::LOAD_REF => {
                let note = read_u16(bytes, &mut pos, start)?;
                let var = read_u8(bytes, &mut pos, start)?;
                Instr::LoadRef(note, VarIndex::from_u8(var)?)
            }
            opcode::LOAD_TEMPO => {
                let note = read_u16(bytes, &mut pos, start)?;
                Instr::LoadTempo(sentinel_to_option(note))
            }
            opcode::LOAD_MEASURE_LEN => {
                let note = read_u16(bytes, &mut pos, start)?;
                Instr::LoadMeasureLen(sentinel_to_option(note))
            }
            opcode::ADD => Instr::Add,
            opcode::SUB => Instr::Sub,
            opcode::MUL => Instr::Mul,
            opcode::DIV => Instr::Div,
            opcode::POW => Instr::Pow,
            opcode::NEG => Instr::Neg,
            other => return Err(DecodeError::UnknownOpcode(other)),
        };
        out.push(instr);
    }
    Ok(out)
}

fn sentinel_to_option(note: NoteId) -> Option<NoteId> {
    if note == BASE_SENTINEL {
        None
    } else {
        Some(note)
    }
}

fn read_u8(bytes: &[u8], pos: &mut usize, start: usize) -> Result<u8, DecodeError> {
    let b = *bytes.get(*pos).ok_or(DecodeError::TruncatedOperand(start))?;
    *pos += 1;
    Ok(b)
}

fn read_u16(bytes: &[u8], pos: &mut usize, start: usize) -> Result<u16, DecodeError> {
    let hi = bytes
        .get(*pos..*pos + 2)
        .ok_or(DecodeError::TruncatedOperand(start))?;
    let v = u16::from_le_bytes([hi[0], hi[1]]);
    *pos += 2;
    Ok(v)
}
