//! Intermediate representation between serde and the ABI byte layout.
//!
//! The [Serializer][super::Serializer] lowers a value into a tree of tokens,
//! which knows everything needed to lay the value out in head/tail form:
//! whether a part is dynamic and how many bytes it occupies. Encoding the tree
//! is then a single pass without any size pre-computation.

use super::Writer;

pub(super) const SLOT_SIZE: usize = 32; // bytes

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A single static slot: `uintN`, `intN`, `bool`, `address`, `bytes32`.
    Word([u8; SLOT_SIZE]),
    /// Dynamic length `bytes` or `string`.
    Bytes(Vec<u8>),
    /// A struct, tuple or fixed-size array `T[N]`. Dynamic iff any member is.
    Tuple(Vec<Token>),
    /// Dynamic length array `T[]`.
    Array(Vec<Token>),
}

impl Token {
    pub fn right_aligned(v: &[u8]) -> Self {
        let mut word = [0u8; SLOT_SIZE];
        word[SLOT_SIZE - v.len()..].copy_from_slice(v);
        Token::Word(word)
    }

    pub fn signed(negative: bool, v: &[u8]) -> Self {
        let filler = if negative { 0xff } else { 0x00 };
        let mut word = [filler; SLOT_SIZE];
        word[SLOT_SIZE - v.len()..].copy_from_slice(v);
        Token::Word(word)
    }

    /// Raw bytes written left aligned, padded to full slots (`bytesN` and
    /// pre-padded values like addresses).
    pub fn left_aligned(v: &[u8]) -> Self {
        let mut words = v.chunks(SLOT_SIZE).map(|chunk| {
            let mut word = [0u8; SLOT_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            Token::Word(word)
        });
        if v.len() == SLOT_SIZE {
            // Unwrap the common case so addresses/hashes are a plain word.
            words.next().unwrap_or(Token::Tuple(vec![]))
        } else {
            Token::Tuple(words.collect())
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Word(_) => false,
            Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(members) => members.iter().any(Token::is_dynamic),
        }
    }

    /// Number of bytes this token occupies in the head of its parent.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            SLOT_SIZE
        } else {
            self.encoded_size()
        }
    }

    /// Number of bytes written by [Token::encode].
    pub fn encoded_size(&self) -> usize {
        match self {
            Token::Word(_) => SLOT_SIZE,
            Token::Bytes(data) => SLOT_SIZE + padded_len(data.len()),
            Token::Tuple(members) => sequence_size(members),
            Token::Array(members) => SLOT_SIZE + sequence_size(members),
        }
    }

    /// Write the token as if it was at the start of its own encoding.
    pub fn encode<W: Writer>(&self, writer: &mut W) {
        match self {
            Token::Word(word) => writer.write(word),
            Token::Bytes(data) => {
                write_usize(writer, data.len());
                for chunk in data.chunks(SLOT_SIZE) {
                    let mut word = [0u8; SLOT_SIZE];
                    word[..chunk.len()].copy_from_slice(chunk);
                    writer.write(&word);
                }
            }
            Token::Tuple(members) => encode_sequence(members, writer),
            Token::Array(members) => {
                write_usize(writer, members.len());
                encode_sequence(members, writer);
            }
        }
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(SLOT_SIZE) * SLOT_SIZE
}

fn sequence_size(members: &[Token]) -> usize {
    members
        .iter()
        .map(|m| {
            if m.is_dynamic() {
                SLOT_SIZE + m.encoded_size()
            } else {
                m.encoded_size()
            }
        })
        .sum()
}

fn write_usize<W: Writer>(writer: &mut W, v: usize) {
    let Token::Word(word) = Token::right_aligned(&(v as u64).to_be_bytes()) else {
        unreachable!("right_aligned always returns a word")
    };
    writer.write(&word);
}

/// Head/Tail encoding of a sequence of members.
///
/// Static members are written in place. Dynamic members write an offset
/// (relative to the start of this sequence) in the head and their content in
/// the tail, in the same order.
pub(super) fn encode_sequence<W: Writer>(members: &[Token], writer: &mut W) {
    let mut offset: usize = members.iter().map(Token::head_size).sum();
    for m in members {
        if m.is_dynamic() {
            write_usize(writer, offset);
            offset += m.encoded_size();
        } else {
            m.encode(writer);
        }
    }
    for m in members.iter().filter(|m| m.is_dynamic()) {
        m.encode(writer);
    }
}

/// Concatenate the content of all words, used to rebuild `bytes` values.
pub(super) fn flatten_words(token: &Token, out: &mut Vec<u8>) -> bool {
    match token {
        Token::Word(word) => {
            out.extend_from_slice(word);
            true
        }
        Token::Tuple(members) => members.iter().all(|m| flatten_words(m, out)),
        Token::Bytes(_) | Token::Array(_) => false,
    }
}

/// Read a length slot written by [write_usize].
pub(super) fn word_to_usize(token: &Token) -> Option<usize> {
    match token {
        Token::Word(word) => {
            if word[..SLOT_SIZE - 8].iter().any(|b| *b != 0) {
                return None;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&word[SLOT_SIZE - 8..]);
            usize::try_from(u64::from_be_bytes(buf)).ok()
        }
        _ => None,
    }
}
