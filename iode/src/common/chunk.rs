//! The compiled object (spec.md §3 "Chunk").
//!
//! Grounded directly on the teacher's (pre-closure-rewrite) revision of
//! `common::chunk::Chunk`, which has the same `code: Vec<u8>` /
//! `constants: Vec<_>` shape and the same "index_data interns, linear scan"
//! constant pool. Extended here with an `exports` table (library
//! containers only) and an `imports` list (spec.md §3, §6).

use std::collections::HashMap;

/// At most 256 entries fit a single constant-index byte (spec.md §3
/// invariant).
pub const MAX_CONSTANTS: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub code:      Vec<u8>,
    pub constants: Vec<String>,
    /// Ordered list of import paths, as encountered by `#import`
    /// directives; the index of an entry is its module ordinal
    /// (spec.md glossary "Ordinal (module)").
    pub imports:   Vec<String>,
    /// Populated only for library containers: exported function name to
    /// its entry instruction pointer.
    pub exports:   HashMap<String, u64>,
}

impl Chunk {
    pub fn empty() -> Chunk { Chunk::default() }

    pub fn emit_byte(&mut self, byte: u8) { self.code.push(byte) }

    pub fn emit(&mut self, op: super::opcode::Opcode) { self.emit_byte(op.to_byte()) }

    pub fn emit_u16(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code.push(hi);
        self.code.push(lo);
    }

    /// Interns a constant string, returning its index. Re-adding an
    /// existing value returns the existing index (spec.md §3 invariant).
    pub fn intern(&mut self, value: impl AsRef<str>) -> Result<u8, String> {
        let value = value.as_ref();
        if let Some(pos) = self.constants.iter().position(|c| c == value) {
            return Ok(pos as u8);
        }
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(format!(
                "too many constants: chunk already holds {} (max {})",
                self.constants.len(),
                MAX_CONSTANTS
            ));
        }
        self.constants.push(value.to_string());
        Ok((self.constants.len() - 1) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reuses_existing_index() {
        let mut chunk = Chunk::empty();
        let a = chunk.intern("hi").unwrap();
        let b = chunk.intern("there").unwrap();
        let c = chunk.intern("hi").unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn exactly_256_constants_is_accepted() {
        let mut chunk = Chunk::empty();
        for i in 0..MAX_CONSTANTS {
            chunk.intern(format!("c{i}")).unwrap();
        }
        assert_eq!(chunk.constants.len(), MAX_CONSTANTS);
        assert!(chunk.intern("one-too-many").is_err());
    }

    proptest::proptest! {
        /// spec.md §8: "Constants are interned: for every distinct string
        /// `v` emitted during compilation, `constants.count(x == v) == 1`
        /// at termination." Interning the same small alphabet of strings
        /// in any order must never produce a duplicate entry.
        #[test]
        fn interning_never_duplicates(values in proptest::collection::vec("[a-c]{1,3}", 0..40)) {
            let mut chunk = Chunk::empty();
            for value in &values {
                chunk.intern(value).unwrap();
            }
            let mut seen = std::collections::HashSet::new();
            for constant in &chunk.constants {
                proptest::prop_assert!(seen.insert(constant.clone()), "duplicate constant '{}'", constant);
            }
            for value in &values {
                proptest::prop_assert_eq!(chunk.constants.iter().filter(|c| *c == value).count(), 1);
            }
        }
    }
}
