//! SPIR-V opcode constants and the word-encoding helper (component G/H boundary). Constants are
//! the numeric opcodes from the SPIR-V specification's instruction table (Appendix A); grouping
//! them here rather than inline keeps `mod.rs`'s instruction-selection code reading like a
//! lowering table instead of a wall of magic numbers.

pub type Word = u32;

pub mod op {
    pub const SOURCE: u32 = 3;
    pub const NAME: u32 = 5;
    pub const EXTENSION: u32 = 10;
    pub const EXT_INST_IMPORT: u32 = 11;
    pub const MEMORY_MODEL: u32 = 14;
    pub const ENTRY_POINT: u32 = 15;
    pub const EXECUTION_MODE: u32 = 16;
    pub const CAPABILITY: u32 = 17;

    pub const TYPE_VOID: u32 = 19;
    pub const TYPE_BOOL: u32 = 20;
    pub const TYPE_INT: u32 = 21;
    pub const TYPE_FLOAT: u32 = 22;
    pub const TYPE_STRUCT: u32 = 30;
    pub const TYPE_POINTER: u32 = 32;
    pub const TYPE_FUNCTION: u32 = 33;

    pub const CONSTANT_TRUE: u32 = 41;
    pub const CONSTANT_FALSE: u32 = 42;
    pub const CONSTANT: u32 = 43;

    pub const FUNCTION: u32 = 54;
    pub const FUNCTION_PARAMETER: u32 = 55;
    pub const FUNCTION_END: u32 = 56;
    pub const FUNCTION_CALL: u32 = 57;

    pub const VARIABLE: u32 = 59;
    pub const LOAD: u32 = 61;
    pub const STORE: u32 = 62;
    pub const COPY_MEMORY: u32 = 63;
    pub const ACCESS_CHAIN: u32 = 65;

    pub const DECORATE: u32 = 71;
    pub const MEMBER_DECORATE: u32 = 72;

    pub const COMPOSITE_CONSTRUCT: u32 = 80;

    pub const I_ADD: u32 = 128;
    pub const I_SUB: u32 = 130;
    pub const I_MUL: u32 = 132;
    pub const S_DIV: u32 = 135;
    pub const S_MOD: u32 = 139;

    pub const LOGICAL_OR: u32 = 166;
    pub const LOGICAL_AND: u32 = 167;
    pub const LOGICAL_NOT: u32 = 168;

    pub const I_EQUAL: u32 = 170;
    pub const I_NOT_EQUAL: u32 = 171;
    pub const S_GREATER_THAN: u32 = 173;
    pub const S_GREATER_THAN_EQUAL: u32 = 175;
    pub const S_LESS_THAN: u32 = 177;
    pub const S_LESS_THAN_EQUAL: u32 = 179;

    pub const BITWISE_OR: u32 = 197;
    pub const BITWISE_XOR: u32 = 198;
    pub const BITWISE_AND: u32 = 199;
    pub const NOT: u32 = 200;

    pub const GROUP_BROADCAST: u32 = 263;
    pub const GROUP_NON_UNIFORM_BALLOT: u32 = 339;
    pub const GROUP_NON_UNIFORM_IADD: u32 = 349;

    pub const PHI: u32 = 245;
    pub const LOOP_MERGE: u32 = 246;
    pub const SELECTION_MERGE: u32 = 247;
    pub const LABEL: u32 = 248;
    pub const BRANCH: u32 = 249;
    pub const BRANCH_CONDITIONAL: u32 = 250;
    pub const SWITCH: u32 = 251;
    pub const RETURN: u32 = 253;
    pub const RETURN_VALUE: u32 = 254;
    pub const UNREACHABLE: u32 = 255;
}

/// SPIR-V storage classes (spec §3.7), the subset this system's [`crate::ir::ids::AddressSpace`]
/// maps onto once every `Generic` pointer has been lowered away.
pub mod storage_class {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const UNIFORM: u32 = 2;
    pub const OUTPUT: u32 = 3;
    pub const WORKGROUP: u32 = 4;
    pub const CROSS_WORKGROUP: u32 = 5;
    pub const PRIVATE: u32 = 6;
    pub const FUNCTION: u32 = 7;
    pub const STORAGE_BUFFER: u32 = 12;
    pub const PHYSICAL_STORAGE_BUFFER: u32 = 5349;
}

pub mod capability {
    pub const MATRIX: u32 = 0;
    pub const SHADER: u32 = 1;
    pub const LINKAGE: u32 = 5;
    pub const GROUPS: u32 = 57;
    pub const PHYSICAL_STORAGE_BUFFER_ADDRESSES: u32 = 5347;
}

pub const ADDRESSING_MODEL_LOGICAL: u32 = 0;
pub const ADDRESSING_MODEL_PHYSICAL_STORAGE_BUFFER64: u32 = 5348;
pub const MEMORY_MODEL_GLSL450: u32 = 1;
pub const EXECUTION_MODEL_GL_COMPUTE: u32 = 5;

/// Packs an opcode and its operand words into one instruction, with the mandatory
/// `word_count << 16 | opcode` header word the spec's physical layout (§2.2.1) requires. The
/// word count includes the header word itself.
pub fn encode(opcode: u32, operands: &[Word]) -> Vec<Word> {
    let word_count = (operands.len() + 1) as u32;
    let mut words = Vec::with_capacity(operands.len() + 1);
    words.push((word_count << 16) | (opcode & 0xFFFF));
    words.extend_from_slice(operands);
    words
}

/// Packs a UTF-8 string as SPIR-V's NUL-terminated, word-padded literal string operand (spec
/// §2.2.1: "a string is interpreted as a nul-terminated stream of characters consuming an
/// integral number of words").
pub fn encode_string(s: &str) -> Vec<Word> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_word_count_in_header() {
        let words = encode(op::I_ADD, &[1, 2, 3]);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0] >> 16, 4);
        assert_eq!(words[0] & 0xFFFF, op::I_ADD);
    }

    #[test]
    fn encode_string_is_nul_terminated_and_word_aligned() {
        let words = encode_string("px");
        // "px\0\0" is exactly one word.
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].to_le_bytes(), [b'p', b'x', 0, 0]);
    }

    #[test]
    fn encode_string_four_byte_name_still_gets_a_nul_word() {
        // A name that exactly fills N words still needs a trailing all-NUL word so the reader
        // can find the terminator.
        let words = encode_string("abcd");
        assert_eq!(words.len(), 2);
        assert_eq!(words[1], 0);
    }
}
