//! Incremental UTF-8 validation for fragmented text messages.
//!
//! Text payload arrives in arbitrary slices, so a multi-byte character can be
//! split across frames or across partial reads of one frame. The validator
//! keeps the decode state of the character in progress between calls and only
//! requires completeness at end of message.

/// Streaming UTF-8 validator.
///
/// Rejects misplaced continuation bytes, overlong encodings, surrogate code
/// points (U+D800..U+DFFF), and code points above U+10FFFF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf8Validator {
    sequence_in_progress: bool,
    additional_bytes_expected: usize,
    expected_value_min: u32,
    current_decode_bits: u32,
}

impl Utf8Validator {
    /// Create a validator with no sequence in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the initial state. Called between messages.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validate the next slice of a text message.
    ///
    /// Returns `false` as soon as the accumulated bytes cannot be a prefix of
    /// valid UTF-8, or if `end_of_message` is set while a character sequence
    /// is still incomplete.
    pub fn validate(&mut self, data: &[u8], end_of_message: bool) -> bool {
        let mut i = 0;
        while i < data.len() {
            if !self.sequence_in_progress {
                self.sequence_in_progress = true;
                let b = data[i];
                i += 1;
                if b & 0x80 == 0 {
                    // 0xxxxxxx
                    self.additional_bytes_expected = 0;
                    self.current_decode_bits = u32::from(b) & 0x7F;
                    self.expected_value_min = 0;
                } else if b & 0xC0 == 0x80 {
                    // 10xxxxxx cannot start a sequence.
                    return false;
                } else if b & 0xE0 == 0xC0 {
                    // 110xxxxx
                    self.additional_bytes_expected = 1;
                    self.current_decode_bits = u32::from(b) & 0x1F;
                    self.expected_value_min = 0x80;
                } else if b & 0xF0 == 0xE0 {
                    // 1110xxxx
                    self.additional_bytes_expected = 2;
                    self.current_decode_bits = u32::from(b) & 0x0F;
                    self.expected_value_min = 0x800;
                } else if b & 0xF8 == 0xF0 {
                    // 11110xxx
                    self.additional_bytes_expected = 3;
                    self.current_decode_bits = u32::from(b) & 0x07;
                    self.expected_value_min = 0x10000;
                } else {
                    // 0xF8..=0xFF never appear in well-formed UTF-8.
                    return false;
                }
            }

            while self.additional_bytes_expected > 0 && i < data.len() {
                let b = data[i];
                if b & 0xC0 != 0x80 {
                    return false;
                }
                i += 1;
                self.additional_bytes_expected -= 1;
                self.current_decode_bits = self.current_decode_bits << 6 | (u32::from(b) & 0x3F);

                if self.additional_bytes_expected == 1
                    && (0x360..=0x37F).contains(&self.current_decode_bits)
                {
                    // Would decode to a surrogate (U+D800..U+DFFF).
                    return false;
                }
                if self.additional_bytes_expected == 2 && self.current_decode_bits >= 0x110 {
                    // Would decode above U+10FFFF.
                    return false;
                }
            }

            if self.additional_bytes_expected == 0 {
                self.sequence_in_progress = false;
                if self.current_decode_bits < self.expected_value_min {
                    // Overlong encoding.
                    return false;
                }
            }
        }

        !(end_of_message && self.sequence_in_progress)
    }
}
