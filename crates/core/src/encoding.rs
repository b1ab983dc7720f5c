//! Encoding and script detection, streaming chunk decode, chunk seams,
//! Unicode normalization.

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

use crate::error::{DecodeError, DetectError};

/// Bytes read from the head of a file for detection.
pub const DEFAULT_SAMPLE_SIZE: usize = 4096;

/// Outcome of encoding and script detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingGuess {
    pub encoding: &'static Encoding,
    /// CJK text without inter-word spaces; pages are sized in characters.
    pub is_eastern: bool,
    /// True when detection failed and the safe default was used.
    pub defaulted: bool,
}

impl EncodingGuess {
    /// UTF-8 / Eastern, used whenever detection cannot run.
    pub fn fallback() -> Self {
        Self {
            encoding: UTF_8,
            is_eastern: true,
            defaulted: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Build the detection sample from the head of a file. A file shorter than
/// `sample_size` is replicated until the sample is at least that long.
pub fn detection_sample(head: &[u8], sample_size: usize) -> Vec<u8> {
    if head.is_empty() {
        return Vec::new();
    }
    let mut sample = head[..head.len().min(sample_size)].to_vec();
    while sample.len() < sample_size {
        sample.extend_from_within(..);
    }
    sample
}

/// Guess the encoding and script of a sample.
pub fn detect(sample: &[u8]) -> EncodingGuess {
    if sample.is_empty() {
        return EncodingGuess::fallback();
    }
    let encoding = detect_encoding(sample);
    EncodingGuess {
        encoding,
        is_eastern: sample_is_eastern(sample, encoding),
        defaulted: false,
    }
}

/// Detection honoring an explicit encoding label. An unknown label is an
/// error; everything else degrades to [`detect`].
pub fn resolve(sample: &[u8], label: Option<&str>) -> Result<EncodingGuess, DetectError> {
    match label {
        Some(label) => {
            let encoding = Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| DetectError::UnknownLabel(label.to_string()))?;
            Ok(EncodingGuess {
                encoding,
                is_eastern: sample.is_empty() || sample_is_eastern(sample, encoding),
                defaulted: false,
            })
        }
        None => Ok(detect(sample)),
    }
}

fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    if let Some(encoding) = detect_utf16_without_bom(sample) {
        return encoding;
    }
    match std::str::from_utf8(sample) {
        // ASCII is reported as UTF-8.
        Ok(_) => return UTF_8,
        // A sample cut inside a multi-byte character is still UTF-8.
        Err(e) if e.error_len().is_none() => return UTF_8,
        Err(_) => {}
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    detector.guess(None, true)
}

/// ASCII-heavy UTF-16 without a BOM shows up as alternating null bytes.
fn detect_utf16_without_bom(sample: &[u8]) -> Option<&'static Encoding> {
    let total_pairs = sample.len() / 2;
    if total_pairs <= 4 {
        return None;
    }
    let nulls_at_odd = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
    let nulls_at_even = sample.iter().step_by(2).filter(|&&b| b == 0).count();
    if nulls_at_odd > total_pairs * 3 / 4 && nulls_at_even < total_pairs / 4 {
        return Some(UTF_16LE);
    }
    if nulls_at_even > total_pairs * 3 / 4 && nulls_at_odd < total_pairs / 4 {
        return Some(UTF_16BE);
    }
    None
}

fn sample_is_eastern(sample: &[u8], encoding: &'static Encoding) -> bool {
    let (text, _, _) = encoding.decode(sample);
    text.chars().any(is_cjk)
}

/// CJK ideographs, kana and hangul.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2FA1F}')
}

/// How a chunk is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeMode {
    /// Fail on malformed input instead of inserting U+FFFD.
    pub strict: bool,
    /// Honor and strip a BOM; only the first chunk of a file starts with one.
    pub sniff_bom: bool,
    /// The chunk ends the file. Otherwise an incomplete trailing sequence is
    /// held back rather than reported as malformed.
    pub last: bool,
}

/// Decode one chunk. `base_offset` is the chunk's position in the file and
/// only feeds error reporting.
pub fn decode_chunk(
    bytes: &[u8],
    encoding: &'static Encoding,
    mode: DecodeMode,
    base_offset: u64,
) -> Result<String, DecodeError> {
    let mut decoder = if mode.sniff_bom {
        encoding.new_decoder()
    } else {
        encoding.new_decoder_without_bom_handling()
    };
    let too_large = || DecodeError::TooLarge {
        encoding: encoding.name().to_string(),
    };

    if mode.strict {
        let capacity = decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .ok_or_else(too_large)?;
        let mut out = String::with_capacity(capacity);
        let (result, read) = decoder.decode_to_string_without_replacement(bytes, &mut out, mode.last);
        match result {
            DecoderResult::InputEmpty => Ok(out),
            DecoderResult::Malformed(bad, consumed_after) => {
                let offset = read.saturating_sub(bad as usize + consumed_after as usize);
                Err(DecodeError::Malformed {
                    encoding: encoding.name().to_string(),
                    offset: base_offset + offset as u64,
                })
            }
            DecoderResult::OutputFull => Err(too_large()),
        }
    } else {
        let capacity = decoder.max_utf8_buffer_length(bytes.len()).ok_or_else(too_large)?;
        let mut out = String::with_capacity(capacity);
        let (result, _read, _had_errors) = decoder.decode_to_string(bytes, &mut out, mode.last);
        match result {
            CoderResult::InputEmpty => Ok(out),
            CoderResult::OutputFull => Err(too_large()),
        }
    }
}

/// Offset just past the last newline in `bytes`, i.e. where the trailing
/// (possibly truncated) line starts.
pub fn last_line_boundary(bytes: &[u8], encoding: &'static Encoding) -> Option<usize> {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        let newline: [u8; 2] = if encoding == UTF_16LE { [0x0A, 0x00] } else { [0x00, 0x0A] };
        let even_len = bytes.len() & !1;
        return (0..even_len)
            .step_by(2)
            .rev()
            .find(|&i| bytes[i..i + 2] == newline)
            .map(|i| i + 2);
    }
    bytes.iter().rposition(|&b| b == b'\n').map(|i| i + 1)
}

/// Compose decoded text to NFC.
pub fn normalize_text(text: String) -> String {
    if is_nfc_quick(text.chars()) == IsNormalized::Yes {
        return text;
    }
    text.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_reported_as_utf8() {
        let guess = detect(b"Just some plain text content.\nWith lines.");
        assert_eq!(guess.encoding, UTF_8);
        assert!(!guess.is_eastern);
        assert!(!guess.defaulted);
    }

    #[test]
    fn utf8_chinese_is_eastern() {
        let guess = detect("第一章 风起\n少年离开了家乡。".as_bytes());
        assert_eq!(guess.encoding, UTF_8);
        assert!(guess.is_eastern);
    }

    #[test]
    fn sample_cut_mid_character_is_still_utf8() {
        let bytes = "少年离开了家乡".as_bytes();
        assert_eq!(detect(&bytes[..bytes.len() - 1]).encoding, UTF_8);
    }

    #[test]
    fn gbk_text_is_detected() {
        let text = "第一章 风起云涌。这是一个关于江湖的故事，少年离开了家乡，踏上了漫长的旅途。\n".repeat(20);
        let (bytes, _, _) = encoding_rs::GBK.encode(&text);
        let guess = detect(&detection_sample(&bytes, DEFAULT_SAMPLE_SIZE));
        assert!(guess.encoding == encoding_rs::GBK || guess.encoding == encoding_rs::GB18030);
        assert!(guess.is_eastern);
    }

    #[test]
    fn utf16_bom_is_honored() {
        let guess = detect(&[0xFF, 0xFE, b'H', 0x00, b'i', 0x00]);
        assert_eq!(guess.encoding, UTF_16LE);
    }

    #[test]
    fn empty_sample_falls_back() {
        let guess = detect(&[]);
        assert_eq!(guess, EncodingGuess::fallback());
    }

    #[test]
    fn override_label_is_resolved() {
        let guess = resolve(b"abc", Some("gb2312")).unwrap();
        assert_eq!(guess.encoding, encoding_rs::GBK);
        assert!(matches!(resolve(b"abc", Some("klingon")), Err(DetectError::UnknownLabel(_))));
    }

    #[test]
    fn small_files_are_replicated_into_the_sample() {
        let sample = detection_sample(b"abc", 8);
        assert_eq!(sample, b"abcabcabcabc");
        assert_eq!(detection_sample(b"abcdefgh", 4), b"abcd");
        assert!(detection_sample(b"", 4).is_empty());
    }

    #[test]
    fn strict_decode_reports_offset() {
        let mode = DecodeMode { strict: true, sniff_bom: false, last: true };
        let err = decode_chunk(b"ab\xffcd", UTF_8, mode, 100).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { offset: 102, .. }));
    }

    #[test]
    fn lossy_decode_replaces() {
        let mode = DecodeMode { strict: false, sniff_bom: false, last: true };
        assert_eq!(decode_chunk(b"ab\xffcd", UTF_8, mode, 0).unwrap(), "ab\u{FFFD}cd");
    }

    #[test]
    fn non_final_chunk_holds_back_partial_character() {
        let mut bytes = b"a".to_vec();
        bytes.extend_from_slice(&"中".as_bytes()[..2]);
        let mode = DecodeMode { strict: true, sniff_bom: false, last: false };
        assert_eq!(decode_chunk(&bytes, UTF_8, mode, 0).unwrap(), "a");
    }

    #[test]
    fn bom_is_stripped_on_first_chunk() {
        let mode = DecodeMode { strict: false, sniff_bom: true, last: true };
        assert_eq!(decode_chunk(b"\xEF\xBB\xBFHi", UTF_8, mode, 0).unwrap(), "Hi");
    }

    #[test]
    fn line_boundary_utf8_and_utf16() {
        assert_eq!(last_line_boundary(b"one\ntwo\nthr", UTF_8), Some(8));
        assert_eq!(last_line_boundary(b"no newline", UTF_8), None);
        let utf16: Vec<u8> = vec![b'a', 0, b'\n', 0, b'b', 0];
        assert_eq!(last_line_boundary(&utf16, UTF_16LE), Some(4));
        let utf16be: Vec<u8> = vec![0, b'a', 0, b'\n', 0, b'b'];
        assert_eq!(last_line_boundary(&utf16be, UTF_16BE), Some(4));
    }

    #[test]
    fn normalization_composes() {
        assert_eq!(normalize_text("e\u{301}".to_string()), "\u{e9}");
        assert_eq!(normalize_text("plain".to_string()), "plain");
    }
}
