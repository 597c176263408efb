//! Heuristic encoding detection over a text sample.

use super::bom;

/// Tuning knobs for [`detect_encoding`].
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    /// Above this ratio of NUL bytes (outside a UTF-16 pattern) the sample is
    /// considered binary and detection gives up.
    pub max_null_ratio: f64,
    /// Same for control characters other than tab, CR and LF.
    pub max_control_ratio: f64,
    /// Minimum sample length for the UTF-16 pattern check.
    pub utf16_min_sample: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            max_null_ratio: 0.1,
            max_control_ratio: 0.3,
            utf16_min_sample: 16,
        }
    }
}

/// Guesses the encoding of `sample`.
///
/// Order: leading BOM, UTF-16 NUL-byte pattern, valid UTF-8, then
/// `windows-1252` for any other 8-bit text. Returns `None` for an empty or
/// binary-looking sample.
pub fn detect_encoding(sample: &[u8], config: DetectionConfig) -> Option<&'static str> {
    if sample.is_empty() {
        return None;
    }

    if let Some(encoding) = bom::sniff(sample) {
        return Some(encoding);
    }

    if sample.len() >= config.utf16_min_sample {
        if let Some(encoding) = detect_utf16_pattern(sample) {
            return Some(encoding);
        }
    }

    let mut null_count = 0usize;
    let mut control_count = 0usize;
    for &b in sample {
        if b == 0 {
            null_count += 1;
        } else if b < 32 && b != b'\t' && b != b'\n' && b != b'\r' {
            control_count += 1;
        }
    }
    let null_ratio = null_count as f64 / sample.len() as f64;
    let control_ratio = control_count as f64 / sample.len() as f64;
    if null_ratio > config.max_null_ratio || control_ratio > config.max_control_ratio {
        return None;
    }

    if std::str::from_utf8(sample).is_ok() || truncated_utf8(sample) {
        return Some("UTF-8");
    }

    Some("windows-1252")
}

/// Valid UTF-8 except for a multi-byte sequence cut at the end of the sample.
fn truncated_utf8(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && sample.len() - err.valid_up_to() < 4,
    }
}

/// Detects UTF-16 from the position of NUL bytes in mostly-ASCII text.
fn detect_utf16_pattern(bytes: &[u8]) -> Option<&'static str> {
    let mut even_null = 0usize;
    let mut odd_null = 0usize;
    let mut even_ascii = 0usize;
    let mut odd_ascii = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        let printable = (32..=126).contains(&b) || b == b'\n' || b == b'\r' || b == b'\t';
        if i % 2 == 0 {
            if b == 0 {
                even_null += 1;
            } else if printable {
                even_ascii += 1;
            }
        } else if b == 0 {
            odd_null += 1;
        } else if printable {
            odd_ascii += 1;
        }
    }

    let half = (bytes.len() / 2).max(1) as f64;

    // Little endian puts the ASCII byte first, the NUL high byte second.
    if odd_null as f64 / half > 0.85 && even_ascii as f64 / half > 0.4 {
        return Some("UTF-16LE");
    }
    if even_null as f64 / half > 0.85 && odd_ascii as f64 / half > 0.4 {
        return Some("UTF-16BE");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(sample: &[u8]) -> Option<&'static str> {
        detect_encoding(sample, DetectionConfig::default())
    }

    #[test]
    fn utf8_text_should_be_detected() {
        assert_eq!(detect("nom;prénom;âge\r\n".as_bytes()), Some("UTF-8"));
        assert_eq!(detect(b"plain ascii"), Some("UTF-8"));
    }

    #[test]
    fn latin_text_should_be_detected_as_windows_1252() {
        assert_eq!(detect(b"nom;pr\xe9nom;\xe2ge\r\n"), Some("windows-1252"));
    }

    #[test]
    fn bom_should_decide_first() {
        assert_eq!(detect(b"\xEF\xBB\xBFnom"), Some("UTF-8"));
        assert_eq!(detect(b"\xFF\xFEn\x00o\x00m\x00"), Some("UTF-16LE"));
    }

    #[test]
    fn utf16_without_bom_should_be_detected() {
        let le: Vec<u8> = "nom,prenom,age\n".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let be: Vec<u8> = "nom,prenom,age\n".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();

        assert_eq!(detect(&le), Some("UTF-16LE"));
        assert_eq!(detect(&be), Some("UTF-16BE"));
    }

    #[test]
    fn empty_or_binary_sample_should_give_nothing() {
        assert_eq!(detect(b""), None);
        assert_eq!(detect(&[0u8, 1, 2, 3, 0, 0, 5, 6, 0, 7]), None);
    }

    #[test]
    fn sample_cut_inside_a_character_is_still_utf8() {
        let text = "prénom".as_bytes();
        assert_eq!(detect(&text[..3]), Some("UTF-8"));
    }
}
