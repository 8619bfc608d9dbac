//! Inspection de base d'un CSV: encodage, séparateur, en-tête
//!
//! Encodage: BOM, puis UTF-8 strict (simdutf8), puis Shift_JIS (cp932),
//! sinon UTF-8 avec remplacement.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{DecoderResult, Encoding, SHIFT_JIS, UTF_8};
use tracing::debug;

use crate::types::CsvMeta;
use crate::CsvGeoError;

/// Taille de l'échantillon lu pour la détection
pub const SAMPLE_SIZE: usize = 65536;

/// Nombre maximal de colonnes retenues dans l'en-tête
pub const MAX_HEADER_FIELDS: usize = 50;

/// Séparateurs candidats, par ordre de préférence
const DELIMITERS: &[u8] = b",\t;|";

/// Nombre de lignes examinées pour le séparateur
const SNIFF_LINES: usize = 20;

/// Inspecte un fichier CSV
pub fn inspect(path: &Path) -> Result<CsvMeta, CsvGeoError> {
    let sample = read_sample(path)?;
    let encoding = detect_encoding(&sample);
    let text = crate::decode_with_encoding(&sample, encoding);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Err(CsvGeoError::EmptyHeader(path.display().to_string()));
    }
    let header: Vec<String> = record
        .iter()
        .take(MAX_HEADER_FIELDS)
        .map(str::to_string)
        .collect();

    let delimiter_char = delimiter as char;
    debug!(
        path = %path.display(),
        encoding = encoding.name(),
        delimiter = ?delimiter_char,
        columns = header.len(),
        "CSV inspected"
    );

    Ok(CsvMeta {
        encoding,
        delimiter,
        header,
    })
}

fn read_sample(path: &Path) -> Result<Vec<u8>, CsvGeoError> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Détecte l'encodage d'un échantillon d'octets
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }

    match simdutf8::compat::from_utf8(sample) {
        Ok(_) => return UTF_8,
        // Échantillon coupé au milieu d'un caractère multi-octets
        Err(e) if e.error_len().is_none() => return UTF_8,
        Err(_) => {}
    }

    // Un échantillon plein peut finir sur un octet de tête isolé
    let truncated = sample.len() >= SAMPLE_SIZE;
    if decodes_cleanly(SHIFT_JIS, sample, !truncated) {
        return SHIFT_JIS;
    }

    UTF_8
}

/// Vrai si l'échantillon se décode sans erreur (`last = false`: une séquence
/// incomplète en fin d'échantillon est tolérée)
fn decodes_cleanly(encoding: &'static Encoding, sample: &[u8], last: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(sample.len()) else {
        return false;
    };
    let mut out = vec![0u8; capacity];
    let (result, _, _) = decoder.decode_to_utf8_without_replacement(sample, &mut out, last);
    matches!(result, DecoderResult::InputEmpty)
}

/// Devine le séparateur à partir des premières lignes
///
/// Un séparateur présent le même nombre de fois sur chaque ligne gagne sur un
/// séparateur irrégulier; à égalité, le plus fréquent l'emporte. Défaut: `,`.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&[u8]> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .map(str::as_bytes)
        .collect();

    if lines.is_empty() {
        return b',';
    }

    let mut best: Option<(bool, usize, u8)> = None;
    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| memchr::memchr_iter(delim, line).count())
            .collect();
        let min = counts.iter().copied().min().unwrap_or(0);
        if counts[0] == 0 {
            continue;
        }
        let consistent = counts.iter().all(|&c| c == counts[0]);
        let key = (consistent, if consistent { counts[0] } else { min });

        match best {
            Some((c, n, _)) if (c, n) >= key => {}
            _ => best = Some((key.0, key.1, delim)),
        }
    }

    best.map(|(_, _, d)| d).unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_encoding_bom() {
        let data = b"\xEF\xBB\xBFlat,lon\n";
        assert_eq!(detect_encoding(data).name(), "UTF-8");

        let data = b"\xFF\xFEl\x00a\x00";
        assert_eq!(detect_encoding(data).name(), "UTF-16LE");
    }

    #[test]
    fn test_detect_encoding_utf8() {
        assert_eq!(detect_encoding("住所,緯度\n".as_bytes()).name(), "UTF-8");
        // Coupé au milieu de "所"
        let bytes = "住所".as_bytes();
        assert_eq!(detect_encoding(&bytes[..5]).name(), "UTF-8");
    }

    #[test]
    fn test_detect_encoding_shift_jis() {
        let (encoded, _, _) = SHIFT_JIS.encode("住所,緯度,経度\n東京都,35.6,139.7\n");
        assert_eq!(detect_encoding(&encoded).name(), "Shift_JIS");
    }

    /// Fichier Shift_JIS dont un caractère double octet chevauche la fin de l'échantillon
    fn shift_jis_straddling_sample() -> Vec<u8> {
        let (header, _, _) = SHIFT_JIS.encode("住所,緯度,経度\n");
        let mut data = header.into_owned();
        while data.len() + 6 <= SAMPLE_SIZE - 1 {
            data.extend_from_slice(b"a,1,2\n");
        }
        data.resize(SAMPLE_SIZE - 1, b'c');
        let (tail, _, _) = SHIFT_JIS.encode("東京,35.6,139.7\n");
        data.extend_from_slice(&tail);
        data
    }

    #[test]
    fn test_detect_encoding_shift_jis_cut_sample() {
        let data = shift_jis_straddling_sample();
        // 東 = 0x93 0x8C: l'octet de tête est le dernier de l'échantillon
        assert_eq!(data[SAMPLE_SIZE - 1], 0x93);
        assert_eq!(detect_encoding(&data[..SAMPLE_SIZE]).name(), "Shift_JIS");

        // Fichier court terminé par un octet de tête: invalide
        let (short, _, _) = SHIFT_JIS.encode("住所");
        let mut short = short.into_owned();
        short.push(0x93);
        assert_eq!(detect_encoding(&short).name(), "UTF-8");
    }

    #[test]
    fn test_inspect_large_shift_jis_file() {
        let path = std::env::temp_dir().join("csvgeo_inspect_large_sjis.csv");
        std::fs::write(&path, shift_jis_straddling_sample()).unwrap();

        let meta = inspect(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(meta.encoding.name(), "Shift_JIS");
        assert_eq!(meta.header, vec!["住所", "緯度", "経度"]);
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter("a;b;c\n1,5;2,5;3\n"), b';');
        assert_eq!(sniff_delimiter("single\nvalue\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_inspect_file() {
        let path = std::env::temp_dir().join("csvgeo_inspect_test.csv");
        let (encoded, _, _) = SHIFT_JIS.encode("fid\t住所\tfX\tfY\n1\t東京都港区\t139.7\t35.6\n");
        std::fs::write(&path, &encoded).unwrap();

        let meta = inspect(&path).unwrap();
        assert_eq!(meta.encoding.name(), "Shift_JIS");
        assert_eq!(meta.delimiter, b'\t');
        assert_eq!(meta.header, vec!["fid", "住所", "fX", "fY"]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_inspect_empty_file() {
        let path = std::env::temp_dir().join("csvgeo_inspect_empty.csv");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(inspect(&path), Err(CsvGeoError::EmptyHeader(_))));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_header_is_capped() {
        let path = std::env::temp_dir().join("csvgeo_inspect_wide.csv");
        let header: Vec<String> = (0..60).map(|i| format!("c{}", i)).collect();
        std::fs::write(&path, header.join(",")).unwrap();

        let meta = inspect(&path).unwrap();
        assert_eq!(meta.header.len(), MAX_HEADER_FIELDS);

        std::fs::remove_file(path).ok();
    }
}
