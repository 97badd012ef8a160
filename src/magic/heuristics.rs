//! GY-030: Statistical heuristics for Magic.
//!
//! Language detection compares the case-folded byte distribution of the data
//! against per-language expectations with a chi-squared statistic. Lower
//! scores are closer matches.

use serde::Serialize;
use std::sync::LazyLock;

/// Below this probability a language match is treated as absent.
pub const MIN_LANGUAGE_PROBABILITY: f64 = 1e-3;

/// Expected share (percent) of bytes outside any language table.
const FLOOR: f64 = 0.05;
const DIGIT: f64 = 0.05;

const PUNCTUATION: &[(u8, f64)] = &[
    (b' ', 16.0),
    (b'\n', 0.5),
    (b',', 1.0),
    (b'.', 1.0),
    (b'\'', 0.2),
    (b'"', 0.2),
    (b'-', 0.2),
    (b'!', 0.05),
    (b'?', 0.05),
    (b':', 0.05),
    (b';', 0.05),
    (b'(', 0.05),
    (b')', 0.05),
];

/// Letter frequencies a-z (percent of letters) plus the share of accented letters.
struct LanguageTable {
    name: &'static str,
    letters: [f64; 26],
    accented: f64,
}

#[rustfmt::skip]
static COMMON: &[LanguageTable] = &[
    LanguageTable { name: "English", accented: 0.0, letters: [
        8.167, 1.492, 2.782, 4.253, 12.702, 2.228, 2.015, 6.094, 6.966, 0.153, 0.772, 4.025, 2.406,
        6.749, 7.507, 1.929, 0.095, 5.987, 6.327, 9.056, 2.758, 0.978, 2.360, 0.150, 1.974, 0.074] },
    LanguageTable { name: "German", accented: 2.323, letters: [
        6.516, 1.886, 2.732, 5.076, 16.396, 1.656, 3.009, 4.577, 6.550, 0.268, 1.417, 3.437, 2.534,
        9.776, 2.594, 0.670, 0.018, 7.003, 7.270, 6.154, 4.166, 0.846, 1.921, 0.034, 0.039, 1.134] },
    LanguageTable { name: "French", accented: 2.864, letters: [
        7.636, 0.901, 3.260, 3.669, 14.715, 1.066, 0.866, 0.737, 7.529, 0.613, 0.074, 5.456, 2.968,
        7.095, 5.796, 2.521, 1.362, 6.693, 7.948, 7.244, 6.311, 1.838, 0.049, 0.427, 0.128, 0.326] },
    LanguageTable { name: "Spanish", accented: 2.966, letters: [
        11.525, 2.215, 4.019, 5.010, 12.181, 0.692, 1.768, 0.703, 6.247, 0.493, 0.011, 4.967, 3.157,
        6.712, 8.683, 2.510, 0.877, 6.871, 7.977, 4.632, 2.927, 1.138, 0.017, 0.215, 1.008, 0.467] },
    LanguageTable { name: "Italian", accented: 1.096, letters: [
        11.745, 0.927, 4.501, 3.736, 11.792, 1.153, 1.644, 0.636, 10.143, 0.011, 0.009, 6.510, 2.512,
        6.883, 9.832, 3.056, 0.505, 6.367, 4.981, 5.623, 3.011, 2.097, 0.033, 0.003, 0.020, 1.181] },
    LanguageTable { name: "Dutch", accented: 0.0, letters: [
        7.486, 1.584, 1.242, 5.933, 18.910, 0.805, 3.403, 2.380, 6.499, 1.460, 2.248, 3.568, 2.213,
        10.032, 6.063, 1.570, 0.009, 6.411, 3.730, 6.790, 1.990, 2.850, 1.520, 0.036, 0.035, 1.390] },
    LanguageTable { name: "Portuguese", accented: 2.400, letters: [
        14.634, 1.043, 3.882, 4.992, 12.570, 1.023, 1.303, 0.781, 6.186, 0.397, 0.015, 2.779, 4.738,
        4.446, 9.735, 2.523, 1.204, 6.530, 6.805, 4.336, 3.639, 1.575, 0.037, 0.253, 0.006, 0.470] },
];

#[rustfmt::skip]
static EXTENDED: &[LanguageTable] = &[
    LanguageTable { name: "Swedish", accented: 4.440, letters: [
        9.383, 1.535, 1.486, 4.702, 10.149, 2.027, 2.862, 2.090, 5.817, 0.614, 3.140, 5.275, 3.471,
        8.542, 4.482, 1.839, 0.020, 8.431, 6.590, 7.691, 1.919, 2.415, 0.142, 0.159, 0.708, 0.070] },
    LanguageTable { name: "Turkish", accented: 11.806, letters: [
        11.920, 2.844, 0.963, 4.706, 8.912, 0.461, 1.253, 1.212, 8.600, 0.034, 4.683, 5.922, 3.752,
        7.487, 2.476, 0.886, 0.0, 6.722, 3.014, 3.314, 3.235, 0.959, 0.0, 0.0, 3.336, 1.500] },
    LanguageTable { name: "Polish", accented: 5.100, letters: [
        10.503, 1.740, 3.895, 3.725, 7.352, 0.143, 1.731, 1.015, 8.328, 1.836, 2.753, 2.564, 2.515,
        6.237, 6.667, 2.445, 0.0, 5.243, 5.224, 2.475, 2.062, 0.012, 5.813, 0.004, 3.206, 4.852] },
];

/// A language with its expected byte distribution, in percent.
struct Language {
    name: &'static str,
    expected: [f64; 256],
}

impl Language {
    fn from_table(table: &LanguageTable) -> Self {
        let mut expected = [FLOOR; 256];
        for &(b, share) in PUNCTUATION {
            expected[usize::from(b)] = share;
        }
        for d in b'0'..=b'9' {
            expected[usize::from(d)] = DIGIT;
        }
        let fixed: f64 = PUNCTUATION.iter().map(|(_, s)| s).sum::<f64>() + DIGIT * 10.0;
        let letter_mass = 100.0 - fixed;
        let total: f64 = table.letters.iter().sum::<f64>() + table.accented;
        for (i, f) in table.letters.iter().enumerate() {
            expected[usize::from(b'a') + i] = (letter_mass * f / total).max(FLOOR);
        }
        if table.accented > 0.0 {
            // UTF-8: a lead byte plus a continuation byte per accented letter
            let accented = letter_mass * table.accented / total / 2.0;
            expected[0xc3] = accented;
            for slot in &mut expected[0x80..0xc0] {
                *slot = (accented / 64.0).max(FLOOR);
            }
        }
        // Upper case is folded before comparison
        for slot in &mut expected[usize::from(b'A')..=usize::from(b'Z')] {
            *slot = 0.0;
        }
        let sum: f64 = expected.iter().sum();
        for slot in &mut expected {
            *slot *= 100.0 / sum;
        }
        Self {
            name: table.name,
            expected,
        }
    }
}

static COMMON_LANGUAGES: LazyLock<Vec<Language>> =
    LazyLock::new(|| COMMON.iter().map(Language::from_table).collect());

static ALL_LANGUAGES: LazyLock<Vec<Language>> = LazyLock::new(|| {
    COMMON
        .iter()
        .chain(EXTENDED)
        .map(Language::from_table)
        .collect()
});

/// How well the data matches one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageScore {
    pub lang: &'static str,
    /// Chi-squared distance; lower is closer
    pub score: f64,
    pub probability: f64,
}

// ============================================================================
// Measures
// ============================================================================

/// Shannon entropy in bits per byte, 0.0 to 8.0.
pub fn entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in data {
        counts[usize::from(b)] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Fraction of decoded characters that are printable or whitespace.
pub fn printable_ratio(data: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(data);
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        if c != char::REPLACEMENT_CHARACTER && (!c.is_control() || c.is_whitespace()) {
            printable += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    printable as f64 / total as f64
}

pub fn is_utf8(data: &[u8]) -> bool {
    std::str::from_utf8(data).is_ok()
}

/// Case-folded byte frequencies, in percent.
fn frequencies(data: &[u8]) -> [f64; 256] {
    let mut freq = [0.0; 256];
    for &b in data {
        freq[usize::from(b.to_ascii_lowercase())] += 1.0;
    }
    let len = data.len() as f64;
    for f in &mut freq {
        *f = *f * 100.0 / len;
    }
    freq
}

/// Pearson's chi-squared statistic over bins with a non-zero expectation.
pub fn chi_squared(observed: &[f64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .filter(|(_, &e)| e > 0.0)
        .map(|(&o, &e)| (o - e) * (o - e) / e)
        .sum()
}

/// Upper-tail probability of `x2` under a chi-squared distribution with `df`
/// degrees of freedom, via the Wilson-Hilferty normal approximation.
pub fn chi_squared_probability(x2: f64, df: f64) -> f64 {
    if x2 <= 0.0 {
        return 1.0;
    }
    let k = 2.0 / (9.0 * df);
    let z = ((x2 / df).cbrt() - (1.0 - k)) / k.sqrt();
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Complementary error function (Abramowitz and Stegun 7.1.26).
fn erfc(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    poly * (-x * x).exp()
}

/// Score the data against every known language, best match first.
///
/// Empty data yields a single `Unknown` entry with the worst possible score.
pub fn detect_language(data: &[u8], extensive: bool) -> Vec<LanguageScore> {
    if data.is_empty() {
        return vec![LanguageScore {
            lang: "Unknown",
            score: f64::MAX,
            probability: 0.0,
        }];
    }
    let observed = frequencies(data);
    let languages = if extensive {
        &*ALL_LANGUAGES
    } else {
        &*COMMON_LANGUAGES
    };
    let mut scores: Vec<LanguageScore> = languages
        .iter()
        .map(|lang| {
            let score = chi_squared(&observed, &lang.expected);
            LanguageScore {
                lang: lang.name,
                score,
                probability: chi_squared_probability(score, 255.0),
            }
        })
        .collect();
    scores.sort_by(|a, b| a.score.total_cmp(&b.score));
    scores
}

/// Whether the best score identifies some language.
pub fn has_language(scores: &[LanguageScore]) -> bool {
    scores
        .first()
        .is_some_and(|s| s.probability > MIN_LANGUAGE_PROBABILITY)
}
