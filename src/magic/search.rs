//! GY-032: Speculative decode search.
//!
//! Starting from a buffer, every operation whose Magic check matches is run
//! and the search recurses on its output until the depth bound. Intensive mode
//! also brute-forces single-byte XOR keys and letter rotations over a prefix of
//! the data. Every visited node becomes a candidate result.

use super::filetype::{self, FileType};
use super::heuristics::{self, LanguageScore};
use crate::core::config::MagicConfig;
use crate::core::dish::Dish;
use crate::core::error::OpError;
use crate::core::executor;
use crate::core::operation::OperationRegistry;
use crate::core::recipe;
use crate::core::state::{BakeContext, RecipeState};
use crate::core::types::{ArgValue, OpConfig};
use crate::ops::bitwise::{self, Scheme};
use crate::ops::text::rotate;
use regex::bytes::{Regex as BytesRegex, RegexBuilder as BytesRegexBuilder};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Brute-forced samples must be at least this printable.
const MIN_PRINTABLE: f64 = 0.9;

/// Search bounds and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct MagicOptions {
    /// Maximum number of operations chained onto the input
    pub depth: usize,
    pub intensive: bool,
    pub extensive_languages: bool,
    /// Regex every reported result must match (case-insensitive)
    pub crib: Option<String>,
    pub preview_length: usize,
    pub brute_force_sample: usize,
}

impl Default for MagicOptions {
    fn default() -> Self {
        Self::from_config(&MagicConfig::default())
    }
}

impl MagicOptions {
    pub fn from_config(config: &MagicConfig) -> Self {
        Self {
            depth: config.depth,
            intensive: config.intensive,
            extensive_languages: config.extensive_languages,
            crib: None,
            preview_length: config.preview_length,
            brute_force_sample: config.brute_force_sample,
        }
    }
}

/// An operation proposed for some data by its Magic check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingOp {
    pub op: String,
    pub args: Vec<ArgValue>,
    pub useful: bool,
}

impl MatchingOp {
    fn to_config(&self) -> OpConfig {
        OpConfig::new(&self.op, self.args.clone())
    }
}

/// One node of the search: the recipe that produced some data and what the
/// heuristics say about it.
#[derive(Debug, Clone, Serialize)]
pub struct MagicResult {
    pub recipe: Vec<OpConfig>,
    /// Truncated preview of the data
    pub data: String,
    pub language_scores: Vec<LanguageScore>,
    pub file_type: Option<FileType>,
    pub is_utf8: bool,
    pub entropy: f64,
    pub printable: f64,
    pub matching_ops: Vec<MatchingOp>,
    /// Set when the last operation's check marks its output as worth showing
    pub useful: bool,
    /// `None` when no crib was given
    pub matches_crib: Option<bool>,
    #[serde(skip)]
    digest: blake3::Hash,
    #[serde(skip)]
    len: usize,
}

impl MagicResult {
    /// Ranking score; lower is better.
    pub fn score(&self) -> f64 {
        let mut score = self.language_scores.first().map_or(f64::MAX, |s| s.score);
        if self.file_type.is_some() {
            score = 500.0;
        }
        if self.is_utf8 {
            score -= 100.0;
        }
        if self.matches_crib == Some(true) {
            score -= 10_000.0;
        }
        score + self.recipe.len() as f64 * 10.0
    }

    /// Whether the node is worth reporting at all.
    fn is_interesting(&self) -> bool {
        (self.useful || self.len > 0)
            && (heuristics::has_language(&self.language_scores)
                || self.file_type.is_some()
                || self.is_utf8
                || !self.matching_ops.is_empty())
            && self.matches_crib != Some(false)
    }
}

/// A compiled Magic check.
struct Pattern {
    op: &'static str,
    args: Vec<ArgValue>,
    regex: BytesRegex,
    useful: bool,
    entropy_range: Option<(f64, f64)>,
}

/// Compile every Magic check declared in the registry.
///
/// Checks whose pattern does not compile are skipped with a warning.
fn compile_patterns(registry: &OperationRegistry) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    for op in registry.iter() {
        let name = op.meta().name;
        for check in op.magic_checks() {
            let regex = BytesRegexBuilder::new(check.pattern)
                .unicode(false)
                .case_insensitive(check.case_insensitive)
                .build();
            match regex {
                Ok(regex) => patterns.push(Pattern {
                    op: name,
                    args: check.args.iter().map(|a| a.to_arg()).collect(),
                    regex,
                    useful: check.useful,
                    entropy_range: check.entropy_range,
                }),
                Err(e) => warn!("Skipping Magic check for {}: {}", name, e),
            }
        }
    }
    patterns
}

/// The search engine, bound to one registry.
pub struct Magic {
    registry: OperationRegistry,
    patterns: Vec<Pattern>,
    crib: Option<Regex>,
    options: MagicOptions,
}

impl Magic {
    pub fn new(registry: OperationRegistry, options: MagicOptions) -> Result<Self, OpError> {
        let crib = match options.crib.as_deref().filter(|c| !c.is_empty()) {
            Some(c) => Some(RegexBuilder::new(c).case_insensitive(true).build()?),
            None => None,
        };
        Ok(Self {
            patterns: compile_patterns(&registry),
            registry,
            crib,
            options,
        })
    }

    pub fn options(&self) -> &MagicOptions {
        &self.options
    }

    /// Operations whose checks match `data`, in registry order.
    pub fn find_matching_ops(&self, data: &[u8]) -> Vec<MatchingOp> {
        let entropy = heuristics::entropy(data);
        self.patterns
            .iter()
            .filter(|p| {
                p.entropy_range
                    .is_none_or(|(lo, hi)| (lo..=hi).contains(&entropy))
            })
            .filter(|p| p.regex.is_match(data))
            .map(|p| MatchingOp {
                op: p.op.to_string(),
                args: p.args.clone(),
                useful: p.useful,
            })
            .collect()
    }

    /// Run the search and return the ranked, de-duplicated results.
    pub fn search(&self, data: &[u8]) -> Vec<MagicResult> {
        let mut results = self.speculate(
            data,
            self.options.depth,
            self.options.intensive,
            Vec::new(),
            false,
        );
        results.sort_by(|a, b| a.score().total_cmp(&b.score()));
        let mut seen = HashSet::new();
        results.retain(|r| seen.insert(r.digest));
        debug!("Magic found {} result(s)", results.len());
        results
    }

    fn speculate(
        &self,
        data: &[u8],
        depth: usize,
        intensive: bool,
        recipe: Vec<OpConfig>,
        useful: bool,
    ) -> Vec<MagicResult> {
        let matching = self.find_matching_ops(data);
        let mut results = vec![self.describe(data, recipe.clone(), matching.clone(), useful)];
        if depth == 0 {
            return results.into_iter().filter(MagicResult::is_interesting).collect();
        }

        for candidate in &matching {
            let conf = candidate.to_config();
            let Some(output) = self.run_step(data, &conf) else {
                continue;
            };
            if output.is_empty() || output == data {
                continue;
            }
            trace!("Magic: {} produced {} bytes", conf.op, output.len());
            let mut next = recipe.clone();
            next.push(conf);
            results.extend(self.speculate(&output, depth - 1, intensive, next, candidate.useful));
        }

        if intensive {
            for (conf, output) in self.brute_force(data) {
                let mut next = recipe.clone();
                next.push(conf);
                results.extend(self.speculate(&output, depth - 1, false, next, false));
            }
        }

        results.into_iter().filter(MagicResult::is_interesting).collect()
    }

    /// Run one operation over `data`. `None` when it fails.
    fn run_step(&self, data: &[u8], conf: &OpConfig) -> Option<Vec<u8>> {
        let ops = recipe::hydrate(std::slice::from_ref(conf), &self.registry).ok()?;
        let mut state = RecipeState::new(
            Dish::from_bytes(data.to_vec()),
            ops,
            BakeContext::new(self.registry.clone()),
        );
        match executor::execute(&mut state) {
            Ok(done) if done == state.op_list.len() && state.last_run.is_some() => {
                state.dish.get_bytes().ok()
            }
            _ => None,
        }
    }

    /// Single-byte XOR keys and rotation amounts whose output over the sample
    /// looks like text, applied to the whole of `data`.
    fn brute_force(&self, data: &[u8]) -> Vec<(OpConfig, Vec<u8>)> {
        if data.is_empty() || filetype::is_compressed(data) {
            return Vec::new();
        }
        let sample = &data[..data.len().min(self.options.brute_force_sample)];
        let baseline = self.best_score(sample);
        let mut configs = Vec::new();
        for key in 1..=u8::MAX {
            if self.plausible(&bitwise::xor(sample, &[key], Scheme::Standard, false), baseline) {
                configs.push(OpConfig::new(
                    "XOR",
                    vec![
                        ArgValue::Toggle {
                            string: format!("{:02x}", key),
                            option: "Hex".to_string(),
                        },
                        "Standard".into(),
                        false.into(),
                    ],
                ));
            }
        }
        for amount in 1..26usize {
            if self.plausible(&rotate(sample, amount, true, true, false), baseline) {
                configs.push(OpConfig::new(
                    "ROT13",
                    vec![true.into(), true.into(), false.into(), (amount as f64).into()],
                ));
            }
        }
        debug!("Brute force kept {} candidate(s)", configs.len());
        configs
            .into_iter()
            .filter_map(|conf| self.run_step(data, &conf).map(|out| (conf, out)))
            .filter(|(_, out)| out != data)
            .collect()
    }

    fn best_score(&self, sample: &[u8]) -> f64 {
        heuristics::detect_language(sample, self.options.extensive_languages)
            .first()
            .map_or(f64::MAX, |s| s.score)
    }

    /// Text-like, language-like and closer to a language than the untouched sample.
    fn plausible(&self, sample: &[u8], baseline: f64) -> bool {
        if !heuristics::is_utf8(sample) || heuristics::printable_ratio(sample) < MIN_PRINTABLE {
            return false;
        }
        let scores = heuristics::detect_language(sample, self.options.extensive_languages);
        heuristics::has_language(&scores) && scores[0].score < baseline
    }

    fn describe(
        &self,
        data: &[u8],
        recipe: Vec<OpConfig>,
        matching_ops: Vec<MatchingOp>,
        useful: bool,
    ) -> MagicResult {
        let text = String::from_utf8_lossy(data);
        MagicResult {
            recipe,
            data: text.chars().take(self.options.preview_length).collect(),
            language_scores: heuristics::detect_language(data, self.options.extensive_languages),
            file_type: filetype::detect(data),
            is_utf8: heuristics::is_utf8(data),
            entropy: heuristics::entropy(data),
            printable: heuristics::printable_ratio(data),
            matching_ops,
            useful,
            matches_crib: self.crib.as_ref().map(|c| c.is_match(&text)),
            digest: blake3::hash(data),
            len: data.len(),
        }
    }
}
