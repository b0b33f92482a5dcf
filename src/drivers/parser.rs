//! Text-line decoding for sensor boards.
//!
//! Boards print one line per sample, either a full frame (`1.0,2.0,3.0,...`)
//! or a sparse update carrying only the first few channels. Separators are not
//! fixed, so every decimal float found in the line counts as a token.
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?")
        .expect("number pattern is valid")
});
/// Turns raw line bytes into channel values.
#[derive(Clone, Debug)]
pub struct LineParser {
    channel_count: usize,
}
impl LineParser {
    pub fn new(channel_count: usize) -> Self {
        Self { channel_count }
    }
    /// Extracts every numeric token. Invalid UTF-8 is replaced, not rejected.
    pub fn tokens(&self, line: &[u8]) -> Vec<f64> {
        let text = String::from_utf8_lossy(line);
        NUMBER
            .find_iter(&text)
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .collect()
    }
    /// Merges one line into `latest`. Returns false when the line held no numbers.
    ///
    /// A line with at least `channel_count` tokens overwrites the whole vector;
    /// a shorter one only touches channels `0..k`.
    pub fn apply_line(&self, line: &[u8], latest: &mut [Option<f64>]) -> bool {
        let tokens = self.tokens(line);
        if tokens.is_empty() {
            log::trace!("dropping line without numbers: {:?}", String::from_utf8_lossy(line));
            return false;
        }
        if tokens.len() >= self.channel_count {
            for (slot, value) in latest.iter_mut().zip(tokens.iter().take(self.channel_count)) {
                *slot = Some(*value);
            }
        } else {
            for (slot, value) in latest.iter_mut().zip(tokens.iter()) {
                *slot = Some(*value);
            }
        }
        true
    }
}
