//! Stimulus sequence construction for the n-back task.
//!
//! A generated sequence has a guaranteed share of target positions (the digit
//! equals the one `n` places earlier) and no accidental matches or immediate
//! repeats anywhere else.

use rand::seq::index;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub const DEFAULT_TARGET_PERCENTAGE: u32 = 33;

/// Stimuli are single digits.
pub type Digit = u8;

/// A generated sequence together with the positions chosen as targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSequence {
    pub digits: Vec<Digit>,
    pub targets: BTreeSet<usize>,
}

/// Where the active sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOrigin {
    Custom,
    Generated,
}

/// Number of targets requested for a sequence of `length`.
pub fn target_count(length: usize, target_percentage: u32) -> usize {
    (length * target_percentage as usize / 100).max(1)
}

/// Generate a sequence with the thread-local RNG.
pub fn generate(length: usize, n_level: usize, target_percentage: u32) -> Vec<Digit> {
    generate_with_rng(&mut rand::thread_rng(), length, n_level, target_percentage).digits
}

/// Generate a sequence and report which positions were labelled as targets.
pub fn generate_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    n_level: usize,
    target_percentage: u32,
) -> GeneratedSequence {
    let targets = choose_target_positions(rng, length, n_level, target_percentage);
    let mut digits: Vec<Digit> = Vec::with_capacity(length);

    for i in 0..length {
        if targets.contains(&i) {
            // targets are >= n_level, so the source slot is already filled
            digits.push(digits[i - n_level]);
            continue;
        }

        let n_back = i.checked_sub(n_level).map(|j| digits[j]);
        let previous = i.checked_sub(1).map(|j| digits[j]);
        // The next slot copies digits[i + 1 - n_level]; keep it distinct from us.
        let next_copy = if n_level >= 2 && targets.contains(&(i + 1)) {
            Some(digits[i + 1 - n_level])
        } else {
            None
        };

        let digit = loop {
            let candidate: Digit = rng.gen_range(0..10);
            if Some(candidate) != n_back && Some(candidate) != previous && Some(candidate) != next_copy
            {
                break candidate;
            }
        };
        digits.push(digit);
    }

    GeneratedSequence { digits, targets }
}

/// Pick target indices in `[n_level, length)`.
///
/// One position is always drawn first when any valid slot exists, then more are
/// added without replacement until the requested count or the slot cap is hit.
pub fn choose_target_positions<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    n_level: usize,
    target_percentage: u32,
) -> BTreeSet<usize> {
    let slots = length.saturating_sub(n_level);
    if slots == 0 {
        return BTreeSet::new();
    }

    let wanted = target_count(length, target_percentage).min(slots);
    let first = rng.gen_range(n_level..length);
    let mut targets = BTreeSet::from([first]);

    let remaining: Vec<usize> = (n_level..length).filter(|&p| p != first).collect();
    let extra = wanted.saturating_sub(1).min(remaining.len());
    for k in index::sample(rng, remaining.len(), extra) {
        targets.insert(remaining[k]);
    }
    targets
}

/// Parse an operator-supplied comma separated digit list.
///
/// Empty tokens (doubled or trailing commas) are skipped. Any other token that
/// is not an integer in `0..=9` rejects the whole string.
pub fn parse_custom_sequence(text: &str) -> Option<Vec<Digit>> {
    if text.trim().is_empty() {
        return None;
    }

    let mut digits = Vec::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<u8>() {
            Ok(d) if d <= 9 => digits.push(d),
            _ => return None,
        }
    }

    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Choose the custom sequence when it parses and is long enough, otherwise generate.
///
/// Custom sequences are used verbatim: the match and repeat constraints are not
/// checked against operator input.
pub fn select_sequence<R: Rng + ?Sized>(
    rng: &mut R,
    custom: &str,
    required: usize,
    n_level: usize,
    target_percentage: u32,
) -> (Vec<Digit>, SequenceOrigin) {
    match parse_custom_sequence(custom) {
        Some(mut digits) if digits.len() >= required => {
            digits.truncate(required);
            debug!(required, "using custom sequence");
            return (digits, SequenceOrigin::Custom);
        }
        Some(digits) => {
            warn!(
                supplied = digits.len(),
                required, "custom sequence too short, generating instead"
            );
        }
        None if !custom.trim().is_empty() => {
            warn!(custom, "custom sequence is malformed, generating instead");
        }
        None => {}
    }

    let generated = generate_with_rng(rng, required, n_level, target_percentage);
    (generated.digits, SequenceOrigin::Generated)
}

/// Whether the stimulus at `index` repeats the one `n_level` positions earlier.
pub fn is_target_trial(sequence: &[Digit], index: usize, n_level: usize) -> bool {
    if index < n_level || index >= sequence.len() {
        return false;
    }
    sequence[index] == sequence[index - n_level]
}
