use crate::domain::model::{Frequency, Participant, RoundLabel};
use serde::{Deserialize, Serialize};

/// How participants with a frequency below 1 are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    /// Independent keyed draw per (participant, round).
    #[default]
    Random,
    /// Evenly spaced schedule driven by the round's sequence index. Falls back
    /// to `Random` when no index is known.
    Spaced,
}

#[derive(Debug, Clone)]
pub struct Sampler {
    seed: u64,
    policy: SamplingPolicy,
}

impl Sampler {
    pub fn new(seed: u64, policy: SamplingPolicy) -> Self {
        Self { seed, policy }
    }

    /// Participants taking part in `round`, in directory order. Same seed,
    /// round and participants always give the same subset.
    pub fn eligible<'a>(
        &self,
        participants: &'a [Participant],
        round: &RoundLabel,
        round_index: Option<u64>,
    ) -> Vec<&'a Participant> {
        let selected: Vec<&Participant> = participants
            .iter()
            .filter(|p| self.is_selected(p, round, round_index))
            .collect();

        let expected: f64 = participants.iter().map(|p| p.frequency.as_f64()).sum();
        tracing::debug!(
            "{} of {} participants eligible for round {} (about {:.1} expected)",
            selected.len(),
            participants.len(),
            round,
            expected
        );
        selected
    }

    pub fn is_selected(
        &self,
        participant: &Participant,
        round: &RoundLabel,
        round_index: Option<u64>,
    ) -> bool {
        let frequency = participant.frequency;
        if frequency.is_always() {
            return true;
        }

        match (self.policy, round_index) {
            (SamplingPolicy::Spaced, Some(index)) => {
                let phase = keyed_draw(self.seed, "phase", &[&participant.email]);
                spaced_selection(frequency, phase, index)
            }
            _ => {
                let draw = keyed_draw(
                    self.seed,
                    "eligibility",
                    &[&participant.email, round.as_str()],
                );
                below(draw, frequency)
            }
        }
    }
}

/// Uniform 64-bit value derived from the seed, a domain tag and key parts.
pub fn keyed_draw(seed: u64, domain: &str, parts: &[&str]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Exact test of `draw / 2^64 < numerator / denominator`.
fn below(draw: u64, frequency: Frequency) -> bool {
    (draw as u128) * (frequency.denominator() as u128)
        < (frequency.numerator() as u128) << 64
}

/// Selected in round k iff floor((k+1)·f + φ) > floor(k·f + φ), with
/// φ = phase / 2^64. Computed in fixed point over the frequency denominator.
fn spaced_selection(frequency: Frequency, phase: u64, index: u64) -> bool {
    let num = frequency.numerator() as u128;
    let den = frequency.denominator() as u128;
    // φ scaled to the denominator: floor(phase · den / 2^64) < den.
    let offset = ((phase as u128) * den) >> 64;
    let k = index as u128;
    let before = (k * num + offset) / den;
    let after = ((k + 1) * num + offset) / den;
    after > before
}
