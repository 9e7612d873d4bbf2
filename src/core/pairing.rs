//! Pairing of a round's eligible participants.
//!
//! Every candidate pair is scored (repeats in history first, then how recently
//! the pair last met, then cluster preference). Pairs are taken greedily from
//! the cheapest, with ties broken by a shuffle seeded from the round label, and
//! the result is refined by swapping partners between pairs while that lowers
//! the total cost.

use crate::core::sampler::keyed_draw;
use crate::domain::model::{pair_key, pairs_of, Pairing, Participant, Round, RoundLabel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::ops::Add;

/// Cost of putting two participants together; compared lexicographically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairCost {
    /// Times this exact pair met in the considered history.
    pub repeats: u32,
    /// 1 + position of the latest round they met in (0 if never).
    pub recency: u32,
    /// 1 when the pair goes against the cluster preference.
    pub cluster: u32,
}

impl Add for PairCost {
    type Output = PairCost;

    fn add(self, other: PairCost) -> PairCost {
        PairCost {
            repeats: self.repeats + other.repeats,
            recency: self.recency + other.recency,
            cluster: self.cluster + other.cluster,
        }
    }
}

#[derive(Debug, Default)]
struct PairHistory {
    // (count, 1 + index of last round)
    seen: HashMap<(String, String), (u32, u32)>,
}

impl PairHistory {
    fn from_rounds(history: &[&Round]) -> Self {
        let mut seen = HashMap::new();
        for (index, round) in history.iter().enumerate() {
            for (a, b) in pairs_of(&round.matches) {
                let entry = seen.entry(pair_key(&a, &b)).or_insert((0, 0));
                entry.0 += 1;
                entry.1 = index as u32 + 1;
            }
        }
        Self { seen }
    }

    fn lookup(&self, a: &str, b: &str) -> (u32, u32) {
        self.seen.get(&pair_key(a, b)).copied().unwrap_or((0, 0))
    }
}

/// Newcomers to a cluster should meet their cluster; everyone else should
/// meet outside of it. Unknown clusters carry no preference.
fn cluster_penalty(a: &Participant, b: &Participant) -> u32 {
    if a.cluster.is_empty() || b.cluster.is_empty() {
        return 0;
    }
    let same = a.cluster.eq_ignore_ascii_case(&b.cluster);
    let wants_same = a.new_to_cluster || b.new_to_cluster;
    u32::from(same != wants_same)
}

#[derive(Debug, Clone)]
pub struct PairingEngine {
    seed: u64,
}

impl PairingEngine {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Pairs `eligible` for `round`, avoiding pairs found in `history`
    /// (oldest round first) where possible. With an odd pool exactly one
    /// participant is left unmatched.
    pub fn pair(&self, eligible: &[&Participant], history: &[&Round], round: &RoundLabel) -> Pairing {
        let mut people: Vec<&Participant> = eligible.to_vec();
        people.sort_by(|a, b| a.email.cmp(&b.email));
        people.dedup_by(|a, b| a.email == b.email);

        if people.len() < 2 {
            return Pairing {
                pairs: Vec::new(),
                unmatched: people.first().map(|p| p.email.clone()),
            };
        }

        let costs = self.cost_matrix(&people, history);
        let (mut pairs, mut leftover) = self.greedy(&costs, round);
        refine(&costs, &mut pairs, &mut leftover);

        let total = pairs
            .iter()
            .fold(PairCost::default(), |acc, &(i, j)| acc + costs[i][j]);
        tracing::debug!(
            "Paired {} participants for round {} ({} repeat meetings)",
            pairs.len() * 2,
            round,
            total.repeats
        );

        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(i, j)| pair_key(&people[i].email, &people[j].email))
            .collect();
        pairs.sort();

        Pairing {
            pairs,
            unmatched: leftover.map(|i| people[i].email.clone()),
        }
    }

    fn cost_matrix(&self, people: &[&Participant], history: &[&Round]) -> Vec<Vec<PairCost>> {
        let seen = PairHistory::from_rounds(history);
        let n = people.len();
        let mut costs = vec![vec![PairCost::default(); n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let (repeats, recency) = seen.lookup(&people[i].email, &people[j].email);
                let cost = PairCost {
                    repeats,
                    recency,
                    cluster: cluster_penalty(people[i], people[j]),
                };
                costs[i][j] = cost;
                costs[j][i] = cost;
            }
        }
        costs
    }

    fn greedy(&self, costs: &[Vec<PairCost>], round: &RoundLabel) -> (Vec<(usize, usize)>, Option<usize>) {
        let n = costs.len();
        let mut candidates: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();

        let mut rng = StdRng::seed_from_u64(keyed_draw(self.seed, "pairing", &[round.as_str()]));
        candidates.shuffle(&mut rng);
        // Stable: equal costs keep their shuffled order.
        candidates.sort_by_key(|&(i, j)| costs[i][j]);

        let mut matched = vec![false; n];
        let mut pairs = Vec::with_capacity(n / 2);
        for (i, j) in candidates {
            if matched[i] || matched[j] {
                continue;
            }
            matched[i] = true;
            matched[j] = true;
            pairs.push((i, j));
            if pairs.len() == n / 2 {
                break;
            }
        }

        let leftover = matched.iter().position(|m| !m);
        (pairs, leftover)
    }
}

/// Swaps partners between two pairs, or with the leftover participant, while
/// that strictly lowers the total cost.
fn refine(costs: &[Vec<PairCost>], pairs: &mut [(usize, usize)], leftover: &mut Option<usize>) {
    let max_passes = costs.len() * costs.len();
    for _ in 0..max_passes {
        let mut improved = false;

        for a in 0..pairs.len() {
            for b in (a + 1)..pairs.len() {
                let (p, q) = pairs[a];
                let (r, s) = pairs[b];
                let current = costs[p][q] + costs[r][s];
                let crossed = costs[p][r] + costs[q][s];
                let swapped = costs[p][s] + costs[q][r];
                if crossed < current && crossed <= swapped {
                    pairs[a] = (p, r);
                    pairs[b] = (q, s);
                    improved = true;
                } else if swapped < current {
                    pairs[a] = (p, s);
                    pairs[b] = (q, r);
                    improved = true;
                }
            }
        }

        for pair in pairs.iter_mut() {
            let Some(u) = *leftover else { break };
            let (p, q) = *pair;
            let current = costs[p][q];
            let keep_q = costs[u][q];
            let keep_p = costs[p][u];
            if keep_q < current && keep_q <= keep_p {
                *pair = (u, q);
                *leftover = Some(p);
                improved = true;
            } else if keep_p < current {
                *pair = (p, u);
                *leftover = Some(q);
                improved = true;
            }
        }

        if !improved {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Gender, MatchMap};
    use std::collections::HashSet;

    fn cohort(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(&format!("p{i:02}@x"), "P", "P P", Gender::Female))
            .collect()
    }

    fn round(label: &str, pairs: &[(&str, &str)]) -> Round {
        let pairing = Pairing {
            pairs: pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            unmatched: None,
        };
        Round {
            label: RoundLabel::new(label).unwrap(),
            matches: pairing.to_match_map().unwrap(),
        }
    }

    fn label(s: &str) -> RoundLabel {
        RoundLabel::new(s).unwrap()
    }

    #[test]
    fn test_pairs_are_disjoint_and_cover_all_but_one() {
        let engine = PairingEngine::new(11);
        for n in 0..14 {
            let people = cohort(n);
            let refs: Vec<&Participant> = people.iter().collect();
            let pairing = engine.pair(&refs, &[], &label(&format!("r{n}")));

            let mut seen = HashSet::new();
            for (a, b) in &pairing.pairs {
                assert_ne!(a, b);
                assert!(seen.insert(a.clone()));
                assert!(seen.insert(b.clone()));
            }
            assert_eq!(pairing.pairs.len(), n / 2);
            assert_eq!(pairing.unmatched.is_some(), n % 2 == 1);
            if let Some(left) = &pairing.unmatched {
                assert!(!seen.contains(left));
            }
            assert!(pairing.to_match_map().is_ok());
        }
    }

    #[test]
    fn test_empty_and_single_pools_have_no_pairs() {
        let engine = PairingEngine::new(1);
        let empty = engine.pair(&[], &[], &label("r"));
        assert_eq!(empty, Pairing::default());

        let people = cohort(1);
        let single = engine.pair(&[&people[0]], &[], &label("r"));
        assert!(single.pairs.is_empty());
        assert_eq!(single.unmatched.as_deref(), Some("p00@x"));
        assert!(single.to_match_map().unwrap().is_empty());
    }

    #[test]
    fn test_avoids_previous_pair_when_alternative_exists() {
        let history = round("r0", &[("p00@x", "p01@x")]);
        for n in [4, 5, 6, 7] {
            let people = cohort(n);
            let refs: Vec<&Participant> = people.iter().collect();
            for seed in 0..40 {
                let pairing = PairingEngine::new(seed).pair(&refs, &[&history], &label("r1"));
                assert!(
                    !pairing.pairs.contains(&("p00@x".to_string(), "p01@x".to_string())),
                    "n={n} seed={seed} repeated a previous pair"
                );
            }
        }
    }

    #[test]
    fn test_avoids_all_repeats_when_possible() {
        let history = [
            round("r0", &[("p00@x", "p01@x"), ("p02@x", "p03@x")]),
            round("r1", &[("p00@x", "p02@x"), ("p01@x", "p03@x")]),
        ];
        let refs_history: Vec<&Round> = history.iter().collect();
        let people = cohort(4);
        let refs: Vec<&Participant> = people.iter().collect();
        for seed in 0..20 {
            let pairing = PairingEngine::new(seed).pair(&refs, &refs_history, &label("r2"));
            assert_eq!(
                pairing.pairs,
                vec![
                    ("p00@x".to_string(), "p03@x".to_string()),
                    ("p01@x".to_string(), "p02@x".to_string())
                ]
            );
        }
    }

    #[test]
    fn test_prefers_least_recent_repeat() {
        let history = [
            round("r0", &[("p00@x", "p01@x"), ("p02@x", "p03@x")]),
            round("r1", &[("p00@x", "p02@x"), ("p01@x", "p03@x")]),
            round("r2", &[("p00@x", "p03@x"), ("p01@x", "p02@x")]),
        ];
        let refs_history: Vec<&Round> = history.iter().collect();
        let people = cohort(4);
        let refs: Vec<&Participant> = people.iter().collect();
        let pairing = PairingEngine::new(5).pair(&refs, &refs_history, &label("r3"));
        assert_eq!(
            pairing.pairs,
            vec![
                ("p00@x".to_string(), "p01@x".to_string()),
                ("p02@x".to_string(), "p03@x".to_string())
            ]
        );
    }

    #[test]
    fn test_same_inputs_give_same_pairing() {
        let people = cohort(9);
        let refs: Vec<&Participant> = people.iter().collect();
        let engine = PairingEngine::new(77);
        let first = engine.pair(&refs, &[], &label("2022-10-08"));
        let second = engine.pair(&refs, &[], &label("2022-10-08"));
        assert_eq!(first, second);

        let reversed: Vec<&Participant> = people.iter().rev().collect();
        assert_eq!(engine.pair(&reversed, &[], &label("2022-10-08")), first);
    }

    #[test]
    fn test_cluster_preference_breaks_ties() {
        let mut people = cohort(4);
        people[0].cluster = "ops".into();
        people[1].cluster = "ops".into();
        people[2].cluster = "eng".into();
        people[3].cluster = "eng".into();
        let refs: Vec<&Participant> = people.iter().collect();

        for seed in 0..20 {
            let pairing = PairingEngine::new(seed).pair(&refs, &[], &label("r"));
            let map: MatchMap = pairing.to_match_map().unwrap();
            for p in &people {
                let partner = people.iter().find(|o| o.email == map[&p.email]).unwrap();
                assert_ne!(p.cluster, partner.cluster, "seed {seed}");
            }
        }

        people[0].new_to_cluster = true;
        people[3].cluster = "sales".into();
        let refs: Vec<&Participant> = people.iter().collect();
        for seed in 0..20 {
            let pairing = PairingEngine::new(seed).pair(&refs, &[], &label("r"));
            let map = pairing.to_match_map().unwrap();
            assert_eq!(map["p00@x"], "p01@x", "seed {seed}");
        }
    }

    #[test]
    fn test_history_outranks_cluster_preference() {
        let mut people = cohort(4);
        people[0].cluster = "ops".into();
        people[1].cluster = "ops".into();
        people[2].cluster = "eng".into();
        people[3].cluster = "eng".into();
        let refs: Vec<&Participant> = people.iter().collect();
        let history = round("r0", &[("p00@x", "p02@x"), ("p01@x", "p03@x")]);

        let pairing = PairingEngine::new(3).pair(&refs, &[&history], &label("r1"));
        assert_eq!(
            pairing.pairs,
            vec![
                ("p00@x".to_string(), "p03@x".to_string()),
                ("p01@x".to_string(), "p02@x".to_string())
            ]
        );
    }
}
