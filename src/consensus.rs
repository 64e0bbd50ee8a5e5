//! Merge several per-model top lists into one consensus ranking.
//!
//! Slots are filled one at a time. For slot `i` the players each model placed
//! at position `i` are tallied:
//!
//! 1. plurality over every model, accepted at a strict majority of votes;
//! 2. plurality over the restricted model subset, accepted at a strict
//!    majority of that subset;
//! 3. otherwise the candidate with the largest share summed over every list.
//!
//! Players already placed are never eligible again. The whole procedure is a
//! pure function of its input.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::model::RESTRICTED_EXCLUDED;
use crate::top_n::{TOP_N, TopList};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsensusError {
    #[error("no model lists to merge")]
    NoModels,
    #[error("{player} appears more than once in the {model} list")]
    DuplicateInList { model: String, player: String },
    #[error("{model} lists a non-finite share for {player}")]
    NonFiniteShare { model: String, player: String },
    #[error("no tie-break candidate left for slot {slot}")]
    TieBreakExhausted { slot: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusConfig {
    pub slots: usize,
    /// Votes needed in the first tier. `None` means a strict majority of the
    /// lists supplied.
    pub majority: Option<usize>,
    /// Votes needed in the second tier. `None` means a strict majority of the
    /// restricted subset, never fewer than two.
    pub restricted_majority: Option<usize>,
    /// Models left out of the second tier.
    pub restricted_excluded: Vec<String>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            slots: TOP_N,
            majority: None,
            restricted_majority: None,
            restricted_excluded: RESTRICTED_EXCLUDED.iter().map(|m| m.to_string()).collect(),
        }
    }
}

fn strict_majority(voters: usize) -> usize {
    voters / 2 + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Plurality,
    RestrictedPlurality,
    ShareSum,
    /// Every player at this position was already placed; the slot went to the
    /// best share sum among all remaining players.
    Backfill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSlot {
    pub slot: usize,
    pub player: String,
    pub tier: Tier,
    pub votes: usize,
    pub share_sum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsensusList {
    pub slots: Vec<ConsensusSlot>,
}

impl ConsensusList {
    pub fn players(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.player.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, player: &str) -> bool {
        self.slots.iter().any(|s| s.player == player)
    }

    fn place(&mut self, player: &str, tier: Tier, votes: usize, share_sum: Option<f64>) {
        let slot = self.slots.len() + 1;
        debug!("slot {slot}: {player} via {tier:?} (votes={votes})");
        self.slots.push(ConsensusSlot {
            slot,
            player: player.to_string(),
            tier,
            votes,
            share_sum,
        });
    }
}

/// Vote counts at one position, most votes first; equal counts keep the
/// order in which players were first seen.
#[derive(Debug, Clone, PartialEq)]
struct Tally<'a> {
    ranked: Vec<(&'a str, usize)>,
}

impl<'a> Tally<'a> {
    fn at<I>(lists: I, position: usize) -> Self
    where
        I: IntoIterator<Item = &'a TopList>,
    {
        let mut ranked: Vec<(&'a str, usize)> = Vec::new();
        for list in lists {
            let Some(entry) = list.at(position) else { continue };
            match ranked.iter_mut().find(|(p, _)| *p == entry.player) {
                Some((_, votes)) => *votes += 1,
                None => ranked.push((entry.player.as_str(), 1)),
            }
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        Self { ranked }
    }

    fn unplaced<'s>(&'s self, placed: &'s ConsensusList) -> impl Iterator<Item = (&'a str, usize)> + 's {
        self.ranked
            .iter()
            .copied()
            .filter(move |(player, _)| !placed.contains(player))
    }

    fn leader(&self, placed: &ConsensusList) -> Option<(&'a str, usize)> {
        self.unplaced(placed).next()
    }
}

/// Sum of each player's share over every list it appears in, at any rank.
fn share_totals(lists: &[TopList]) -> HashMap<&str, f64> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for list in lists {
        for entry in &list.entries {
            *totals.entry(entry.player.as_str()).or_insert(0.0) += entry.share;
        }
    }
    totals
}

/// Highest share sum; on equal sums the earlier candidate wins.
fn best_by_share<'a>(candidates: &[&'a str], totals: &HashMap<&str, f64>) -> Option<(&'a str, f64)> {
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates.iter().copied() {
        let sum = totals.get(candidate).copied().unwrap_or(0.0);
        if best.is_none_or(|(_, top)| sum > top) {
            best = Some((candidate, sum));
        }
    }
    best
}

fn validate(lists: &[TopList]) -> Result<(), ConsensusError> {
    if lists.is_empty() {
        return Err(ConsensusError::NoModels);
    }
    for list in lists {
        let mut seen = HashSet::with_capacity(list.entries.len());
        for entry in &list.entries {
            if !seen.insert(entry.player.as_str()) {
                return Err(ConsensusError::DuplicateInList {
                    model: list.model.clone(),
                    player: entry.player.clone(),
                });
            }
            if !entry.share.is_finite() {
                return Err(ConsensusError::NonFiniteShare {
                    model: list.model.clone(),
                    player: entry.player.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Build the consensus ranking.
///
/// The result holds `config.slots` players unless fewer distinct players exist
/// across all lists, in which case it is returned short.
pub fn resolve(lists: &[TopList], config: &ConsensusConfig) -> Result<ConsensusList, ConsensusError> {
    validate(lists)?;

    let restricted: Vec<&TopList> = lists
        .iter()
        .filter(|l| !config.restricted_excluded.contains(&l.model))
        .collect();
    let majority = config.majority.unwrap_or_else(|| strict_majority(lists.len()));
    // A lone reliable model is not a vote.
    let restricted_majority = config
        .restricted_majority
        .unwrap_or_else(|| strict_majority(restricted.len()).max(2));
    let totals = share_totals(lists);

    let mut placed = ConsensusList::default();
    for position in 0..config.slots {
        let everyone = Tally::at(lists, position);
        if let Some((player, votes)) = everyone.leader(&placed)
            && votes >= majority
        {
            placed.place(player, Tier::Plurality, votes, None);
            continue;
        }

        if !restricted.is_empty() {
            let subset = Tally::at(restricted.iter().copied(), position);
            if let Some((player, votes)) = subset.leader(&placed)
                && votes >= restricted_majority
            {
                placed.place(player, Tier::RestrictedPlurality, votes, None);
                continue;
            }
        }

        let candidates: Vec<&str> = everyone.unplaced(&placed).map(|(p, _)| p).collect();
        if !candidates.is_empty() {
            let (player, sum) =
                best_by_share(&candidates, &totals).ok_or(ConsensusError::TieBreakExhausted { slot: position + 1 })?;
            let votes = everyone.ranked.iter().find(|(p, _)| *p == player).map(|(_, v)| *v).unwrap_or(0);
            placed.place(player, Tier::ShareSum, votes, Some(sum));
            continue;
        }

        let remaining = remaining_players(lists, &placed);
        if remaining.is_empty() {
            debug!("only {} distinct players across all lists", placed.len());
            break;
        }
        let (player, sum) =
            best_by_share(&remaining, &totals).ok_or(ConsensusError::TieBreakExhausted { slot: position + 1 })?;
        placed.place(player, Tier::Backfill, 0, Some(sum));
    }
    Ok(placed)
}

/// Unplaced players from every list, in list-then-rank order of first sight.
fn remaining_players<'a>(lists: &'a [TopList], placed: &ConsensusList) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::new();
    for list in lists {
        for entry in &list.entries {
            let player = entry.player.as_str();
            if !placed.contains(player) && !out.contains(&player) {
                out.push(player);
            }
        }
    }
    out
}
