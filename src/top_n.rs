use crate::ranker::ModelRanking;
use crate::record::round_dp;

pub const TOP_N: usize = 10;
pub const SHARE_DECIMALS: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TopEntry {
    pub rank: usize,
    pub player: String,
    pub share: f64,
}

/// A model's own top candidates, ranks dense from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TopList {
    pub model: String,
    pub entries: Vec<TopEntry>,
}

impl TopList {
    pub fn new<S: Into<String>>(model: impl Into<String>, entries: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self {
            model: model.into(),
            entries: entries
                .into_iter()
                .enumerate()
                .map(|(idx, (player, share))| TopEntry {
                    rank: idx + 1,
                    player: player.into(),
                    share,
                })
                .collect(),
        }
    }

    pub fn at(&self, position: usize) -> Option<&TopEntry> {
        self.entries.get(position)
    }

    pub fn share_of(&self, player: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.player == player).map(|e| e.share)
    }

    pub fn rank_label(&self) -> String {
        rank_label(&self.model)
    }

    pub fn share_label(&self) -> String {
        share_label(&self.model)
    }
}

pub fn rank_label(model: &str) -> String {
    format!("RANK {model}")
}

pub fn share_label(model: &str) -> String {
    format!("SHARE {model}")
}

pub fn extract_top_n(ranking: &ModelRanking, n: usize) -> TopList {
    TopList {
        model: ranking.model.clone(),
        entries: ranking
            .ranked
            .iter()
            .take(n)
            .enumerate()
            .map(|(idx, r)| TopEntry {
                rank: idx + 1,
                player: r.player.clone(),
                share: round_dp(r.score, SHARE_DECIMALS),
            })
            .collect(),
    }
}

pub fn extract_all(rankings: &[ModelRanking], n: usize) -> Vec<TopList> {
    rankings.iter().map(|r| extract_top_n(r, n)).collect()
}

/// Side-by-side view of the top lists: row `i` holds each model's rank-`i`
/// player and share. Rows are positions, not a shared player key.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRankTable {
    pub models: Vec<String>,
    pub rows: Vec<Vec<Option<(String, f64)>>>,
}

impl WideRankTable {
    pub fn from_top_lists(lists: &[TopList]) -> Self {
        let depth = lists.iter().map(|l| l.entries.len()).max().unwrap_or(0);
        let rows = (0..depth)
            .map(|pos| {
                lists
                    .iter()
                    .map(|l| l.at(pos).map(|e| (e.player.clone(), e.share)))
                    .collect()
            })
            .collect();
        Self {
            models: lists.iter().map(|l| l.model.clone()).collect(),
            rows,
        }
    }

    pub fn header(&self) -> Vec<String> {
        self.models
            .iter()
            .flat_map(|m| [rank_label(m), share_label(m)])
            .collect()
    }

    /// Header plus one string row per position; `final_column` is appended
    /// when given (the consensus pick for each position).
    pub fn to_rows(&self, final_column: Option<&[String]>) -> Vec<Vec<String>> {
        let mut header = self.header();
        if final_column.is_some() {
            header.push(rank_label("FINAL"));
        }
        let mut out = vec![header];
        let depth = self
            .rows
            .len()
            .max(final_column.map(<[String]>::len).unwrap_or(0));
        for pos in 0..depth {
            let mut row = Vec::with_capacity(self.models.len() * 2 + 1);
            match self.rows.get(pos) {
                Some(cells) => {
                    for cell in cells {
                        match cell {
                            Some((player, share)) => {
                                row.push(player.clone());
                                row.push(format!("{share:.3}"));
                            }
                            None => {
                                row.push(String::new());
                                row.push(String::new());
                            }
                        }
                    }
                }
                None => row.extend(std::iter::repeat_n(String::new(), self.models.len() * 2)),
            }
            if let Some(finals) = final_column {
                row.push(finals.get(pos).cloned().unwrap_or_default());
            }
            out.push(row);
        }
        out
    }
}
