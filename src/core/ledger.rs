use crate::core::directory::EMAIL;
use crate::domain::model::{MatchMap, Round, RoundLabel};
use crate::domain::sheet::Sheet;
use crate::utils::error::{Result, RouletteError};

pub const DEFAULT_MATCH_PREFIX: &str = "match_";

/// Every computed round, in the order it was first recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    prefix: String,
    rounds: Vec<Round>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_PREFIX)
    }
}

impl Ledger {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            rounds: Vec::new(),
        }
    }

    /// Reads every `<prefix><label>` column of the sheet as a round.
    pub fn from_sheet(sheet: &Sheet, prefix: &str) -> Result<Self> {
        let email_column = sheet.column_index(EMAIL).ok_or_else(|| {
            RouletteError::validation(None, EMAIL, "sheet is missing required column 'email'")
        })?;

        let mut ledger = Self::new(prefix);
        for (column, header) in sheet.headers().iter().enumerate() {
            let Some(label) = header.trim().strip_prefix(prefix) else {
                continue;
            };
            let label = RoundLabel::new(label)
                .map_err(|reason| RouletteError::validation(Some(1), header, reason))?;

            let mut matches = MatchMap::new();
            for row in 0..sheet.row_count() {
                let email = sheet.cell(row, email_column);
                let partner = sheet.cell(row, column);
                if email.is_empty() || partner.is_empty() {
                    continue;
                }
                matches.insert(email.to_string(), partner.to_string());
            }

            let asymmetric = matches
                .iter()
                .filter(|(email, partner)| matches.get(*partner) != Some(*email))
                .count();
            if asymmetric > 0 {
                tracing::warn!(
                    "Round {} has {} one-sided match entries; check the '{}' column",
                    label,
                    asymmetric,
                    header
                );
            }

            ledger.write(label, matches);
        }

        tracing::debug!("Ledger holds {} rounds", ledger.rounds.len());
        Ok(ledger)
    }

    pub fn column_name(&self, label: &RoundLabel) -> String {
        format!("{}{}", self.prefix, label)
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn position(&self, label: &RoundLabel) -> Option<usize> {
        self.rounds.iter().position(|r| &r.label == label)
    }

    /// Sequence index the round has, or would get when first written.
    pub fn index_for(&self, label: &RoundLabel) -> usize {
        self.position(label).unwrap_or(self.rounds.len())
    }

    /// Rounds recorded before `current` (every round when `current` is new),
    /// oldest first. With `lookback` only the most recent ones are kept.
    pub fn history(&self, current: &RoundLabel, lookback: Option<usize>) -> Vec<&Round> {
        let end = self.index_for(current);
        let rounds: Vec<&Round> = self.rounds[..end].iter().collect();
        match lookback {
            Some(limit) if rounds.len() > limit => rounds[rounds.len() - limit..].to_vec(),
            _ => rounds,
        }
    }

    /// Replaces the round's mapping wholesale, or appends the round.
    pub fn write(&mut self, label: RoundLabel, matches: MatchMap) {
        match self.rounds.iter_mut().find(|r| r.label == label) {
            Some(round) => round.matches = matches,
            None => self.rounds.push(Round { label, matches }),
        }
    }

    pub fn read(&self, label: &RoundLabel) -> Result<&MatchMap> {
        self.rounds
            .iter()
            .find(|r| &r.label == label)
            .map(|r| &r.matches)
            .ok_or_else(|| RouletteError::NotFoundError {
                round: label.to_string(),
            })
    }

    /// Writes every round into its column. Rows without a match get an empty
    /// cell; new rounds get a new column at the end.
    pub fn apply_to_sheet(&self, sheet: &mut Sheet) -> Result<()> {
        let email_column = sheet.column_index(EMAIL).ok_or_else(|| {
            RouletteError::validation(None, EMAIL, "sheet is missing required column 'email'")
        })?;

        for round in &self.rounds {
            let column = sheet.ensure_column(&self.column_name(&round.label));
            for row in 0..sheet.row_count() {
                let partner = round
                    .matches
                    .get(sheet.cell(row, email_column))
                    .cloned()
                    .unwrap_or_default();
                sheet.set_cell(row, column, &partner);
            }
        }
        Ok(())
    }
}
