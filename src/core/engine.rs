use crate::adapters::sheet_codec::SheetStore;
use crate::core::directory::Directory;
use crate::core::dispatcher::{ChannelFailurePolicy, DispatchReport, Dispatcher};
use crate::core::ledger::{Ledger, DEFAULT_MATCH_PREFIX};
use crate::core::pairing::PairingEngine;
use crate::core::sampler::{Sampler, SamplingPolicy};
use crate::core::template::Template;
use crate::domain::model::{Pairing, RoundLabel};
use crate::domain::ports::{NotificationChannel, Storage};
use crate::domain::sheet::Sheet;
use crate::utils::error::{Result, RouletteError};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sheet_path: String,
    /// Where a computed round is saved; the input sheet when `None`.
    pub output_path: Option<String>,
    pub seed: u64,
    pub match_column_prefix: String,
    pub sampling: SamplingPolicy,
    /// Rounds of history considered by the pairing; all when `None`.
    pub lookback: Option<usize>,
    pub on_channel_failure: ChannelFailurePolicy,
}

impl EngineSettings {
    pub fn new(sheet_path: &str) -> Self {
        Self {
            sheet_path: sheet_path.to_string(),
            output_path: None,
            seed: 0,
            match_column_prefix: DEFAULT_MATCH_PREFIX.to_string(),
            sampling: SamplingPolicy::default(),
            lookback: None,
            on_channel_failure: ChannelFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: RoundLabel,
    pub eligible: usize,
    pub pairing: Pairing,
    pub replaced_existing: bool,
    /// Path the sheet was saved to; `None` for a preview.
    pub saved_to: Option<String>,
}

pub struct RouletteEngine<S: Storage> {
    store: SheetStore<S>,
    settings: EngineSettings,
}

impl<S: Storage> RouletteEngine<S> {
    pub fn new(storage: S, settings: EngineSettings) -> Self {
        Self {
            store: SheetStore::new(storage),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    async fn load(&self) -> Result<(Sheet, Directory, Ledger)> {
        let sheet = self.store.load(&self.settings.sheet_path).await?;
        let directory = Directory::from_sheet(&sheet)?;
        let ledger = Ledger::from_sheet(&sheet, &self.settings.match_column_prefix)?;
        Ok((sheet, directory, ledger))
    }

    /// Samples, pairs and records `round`. Nothing is written when
    /// `preview` is set.
    pub async fn compute_round(&self, round: &RoundLabel, preview: bool) -> Result<RoundOutcome> {
        let (mut sheet, directory, mut ledger) = self.load().await?;
        if directory.is_empty() {
            tracing::warn!(
                "{} lists no participants; round {} will be empty",
                self.settings.sheet_path,
                round
            );
        }
        tracing::info!(
            "📋 Loaded {} participants and {} previous rounds",
            directory.len(),
            ledger.rounds().len()
        );

        let replaced_existing = ledger.position(round).is_some();
        if replaced_existing {
            tracing::warn!("Round {} already exists and will be recomputed", round);
        }

        let index = ledger.index_for(round) as u64;
        let sampler = Sampler::new(self.settings.seed, self.settings.sampling);
        let eligible = sampler.eligible(directory.participants(), round, Some(index));

        let history = ledger.history(round, self.settings.lookback);
        let pairing = PairingEngine::new(self.settings.seed).pair(&eligible, &history, round);
        let matches = pairing
            .to_match_map()
            .map_err(|reason| RouletteError::validation(None, "pairing", reason))?;

        for (a, b) in &pairing.pairs {
            tracing::info!("🤝 {} + {}", a, b);
        }
        if let Some(left) = &pairing.unmatched {
            tracing::info!("{} sits out round {} (odd number of participants)", left, round);
        }

        let mut outcome = RoundOutcome {
            round: round.clone(),
            eligible: eligible.len(),
            pairing,
            replaced_existing,
            saved_to: None,
        };
        if preview {
            tracing::info!("Preview only; sheet left untouched");
            return Ok(outcome);
        }

        ledger.write(round.clone(), matches);
        ledger.apply_to_sheet(&mut sheet)?;

        let target = self
            .settings
            .output_path
            .clone()
            .unwrap_or_else(|| self.settings.sheet_path.clone());
        self.store.save(&target, &sheet).await?;
        tracing::info!("💾 Saved round {} to {}", round, target);

        outcome.saved_to = Some(target);
        Ok(outcome)
    }

    /// Notifies both sides of every pair of an already computed round.
    pub async fn send_round(
        &self,
        round: &RoundLabel,
        template: &Template,
        channel: &dyn NotificationChannel,
        dry_run: bool,
    ) -> Result<DispatchReport> {
        let (_, directory, ledger) = self.load().await?;
        let matches = ledger.read(round)?;
        tracing::info!("📨 Round {} has {} matched participants", round, matches.len());

        Dispatcher::new(channel, self.settings.on_channel_failure, dry_run)
            .send_round(template, round, matches, &directory)
            .await
    }

    /// Sends the template to the whole directory.
    pub async fn announce(
        &self,
        template: &Template,
        channel: &dyn NotificationChannel,
        dry_run: bool,
        round: Option<&RoundLabel>,
    ) -> Result<DispatchReport> {
        let (_, directory, _) = self.load().await?;
        tracing::info!("📢 Announcing to {} participants", directory.len());

        Dispatcher::new(channel, self.settings.on_channel_failure, dry_run)
            .announce(template, &directory, round)
            .await
    }
}
