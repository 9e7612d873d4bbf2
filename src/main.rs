use clap::Parser;
use lunch_roulette::adapters::channel::DryRunChannel;
use lunch_roulette::config::Command;
use lunch_roulette::core::dispatcher::DispatchReport;
use lunch_roulette::domain::ports::NotificationChannel;
use lunch_roulette::utils::error::{ErrorSeverity, RouletteError};
use lunch_roulette::utils::{logger, validation::Validate};
use lunch_roulette::{
    CliConfig, LocalStorage, RouletteConfig, RouletteEngine, RoundLabel, Template,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting lunch-roulette");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = run(&config).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(config: &CliConfig) -> lunch_roulette::Result<()> {
    config.validate()?;
    let file_config = config.file_config()?;
    file_config.validate()?;

    let settings = config.engine_settings(&file_config);
    let engine = RouletteEngine::new(LocalStorage::new(String::new()), settings);
    tracing::debug!("Engine settings: {:?}", engine.settings());
    if config.is_dry_run() {
        tracing::info!("👀 Dry run: the sheet is not written and nothing is sent");
    }

    match &config.command {
        Command::Compute { round, preview } => {
            let round = parse_round(round)?;
            let outcome = engine.compute_round(&round, *preview).await?;

            println!(
                "✅ Round {}: {} eligible, {} pairs",
                outcome.round,
                outcome.eligible,
                outcome.pairing.pairs.len()
            );
            for (a, b) in &outcome.pairing.pairs {
                println!("   {} + {}", a, b);
            }
            if let Some(left) = &outcome.pairing.unmatched {
                println!("   {} sits this round out", left);
            }
            match &outcome.saved_to {
                Some(path) => println!("📁 Saved to: {}", path),
                None => println!("👀 Preview only, nothing was written"),
            }
        }
        Command::Send {
            round,
            template,
            dry_run,
        } => {
            let round = parse_round(round)?;
            let template = load_template(
                template.as_deref(),
                file_config.templates.round.as_deref(),
                "templates.round",
            )?;
            let channel = channel_for(&file_config, *dry_run)?;
            let report = engine
                .send_round(&round, &template, channel.as_ref(), *dry_run)
                .await?;
            print_report(&report)?;
        }
        Command::Announce {
            round,
            template,
            dry_run,
        } => {
            let round = round.as_deref().map(parse_round).transpose()?;
            let template = load_template(
                template.as_deref(),
                file_config.templates.announcement.as_deref(),
                "templates.announcement",
            )?;
            let channel = channel_for(&file_config, *dry_run)?;
            let report = engine
                .announce(&template, channel.as_ref(), *dry_run, round.as_ref())
                .await?;
            print_report(&report)?;
        }
    }

    Ok(())
}

fn parse_round(label: &str) -> lunch_roulette::Result<RoundLabel> {
    RoundLabel::new(label).map_err(|reason| RouletteError::InvalidConfigValueError {
        field: "round".to_string(),
        value: label.to_string(),
        reason,
    })
}

fn load_template(
    flag: Option<&str>,
    configured: Option<&str>,
    field: &str,
) -> lunch_roulette::Result<Template> {
    let path = flag
        .or(configured)
        .ok_or_else(|| RouletteError::MissingConfigError {
            field: field.to_string(),
        })?;
    tracing::debug!("Using template {}", path);
    Template::from_file(path)
}

fn channel_for(
    file_config: &RouletteConfig,
    dry_run: bool,
) -> lunch_roulette::Result<Box<dyn NotificationChannel>> {
    if dry_run {
        return Ok(Box::new(DryRunChannel::new()));
    }
    file_config.build_channel()
}

fn print_report(report: &DispatchReport) -> lunch_roulette::Result<()> {
    if report.dry_run {
        println!("👀 Rendered {} messages; nothing was sent", report.rendered);
        return Ok(());
    }

    println!("✅ Sent {} of {} messages", report.sent.len(), report.rendered);
    if report.is_success() {
        return Ok(());
    }

    for (to, reason) in &report.failed {
        eprintln!("   ❌ {}: {}", to, reason);
    }
    let (recipient, message) = report.failed[0].clone();
    Err(RouletteError::ChannelError {
        recipient: format!("{} of {} recipients, first {}", report.failed.len(), report.rendered, recipient),
        message,
    })
}
