#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod studio;

use std::process::ExitCode;
use std::sync::Arc;

use args::{Args, Command, GenerateArgs};
use atelier_config::Config;
use atelier_core::GenerationConfig;
use atelier_studio::{GenerationError, GenerationOrchestrator, GenerationPhase};
use clap::Parser;
use studio::Studio;

/// Exit code after an interrupt, as a shell reports SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let _telemetry_guard = atelier_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::info!(
        config_path = %args.config.display(),
        models = config.models.len(),
        "starting atelier"
    );

    let studio = Studio::build(&config)?;

    let outcome = match &args.command {
        Command::Generate(generate_args) => generate(&studio, generate_args).await,
        Command::Estimate(generate_args) => estimate(&studio, generate_args).await,
        Command::Status => status(&studio).await,
        Command::Models => {
            models(&studio);
            Ok(ExitCode::SUCCESS)
        }
    };

    studio.registry.cleanup();
    tracing::info!("atelier stopped");

    outcome
}

/// Config for the selected model with the command line flags applied
async fn generation_config(studio: &Studio, args: &GenerateArgs) -> anyhow::Result<GenerationConfig> {
    let model = match &args.model {
        Some(model) => model.clone(),
        None => studio
            .registry
            .models()
            .next()
            .map(|m| m.id.clone())
            .ok_or_else(|| anyhow::anyhow!("no models configured"))?,
    };

    let adapter = studio.registry.create_adapter(&model).await?;
    Ok(args.apply(adapter.default_config()))
}

async fn generate(studio: &Studio, args: &GenerateArgs) -> anyhow::Result<ExitCode> {
    let config = generation_config(studio, args).await?;
    let mut progress = studio.orchestrator.subscribe();

    let orchestrator = Arc::clone(&studio.orchestrator);
    let mut run = tokio::spawn(async move { orchestrator.generate(config).await });

    let outcome = loop {
        tokio::select! {
            result = &mut run => break result?,
            _ = tokio::signal::ctrl_c() => match interrupt(&studio.orchestrator) {
                Interrupt::Cancelling => eprintln!("cancelling..."),
                Interrupt::Abandon => {
                    run.abort();
                    eprintln!("generation cancelled");
                    return Ok(ExitCode::from(EXIT_INTERRUPTED));
                }
                Interrupt::Ignore => {}
            },
            Ok(()) = progress.changed() => {
                let status = progress.borrow_and_update().clone();
                if status.phase == GenerationPhase::Processing {
                    let stage = status.stage.map(|s| s.to_string()).unwrap_or_default();
                    eprintln!("[{:>5.1}%] {stage}", status.progress);
                    if let Some(warnings) = status.message {
                        eprintln!("warning: {warnings}");
                    }
                }
            }
        }
    };

    let batch = match outcome {
        Ok(batch) => batch,
        Err(GenerationError::Cancelled) => {
            eprintln!("generation cancelled");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    // persistence that outlived the grace period lands in history
    studio.orchestrator.drain().await;
    let batch = studio.orchestrator.history().get(&batch.id).unwrap_or(batch);

    for result in &batch.results {
        println!("{}", result.image_url);
    }
    match &batch.real_generation_id {
        Some(id) => println!("saved as {id}"),
        None if studio.persists() => eprintln!("warning: generation was not saved"),
        None => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// What Ctrl-C does to a running `generate`
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// The processing attempt was cancelled and will report it
    Cancelling,
    /// Nothing is processing yet, or a cancel already went out: stop now
    Abandon,
    /// Results already arrived
    Ignore,
}

fn interrupt(orchestrator: &GenerationOrchestrator) -> Interrupt {
    if orchestrator.cancel() {
        Interrupt::Cancelling
    } else if orchestrator.status().phase == GenerationPhase::Processing {
        Interrupt::Ignore
    } else {
        Interrupt::Abandon
    }
}

async fn estimate(studio: &Studio, args: &GenerateArgs) -> anyhow::Result<ExitCode> {
    let config = generation_config(studio, args).await?;

    let validation = studio.orchestrator.validate(&config).await?;
    for warning in &validation.warnings {
        eprintln!("warning: {warning}");
    }
    if !validation.is_valid() {
        eprintln!("error: {}", validation.error_message());
        return Ok(ExitCode::FAILURE);
    }

    let cost = studio.orchestrator.estimate_cost(&config).await?;
    println!(
        "{} x {} on {}: ${cost:.4}",
        config.num_outputs, config.aspect_ratio, config.model
    );

    Ok(ExitCode::SUCCESS)
}

async fn status(studio: &Studio) -> anyhow::Result<ExitCode> {
    let ids: Vec<String> = studio.registry.models().map(|m| m.id.clone()).collect();

    let mut failed = false;
    for id in &ids {
        if let Err(e) = studio.registry.create_adapter(id).await {
            println!("{id}: unavailable ({e})");
            failed = true;
        }
    }

    for (model, status) in studio.registry.check_all_status().await {
        let latency = status
            .latency
            .map(|l| format!(" in {}ms", l.as_millis()))
            .unwrap_or_default();
        let state = if status.available { "available" } else { "unavailable" };
        match status.last_error {
            Some(error) => println!("{model}: {state}{latency} ({error})"),
            None => println!("{model}: {state}{latency}"),
        }
        failed |= !status.available;
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn models(studio: &Studio) {
    for model in studio.registry.models() {
        println!(
            "{:<20} {:<12} {} ({})",
            model.id, model.provider, model.display_name, model.upstream_model
        );
    }
}
