mod bootstrap;

use std::time::Duration;

use anyhow::{Context, Result};
use bci_core::settings::Settings;
use bci_data::edf::load_recording;
use bci_data::model::{Classifier, CspLdaModel};
use bci_data::preprocess::{preprocess, FilterConfig};
use bci_data::recording::Recording;
use bci_data::summary::log_recording_summary;
use bci_runtime::{Actuator, LogActuator, PlaybackLoop, TokioClock, XdotoolActuator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("BCI control v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&settings).await {
        tracing::error!("{:#}", e);
    }

    Ok(())
}

async fn run(settings: &Settings) -> Result<()> {
    if settings.inspect {
        return inspect(settings);
    }

    settings.validate_band()?;
    let recording = open_recording(settings)?;

    let model_path = settings.model_path()?;
    tracing::info!("Loading model from {}", model_path.display());
    let model = CspLdaModel::load(model_path)?;

    let filter = FilterConfig {
        l_freq: settings.l_freq,
        h_freq: settings.h_freq,
        order: settings.filter_order as usize,
    };
    let recording = preprocess(recording, model.meta(), &filter).context("preprocessing failed")?;
    let annotations = recording.annotations().to_vec();

    let actuator: Box<dyn Actuator> = match settings.actuator.as_str() {
        "log" => Box::new(LogActuator),
        _ => Box::new(XdotoolActuator::new()),
    };
    let mut playback = PlaybackLoop::new(&recording, &model, actuator, TokioClock::new())?;

    tracing::info!(
        "Ready: {} annotations, {} actuator. Focus the target window.",
        annotations.len(),
        settings.actuator
    );

    let interrupted = tokio::select! {
        _ = async {
            countdown(settings.start_delay).await;
            playback.run(&annotations).await;
        } => false,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; stopping playback");
            true
        }
    };
    if interrupted {
        playback.release_keys();
    }

    let report = playback.into_report();
    match report.accuracy() {
        Some(accuracy) => tracing::info!(
            "Accuracy on left/right trials: {:.1}% ({} trials, {} failed, {} skipped)",
            accuracy * 100.0,
            report.trials.len(),
            report.failures(),
            report.skipped
        ),
        None => tracing::info!("No left/right trials were played"),
    }

    if let Some(path) = &settings.report {
        report
            .save_to(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}

/// `--inspect`: summarise the recording without touching the model.
fn inspect(settings: &Settings) -> Result<()> {
    let recording = open_recording(settings)?;
    log_recording_summary(&recording);
    Ok(())
}

fn open_recording(settings: &Settings) -> Result<Recording> {
    let path = settings.recording_path()?;
    tracing::info!("Loading recording from {}", path.display());
    Ok(load_recording(path)?)
}

async fn countdown(seconds: u64) {
    for remaining in (1..=seconds).rev() {
        tracing::info!("Starting in {}...", remaining);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
