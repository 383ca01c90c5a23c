//! Application entry point for the NERO voice assistant.
//!
//! # Startup sequence
//!
//! 1. Parse the command line and load `.env`.
//! 2. Initialise logging (`-v` raises the default level to debug).
//! 3. Read the API keys; a missing key exits with status 1.
//! 4. Load and validate [`AppConfig`].
//! 5. Create the [`tokio`] runtime.
//! 6. Build the collaborators (Whisper model, Deepgram, agent, Cartesia).
//! 7. Ping the agent once; an unreachable agent is logged, not fatal.
//! 8. Spawn the signal watcher and run the [`Orchestrator`] until shutdown.
//! 9. Tear everything down in order and exit.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nero_voice::{
    audio::MicrophoneSource,
    config::{AppConfig, Credentials},
    llm::{ApiAgent, ReasoningService},
    pipeline::{wait_for_signal, Collaborators, Orchestrator, Shutdown},
    stt::{DeepgramTranscriber, RecognizeParams, WhisperRecognizer},
    tts::CartesiaSynthesizer,
};

/// Grace period for blocking tasks (playback, listener joins) at exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Parser)]
#[command(name = "nero", version, about = "Wake-word voice assistant")]
struct Args {
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Settings file to use instead of the platform default.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();

    // 1. Logging
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    if let Ok(path) = dotenv {
        log::debug!("loaded environment from {}", path.display());
    }
    log::info!("NERO voice assistant starting up");

    // 2. Credentials
    let credentials = match Credentials::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(1);
        }
    };

    // 3. Configuration
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = match loaded.and_then(|c| c.validate().map(|()| c)) {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid configuration: {e:#}");
            return ExitCode::from(1);
        }
    };
    if let Some(key) = &credentials.agent_api_key {
        config.agent.api_key = Some(key.clone());
    }

    // 4. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to create tokio runtime: {e}");
            return ExitCode::from(1);
        }
    };

    // 5. Collaborators
    let model_path = config.recognizer_model_path();
    let params = RecognizeParams {
        n_threads: config
            .recognizer
            .threads
            .unwrap_or(RecognizeParams::default().n_threads),
        ..RecognizeParams::default()
    };
    let recognizer = match WhisperRecognizer::load(&model_path, params) {
        Ok(r) => r,
        Err(e) => {
            log::error!("cannot load phrase recognizer from {}: {e}", model_path.display());
            return ExitCode::from(1);
        }
    };
    log::info!("Whisper model loaded: {}", model_path.display());

    let agent = Arc::new(ApiAgent::from_config(
        &config.agent,
        config.synthesis.summary_max_chars,
    ));

    // 6. Agent connectivity check
    match rt.block_on(agent.ping()) {
        Ok(()) => log::info!("agent reachable at {}", config.agent.base_url),
        Err(e) => log::warn!(
            "agent at {} is not answering ({e}); turns will fail until it does",
            config.agent.base_url
        ),
    }

    let collaborators = Collaborators {
        source: Arc::new(MicrophoneSource::new(config.audio.device.clone())),
        recognizer: Arc::new(recognizer),
        transcriber: Arc::new(DeepgramTranscriber::new(
            &config.transcription,
            credentials.deepgram_api_key.clone(),
            &config.locale,
        )),
        agent,
        synthesizer: Arc::new(CartesiaSynthesizer::new(
            &config.synthesis,
            credentials.cartesia_api_key.clone(),
            &config.locale,
        )),
    };

    // 7. Run until SIGINT / SIGTERM or the wake-timeout policy stops us
    let shutdown = Shutdown::new();
    let stats = rt.block_on(async {
        let watcher = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                wait_for_signal().await;
                shutdown.trigger();
            })
        };

        let mut orchestrator = Orchestrator::new(&config, collaborators, shutdown);
        let stats = orchestrator.run().await;

        watcher.abort();
        drop(orchestrator);
        stats
    });

    // 8. Ordered teardown: the orchestrator (and with it every collaborator)
    //    is gone; give blocking tasks a bounded window to finish.
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    log::info!(
        "NERO stopped: {} completed, {} aborted, {} failed",
        stats.completed,
        stats.aborted,
        stats.failed
    );
    ExitCode::SUCCESS
}
