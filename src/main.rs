//! Application entry point for voice-shifter.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the cpal backend and resolve the stream parameters.
//! 5. Build the [`AudioPipeline`] and select the configured profile.
//! 6. Spawn the event printer on the runtime.
//! 7. Read commands from stdin until `quit`, EOF or Ctrl-C.
//! 8. Stop the pipeline, releasing both devices.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use voice_shifter::{
    audio::{list_input_devices, list_output_devices, CpalBackend},
    config::AppConfig,
    control::{CommandError, ControlCommand, HELP},
    pipeline::{event_channel, AudioPipeline, EventReceiver, PipelineError},
    profile::ProfileRegistry,
};

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

/// Print every pipeline notification as a status line.
async fn print_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        println!("{event}");
    }
}

// ---------------------------------------------------------------------------
// Command loop
// ---------------------------------------------------------------------------

/// Read and execute commands until `quit`, end of input or Ctrl-C.
async fn command_loop(pipeline: Arc<AudioPipeline>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };

        let command = match ControlCommand::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            ControlCommand::Quit => break,

            // start/stop block on device open and worker join.
            ControlCommand::Start | ControlCommand::Stop | ControlCommand::Toggle => {
                let p = Arc::clone(&pipeline);
                let result = tokio::task::spawn_blocking(move || match command {
                    ControlCommand::Start => p.start(),
                    ControlCommand::Stop => p.stop(),
                    _ => p.toggle().map(|_| ()),
                })
                .await?;
                report(result);
            }

            ControlCommand::Profile(id) => {
                if let Err(e) = pipeline.set_profile(&id) {
                    let known: Vec<&str> = pipeline.registry().ids().collect();
                    eprintln!("{e} (available: {})", known.join(", "));
                }
            }

            ControlCommand::List => print_profiles(&pipeline),
            ControlCommand::Status => print_status(&pipeline),

            ControlCommand::Devices => {
                let listing =
                    tokio::task::spawn_blocking(|| (list_input_devices(), list_output_devices()))
                        .await?;
                print_devices("input", listing.0);
                print_devices("output", listing.1);
            }

            ControlCommand::Help => println!("{HELP}"),
        }
    }

    Ok(())
}

/// Surface errors the event printer does not already show.
fn report(result: Result<(), PipelineError>) {
    match result {
        Ok(()) => {}
        Err(PipelineError::DeviceUnavailable { .. } | PipelineError::Spawn(_)) => {}
        Err(e) => eprintln!("{e}"),
    }
}

fn print_profiles(pipeline: &AudioPipeline) {
    let active = pipeline.active_profile();
    for profile in pipeline.registry().list() {
        let marker = if profile.id == active.id { '*' } else { ' ' };
        println!(
            "{marker} {:<8} {:<10} gain {:.1}  time scale {:.1}",
            profile.id, profile.display_name, profile.gain, profile.time_scale
        );
    }
}

fn print_status(pipeline: &AudioPipeline) {
    let spec = pipeline.stream_spec();
    let stats = pipeline.stats();
    println!("state:    {}", pipeline.state());
    println!("profile:  {}", pipeline.active_profile().display_name);
    println!(
        "stream:   {} Hz, {} byte buffers (~{:.0} ms)",
        spec.sample_rate,
        spec.buffer_size,
        spec.buffer_millis()
    );
    println!(
        "counters: {} cycles, {} skipped reads, {} malformed buffers, {} discarded samples",
        stats.cycles, stats.skipped_reads, stats.malformed_buffers, stats.discarded_samples
    );
}

fn print_devices(direction: &str, devices: Result<Vec<String>, voice_shifter::audio::DeviceError>) {
    match devices {
        Ok(names) if names.is_empty() => println!("{direction}: (none)"),
        Ok(names) => {
            println!("{direction}:");
            for name in names {
                println!("  {name}");
            }
        }
        Err(e) => eprintln!("{direction}: {e}"),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-shifter starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (stdin reader + event printer)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Devices
    let backend = Arc::new(CpalBackend::from_config(&config.audio));
    let spec = config.audio.stream_spec(backend.as_ref());
    log::info!(
        "stream: {} Hz mono 16-bit, {} byte buffers",
        spec.sample_rate,
        spec.buffer_size
    );

    // 5. Pipeline
    let (events_tx, events_rx) = event_channel();
    let pipeline = Arc::new(
        AudioPipeline::new(backend, Arc::new(ProfileRegistry::builtin()), spec)
            .with_events(events_tx),
    );
    if let Err(e) = pipeline.set_profile(&config.profile.default_profile) {
        log::warn!("{e}; keeping {}", pipeline.active_profile().id);
    }

    // 6. Event printer
    rt.spawn(print_events(events_rx));

    // 7. Commands
    let result = rt.block_on(command_loop(Arc::clone(&pipeline)));

    // 8. Shutdown
    if let Err(e) = pipeline.stop() {
        log::warn!("stop on exit failed: {e}");
    }
    log::info!("voice-shifter exiting");

    // A pending stdin read would otherwise hold the runtime open.
    rt.shutdown_background();
    result
}
