//! Cycle scheduling: the unattended polling loop and single-shot runs.
//!
//! One cycle runs at a time; the next is scheduled only after the
//! previous one finished, so a slow cycle delays its successor instead
//! of overlapping it. Cycle failures are reported and logged, never
//! fatal; the registry and transport survive into the next cycle.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use ce102m::{is_full_cycle, MeterSession, ParameterRegistry, ReadMode, SessionConfig};

use crate::cli::Args;
use crate::input::{NoInput, StdinInput};
use crate::serial::SerialTransport;
use crate::sink::{ConsoleSink, MqttSink};

/// Unattended daemon polling: full set every 5th cycle, limited set in
/// between, repeated until ctrl-c.
pub async fn run_daemon(args: &Args) -> anyhow::Result<()> {
    let mut registry = ParameterRegistry::ce102m();
    let mut transport = SerialTransport::open(&args.address)?;
    let mut sink = MqttSink::connect(&args.mqtt_host, args.mqtt_port, &args.device).await?;
    let mut input = NoInput;

    let interval = Duration::from_secs(args.interval);
    let mut counter: u64 = 0;

    info!(
        address = %args.address,
        interval_s = args.interval,
        "starting CE102M polling daemon"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                return Ok(());
            }
            _ = sleep(interval) => {}
        }

        let full = is_full_cycle(counter);
        counter += 1;
        debug!(cycle = counter, full, "polling cycle");

        let config = SessionConfig {
            mode: ReadMode::Full,
            short_cycle: !full,
            silent: false,
            max_restarts: args.max_restarts,
        };
        let mut session = MeterSession::new(config, &mut transport, &mut sink, &mut input)?;
        match session.run(&mut registry).await {
            Ok(outcome) => debug!(?outcome, "cycle complete"),
            // Scoped to this cycle; the next one starts clean.
            Err(e) => warn!(error = %e, "polling cycle failed"),
        }
    }
}

/// One synchronous cycle for the `-r`/`-f`/`-p` invocations, printing
/// to the console.
pub async fn run_once(args: &Args) -> anyhow::Result<()> {
    let mut registry = ParameterRegistry::ce102m();
    let mut transport = SerialTransport::open(&args.address)?;
    let mut sink = ConsoleSink;
    let mut input = StdinInput::new();

    let config = SessionConfig {
        mode: args.mode(),
        short_cycle: false,
        silent: args.silent && args.programming,
        max_restarts: args.max_restarts,
    };
    let mut session = MeterSession::new(config, &mut transport, &mut sink, &mut input)?;
    let outcome = session.run(&mut registry).await?;
    info!(?outcome, "session complete");
    Ok(())
}
