//! Command-line surface of the polling service.

use clap::Parser;

use ce102m::ReadMode;

/// Energomera CE102M polling service.
///
/// Without a mode flag the service runs as an unattended daemon,
/// polling the meter on an interval and publishing to MQTT. With one of
/// `-r`/`-f`/`-p` it runs a single cycle and prints to the console.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Read a limited set of parameters and exit
    #[arg(short = 'r', long)]
    pub read: bool,

    /// Read the full set of parameters and exit
    #[arg(short = 'f', long)]
    pub full: bool,

    /// Programming mode (overrides -r)
    #[arg(short = 'p', long)]
    pub programming: bool,

    /// Silent mode, for -p only: operator prompts are suppressed
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Serial port address
    #[arg(short = 'a', long, default_value = "/dev/ttyRS485-2")]
    pub address: String,

    /// Meter polling interval, seconds (daemon mode)
    #[arg(short = 't', long, default_value_t = 5)]
    pub interval: u64,

    /// Handshake restarts allowed before a cycle is abandoned
    #[arg(long, default_value_t = 3)]
    pub max_restarts: u32,

    /// MQTT broker host (daemon mode)
    #[arg(long, default_value = "localhost", env = "METERSRV_MQTT_HOST")]
    pub mqtt_host: String,

    /// MQTT broker port (daemon mode)
    #[arg(long, default_value_t = 1883, env = "METERSRV_MQTT_PORT")]
    pub mqtt_port: u16,

    /// Device id used in the MQTT topic tree
    #[arg(long, default_value = "energomera-ce102m")]
    pub device: String,
}

impl Args {
    /// No explicit mode flag means unattended daemon polling.
    pub fn is_daemon(&self) -> bool {
        !(self.full || self.read || self.programming)
    }

    /// Negotiated session mode for single-shot invocations.
    pub fn mode(&self) -> ReadMode {
        if self.programming {
            ReadMode::Program
        } else if self.read {
            ReadMode::Limited
        } else {
            ReadMode::Full
        }
    }
}
