mod catalog;

use clap::Parser;
use optolink_core::dummy::DummyDevice;
use optolink_core::link::SerialLink;
use optolink_core::CoreError;
use tracing_subscriber::EnvFilter;

/// Controller-side bridge to a KW-protocol heating appliance.
#[derive(Debug, Parser)]
struct Cli {
    /// Which transport to talk to: "dummy" for the in-memory test appliance,
    /// or "serial:<path>" for a real Optolink port.
    #[arg(long, default_value = "dummy")]
    transport: String,

    /// Baud rate to open the serial port with, when using a serial transport.
    #[arg(long, default_value_t = optolink_core::link::BAUD_RATE)]
    baud: u32,

    /// Log verbosity, e.g. "info", "debug", "optolink_core=trace,bridge=debug".
    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Debug, thiserror::Error)]
enum BridgeError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to open transport: {0}")]
    Link(#[from] optolink_core::LinkError),
    #[error("unrecognized transport \"{0}\", expected \"dummy\" or \"serial:<path>\"")]
    UnknownTransport(String),
}

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let device = catalog::demo_device();
    tracing::info!(device = %device.name, "starting bridge");

    let cache = match cli.transport.as_str() {
        "dummy" => {
            tracing::info!("using in-memory dummy transport");
            device.start_communication(DummyDevice::new())
        }
        other => {
            let Some(path) = other.strip_prefix("serial:") else {
                return Err(BridgeError::UnknownTransport(other.to_string()));
            };
            tracing::info!(path, baud = cli.baud, "opening serial transport");
            let link = SerialLink::open(path, cli.baud)?;
            device.start_communication(link)
        }
    };

    for parameter in cache.supported() {
        tracing::debug!(id = %parameter.id, name = %parameter.name, "registered parameter");
    }

    let reading = cache.read_param("outside_temp", false, None).await?;
    println!(
        "outside_temp = {}",
        reading.parameter.unit.display_string(&reading.value)
    );

    let status = cache.read_param("operating_status", false, None).await?;
    println!(
        "operating_status = {}",
        status.parameter.unit.display_string(&status.value)
    );

    Ok(())
}
