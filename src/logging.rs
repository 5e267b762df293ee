use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate when
/// `verbose`. Output goes to stderr so stdout stays JSON.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose { "info,chartlevels=debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(verbose))
        .try_init()?;
    Ok(())
}
