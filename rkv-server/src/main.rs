use rkv_common::Config;
use rkv_server::Reactor;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let mut reactor = Reactor::bind(&config)?;
    reactor.run()?;
    Ok(())
}
