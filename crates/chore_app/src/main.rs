use chore_app::app::{run, AppConfig, Command};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let result = AppConfig::from_env().and_then(|config| {
        let command = Command::parse(std::env::args().skip(1))?;
        run(&config, command, &mut std::io::stdout().lock())
    });
    if let Err(err) = result {
        eprintln!("chore: {err:#}");
        std::process::exit(1);
    }
}
