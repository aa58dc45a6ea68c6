use clap::Parser;
use tracing::info;

mod app;

/// Relay chat between IRC channels and Discord channels.
#[derive(Debug, Parser)]
#[command(name = "ircord", version, about)]
struct Cli {
    /// Config file (falls back to IRCORD_CONFIG, then ./ircord.toml).
    #[arg(short, long)]
    config: Option<String>,

    /// Validate the configuration and localization tables, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ircord=info,ircord_relay=info,ircord_irc=info,ircord_discord=info,serenity=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ircord_core::IrcordConfig::load(cli.config.as_deref())?;

    if cli.check {
        let locale = app::load_locale(&config)?;
        info!(
            server = %config.irc.server,
            links = config.channels.len(),
            languages = ?locale.languages(),
            "configuration is valid"
        );
        return Ok(());
    }

    info!(
        server = %config.irc.server,
        links = config.channels.len(),
        "starting ircord"
    );
    app::run(config).await
}
