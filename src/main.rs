use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod completion;
mod config;
mod errors;
mod query;
#[cfg(test)]
mod tests;
mod vocabulary;
mod web;

use app::AppFactory;
use config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let config = Config::load()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args.command, config))
}

async fn run(command: cli::Command, config: Config) -> anyhow::Result<()> {
    match command {
        cli::Command::Parse { query, no_fallback } => {
            let interpreter = AppFactory::create_interpreter(&config, !no_fallback).await?;
            let parsed = interpreter.parse(&query.join(" ")).await;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }

        cli::Command::Vocab { partner_id } => {
            let provider = AppFactory::create_vocabulary_provider(&config)?;
            let store = vocabulary::VocabularyStore::load(provider).await?;
            let vocab = store.snapshot();

            println!("Market codes:\n{:?}\n", vocab.market_codes());
            println!("Channels:\n{:?}\n", vocab.channels());
            println!("Partner names:\n{:?}\n", vocab.partner_names());
            println!("Funnels:\n{:?}\n", vocab.funnels());
            println!("Partner ids:\n{:?}", vocab.partner_id_to_name());

            if let Some(partner_id) = partner_id {
                match vocab.partner_name_by_id(&partner_id) {
                    Some(name) => println!("\nPartner {partner_id:?}: {name}"),
                    None => println!("\nNo partner with id {partner_id:?}"),
                }
            }
            Ok(())
        }

        cli::Command::Serve { listen } => {
            let interpreter = Arc::new(AppFactory::create_interpreter(&config, true).await?);
            let listen = listen.unwrap_or_else(|| config.server.listen.clone());
            let refresh_interval = (config.vocabulary.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(config.vocabulary.refresh_interval_secs));

            web::start_app(interpreter, &listen, refresh_interval).await
        }
    }
}
