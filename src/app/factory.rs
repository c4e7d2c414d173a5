use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    completion::{ChatCompletionClient, CompletionClient},
    config::{Config, VocabularySource},
    query::{QueryInterpreter, StaticTables},
    vocabulary::{CatalogProvider, FileProvider, VocabularyProvider, VocabularyStore},
};

/// Builds the interpreter and its collaborators from configuration
pub struct AppFactory;

impl AppFactory {
    /// Load the vocabulary and assemble the interpreter.
    ///
    /// With `with_fallback` and fallback enabled in config, the completion
    /// client must be constructible (its api key set), otherwise this fails.
    pub async fn create_interpreter(
        config: &Config,
        with_fallback: bool,
    ) -> Result<QueryInterpreter> {
        let provider = Self::create_vocabulary_provider(config)?;
        let store = VocabularyStore::load(provider).await?;

        let interpreter = QueryInterpreter::new(Arc::new(StaticTables::new()), Arc::new(store));

        let interpreter = if with_fallback && config.completion.enabled {
            let client = Self::create_completion_client(config)?;
            log::info!("fallback model={}", client.model_name());
            interpreter.with_fallback(client)
        } else {
            interpreter
        };
        log::info!("parse strategies: {:?}", interpreter.strategy_names());

        Ok(interpreter)
    }

    /// Provider for the configured vocabulary source
    pub fn create_vocabulary_provider(config: &Config) -> Result<Box<dyn VocabularyProvider>> {
        match config.vocabulary.source {
            VocabularySource::File => {
                let path = config.vocabulary_path();
                log::info!("Using vocabulary file: {}", path.display());
                Ok(Box::new(FileProvider::new(path)))
            }
            VocabularySource::Catalog => {
                let vocabulary = &config.vocabulary;
                let token = std::env::var(&vocabulary.token_env).with_context(|| {
                    format!("{} not set for catalog source", vocabulary.token_env)
                })?;
                let database_id = vocabulary
                    .database_id
                    .as_deref()
                    .context("vocabulary.database_id not set for catalog source")?;
                log::info!("Using vocabulary catalog: {}", vocabulary.catalog_url);
                Ok(Box::new(CatalogProvider::new(
                    &vocabulary.catalog_url,
                    database_id,
                    token.trim().to_string(),
                    config.vocabulary_timeout(),
                )?))
            }
        }
    }

    /// Completion client for the fallback parser
    pub fn create_completion_client(config: &Config) -> Result<Arc<dyn CompletionClient>> {
        let completion = &config.completion;
        let client = ChatCompletionClient::from_env(
            &completion.base_url,
            &completion.api_key_env,
            &completion.model,
            completion.temperature,
            config.completion_timeout(),
        )?;
        Ok(Arc::new(client))
    }
}
