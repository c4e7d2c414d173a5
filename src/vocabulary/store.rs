use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::EngineError;

use super::{ReferenceVocabulary, VocabularyProvider};

/// Holds the current vocabulary snapshot and the provider it came from.
///
/// Readers clone the `Arc` and keep it for the whole parse; a refresh builds
/// the new vocabulary off to the side and swaps the pointer in one step.
pub struct VocabularyStore {
    current: RwLock<Arc<ReferenceVocabulary>>,
    provider: Box<dyn VocabularyProvider>,
}

impl VocabularyStore {
    /// Initial load. Without a vocabulary nothing can be parsed, so a
    /// failure here is fatal to the caller.
    pub async fn load(provider: Box<dyn VocabularyProvider>) -> Result<Self, EngineError> {
        let vocabulary = provider.fetch().await.map_err(|err| {
            log::error!("provider={} outcome=error err={err:#}", provider.name());
            EngineError::VocabularyUnavailable(err)
        })?;
        log::info!("provider={} outcome=loaded", provider.name());
        if vocabulary.is_empty() {
            log::warn!("provider={} returned an empty vocabulary", provider.name());
        }

        Ok(Self {
            current: RwLock::new(Arc::new(vocabulary)),
            provider,
        })
    }

    /// Store over a fixed vocabulary; refresh re-installs the same data.
    #[cfg(test)]
    pub fn fixed(vocabulary: ReferenceVocabulary) -> Self {
        Self {
            current: RwLock::new(Arc::new(vocabulary.clone())),
            provider: Box::new(super::StaticProvider(vocabulary)),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceVocabulary> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-fetch from the provider. On failure the previous snapshot stays.
    pub async fn refresh(&self) -> Result<Arc<ReferenceVocabulary>, EngineError> {
        match self.provider.fetch().await {
            Ok(vocabulary) => {
                let vocabulary = Arc::new(vocabulary);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = vocabulary.clone();
                log::info!("provider={} outcome=refreshed", self.provider.name());
                Ok(vocabulary)
            }
            Err(err) => {
                log::error!(
                    "provider={} outcome=error err={err:#}; keeping previous vocabulary",
                    self.provider.name()
                );
                Err(EngineError::VocabularyUnavailable(err))
            }
        }
    }
}
