//! ResidencyDetector - Decides where each entity type of a company lives
//!
//! Resolution order:
//! 1. Platform residency config (only with a Platform client)
//! 2. Explicit setting on the installation record
//! 3. Local presence: local records mean `app`; none on a linked installation means `platform`
//! 4. Configured default, never `platform` without a client

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use platform::PlatformClient;
use serde::{Deserialize, Serialize};
use shared::{meta, CompanyId, EntityType, Logger, ResidencyConfig, ResidencyMode, Result, MAX_RESIDENCY_TTL_SECS};
use vms_domain::LocalStore;

/// Which rule produced a residency decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencySource {
    Platform,
    Installation,
    LocalData,
    Default,
}

impl ResidencySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResidencySource::Platform => "platform",
            ResidencySource::Installation => "installation",
            ResidencySource::LocalData => "local_data",
            ResidencySource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Residency {
    pub mode: ResidencyMode,
    pub source: ResidencySource,
}

impl Residency {
    fn new(mode: ResidencyMode, source: ResidencySource) -> Self {
        Self { mode, source }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    residency: Residency,
    expires_at: Instant,
}

/// Residency resolution with a per-(company, entity) cache
pub struct ResidencyDetector {
    store: LocalStore,
    platform: Option<Arc<dyn PlatformClient>>,
    config: ResidencyConfig,
    logger: Arc<dyn Logger>,
    cache: RwLock<HashMap<(CompanyId, EntityType), CacheEntry>>,
}

impl ResidencyDetector {
    /// Create a new ResidencyDetector
    pub fn new(
        store: LocalStore,
        platform: Option<Arc<dyn PlatformClient>>,
        config: ResidencyConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            store,
            platform,
            config,
            logger,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn has_platform(&self) -> bool {
        self.platform.is_some()
    }

    /// Resolve residency for one entity type
    pub async fn detect(&self, company: &CompanyId, entity: EntityType) -> Result<Residency> {
        let key = (company.clone(), entity);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let (residency, degraded) = self.resolve(company, entity).await?;
        let ttl = if degraded {
            self.config.error_cache_ttl_secs
        } else {
            self.config.cache_ttl_secs
        };
        let ttl = Duration::from_secs(ttl.min(MAX_RESIDENCY_TTL_SECS));
        if let Some(expires_at) = Instant::now().checked_add(ttl).filter(|_| !ttl.is_zero()) {
            let entry = CacheEntry { residency, expires_at };
            self.cache
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(key, entry);
        }
        Ok(residency)
    }

    pub async fn mode(&self, company: &CompanyId, entity: EntityType) -> Result<ResidencyMode> {
        Ok(self.detect(company, entity).await?.mode)
    }

    /// Residency of every entity type
    pub async fn detect_all(&self, company: &CompanyId) -> Result<BTreeMap<EntityType, Residency>> {
        let mut all = BTreeMap::new();
        for entity in EntityType::ALL {
            all.insert(entity, self.detect(company, entity).await?);
        }
        Ok(all)
    }

    /// Record an explicit mode on the installation
    pub fn set_mode(&self, company: &CompanyId, entity: EntityType, mode: ResidencyMode) -> Result<()> {
        let mut installation = self.store.installation(company)?;
        installation.set_residency(entity, mode, Utc::now());
        self.store.installations.save(&installation)?;
        self.invalidate(company);
        self.logger.info(
            "Residency updated",
            Some(&meta([
                ("company", company.as_str()),
                ("entity", entity.as_str()),
                ("mode", mode.as_str()),
            ])),
        );
        Ok(())
    }

    pub fn invalidate(&self, company: &CompanyId) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|(c, _), _| c != company);
    }

    pub fn invalidate_all(&self) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn cached(&self, key: &(CompanyId, EntityType)) -> Option<Residency> {
        let cache = self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.residency)
    }

    /// Returns the decision and whether the Platform failed along the way
    async fn resolve(&self, company: &CompanyId, entity: EntityType) -> Result<(Residency, bool)> {
        let mut degraded = false;

        if let Some(platform) = &self.platform {
            match platform.residency_config(company).await {
                Ok(Some(config)) => {
                    if let Some(mode) = config.mode_for(entity) {
                        return Ok((Residency::new(mode, ResidencySource::Platform), false));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    degraded = true;
                    self.logger.warn(
                        &format!("Platform residency lookup failed: {}", e),
                        Some(&meta([("company", company.as_str()), ("entity", entity.as_str())])),
                    );
                }
            }
        }

        let installation = self.store.installation(company)?;
        if let Some(mode) = installation.residency_for(entity) {
            return Ok((Residency::new(mode, ResidencySource::Installation), degraded));
        }

        if self.store.count_entities(company, entity)? > 0 {
            return Ok((Residency::new(ResidencyMode::App, ResidencySource::LocalData), degraded));
        }
        if installation.is_linked() && self.platform.is_some() {
            return Ok((Residency::new(ResidencyMode::Platform, ResidencySource::LocalData), degraded));
        }

        let mode = if self.platform.is_some() {
            self.config.default_mode
        } else {
            ResidencyMode::App
        };
        Ok((Residency::new(mode, ResidencySource::Default), degraded))
    }
}
