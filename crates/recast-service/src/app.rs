//! Composition root.

use std::sync::Arc;

use tracing::info;

use recast_manager::TranscodeManager;
use recast_media::{FfmpegDriver, MediaDriver};
use recast_registry::JobRegistry;
use recast_storage::{MediaStore, SessionTable};

use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::status::StatusService;
use crate::transcode::TranscodeService;
use crate::upload::UploadService;

/// The assembled transcoding core.
///
/// Built once at startup, before the first request; torn down by
/// letting the process exit. The facades it hands out are cheap
/// clones sharing the same state.
pub struct App {
    config: ServiceConfig,
    store: MediaStore,
    sessions: Arc<SessionTable>,
    registry: Arc<JobRegistry>,
    manager: Arc<TranscodeManager>,
}

impl App {
    /// Build the core with the production ffmpeg driver.
    ///
    /// Fails at startup when either configured binary cannot be
    /// resolved, the same way a missing storage root is fatal.
    pub async fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let driver = FfmpegDriver::new(&config.ffmpeg_path, &config.ffprobe_path);
        driver.check_binaries()?;
        Self::with_driver(config, Arc::new(driver)).await
    }

    /// Build the core around an injected media driver.
    ///
    /// Tests use this with a scripted driver so nothing is spawned.
    pub async fn with_driver(
        config: ServiceConfig,
        driver: Arc<dyn MediaDriver>,
    ) -> ServiceResult<Self> {
        // Storage init failure is fatal: without the roots nothing works.
        let store = MediaStore::new(&config.staging_dir, &config.output_dir).await?;
        let sessions = Arc::new(SessionTable::new());
        let registry = Arc::new(JobRegistry::new());
        let manager = Arc::new(TranscodeManager::new(
            store.clone(),
            registry.clone(),
            driver,
            config.workers,
        ));
        info!("Service initialized with {} workers", config.workers);

        Ok(Self {
            config,
            store,
            sessions,
            registry,
            manager,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn upload_service(&self) -> UploadService {
        UploadService::new(
            self.store.clone(),
            self.sessions.clone(),
            self.config.max_message_size,
        )
    }

    pub fn transcode_service(&self) -> TranscodeService {
        TranscodeService::new(self.manager.clone(), self.config.default_formats.clone())
    }

    pub fn status_service(&self) -> StatusService {
        StatusService::new(self.registry.clone())
    }

    /// Stop the worker pool dispatcher. Running jobs finish; queued
    /// jobs are dropped. The process normally just exits instead.
    pub fn shutdown(&self) {
        self.manager.shutdown();
    }
}
