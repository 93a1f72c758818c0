use std::sync::Arc;

use crate::{
    analysis::AnalysisRunner,
    auth::jwt::JwtService,
    chat::ContractChat,
    config::AppConfig,
    jobs::JobQueue,
    participants::ParticipantRegistry,
    storage::ObjectStorage,
    store::ContractStore,
    tasks::TaskOrchestrator,
    versions::VersionManager,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ContractStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
    pub versions: Arc<VersionManager>,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub participants: Arc<ParticipantRegistry>,
    pub chat: Option<Arc<ContractChat>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ContractStore>,
        storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn JobQueue>,
        runner: Option<Arc<dyn AnalysisRunner>>,
        jwt: JwtService,
    ) -> Self {
        let versions = VersionManager::new(
            store.clone(),
            storage.clone(),
            config.version_insert_max_attempts,
        );
        let orchestrator = TaskOrchestrator::new(store.clone(), queue);
        let participants = ParticipantRegistry::new(store.clone());
        let chat = runner.map(|runner| Arc::new(ContractChat::new(store.clone(), runner)));

        Self {
            config: Arc::new(config),
            store,
            storage,
            jwt,
            versions: Arc::new(versions),
            orchestrator: Arc::new(orchestrator),
            participants: Arc::new(participants),
            chat,
        }
    }
}
