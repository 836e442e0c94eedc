use std::sync::Arc;

use marquee_db::Store;
use marquee_pipeline::encode::ArtifactEncoder;
use marquee_pipeline::generator::SegmentGenerator;
use marquee_pipeline::now_playing::NowPlayingProbe;
use marquee_pipeline::orchestrator::GenerationOrchestrator;
use marquee_pipeline::render::BuiltinRenderers;
use marquee_pipeline::selector::PlaybackSelector;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Animation, lock and timer persistence.
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    /// Runs single-flight generation passes.
    pub orchestrator: GenerationOrchestrator,
    /// Answers display polls.
    pub selector: PlaybackSelector,
}

impl AppState {
    /// Wire the pipeline around `store` with the built-in renderers.
    pub fn new(
        store: Arc<dyn Store>,
        config: ServerConfig,
        encoder: Arc<dyn ArtifactEncoder>,
        probe: Option<Arc<dyn NowPlayingProbe>>,
    ) -> Self {
        let generation = Arc::new(config.generation.clone());
        let renderers = Arc::new(BuiltinRenderers::new(generation.width, generation.height));
        let generator = SegmentGenerator::new(Arc::clone(&generation), renderers, encoder);
        let orchestrator = GenerationOrchestrator::new(Arc::clone(&store), generator, probe);
        let selector = PlaybackSelector::new(Arc::clone(&store), &generation);
        Self {
            store,
            config: Arc::new(config),
            orchestrator,
            selector,
        }
    }
}
