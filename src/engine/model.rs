//! One-time model loading
//!
//! Both models are read and compiled during process startup and never
//! mutated afterwards. Model load failure is fatal at startup only,
//! never per-request.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use openvino::{CompiledModel, Core};
use tracing::info;

use crate::config::ModelsConfig;

/// Wrapper for OpenVINO CompiledModel that implements Send + Sync.
#[derive(Clone)]
pub struct SafeCompiledModel(Arc<CompiledModel>);

unsafe impl Send for SafeCompiledModel {}
unsafe impl Sync for SafeCompiledModel {}

impl SafeCompiledModel {
    /// Create an inference request.
    /// OpenVINO CompiledModel methods are thread-safe in C++, but the
    /// Rust bindings require &mut self. We bypass this restriction.
    pub fn create_infer_request(&self) -> Result<openvino::InferRequest> {
        unsafe {
            let ptr = Arc::as_ptr(&self.0) as *mut CompiledModel;
            (*ptr).create_infer_request().map_err(|e| e.into())
        }
    }
}

impl Deref for SafeCompiledModel {
    type Target = CompiledModel;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The loaded detection and embedding models, compiled once at startup.
pub struct ModelStack {
    detector: SafeCompiledModel,
    embedder: SafeCompiledModel,
}

impl ModelStack {
    /// Read and compile both models. Called once at process start.
    pub fn load(config: &ModelsConfig) -> Result<Self> {
        let mut core = Core::new()?;

        let detector = Self::compile(&mut core, config, &config.detector)?;
        let embedder = Self::compile(&mut core, config, &config.embedder)?;

        Ok(Self { detector, embedder })
    }

    fn compile(
        core: &mut Core,
        config: &ModelsConfig,
        path: &std::path::Path,
    ) -> Result<SafeCompiledModel> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non-UTF8 model path: {}", path.display()))?;

        info!("Loading model from {}", path_str);
        let start = Instant::now();

        let model = core.read_model_from_file(path_str, "")?;
        let compiled = core.compile_model(&model, config.device.as_str().into())?;

        info!("Model {} compiled in {:?}", path_str, start.elapsed());
        Ok(SafeCompiledModel(Arc::new(compiled)))
    }

    pub fn detector(&self) -> &SafeCompiledModel {
        &self.detector
    }

    pub fn embedder(&self) -> &SafeCompiledModel {
        &self.embedder
    }
}
