//! ONNX Runtime session construction shared by the detector and recognizer.

use ort::session::Session;
use std::path::Path;

/// Options applied to every model session.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Intra-op threads ONNX Runtime may use per session.
    pub intra_threads: usize,
    /// Request the CUDA execution provider. Falls back to CPU when unavailable.
    pub use_gpu: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            intra_threads: 2,
            use_gpu: true,
        }
    }
}

impl InferenceOptions {
    /// Device label for logging.
    pub fn device(&self) -> &'static str {
        if self.use_gpu && cfg!(feature = "cuda") {
            "cuda"
        } else {
            "cpu"
        }
    }
}

/// Build an inference session for the model at `model_path`.
pub(crate) fn build_session(model_path: &Path, options: &InferenceOptions) -> ort::Result<Session> {
    #[allow(unused_mut)]
    let mut builder = Session::builder()?.with_intra_threads(options.intra_threads)?;

    if options.use_gpu {
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::CUDAExecutionProvider;
            builder = builder.with_execution_providers([CUDAExecutionProvider::default().build()])?;
        }
        #[cfg(not(feature = "cuda"))]
        {
            tracing::warn!(
                model = %model_path.display(),
                "GPU requested but facesort-core was built without the `cuda` feature; using CPU"
            );
        }
    }

    tracing::debug!(
        model = %model_path.display(),
        device = options.device(),
        threads = options.intra_threads,
        "building inference session"
    );

    builder.commit_from_file(model_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = InferenceOptions::default();
        assert_eq!(opts.intra_threads, 2);
        assert!(opts.use_gpu);
    }

    #[test]
    fn test_device_cpu_when_gpu_disabled() {
        let opts = InferenceOptions {
            intra_threads: 1,
            use_gpu: false,
        };
        assert_eq!(opts.device(), "cpu");
    }
}
