//! Detection + recognition pipeline and the `FaceEncoder` seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::session::InferenceOptions;
use crate::types::Embedding;
use image::{ImageError, ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns an image into one embedding per detected face.
///
/// Faces are returned highest-confidence first; an empty vector means no
/// face was found.
pub trait FaceEncoder {
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, Self::Error>;
}

/// SCRFD detector followed by ArcFace recognizer.
pub struct FacePipeline {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FacePipeline {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path, options: &InferenceOptions) -> Result<Self, PipelineError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE), options)?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE), options)?;

        tracing::info!(model_dir = %model_dir.display(), device = options.device(), "face pipeline ready");

        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for FacePipeline {
    type Error = PipelineError;

    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, PipelineError> {
        let faces = self.detector.detect(image)?;

        let mut embeddings = Vec::with_capacity(faces.len());
        for face in &faces {
            if face.landmarks.is_none() {
                tracing::debug!(confidence = face.confidence, "skipping face without landmarks");
                continue;
            }
            embeddings.push(self.recognizer.extract(image, face)?);
        }

        Ok(embeddings)
    }
}

/// Load an image file as 8-bit RGB.
///
/// The format is sniffed from the file content, so a mislabelled extension
/// still decodes.
pub fn load_image(path: &Path) -> Result<RgbImage, ImageError> {
    let image = ImageReader::open(path)
        .map_err(ImageError::IoError)?
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .decode()?;
    Ok(image.to_rgb8())
}

/// Default directory for ONNX model files.
///
/// `$XDG_DATA_HOME/facesort/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    model_dir_from(std::env::var("XDG_DATA_HOME").ok(), std::env::var("HOME").ok())
}

/// Empty or relative values are ignored, as XDG base directories require.
fn model_dir_from(xdg_data_home: Option<String>, home: Option<String>) -> PathBuf {
    let absolute = |v: Option<String>| v.map(PathBuf::from).filter(|p| p.is_absolute());

    absolute(xdg_data_home)
        .unwrap_or_else(|| {
            absolute(home)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/share")
        })
        .join("facesort")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_load_reports_missing_detector_first() {
        let dir = tempfile::tempdir().unwrap();
        let err = FacePipeline::load(dir.path(), &InferenceOptions::default());
        assert!(matches!(err, Err(PipelineError::Detector(DetectorError::ModelNotFound(_)))));
    }

    #[test]
    fn test_load_image_sniffs_format() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("face.png");
        RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])).save(&png).unwrap();

        // Same bytes behind a misleading extension.
        let renamed = dir.path().join("face.jpg");
        std::fs::copy(&png, &renamed).unwrap();

        let image = load_image(&renamed).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_load_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(load_image(&path).is_err());
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("/nonexistent/face.png"));
        assert!(matches!(err, Err(ImageError::IoError(_))));
    }

    #[test]
    fn test_default_model_dir_suffix() {
        assert!(default_model_dir().ends_with("facesort/models"));
    }

    #[test]
    fn test_model_dir_prefers_xdg_data_home() {
        let dir = model_dir_from(Some("/data".into()), Some("/home/ana".into()));
        assert_eq!(dir, PathBuf::from("/data/facesort/models"));
    }

    #[test]
    fn test_model_dir_ignores_empty_or_relative_xdg() {
        let expected = PathBuf::from("/home/ana/.local/share/facesort/models");
        assert_eq!(model_dir_from(Some(String::new()), Some("/home/ana".into())), expected);
        assert_eq!(model_dir_from(Some("data".into()), Some("/home/ana".into())), expected);
        assert_eq!(model_dir_from(None, Some("/home/ana".into())), expected);
    }

    #[test]
    fn test_model_dir_without_home() {
        let dir = model_dir_from(Some(String::new()), Some(String::new()));
        assert_eq!(dir, PathBuf::from("/tmp/.local/share/facesort/models"));
        assert!(dir.is_absolute());
    }
}
