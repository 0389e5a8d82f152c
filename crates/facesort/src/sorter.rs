//! Copy every dataset image that contains the reference face.

use crate::discovery::discover_images;
use chrono::{DateTime, Utc};
use facesort_core::{load_image, Embedding, EuclideanMatcher, FaceEncoder, Matcher};
use image::ImageError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("reference image not found: {0}")]
    ReferenceNotFound(PathBuf),
    #[error("dataset folder not found: {0}")]
    DatasetNotFound(PathBuf),
    #[error("error loading reference image {path}: {source}")]
    ReferenceUnreadable { path: PathBuf, source: ImageError },
    #[error("error encoding reference image: {0}")]
    ReferenceEncoding(#[source] BoxError),
    #[error("no face found in reference image {0}")]
    NoReferenceFace(PathBuf),
    #[error("cannot create output folder {path}: {source}")]
    OutputDir { path: PathBuf, source: std::io::Error },
    #[error("no supported image files found in {0}")]
    NoImages(PathBuf),
}

/// Errors for a single dataset file. Logged and counted, never fatal.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("decode: {0}")]
    Decode(#[from] ImageError),
    #[error("encode: {0}")]
    Encode(#[source] BoxError),
    #[error("copy to {dest}: {source}")]
    Copy { dest: PathBuf, source: std::io::Error },
    #[error("source and destination are the same file: {0}")]
    SameFile(PathBuf),
}

/// What happened to one dataset file.
#[derive(Debug)]
enum FileOutcome {
    Copied { dest: PathBuf, distance: f32 },
    NoFace,
    NoMatch { distance: f32 },
}

#[derive(Debug, Clone)]
pub struct SortOptions {
    pub reference: PathBuf,
    pub dataset: PathBuf,
    pub output: PathBuf,
    pub tolerance: f32,
    pub recursive: bool,
    pub progress_interval: usize,
}

impl SortOptions {
    pub fn new(reference: impl Into<PathBuf>, dataset: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
            dataset: dataset.into(),
            output: output.into(),
            tolerance: EuclideanMatcher::DEFAULT_TOLERANCE,
            recursive: false,
            progress_interval: 50,
        }
    }

    /// Check the input paths. Runs before any model or folder work.
    pub fn validate(&self) -> Result<(), SortError> {
        if !self.reference.is_file() {
            tracing::error!(path = %self.reference.display(), "reference image not found");
            return Err(SortError::ReferenceNotFound(self.reference.clone()));
        }
        if !self.dataset.is_dir() {
            tracing::error!(path = %self.dataset.display(), "dataset folder not found");
            return Err(SortError::DatasetNotFound(self.dataset.clone()));
        }
        Ok(())
    }
}

/// Statistics for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SortReport {
    pub processed: usize,
    pub copied: usize,
    pub no_face: usize,
    pub errors: usize,
    /// Percentage of processed files that did not error.
    pub success_rate: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub copied_files: Vec<PathBuf>,
}

impl SortReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            processed: 0,
            copied: 0,
            no_face: 0,
            errors: 0,
            success_rate: 0.0,
            started_at: now,
            finished_at: now,
            copied_files: Vec::new(),
        }
    }

    fn finish(&mut self) {
        self.success_rate = if self.processed > 0 {
            (self.processed - self.errors) as f64 / self.processed as f64 * 100.0
        } else {
            0.0
        };
        self.finished_at = Utc::now();
    }
}

/// Scan `options.dataset` and copy every image containing the reference
/// face into `options.output`.
///
/// Missing inputs, an unreadable reference or a reference without a face
/// abort the run. Problems with individual dataset files are logged,
/// counted in [`SortReport::errors`] and skipped.
pub fn copy_images_with_face<E: FaceEncoder>(
    encoder: &mut E,
    options: &SortOptions,
) -> Result<SortReport, SortError> {
    options.validate()?;
    let mut report = SortReport::start();

    let reference = encode_reference(encoder, &options.reference)?;

    fs::create_dir_all(&options.output).map_err(|source| SortError::OutputDir {
        path: options.output.clone(),
        source,
    })?;
    tracing::info!(path = %options.output.display(), "output folder ready");

    // Compare canonical paths so an output folder inside the dataset is excluded
    // however either path was spelled.
    let dataset = options.dataset.canonicalize().unwrap_or_else(|_| options.dataset.clone());
    let output = options.output.canonicalize().unwrap_or_else(|_| options.output.clone());

    let images = discover_images(&dataset, options.recursive, Some(&output));
    if images.is_empty() {
        tracing::warn!(path = %options.dataset.display(), "no supported image files found");
        return Err(SortError::NoImages(options.dataset.clone()));
    }

    let total = images.len();
    tracing::info!(total, tolerance = options.tolerance, "starting face matching");

    let matcher = EuclideanMatcher::new(options.tolerance);
    let interval = options.progress_interval.max(1);

    for path in &images {
        report.processed += 1;
        if report.processed % interval == 0 {
            tracing::info!(processed = report.processed, total, "progress");
        }

        let dest = output.join(relative_name(path, &dataset));

        match process_file(encoder, &matcher, &reference, path, &dest) {
            Ok(FileOutcome::Copied { dest, distance }) => {
                report.copied += 1;
                tracing::info!(file = %path.display(), dest = %dest.display(), distance, "copied matching image");
                report.copied_files.push(dest);
            }
            Ok(FileOutcome::NoFace) => {
                report.no_face += 1;
                tracing::debug!(file = %path.display(), "no face found");
            }
            Ok(FileOutcome::NoMatch { distance }) => {
                tracing::debug!(file = %path.display(), distance, "no matching face");
            }
            Err(err) => {
                report.errors += 1;
                tracing::error!(file = %path.display(), error = %err, "error processing image");
            }
        }
    }

    report.finish();
    tracing::info!(
        processed = report.processed,
        copied = report.copied,
        no_face = report.no_face,
        errors = report.errors,
        success_rate = report.success_rate,
        "processing complete"
    );

    Ok(report)
}

/// Load the reference image and return its highest-confidence face.
fn encode_reference<E: FaceEncoder>(encoder: &mut E, path: &Path) -> Result<Embedding, SortError> {
    tracing::info!(path = %path.display(), "loading reference image");

    let image = load_image(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "error loading reference image");
        SortError::ReferenceUnreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut faces = encoder
        .encode(&image)
        .map_err(|e| SortError::ReferenceEncoding(Box::new(e)))?;

    if faces.is_empty() {
        tracing::error!(path = %path.display(), "no face found in the reference image");
        return Err(SortError::NoReferenceFace(path.to_path_buf()));
    }
    if faces.len() > 1 {
        tracing::warn!(faces = faces.len(), "multiple faces found in reference image; using the first one");
    }

    tracing::info!("reference face loaded");
    Ok(faces.swap_remove(0))
}

fn process_file<E: FaceEncoder>(
    encoder: &mut E,
    matcher: &EuclideanMatcher,
    reference: &Embedding,
    path: &Path,
    dest: &Path,
) -> Result<FileOutcome, FileError> {
    let image = load_image(path)?;
    let faces = encoder.encode(&image).map_err(|e| FileError::Encode(Box::new(e)))?;

    if faces.is_empty() {
        return Ok(FileOutcome::NoFace);
    }

    let result = matcher.compare(reference, &faces);
    if !result.matched {
        return Ok(FileOutcome::NoMatch {
            distance: result.distance,
        });
    }

    // Copying a file onto itself truncates it.
    if is_same_file(path, dest) {
        return Err(FileError::SameFile(dest.to_path_buf()));
    }

    let copy = |dest: &Path| -> std::io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, dest)?;
        Ok(())
    };
    copy(dest).map_err(|source| FileError::Copy {
        dest: dest.to_path_buf(),
        source,
    })?;

    Ok(FileOutcome::Copied {
        dest: dest.to_path_buf(),
        distance: result.distance,
    })
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Path of `file` relative to the dataset root, or its bare file name.
fn relative_name<'a>(file: &'a Path, dataset: &Path) -> &'a Path {
    file.strip_prefix(dataset)
        .ok()
        .or_else(|| file.file_name().map(Path::new))
        .unwrap_or(file)
}
