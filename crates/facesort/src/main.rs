use anyhow::{Context, Result};
use clap::Parser;
use facesort::{copy_images_with_face, Config, SortOptions, SortReport};
use facesort_core::FacePipeline;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "facesort",
    version,
    about = "Copy every image containing a reference person's face into an output folder"
)]
struct Cli {
    /// Image containing the face to look for
    #[arg(short, long)]
    reference: PathBuf,
    /// Folder of images to search
    #[arg(short, long)]
    dataset: PathBuf,
    /// Folder that receives matching images (created if missing)
    #[arg(short, long)]
    output: PathBuf,
    /// Match tolerance: 0.4 strict, 0.6 balanced, 0.8 lenient
    #[arg(short, long)]
    tolerance: Option<f32>,
    /// Disable GPU inference
    #[arg(long)]
    no_gpu: bool,
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Also search subfolders of the dataset
    #[arg(long)]
    recursive: bool,
    /// ONNX Runtime threads per model
    #[arg(long)]
    threads: Option<usize>,
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log file path (default: face_recognition.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(t) = self.tolerance {
            config.tolerance = t;
        }
        if self.no_gpu {
            config.use_gpu = false;
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if self.recursive {
            config.recursive = true;
        }
        if let Some(n) = self.threads {
            config.intra_threads = n;
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, rejected) = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate()?;

    let _log_guard = facesort::logging::init(config.log_file.as_deref())?;

    for r in &rejected {
        tracing::warn!(key = r.key, value = %r.value, "ignoring unparsable environment override");
    }

    let options = SortOptions {
        reference: cli.reference.clone(),
        dataset: cli.dataset.clone(),
        output: cli.output.clone(),
        tolerance: config.tolerance,
        recursive: config.recursive,
        progress_interval: config.progress_interval,
    };

    if !cli.json {
        println!("Face Recognition Image Sorter");
        println!("{}", "=".repeat(50));
    }

    // Fail on bad paths before paying for model loading.
    options.validate()?;

    let inference = config.inference_options();
    tracing::info!(device = inference.device(), "using device");

    let mut pipeline = FacePipeline::load(&config.model_dir, &inference)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;

    let report = copy_images_with_face(&mut pipeline, &options).context("processing failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &SortReport) {
    let rule = "=".repeat(50);
    println!();
    println!("{rule}");
    println!("PROCESSING COMPLETE!");
    println!("{rule}");
    println!("Images processed: {}", report.processed);
    println!("Images copied: {}", report.copied);
    println!("Images without faces: {}", report.no_face);
    println!("Errors encountered: {}", report.errors);
    println!("Success rate: {:.1}%", report.success_rate);
    println!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REQUIRED: [&str; 7] = ["facesort", "-r", "ref.jpg", "-d", "photos", "-o", "out"];

    fn parse(extra: &[&str]) -> Cli {
        Cli::try_parse_from(REQUIRED.iter().chain(extra.iter()).copied()).unwrap()
    }

    fn load(file: &str, env: &[(&str, &str)]) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facesort.toml");
        std::fs::write(&path, file).unwrap();

        let env: HashMap<String, String> = env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let (config, rejected) = Config::load_with(Some(&path), |key| env.get(key).cloned()).unwrap();
        assert!(rejected.is_empty());
        config
    }

    #[test]
    fn test_cli_overrides_env_and_file() {
        let mut config = load(
            "tolerance = 0.4\nintra_threads = 8\nrecursive = true\n",
            &[("FACESORT_TOLERANCE", "0.5"), ("FACESORT_THREADS", "6")],
        );
        // File, then env.
        assert!((config.tolerance - 0.5).abs() < 1e-6);
        assert_eq!(config.intra_threads, 6);
        assert!(config.use_gpu);

        parse(&["--tolerance", "0.9", "--no-gpu", "--threads", "3", "--model-dir", "/models"])
            .apply_to(&mut config);

        assert!((config.tolerance - 0.9).abs() < 1e-6);
        assert!(!config.use_gpu);
        assert_eq!(config.intra_threads, 3);
        assert_eq!(config.model_dir, PathBuf::from("/models"));
        // Flags that were not given leave lower layers alone.
        assert!(config.recursive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_without_flags_keeps_lower_layers() {
        let mut config = load("use_gpu = false\n", &[("FACESORT_PROGRESS_INTERVAL", "5")]);
        parse(&[]).apply_to(&mut config);

        assert!(!config.use_gpu);
        assert_eq!(config.progress_interval, 5);
        assert!((config.tolerance - 0.6).abs() < 1e-6);
        assert_eq!(config.log_file.as_deref(), Some(std::path::Path::new("face_recognition.log")));
    }

    #[test]
    fn test_cli_log_file_and_recursive() {
        let mut config = Config::default();
        let cli = parse(&["--recursive", "--log-file", "/var/log/facesort.log", "--json"]);
        assert!(cli.json);
        cli.apply_to(&mut config);
        assert!(config.recursive);
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/facesort.log")));
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["facesort", "-r", "ref.jpg"]).is_err());
    }
}
