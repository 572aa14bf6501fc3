use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use road_sign_lib::dataset::{class_distribution, DatasetLoader};
use road_sign_lib::model::{describe_metadata, load_metadata, AppConfig, DeviceType};

#[derive(Parser, Debug)]
#[command(
    name = "road-sign-recognition",
    about = "Recognise German road signs with a convolutional network",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Config file (JSON)
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,
    /// Override the model archive from the config
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,
    /// Run on the CPU backend instead of WGPU
    #[arg(long, global = true, default_value_t = false)]
    cpu: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognise the sign in one or more images
    #[cfg(feature = "ml")]
    Recognise {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Interactive shell: open images and recognise them
    #[cfg(feature = "ml")]
    Shell,
    /// Train a model on the training set and save it
    #[cfg(feature = "ml")]
    Train,
    /// Measure accuracy on the test set
    #[cfg(feature = "ml")]
    Evaluate {
        /// Number of actual/predicted pairs to print
        #[arg(long, default_value_t = 24)]
        sample: usize,
    },
    /// Show the class distribution of the training set
    Stats,
    /// Show or write the configuration
    Config {
        /// Write the current (or default) configuration to the config path
        #[arg(long, default_value_t = false)]
        init: bool,
    },
    /// Show the metadata stored in a model archive
    Info,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = AppConfig::load_or_default_from(&args.config);
    if let Some(model) = &args.model {
        config.model.model_path = model.to_string_lossy().to_string();
    }
    if args.cpu {
        config.device_type = DeviceType::Cpu;
    }

    match args.command {
        #[cfg(feature = "ml")]
        Commands::Recognise { images } => ml_commands::recognise(&config, &images),
        #[cfg(feature = "ml")]
        Commands::Shell => ml_commands::shell(&config),
        #[cfg(feature = "ml")]
        Commands::Train => ml_commands::train(&config),
        #[cfg(feature = "ml")]
        Commands::Evaluate { sample } => ml_commands::evaluate(&config, sample),
        Commands::Stats => stats(&config),
        Commands::Config { init } => {
            if init {
                config
                    .save(&args.config)
                    .with_context(|| format!("Failed to write {}", args.config.display()))?;
                info!("Wrote {}", args.config.display());
            }
            println!("{}", config.display());
            Ok(())
        }
        Commands::Info => {
            let metadata = load_metadata(&config.model_path())?;
            println!("{}", describe_metadata(&metadata));
            Ok(())
        }
    }
}

fn stats(config: &AppConfig) -> Result<()> {
    let loader = DatasetLoader::new(config.preprocessor(), config.dataset.strict_decode);
    let (dataset, report) = loader
        .load_training_set(&config.dataset.train_path())
        .context("Failed to load training set")?;

    println!("{:<55} {:>6}", "Sign", "Images");
    for (name, count) in class_distribution(&dataset.class_counts()) {
        println!("{:<55} {:>6}", name, count);
    }
    println!("Total: {} images ({} skipped)", dataset.len(), report.skipped_count());
    Ok(())
}

#[cfg(feature = "ml")]
mod ml_commands {
    use anyhow::{Context, Result};
    use rand::Rng;
    use std::io;
    use std::path::PathBuf;
    use tracing::info;

    use road_sign_lib::dataset::DatasetLoader;
    use road_sign_lib::evaluation::evaluate as evaluate_dataset;
    use road_sign_lib::ml::{load_classifier, train_model};
    use road_sign_lib::model::AppConfig;
    use road_sign_lib::recognition::RecognitionService;
    use road_sign_lib::shell::Shell;

    fn service(config: &AppConfig) -> Result<RecognitionService<Box<dyn road_sign_lib::Classifier>>> {
        let (classifier, metadata) = load_classifier(&config.model_path(), config.device_type)
            .with_context(|| format!("Failed to load model {}", config.model_path().display()))?;

        let mut preprocessor = config.preprocessor();
        if metadata.channel_order != preprocessor.channel_order {
            info!(
                "Using the model's channel order {} instead of {}",
                metadata.channel_order, preprocessor.channel_order
            );
            preprocessor.channel_order = metadata.channel_order;
        }
        Ok(RecognitionService::with_preprocessor(classifier, preprocessor))
    }

    pub fn recognise(config: &AppConfig, images: &[PathBuf]) -> Result<()> {
        let service = service(config)?;
        for path in images {
            match service.recognise(path) {
                Some(recognition) => println!("{}: {}", path.display(), recognition.name),
                None => println!("{}: Error during recognition", path.display()),
            }
        }
        Ok(())
    }

    pub fn shell(config: &AppConfig) -> Result<()> {
        let service = service(config)?;
        let mut shell = Shell::new(service).with_images_directory(config.images_directory());
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        shell.run(stdin.lock(), &mut stdout)?;
        Ok(())
    }

    pub fn train(config: &AppConfig) -> Result<()> {
        let (path, report) = train_model(config)?;
        println!("Model saved to {}", path.display());
        if !report.skipped.is_empty() {
            println!("{} training images could not be read", report.skipped_count());
        }
        Ok(())
    }

    pub fn evaluate(config: &AppConfig, sample: usize) -> Result<()> {
        let service = service(config)?;
        let loader = DatasetLoader::new(*service.preprocessor(), config.dataset.strict_decode);
        let root = PathBuf::from(&config.dataset.root);
        let (dataset, load_report) = loader
            .load_test_set(&root, &config.dataset.manifest_path())
            .context("Failed to load test set")?;

        let report = evaluate_dataset(
            service.classifier(),
            &dataset,
            config.training.batch_size,
            load_report.skipped_count(),
        )?;

        println!("{}", report.summary());
        if sample > 0 {
            let max_start = report.predictions.len().saturating_sub(sample);
            let start = rand::thread_rng().gen_range(0..=max_start);
            println!("{}", report.format_window(start, sample));
        }
        Ok(())
    }
}
