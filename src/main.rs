use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{Subscriber, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pixelpipe::domain::entities::{DataSource, ImageRequest, ImageResult, Size};
use pixelpipe::infrastructure::{CacheStats, CliArgs, LoaderConfig};
use pixelpipe::ImageLoader;

fn console_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(false)
}

fn init_logging(config: &LoaderConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer(std::io::stderr))
            .init();
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct Outcome {
    pass: usize,
    source: String,
    status: &'static str,
    width: Option<u32>,
    height: Option<u32>,
    data_source: Option<DataSource>,
    cached: bool,
    sampled: bool,
    error: Option<String>,
}

impl Outcome {
    fn new(pass: usize, source: &str, result: Result<ImageResult, pixelpipe::Cancelled>) -> Self {
        let mut outcome = Self {
            pass,
            source: source.to_string(),
            status: "cancelled",
            width: None,
            height: None,
            data_source: None,
            cached: false,
            sampled: false,
            error: None,
        };
        match result {
            Ok(ImageResult::Success(success)) => {
                outcome.status = "success";
                outcome.width = Some(success.image.width());
                outcome.height = Some(success.image.height());
                outcome.data_source = Some(success.data_source);
                outcome.cached = success.memory_cache_key.is_some();
                outcome.sampled = success.is_sampled;
            }
            Ok(ImageResult::Error(error)) => {
                outcome.status = "error";
                outcome.error = Some(error.error.to_string());
            }
            Err(_) => {}
        }
        outcome
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[pass {}] {}: {}", self.pass, self.source, self.status)?;
        if let (Some(width), Some(height)) = (self.width, self.height) {
            write!(f, " {width}x{height}")?;
        }
        if let Some(data_source) = self.data_source {
            write!(f, " from {data_source}")?;
        }
        if self.sampled {
            write!(f, " (sampled)")?;
        }
        if let Some(error) = &self.error {
            write!(f, " - {error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Report {
    outcomes: Vec<Outcome>,
    cache: CacheStats,
}

async fn run(loader: &ImageLoader, args: &CliArgs) -> Vec<Outcome> {
    let size = args.size.unwrap_or(Size::ORIGINAL);
    let mut outcomes = Vec::new();

    for pass in 1..=args.passes.max(1) {
        if pass > 1
            && let Some(level) = args.trim
        {
            info!(?level, "Applying memory pressure");
            loader.trim_memory(level);
        }

        let requests = args.sources.iter().map(|source| {
            let request = ImageRequest::builder(source.as_str()).size(size).build();
            async move { Outcome::new(pass, source, loader.execute(request).await) }
        });
        outcomes.extend(join_all(requests).await);
    }
    outcomes
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let mut config =
        LoaderConfig::load(args.config.as_deref()).wrap_err("Failed to load configuration")?;
    config.merge_with_args(&args);

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(&config)?;
    info!(version = pixelpipe::VERSION, "Starting {}", pixelpipe::NAME);

    if args.sources.is_empty() {
        warn!("No sources given");
    }

    let loader = ImageLoader::new(config);
    let outcomes = run(&loader, &args).await;
    let report = Report {
        outcomes,
        cache: loader.memory_cache().stats(),
    };
    loader.shutdown();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).wrap_err("Failed to serialize report")?
        );
    } else {
        for outcome in &report.outcomes {
            println!("{outcome}");
        }
        println!("{}", report.cache);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pixelpipe::infrastructure::LogLevel;
    use tracing::debug;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_layer_respects_log_level() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(LogLevel::Info.to_string()))
            .with(console_layer(move || writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden detail");
            info!("loader ready");
        });

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert!(output.contains("loader ready"));
        assert!(!output.contains("hidden detail"));
    }
}
