use std::path::PathBuf;

use clap::Parser;

use super::loader_config::{ExecutionContext, LogLevel};
use crate::domain::entities::{CachePolicy, Precision, Size};
use crate::infrastructure::memory::TrimLevel;

#[derive(Debug, Parser)]
#[command(
    name = "pixelpipe",
    version,
    about = "Load images through a cancellable pipeline with a tiered memory cache",
    long_about = None
)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliArgs {
    /// Image sources: file paths, `file://` URIs or `data:` URIs.
    #[arg(value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Strong memory cache budget in bytes.
    #[arg(long, value_name = "BYTES")]
    pub memory_cache_max_bytes: Option<u64>,

    /// Keep evicted images reachable while something else holds them.
    #[arg(long)]
    pub weak_references_enabled: Option<bool>,

    /// Memory cache policy.
    #[arg(long, value_enum)]
    pub memory_cache_policy: Option<CachePolicy>,

    /// Disk cache policy.
    #[arg(long, value_enum)]
    pub disk_cache_policy: Option<CachePolicy>,

    /// Network cache policy.
    #[arg(long, value_enum)]
    pub network_cache_policy: Option<CachePolicy>,

    /// Include file modification times in file cache keys.
    #[arg(long)]
    pub add_file_last_modified_to_cache_key: Option<bool>,

    /// Let network fetchers honour HTTP cache headers.
    #[arg(long)]
    pub respect_network_cache_headers: Option<bool>,

    /// Maximum concurrent fetches.
    #[arg(long)]
    pub fetch_parallelism: Option<usize>,

    /// Allow hardware-backed images.
    #[arg(long)]
    pub allow_hardware: Option<bool>,

    /// Size precision.
    #[arg(long, value_enum)]
    pub precision: Option<Precision>,

    /// Where decoders run.
    #[arg(long, value_enum)]
    pub decoder_context: Option<ExecutionContext>,

    /// Where transformations run.
    #[arg(long, value_enum)]
    pub transformation_context: Option<ExecutionContext>,

    /// Requested size as `WIDTHxHEIGHT`; the original size when omitted.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<Size>,

    /// Number of passes over the sources; later passes hit the memory cache.
    #[arg(long, default_value_t = 2)]
    pub passes: usize,

    /// Simulated memory pressure applied between passes.
    #[arg(long, value_enum)]
    pub trim: Option<TrimLevel>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid width '{width}': {e}"))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid height '{height}': {e}"))?;
    if width == 0 || height == 0 {
        return Err("size dimensions must be positive".to_string());
    }
    Ok(Size::new(width, height))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("64x32", Some((64, 32)) ; "lowercase separator")]
    #[test_case("8X8", Some((8, 8)) ; "uppercase separator")]
    #[test_case("0x8", None ; "zero width")]
    #[test_case("64", None ; "missing separator")]
    #[test_case("ax8", None ; "non numeric")]
    fn test_parse_size(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(
            parse_size(input).ok(),
            expected.map(|(w, h)| Size::new(w, h))
        );
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["pixelpipe", "a.png", "b.png"]);
        assert_eq!(args.sources, ["a.png", "b.png"]);
        assert_eq!(args.passes, 2);
        assert!(args.size.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_pipeline_flags() {
        let args = CliArgs::parse_from([
            "pixelpipe",
            "--size",
            "16x16",
            "--trim",
            "severe",
            "--memory-cache-policy",
            "read-only",
            "--decoder-context",
            "inline",
        ]);
        assert_eq!(args.size, Some(Size::new(16, 16)));
        assert_eq!(args.trim, Some(TrimLevel::Severe));
        assert_eq!(args.memory_cache_policy, Some(CachePolicy::ReadOnly));
        assert_eq!(args.decoder_context, Some(ExecutionContext::Inline));
    }
}
