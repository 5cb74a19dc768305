use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use attention_viz::dataset::vocab_path;
use attention_viz::decoder::resolve_export_path;
use attention_viz::{
    AlignmentPipelineBuilder, BatchSource, ManifestDataset, ModelConfig, ReplayDecoder,
    VisualizationConfig,
};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

#[path = "plot_attention/logging.rs"]
mod logging;
#[path = "plot_attention/run_index_formatter.rs"]
mod run_index_formatter;

const DEFAULT_SAVE_DIR: &str = "att_weights";

#[derive(Debug, Parser)]
#[command(name = "plot_attention")]
#[command(about = "Plot attention weights of an attention-based speech recognizer")]
struct Args {
    /// Model directory holding config.json and the decoder exports.
    #[arg(long, env = "ATTENTION_VIZ_MODEL_PATH")]
    model_path: PathBuf,
    /// Epoch to restore; -1 selects the latest one.
    #[arg(long, env = "ATTENTION_VIZ_EPOCH", default_value_t = -1, allow_negative_numbers = true)]
    epoch: i64,
    #[arg(long, env = "ATTENTION_VIZ_EVAL_BATCH_SIZE", default_value_t = 1)]
    eval_batch_size: usize,
    /// Output length at which decoding stops when no end marker was emitted.
    #[arg(long, env = "ATTENTION_VIZ_MAX_DECODE_LEN", default_value_t = VisualizationConfig::DEFAULT_MAX_DECODE_LEN)]
    max_decode_len: usize,
    #[arg(long, env = "ATTENTION_VIZ_DATA_PATH")]
    data_path: PathBuf,
    #[arg(long, env = "ATTENTION_VIZ_DATA_TYPE", default_value = "test")]
    data_type: String,
    /// Defaults to <model_path>/att_weights.
    #[arg(long, env = "ATTENTION_VIZ_OUT")]
    out: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    logging::init(args.quiet);
    if let Err(err) = run(args) {
        tracing::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let model_config = ModelConfig::load(&args.model_path.join("config.json"))
        .map_err(|err| format!("Failed to load model config: {err}"))?;
    let save_dir = args
        .out
        .clone()
        .unwrap_or_else(|| args.model_path.join(DEFAULT_SAVE_DIR));

    let mut dataset = ManifestDataset::open(
        &args.data_path,
        &args.data_type,
        Some(model_config.input_size()),
        args.eval_batch_size,
    )
    .map_err(|err| format!("Failed to load {} data: {err}", args.data_type))?;

    let export_path = resolve_export_path(&args.model_path, args.epoch)
        .map_err(|err| format!("Failed to restore epoch {}: {err}", args.epoch))?;
    let mut decoder = ReplayDecoder::load(&export_path)
        .map_err(|err| format!("Failed to load '{}': {err}", export_path.display()))?;
    decoder
        .ensure_matches(dataset.num_utterances())
        .map_err(|err| format!("Cannot replay '{}': {err}", export_path.display()))?;

    let config = VisualizationConfig {
        save_dir: save_dir.clone(),
        vocab_path: vocab_path(&args.data_path, &model_config.label_type),
        max_decode_len: args.max_decode_len,
        eval_batch_size: Some(args.eval_batch_size),
        ..VisualizationConfig::default()
    };

    let progress = ProgressBar::new(dataset.num_utterances() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    let rendered: Rc<RefCell<Vec<run_index_formatter::IndexEntry>>> = Rc::default();

    let pipeline = {
        let progress = progress.clone();
        let rendered = Rc::clone(&rendered);
        AlignmentPipelineBuilder::new(config)
            .with_artifact_callback(Box::new(move |input_name: &str, path: &Path| {
                progress.set_message(input_name.to_string());
                progress.inc(1);
                rendered
                    .borrow_mut()
                    .push(run_index_formatter::IndexEntry::new(input_name, path));
            }))
            .build()
            .map_err(|err| format!("Failed to build pipeline: {err}"))?
    };

    let is_test = dataset.is_test();
    let summary = pipeline
        .run(&mut dataset, &mut decoder)
        .map_err(|err| format!("Attention visualization failed: {err}"))?;
    progress.finish_with_message("attention plots complete");

    let entries = rendered.take();
    let index = run_index_formatter::RunIndex {
        schema_version: 1,
        generated_at: Utc::now().to_rfc3339(),
        model_path: args.model_path.to_string_lossy().into_owned(),
        export_path: export_path.to_string_lossy().into_owned(),
        data_type: args.data_type.clone(),
        is_test,
        batches: summary.batches,
        row_sum_warnings: summary.row_sum_warnings,
        artifacts: entries,
    };
    let index_path = save_dir.join(run_index_formatter::INDEX_FILE);
    run_index_formatter::write_index(&index_path, &index)?;

    println!(
        "Wrote {} attention plot(s) to {}",
        summary.samples,
        save_dir.display()
    );
    Ok(())
}
