pub mod alignment;
pub mod config;
pub mod dataset;
pub mod decoder;
pub mod error;
pub mod labels;
pub mod pipeline;
pub mod render;
pub mod types;

pub use config::{ModelConfig, VisualizationConfig};
pub use dataset::ManifestDataset;
pub use decoder::{ExportedDecode, ReplayDecoder};
pub use error::VisualizationError;
pub use labels::SymbolTable;
pub use pipeline::builder::AlignmentPipelineBuilder;
pub use pipeline::output::DirectoryOutput;
pub use pipeline::runtime::{AlignmentPipeline, RunState};
pub use pipeline::traits::{
    ArtifactRenderer, BatchSource, Decoder, LabelMapper, OutputLocation, RenderRequest,
};
pub use render::HeatmapRenderer;
pub use types::{AlignmentRecord, Batch, DecodeResult, Reference, RunSummary};
