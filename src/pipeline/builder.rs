use std::path::Path;

use crate::config::VisualizationConfig;
use crate::error::VisualizationError;
use crate::labels::SymbolTable;
use crate::pipeline::output::DirectoryOutput;
use crate::pipeline::runtime::{AlignmentPipeline, AlignmentPipelineParts, ArtifactCallback};
use crate::pipeline::traits::{ArtifactRenderer, LabelMapper, OutputLocation};
use crate::render::HeatmapRenderer;

pub struct AlignmentPipelineBuilder {
    config: VisualizationConfig,
    label_mapper: Option<Box<dyn LabelMapper>>,
    renderer: Option<Box<dyn ArtifactRenderer>>,
    output: Option<Box<dyn OutputLocation>>,
    on_artifact: Option<ArtifactCallback>,
}

impl AlignmentPipelineBuilder {
    pub fn new(config: VisualizationConfig) -> Self {
        Self {
            config,
            label_mapper: None,
            renderer: None,
            output: None,
            on_artifact: None,
        }
    }

    pub fn with_label_mapper(mut self, label_mapper: Box<dyn LabelMapper>) -> Self {
        self.label_mapper = Some(label_mapper);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ArtifactRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_output_location(mut self, output: Box<dyn OutputLocation>) -> Self {
        self.output = Some(output);
        self
    }

    /// Called with the input name and image path after each render.
    pub fn with_artifact_callback(mut self, on_artifact: ArtifactCallback) -> Self {
        self.on_artifact = Some(on_artifact);
        self
    }

    pub fn build(self) -> Result<AlignmentPipeline, VisualizationError> {
        if self.config.max_decode_len == 0 {
            return Err(VisualizationError::invalid_input(
                "max_decode_len must be at least 1",
            ));
        }
        if self.config.eval_batch_size == Some(0) {
            return Err(VisualizationError::invalid_input(
                "eval_batch_size must be at least 1",
            ));
        }

        let label_mapper = match self.label_mapper {
            Some(label_mapper) => label_mapper,
            None => Box::new(SymbolTable::load(
                Path::new(&self.config.vocab_path),
                self.config.eos_symbol.as_deref(),
            )?),
        };
        let output = self.output.unwrap_or_else(|| {
            Box::new(DirectoryOutput::new(
                self.config.save_dir.clone(),
                self.config.image_suffix.clone(),
            ))
        });

        Ok(AlignmentPipeline::from_parts(AlignmentPipelineParts {
            config: self.config,
            label_mapper,
            renderer: self
                .renderer
                .unwrap_or_else(|| Box::new(HeatmapRenderer::default())),
            output,
            on_artifact: self.on_artifact,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_on_missing_vocab() {
        let config = VisualizationConfig {
            vocab_path: "/nonexistent/vocab.txt".into(),
            ..VisualizationConfig::default()
        };
        let result = AlignmentPipelineBuilder::new(config).build();
        assert!(matches!(result, Err(VisualizationError::Io { .. })));
    }

    #[test]
    fn build_with_injected_mapper_skips_vocab() {
        let mapper = SymbolTable::new(vec!["a".to_string()], None);
        let pipeline = AlignmentPipelineBuilder::new(VisualizationConfig::default())
            .with_label_mapper(Box::new(mapper))
            .build()
            .expect("build should succeed");
        assert_eq!(pipeline.config().max_decode_len, 40);
    }

    #[test]
    fn build_rejects_zero_batch_size() {
        let config = VisualizationConfig {
            eval_batch_size: Some(0),
            ..VisualizationConfig::default()
        };
        let result = AlignmentPipelineBuilder::new(config)
            .with_label_mapper(Box::new(SymbolTable::new(vec![], None)))
            .build();
        assert!(matches!(result, Err(VisualizationError::InvalidInput { .. })));
    }

    #[test]
    fn build_rejects_zero_max_decode_len() {
        let config = VisualizationConfig {
            max_decode_len: 0,
            ..VisualizationConfig::default()
        };
        let result = AlignmentPipelineBuilder::new(config)
            .with_label_mapper(Box::new(SymbolTable::new(vec![], None)))
            .build();
        assert!(result.is_err());
    }
}
