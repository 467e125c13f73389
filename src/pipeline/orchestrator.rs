/*!
 * The run state machine.
 *
 * UPLOADED -> EXTRACTED -> JSON_GENERATED -> TEMPLATE_WRITTEN -> RENDERED
 * -> PUBLISHED, failing out of any step. Every artifact a run produces is
 * written under `<work_dir>/<run id>/`.
 */

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{Config, GenerationProvider, TranscriptionMode};
use crate::errors::{PipelineError, RepairError};
use crate::file_utils::{FileManager, VideoFormat};
use crate::pipeline::prompts;
use crate::pipeline::review::{self, PythonSyntaxChecker, SyntaxChecker};
use crate::providers::{Gemini, GenerationRequest, MockProvider, Provider};
use crate::renderer::{ManimRenderer, RenderJob, Renderer};
use crate::scene::{
    ManimScript, SceneDescriptor, SceneRecord, extract_slides, normalize_record, repair_scene_record,
    select_for_scene,
};

/// Completed step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Uploaded,
    Extracted,
    JsonGenerated,
    TemplateWritten,
    Rendered,
    Published,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uploaded => "uploaded",
            Self::Extracted => "extracted",
            Self::JsonGenerated => "json_generated",
            Self::TemplateWritten => "template_written",
            Self::Rendered => "rendered",
            Self::Published => "published",
        };
        f.write_str(name)
    }
}

/// Repair raw service output and turn it into a script, without any I/O
pub fn compose_script(raw_response: &str, scene_name: &str) -> Result<(SceneRecord, ManimScript), RepairError> {
    let mut record = repair_scene_record(raw_response)?;
    normalize_record(&mut record);

    let descriptor = SceneDescriptor::build_named(&record, scene_name);
    let script = ManimScript::render(&descriptor);

    Ok((record, script))
}

/// One pipeline wired to its collaborators; shared by every run
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    provider: Arc<dyn Provider>,
    renderer: Arc<dyn Renderer>,
    checker: Arc<dyn SyntaxChecker>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        provider: Arc<dyn Provider>,
        renderer: Arc<dyn Renderer>,
        checker: Arc<dyn SyntaxChecker>,
    ) -> Self {
        Self {
            config,
            provider,
            renderer,
            checker,
        }
    }

    /// Wire the production collaborators described by the configuration
    pub fn from_config(config: Config) -> Self {
        let provider: Arc<dyn Provider> = match config.provider.provider_type {
            GenerationProvider::Gemini => Arc::new(Gemini::from_config(&config.provider)),
            GenerationProvider::Mock => Arc::new(MockProvider::echo()),
        };
        let renderer = Arc::new(ManimRenderer::new(config.renderer.clone()));
        let checker = Arc::new(PythonSyntaxChecker::new(config.renderer.python.clone()));

        Self::new(config, provider, renderer, checker)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.config.pipeline.work_dir.join(run_id)
    }

    /// Execute every stage for one uploaded video and return the published path.
    pub async fn run<F>(&self, run_id: &str, video_path: &Path, on_stage: F) -> Result<PathBuf, PipelineError>
    where
        F: Fn(RunStage) + Send + Sync,
    {
        let run_dir = self.run_dir(run_id);
        FileManager::ensure_dir(&run_dir).map_err(io_error)?;
        info!("Run {} processing {:?}", run_id, video_path);

        let format = video_path
            .file_name()
            .and_then(|name| VideoFormat::from_file_name(&name.to_string_lossy()))
            .ok_or_else(|| PipelineError::UploadRejected(format!("Unsupported video file: {:?}", video_path)))?;
        let video = tokio::fs::read(video_path).await?;

        let context = self.transcribe(&video, format, &run_dir).await?;
        mark_stage(&run_dir, RunStage::Extracted, &on_stage);

        let raw_response = self.request_scene_record(&context).await?;
        write_artifact(&run_dir.join("scene_response.txt"), &raw_response)?;
        let (record, script) = compose_script(&raw_response, &self.config.renderer.scene_name)?;
        debug!("Run {} scene '{}' has {} element(s)", run_id, record.title, record.elements.len());
        mark_stage(&run_dir, RunStage::JsonGenerated, &on_stage);

        let source = self.finalize_script(script).await?;
        let script_path = run_dir.join(script_file_name(run_id));
        write_artifact(&script_path, &source)?;
        mark_stage(&run_dir, RunStage::TemplateWritten, &on_stage);

        let job = RenderJob {
            run_id: run_id.to_string(),
            script_path,
        };
        let produced = self.renderer.render(&job).await?;
        mark_stage(&run_dir, RunStage::Rendered, &on_stage);

        let published = FileManager::processed_path(&self.config.server.processed_dir, run_id);
        FileManager::move_file(&produced, &published).map_err(io_error)?;
        mark_stage(&run_dir, RunStage::Published, &on_stage);

        info!("Run {} published {:?}", run_id, published);
        Ok(published)
    }

    /// Transcribe the video and return the context for scene generation
    async fn transcribe(&self, video: &[u8], format: VideoFormat, run_dir: &Path) -> Result<String, PipelineError> {
        let provider = &self.config.provider;

        let request = GenerationRequest::new(&provider.transcription_model)
            .media(format.mime_type(), video.to_vec())
            .text(prompts::slide_transcription_prompt())
            .temperature(provider.temperature);
        let transcript = self.provider.complete(request).await?.text;
        write_artifact(&run_dir.join("transcript.txt"), &transcript)?;

        let slides = extract_slides(&transcript);
        info!("Extracted {} slide(s)", slides.len());
        let selected =
            select_for_scene(&slides, self.config.pipeline.slide_selection).ok_or(PipelineError::ExtractionEmpty)?;

        match self.config.pipeline.transcription_mode {
            TranscriptionMode::Visual => Ok(selected),
            TranscriptionMode::VisualAndSpeech => {
                let request = GenerationRequest::new(&provider.transcription_model)
                    .media(format.mime_type(), video.to_vec())
                    .text(prompts::speech_transcription_prompt())
                    .temperature(provider.temperature);
                let speech = self.provider.complete(request).await?.text;
                write_artifact(&run_dir.join("speech.txt"), &speech)?;

                Ok(prompts::combined_context(&selected, speech.trim()))
            }
        }
    }

    async fn request_scene_record(&self, context: &str) -> Result<String, PipelineError> {
        let provider = &self.config.provider;
        let request = GenerationRequest::new(&provider.generation_model)
            .text(prompts::scene_record_prompt(context))
            .temperature(provider.temperature);

        Ok(self.provider.complete(request).await?.text)
    }

    /// Optional LaTeX review followed by the bounded syntax loop
    pub async fn finalize_script(&self, script: ManimScript) -> Result<String, PipelineError> {
        let model = &self.config.provider.review_model;
        let mut source = script.into_string();

        if self.config.pipeline.latex_review {
            source = review::review_latex(source, self.provider.as_ref(), model).await?;
        }

        review::ensure_valid_syntax(
            source,
            self.checker.as_ref(),
            self.provider.as_ref(),
            model,
            self.config.pipeline.max_syntax_attempts,
        )
        .await
    }
}

/// Per-run script name, so concurrent renders never share an output folder
pub fn script_file_name(run_id: &str) -> String {
    format!("scene_{}.py", run_id.replace('-', "_"))
}

/// Report a stage to the caller and append it to the run's own log
fn mark_stage<F: Fn(RunStage)>(run_dir: &Path, stage: RunStage, on_stage: &F) {
    on_stage(stage);
    if let Err(e) = FileManager::append_to_log_file(run_dir.join("run.log"), &format!("stage {}", stage)) {
        warn!("Failed to append to run log: {}", e);
    }
}

fn write_artifact(path: &Path, content: &str) -> Result<(), PipelineError> {
    FileManager::write_to_file(path, content).map_err(io_error)
}

fn io_error(error: anyhow::Error) -> PipelineError {
    PipelineError::Io(error.to_string())
}
