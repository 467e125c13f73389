/*!
 * Renderer invocation.
 *
 * Runs Manim as a child process, forwards its output to the log line by
 * line while it runs, enforces a wall-clock timeout, then locates the
 * produced video.
 */

use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::app_config::RendererConfig;
use crate::errors::PipelineError;
use crate::file_utils::FileManager;

/// Lines of stderr kept for the failure message
const STDERR_TAIL_LINES: usize = 8;

/// One render of one script
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub run_id: String,
    pub script_path: PathBuf,
}

impl RenderJob {
    /// First eight characters of the run id, used as log prefix
    pub fn short_id(&self) -> &str {
        self.run_id.get(..8).unwrap_or(&self.run_id)
    }
}

/// Something that turns a script file into a video
#[async_trait]
pub trait Renderer: Send + Sync + Debug {
    /// Render the job's script and return the produced video's path
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, PipelineError>;
}

/// `python3 -m manim` driven renderer
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    config: RendererConfig,
}

impl ManimRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Arguments after the interpreter
    pub fn command_args(&self, script_path: &Path) -> Vec<String> {
        vec![
            "-m".to_string(),
            "manim".to_string(),
            self.config.quality.flag().to_string(),
            "--media_dir".to_string(),
            self.config.media_dir.to_string_lossy().to_string(),
            script_path.to_string_lossy().to_string(),
            self.config.scene_name.clone(),
        ]
    }

    /// Where Manim writes the video for this script and quality
    pub fn expected_output(&self, script_path: &Path) -> PathBuf {
        let stem = script_path.file_stem().unwrap_or_default();
        self.config
            .media_dir
            .join("videos")
            .join(stem)
            .join(self.config.quality.output_dir_name())
            .join(format!("{}.mp4", self.config.scene_name))
    }

    fn locate_output(&self, script_path: &Path) -> Result<PathBuf, PipelineError> {
        let expected = self.expected_output(script_path);
        if FileManager::file_exists(&expected) {
            return Ok(expected);
        }

        // Scripts are named per run, so their video folder is per run too
        let search_root = self
            .config
            .media_dir
            .join("videos")
            .join(script_path.file_stem().unwrap_or_default());
        debug!("{:?} not found, searching {:?}", expected, search_root);

        let file_name = format!("{}.mp4", self.config.scene_name);
        FileManager::find_file_named(&search_root, &file_name)
            .map_err(|e| PipelineError::Io(e.to_string()))?
            .ok_or_else(|| PipelineError::RenderFailure(format!("Renderer produced no {} under {:?}", file_name, search_root)))
    }
}

/// Log each line as it arrives, keeping the last few
fn forward_lines<R>(reader: R, prefix: String, stream: &'static str) -> JoinHandle<VecDeque<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut lines = BufReader::new(reader).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            info!("[{}] manim {}: {}", prefix, stream, line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        tail
    })
}

#[async_trait]
impl Renderer for ManimRenderer {
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, PipelineError> {
        let prefix = job.short_id().to_string();
        let args = self.command_args(&job.script_path);
        info!("[{}] Running {} {}", prefix, self.config.python, args.join(" "));

        let mut child = Command::new(&self.config.python)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::RenderFailure(format!("Failed to start {}: {}", self.config.python, e)))?;

        let stdout_task = child.stdout.take().map(|out| forward_lines(out, prefix.clone(), "stdout"));
        let stderr_task = child.stderr.take().map(|err| forward_lines(err, prefix.clone(), "stderr"));

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                error!("[{}] Renderer timed out after {} seconds, killing it", prefix, self.config.timeout_secs);
                if let Err(e) = child.kill().await {
                    warn!("[{}] Failed to kill renderer: {}", prefix, e);
                }
                return Err(PipelineError::RenderTimeout(self.config.timeout_secs));
            }
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if !status.success() {
            let detail = stderr_tail.into_iter().collect::<Vec<_>>().join("\n");
            error!("[{}] Renderer exited with {}", prefix, status);
            return Err(PipelineError::RenderFailure(format!("manim exited with {}: {}", status, detail)));
        }

        let produced = self.locate_output(&job.script_path)?;
        info!("[{}] Renderer wrote {:?}", prefix, produced);
        Ok(produced)
    }
}
