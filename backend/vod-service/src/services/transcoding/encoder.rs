//! External encoder process lifecycle
//!
//! Owns command construction, execution, output draining, timeout/kill, and
//! exit-code interpretation for the ffmpeg child process. The combined
//! stdout/stderr output is drained by a task that runs concurrently with the
//! wait-for-exit call: unread output can fill the OS pipe buffer and
//! deadlock the child, so the reader must never start after the wait.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use video_core::constants::{
    AUDIO_BITRATE, DASH_INIT_SEGMENT_TEMPLATE, DASH_MANIFEST_NAME, DASH_MEDIA_SEGMENT_TEMPLATE,
    DASH_SEGMENT_DURATION_SECS,
};
use video_core::VideoQuality;

use crate::config::{DashStrategy, TranscodeConfig};
use crate::error::EncodeError;

/// What one encoder invocation should produce: a single quality or one
/// combined multi-representation output for the whole ladder.
#[derive(Debug, Clone)]
pub enum QualityPlan {
    Single(VideoQuality),
    Ladder(Vec<VideoQuality>),
}

impl QualityPlan {
    /// Qualities that actually go through the encoder (passthrough tiers
    /// are excluded — the source object itself is their artifact)
    pub fn encoded(&self) -> Vec<VideoQuality> {
        match self {
            Self::Single(quality) => [*quality]
                .into_iter()
                .filter(|q| q.resolution().is_some())
                .collect(),
            Self::Ladder(qualities) => qualities
                .iter()
                .copied()
                .filter(|q| q.resolution().is_some())
                .collect(),
        }
    }
}

/// Drives the external encoding tool
pub struct EncodeRunner {
    ffmpeg_bin: String,
    timeout: Duration,
    strategy: DashStrategy,
}

impl EncodeRunner {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            strategy: config.strategy,
        }
    }

    /// Package the input into a segmented DASH output under `output_dir`
    pub async fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        plan: &QualityPlan,
    ) -> Result<(), EncodeError> {
        let qualities = plan.encoded();
        let args = match self.strategy {
            DashStrategy::MappedStreams => build_mapped_command(input, output_dir, &qualities),
            DashStrategy::FilterGraph => build_filter_graph_command(input, output_dir, &qualities),
        };

        debug!(bin = %self.ffmpeg_bin, ?args, "running encoder");
        run_command(&self.ffmpeg_bin, &args, self.timeout, "ffmpeg").await
    }
}

/// Launch a child process, drain its output concurrently, and enforce a
/// wall-clock timeout. On timeout the process is forcibly terminated.
pub async fn run_command(
    bin: &str,
    args: &[String],
    timeout: Duration,
    label: &str,
) -> Result<(), EncodeError> {
    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EncodeError::Spawn(format!("{bin}: {e}")))?;

    let drain = spawn_output_drain(&mut child, label);

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            let _ = drain.await;
            return Err(EncodeError::Spawn(format!("{bin}: {e}")));
        }
        Err(_) => {
            warn!(bin = %bin, ?timeout, "{label} timed out, killing process");
            let _ = child.start_kill();
            let _ = child.wait().await;
            let _ = drain.await;
            return Err(EncodeError::Timeout);
        }
    };

    let _ = drain.await;

    if !status.success() {
        return Err(EncodeError::Exit(status.code().unwrap_or(-1)));
    }
    Ok(())
}

/// Consume the child's stdout and stderr continuously. The handles must be
/// taken before waiting so both pipes drain while the process runs.
fn spawn_output_drain(child: &mut tokio::process::Child, label: &str) -> JoinHandle<()> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let label = label.to_string();

    tokio::spawn(async move {
        let out_label = label.clone();
        let read_stdout = async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{out_label}: {line}");
                }
            }
        };
        let read_stderr = async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{label}: {line}");
                }
            }
        };
        tokio::join!(read_stdout, read_stderr);
    })
}

/// Strategy (a): map the video stream N times, assign each copy its own
/// bitrate and scale, no filter graph.
pub fn build_mapped_command(
    input: &Path,
    output_dir: &Path,
    qualities: &[VideoQuality],
) -> Vec<String> {
    let mut cmd: Vec<String> = Vec::new();

    cmd.push("-y".into());
    cmd.push("-i".into());
    cmd.push(input.display().to_string());

    for _ in qualities {
        cmd.push("-map".into());
        cmd.push("0:v:0".into());
    }

    cmd.push("-c:v".into());
    cmd.push("libx264".into());
    cmd.push("-preset".into());
    cmd.push("fast".into());
    cmd.push("-profile:v".into());
    cmd.push("main".into());

    for (i, quality) in qualities.iter().enumerate() {
        cmd.push(format!("-b:v:{i}"));
        cmd.push(quality.bitrate().unwrap_or_default().into());
        cmd.push(format!("-s:v:{i}"));
        cmd.push(quality.resolution().unwrap_or_default().into());
        cmd.push(format!("-filter:v:{i}"));
        cmd.push("setsar=1".into());
    }

    push_gop_alignment(&mut cmd);
    push_audio(&mut cmd);
    push_dash_packaging(&mut cmd, output_dir);

    cmd
}

/// Strategy (b): one filter graph splitting the decoded video into N
/// branches, each scaled to its target resolution.
pub fn build_filter_graph_command(
    input: &Path,
    output_dir: &Path,
    qualities: &[VideoQuality],
) -> Vec<String> {
    let mut cmd: Vec<String> = Vec::new();

    cmd.push("-y".into());
    cmd.push("-i".into());
    cmd.push(input.display().to_string());

    let mut filter = format!("[0:v]split={}", qualities.len());
    for i in 0..qualities.len() {
        filter.push_str(&format!("[v{i}]"));
    }
    for (i, quality) in qualities.iter().enumerate() {
        let scale = quality.resolution().unwrap_or_default().replace('x', ":");
        filter.push_str(&format!(";[v{i}]scale={scale},setsar=1[v{i}out]"));
    }

    cmd.push("-filter_complex".into());
    cmd.push(filter);

    for (i, quality) in qualities.iter().enumerate() {
        cmd.push("-map".into());
        cmd.push(format!("[v{i}out]"));
        cmd.push(format!("-c:v:{i}"));
        cmd.push("libx264".into());
        cmd.push(format!("-b:v:{i}"));
        cmd.push(quality.bitrate().unwrap_or_default().into());
    }

    cmd.push("-profile:v".into());
    cmd.push("main".into());
    push_gop_alignment(&mut cmd);
    push_audio(&mut cmd);
    push_dash_packaging(&mut cmd, output_dir);

    cmd
}

/// Aligned GOPs across representations so segment boundaries match
fn push_gop_alignment(cmd: &mut Vec<String>) {
    cmd.push("-g".into());
    cmd.push("48".into());
    cmd.push("-keyint_min".into());
    cmd.push("48".into());
    cmd.push("-sc_threshold".into());
    cmd.push("0".into());
}

/// Audio is mapped once and encoded independently of video quality
fn push_audio(cmd: &mut Vec<String>) {
    cmd.push("-map".into());
    cmd.push("0:a?".into());
    cmd.push("-c:a".into());
    cmd.push("aac".into());
    cmd.push("-b:a".into());
    cmd.push(AUDIO_BITRATE.into());
}

fn push_dash_packaging(cmd: &mut Vec<String>, output_dir: &Path) {
    cmd.push("-f".into());
    cmd.push("dash".into());
    cmd.push("-seg_duration".into());
    cmd.push(DASH_SEGMENT_DURATION_SECS.to_string());
    cmd.push("-use_template".into());
    cmd.push("1".into());
    cmd.push("-use_timeline".into());
    cmd.push("1".into());
    cmd.push("-init_seg_name".into());
    cmd.push(DASH_INIT_SEGMENT_TEMPLATE.into());
    cmd.push("-media_seg_name".into());
    cmd.push(DASH_MEDIA_SEGMENT_TEMPLATE.into());
    cmd.push("-adaptation_sets".into());
    cmd.push("id=0,streams=v id=1,streams=a".into());
    cmd.push(output_dir.join(DASH_MANIFEST_NAME).display().to_string());
}

/// Remove a temp tree, deepest paths first, so directories are empty by the
/// time they are deleted. Individual failures are logged, not escalated.
pub fn remove_tree_logged(root: &Path) {
    if !root.exists() {
        return;
    }

    let mut paths = Vec::new();
    collect_paths(root, &mut paths);
    paths.sort();
    paths.reverse();

    for path in paths {
        let result = if path.is_dir() {
            std::fs::remove_dir(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to delete temp path");
        }
    }

    if let Err(e) = std::fs::remove_dir(root) {
        warn!(path = %root.display(), error = %e, "failed to delete temp directory");
    }
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_paths(&path, out);
        }
        out.push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<VideoQuality> {
        VideoQuality::ladder().to_vec()
    }

    #[test]
    fn test_mapped_command_shape() {
        let cmd = build_mapped_command(
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out"),
            &ladder(),
        );

        let maps = cmd.iter().filter(|a| *a == "0:v:0").count();
        assert_eq!(maps, 4);
        assert!(cmd.contains(&"-b:v:0".to_string()));
        assert!(cmd.contains(&"5000k".to_string()));
        assert!(cmd.contains(&"-s:v:3".to_string()));
        assert!(cmd.contains(&"640x360".to_string()));
        assert!(cmd.contains(&"-f".to_string()));
        assert!(cmd.contains(&"dash".to_string()));
        assert!(cmd.last().unwrap().ends_with("manifest.mpd"));
    }

    #[test]
    fn test_filter_graph_command_shape() {
        let cmd = build_filter_graph_command(
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out"),
            &ladder(),
        );

        let filter_pos = cmd.iter().position(|a| a == "-filter_complex").unwrap();
        let filter = &cmd[filter_pos + 1];
        assert!(filter.starts_with("[0:v]split=4"));
        assert!(filter.contains("scale=1920:1080"));
        assert!(filter.contains("scale=640:360"));
        assert!(filter.contains("[v3out]"));

        assert!(cmd.contains(&"[v0out]".to_string()));
        assert!(cmd.contains(&"-adaptation_sets".to_string()));
        assert!(cmd.contains(&"-seg_duration".to_string()));
        assert!(cmd.contains(&"10".to_string()));
    }

    #[test]
    fn test_audio_is_mapped_once() {
        for cmd in [
            build_mapped_command(Path::new("in"), Path::new("out"), &ladder()),
            build_filter_graph_command(Path::new("in"), Path::new("out"), &ladder()),
        ] {
            let audio_maps = cmd.iter().filter(|a| *a == "0:a?").count();
            assert_eq!(audio_maps, 1);
            assert!(cmd.contains(&"aac".to_string()));
            assert!(cmd.contains(&"128k".to_string()));
        }
    }

    #[test]
    fn test_plan_excludes_passthrough_tiers() {
        let plan = QualityPlan::Single(VideoQuality::Original);
        assert!(plan.encoded().is_empty());

        let plan = QualityPlan::Ladder(vec![VideoQuality::Original, VideoQuality::Q720p]);
        assert_eq!(plan.encoded(), vec![VideoQuality::Q720p]);
    }

    #[tokio::test]
    async fn test_run_command_success() {
        let result = run_command("true", &[], Duration::from_secs(5), "test").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let args = vec!["-c".to_string(), "exit 7".to_string()];
        let result = run_command("sh", &args, Duration::from_secs(5), "test").await;
        assert_eq!(result, Err(EncodeError::Exit(7)));
    }

    #[tokio::test]
    async fn test_run_command_timeout_kills_child() {
        let args = vec!["5".to_string()];
        let started = std::time::Instant::now();
        let result = run_command("sleep", &args, Duration::from_millis(200), "test").await;
        assert_eq!(result, Err(EncodeError::Timeout));
        // the child was killed rather than waited out
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_command_spawn_failure() {
        let result = run_command(
            "/nonexistent/encoder-bin",
            &[],
            Duration::from_secs(1),
            "test",
        )
        .await;
        assert!(matches!(result, Err(EncodeError::Spawn(_))));
    }

    #[test]
    fn test_remove_tree_logged_deletes_nested_dirs() {
        let root = tempfile::tempdir().unwrap().into_path();
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("chunk-0-1.m4s"), b"segment").unwrap();
        std::fs::write(root.join("manifest.mpd"), b"manifest").unwrap();

        remove_tree_logged(&root);
        assert!(!root.exists());
    }
}
