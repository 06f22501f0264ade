use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::surface::frame_len;

/// Pipes raw RGBA visualizer frames into an `ffmpeg` child process.
pub struct FfmpegRecorder {
    child: Child,
    frame_len: usize,
}

pub fn recorder_args(output_path: &Path, width: u32, height: u32, fps: u32) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", width, height),
        "-framerate".into(), fps.to_string(),
        "-i".into(), "pipe:0".into(),
        // yuv420p needs even dimensions
        "-vf".into(), "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        "-c:v".into(), "libx264".into(),
        "-pix_fmt".into(), "yuv420p".into(),
        output_path.to_string_lossy().into_owned(),
    ]
}

impl FfmpegRecorder {
    pub fn new(output_path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let recorder = Self::spawn(
            Command::new("ffmpeg").args(recorder_args(output_path, width, height, fps)),
            frame_len(width, height),
        )
        .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "Recording {}x{} @ {}fps to {}",
            width,
            height,
            fps,
            output_path.display()
        );

        Ok(recorder)
    }

    /// Start `command` with frames piped to its stdin.
    pub fn spawn(command: &mut Command, frame_len: usize) -> std::io::Result<Self> {
        let child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Self { child, frame_len })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_len {
            anyhow::bail!(
                "Frame is {} bytes, recorder expects {}",
                rgba_pixels.len(),
                self.frame_len
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("Recording complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_describe_raw_rgba_input() {
        let args = recorder_args(Path::new("out.mp4"), 110, 28, 60);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pixel_format rgba -video_size 110x28 -framerate 60"));
        assert!(joined.contains("-i pipe:0"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_wrong_frame_size() {
        let mut recorder = FfmpegRecorder::spawn(Command::new("sh").args(["-c", "cat > /dev/null"]), 8).unwrap();
        assert!(recorder.write_frame(&[0; 4]).is_err());
        recorder.write_frame(&[0; 8]).unwrap();
        recorder.finish().unwrap();
    }
}
