use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::audio::graph::AudioGraph;
use crate::audio::media::MediaElement;
use crate::audio::output::{OutputContext, StreamMedia};
use crate::audio::sampler::FrequencySampler;
use crate::config::{AnalyserConfig, VisualizerConfig};
use crate::encode::ffmpeg::FfmpegRecorder;
use crate::player::controller::PlaybackController;
use crate::playlist::Playlist;
use crate::render::frame_loop::FrameLoop;
use crate::render::surface::Surface;
use crate::render::terminal::{Command, TerminalPresenter};
use crate::render::visualizer::Visualizer;

/// Everything the session needs besides the playlist, already merged from
/// CLI flags and the config file.
pub struct SessionOptions {
    pub visualizer: VisualizerConfig,
    pub analyser: AnalyserConfig,
    pub autoplay: bool,
    pub volume: f32,
    pub headless: bool,
    pub frame_limit: Option<u64>,
    pub record: Option<PathBuf>,
}

fn limit_reached(frames_run: u64, limit: Option<u64>) -> bool {
    limit.is_some_and(|limit| frames_run >= limit)
}

/// Finish the recording whatever the frame loop returned. An error from
/// the loop takes precedence over one from the recorder.
fn close_recording(outcome: Result<u64>, recorder: Option<FfmpegRecorder>) -> Result<u64> {
    let finished = match recorder {
        Some(recorder) => recorder.finish(),
        None => Ok(()),
    };
    match (outcome, finished) {
        (Ok(frames), Ok(())) => Ok(frames),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(finish_err)) => {
            log::warn!("Recording not finalised: {:#}", finish_err);
            Err(err)
        }
    }
}

/// Run the player until the user quits or the frame limit is hit.
pub fn run(playlist: Playlist, options: SessionOptions) -> Result<()> {
    log::info!("Playlist: {} tracks", playlist.len());
    for (i, track) in playlist.tracks().iter().enumerate() {
        log::debug!("  [{}] {} - {} ({})", i, track.title, track.artist, track.source);
    }

    let media = StreamMedia::new(options.volume);
    let context = match OutputContext::new(&media) {
        Ok(context) => Some(context),
        Err(err) => {
            log::warn!("Audio output unavailable, running without sound: {}", err);
            None
        }
    };

    // No output context means nothing to analyse; the visualizer stays idle.
    let mut graph = match &context {
        Some(context) => Some(
            AudioGraph::new(context, &options.analyser).context("Invalid analyser settings")?,
        ),
        None => None,
    };

    let mut controller = PlaybackController::new(playlist, media, context);
    controller.start(graph.as_mut(), options.autoplay);
    match &graph {
        Some(graph) => log::debug!(
            "Analysis graph connected: {} ({} bins)",
            graph.is_connected(),
            graph.analyser().frequency_bin_count()
        ),
        None if controller.context().is_none() => log::info!("No audio output; bars stay idle"),
        None => {}
    }

    let vis = &options.visualizer;
    let visualizer = Visualizer::new(vis);
    log::info!(
        "Visualizer: {} bars on {}x{} @ {}fps",
        visualizer.bar_count(),
        vis.width,
        vis.height,
        vis.fps
    );
    let mut sampler = FrequencySampler::new();
    let mut surface = Surface::new(vis.width, vis.height);

    let mut presenter = if options.headless {
        None
    } else {
        Some(TerminalPresenter::new(vis.background)?)
    };
    let mut recorder = match &options.record {
        Some(path) => Some(FfmpegRecorder::new(path, vis.width, vis.height, vis.fps)?),
        None => None,
    };

    let progress = match (options.headless, options.frame_limit) {
        (true, Some(limit)) => {
            let pb = ProgressBar::new(limit);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.magenta/white} {pos}/{len} frames {msg}")?
                    .progress_chars("=>-"),
            );
            Some(pb)
        }
        _ => None,
    };

    let frame_loop = FrameLoop::new(vis.fps);
    log::debug!("Frame interval: {:?}", frame_loop.interval());
    let stop = frame_loop.stop_signal();
    let fps = u64::from(vis.fps.max(1));

    let outcome = frame_loop.run(|tick| {
        if let Some(presenter) = presenter.as_mut() {
            for command in presenter.poll_commands()? {
                match command {
                    Command::Toggle => {
                        controller.toggle();
                    }
                    Command::Next => {
                        controller.next(graph.as_mut());
                    }
                    Command::Quit => stop.dispose(),
                }
            }
        }

        controller.pump_events(graph.as_mut());
        let sample = sampler.tick(graph.as_mut());
        visualizer.draw(Some(&mut surface), sample);

        let now = controller.now_playing();
        if let Some(presenter) = presenter.as_mut() {
            let notice = controller.last_error().map(|err| err.to_string());
            presenter.present(&surface, &now, notice.as_deref())?;
        }
        if let Some(recorder) = recorder.as_mut() {
            recorder.write_frame(&surface.flatten(vis.background))?;
        }
        if let Some(pb) = &progress {
            pb.set_position(tick.index + 1);
            pb.set_message(now.title.clone());
        }
        if tick.index % fps == 0 {
            log::debug!(
                "{:.1}s: {} {} {:.1}%",
                tick.elapsed.as_secs_f32(),
                now.icon.glyph(),
                now.title,
                now.progress_percent
            );
        }

        if limit_reached(tick.index + 1, options.frame_limit) {
            stop.dispose();
        }
        Ok(())
    });

    // Leave the alternate screen before anything else is printed.
    drop(presenter);
    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }
    let frames_run = close_recording(outcome, recorder)?;

    log::info!(
        "Session ended after {} frames on track {} of {} at {:.1}s",
        frames_run,
        controller.state().current_index + 1,
        controller.playlist().len(),
        controller.media().current_time()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_limit_runs_forever() {
        assert!(!limit_reached(1_000_000, None));
    }

    #[test]
    fn limit_is_inclusive() {
        assert!(!limit_reached(9, Some(10)));
        assert!(limit_reached(10, Some(10)));
    }

    #[cfg(unix)]
    #[test]
    fn failed_loop_still_finishes_recording() {
        use std::process::Command;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames.raw");
        let script = format!("cat > '{}'", out.display());
        let mut recorder = FfmpegRecorder::spawn(Command::new("sh").args(["-c", &script]), 4).unwrap();
        recorder.write_frame(&[1, 2, 3, 4]).unwrap();

        let result = close_recording(Err(anyhow::anyhow!("terminal went away")), Some(recorder));
        assert_eq!(result.unwrap_err().to_string(), "terminal went away");
        assert_eq!(std::fs::read(&out).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn clean_loop_without_recorder_reports_frames() {
        assert_eq!(close_recording(Ok(42), None).unwrap(), 42);
    }
}
