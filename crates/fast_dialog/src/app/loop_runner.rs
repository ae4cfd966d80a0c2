use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use dialogue_core::{
    AdvanceInput, ControlCommand, ControlOutcome, ControlProcessor, CycleOutcome, DialogueConfig,
    PollingDecisionLoop, SceneGraph,
};
use tracing::{error, info};

use super::advance::LoggingAdvancer;
use super::bootstrap::AppWiring;
use super::control_port::ControlPort;
use super::scene_source::FileSceneSource;

const LOOP_FPS: u32 = 30;
const SCENE_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Decision loop plus the command surface and advancer it drives.
pub(crate) struct Session {
    decision_loop: PollingDecisionLoop,
    processor: ControlProcessor,
    advancer: LoggingAdvancer,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LineResult {
    pub(crate) replies: Vec<String>,
    pub(crate) quit: bool,
}

impl Session {
    pub(crate) fn new(config: DialogueConfig, input: AdvanceInput, now: Instant) -> Self {
        Self {
            decision_loop: PollingDecisionLoop::new(config, now),
            processor: ControlProcessor::new(),
            advancer: LoggingAdvancer::new(input),
        }
    }

    pub(crate) fn start(&mut self, now: Instant) -> bool {
        self.decision_loop.start(now, &mut self.advancer)
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.decision_loop.is_polling()
    }

    pub(crate) fn handle_line(
        &mut self,
        line: &str,
        now: Instant,
        graph: &dyn SceneGraph,
    ) -> LineResult {
        match self.processor.process_line(line) {
            ControlOutcome::Reply(replies) => LineResult {
                replies,
                quit: false,
            },
            ControlOutcome::Command(command) => {
                info!(line = line.trim(), "control_command_received");
                let replies = self
                    .decision_loop
                    .apply_command(command, now, graph, &mut self.advancer);
                LineResult {
                    replies,
                    quit: command == ControlCommand::Quit,
                }
            }
        }
    }

    pub(crate) fn tick(&mut self, now: Instant, graph: &dyn SceneGraph) -> Option<CycleOutcome> {
        self.decision_loop.update(now, graph, &mut self.advancer)
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<String>) {
        self.advancer.drain_events_into(out);
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut scene = match FileSceneSource::open(&app.scene_path) {
        Ok(scene) => scene,
        Err(error) => {
            error!(error = %error, "scene_load_failed");
            return ExitCode::FAILURE;
        }
    };
    let mut control = ControlPort::initialize(app.control);

    let started = Instant::now();
    let mut session = Session::new(app.config, app.input, started);
    if app.autostart || !control.is_enabled() {
        session.start(started);
    }

    let frame_target = target_frame_duration(Some(LOOP_FPS));
    let mut last_refresh = started;
    let mut pending_lines = Vec::new();
    let mut events = Vec::new();
    info!(fps = LOOP_FPS, polling = session.is_polling(), "loop_started");

    loop {
        let frame_start = Instant::now();

        if frame_start.saturating_duration_since(last_refresh) >= SCENE_REFRESH_INTERVAL {
            scene.refresh();
            last_refresh = frame_start;
        }

        pending_lines.clear();
        control.poll_lines(&mut pending_lines);
        let mut quit = false;
        for line in &pending_lines {
            let result = session.handle_line(line, frame_start, scene.tree());
            control.send_replies(&result.replies);
            quit |= result.quit;
        }
        if quit {
            info!("shutdown_requested");
            break;
        }

        session.tick(frame_start, scene.tree());

        events.clear();
        session.drain_events_into(&mut events);
        for event in &events {
            control.send_event(event);
        }

        let sleep = compute_cap_sleep(frame_start.elapsed(), frame_target);
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }

    info!("loop_stopped");
    ExitCode::SUCCESS
}

fn target_frame_duration(fps: Option<u32>) -> Option<Duration> {
    fps.filter(|value| *value > 0).map(|value| Duration::from_secs_f64(1.0 / value as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}
