use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::DialogueConfig;
use crate::control::ControlCommand;
use crate::dialogue::{
    describe_character, log_scan_report, scan_characters, shorten, CharacterInfo, ScanResult,
};
use crate::scene::SceneGraph;

use super::advance::Advancer;
use super::decision::{decide, Decision};
use super::state::PollState;
use super::stats::{PollStatsAccumulator, PollTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceStatus {
    NotRequested,
    Sent,
    /// Same state was already advanced inside the re-arm window.
    Debounced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub decision: Decision,
    pub advance: AdvanceStatus,
    pub characters: usize,
    pub failures: usize,
}

/// What a character looked like when it was last advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StateFingerprint {
    character: String,
    talks: Vec<(String, bool)>,
    quest: Option<String>,
    emoji: Option<String>,
}

impl StateFingerprint {
    fn of(info: &CharacterInfo) -> Self {
        Self {
            character: info.name.clone(),
            talks: info
                .talks
                .iter()
                .map(|talk| (talk.text.clone(), talk.is_typing))
                .collect(),
            quest: info.quest.as_ref().map(|quest| quest.show_name().to_string()),
            emoji: info
                .emoji
                .as_ref()
                .map(|emoji| emoji.animation_name().to_string()),
        }
    }
}

#[derive(Debug)]
struct LastAdvance {
    fingerprint: StateFingerprint,
    at: Instant,
}

/// Scan, decide and advance on a fixed cadence while polling.
///
/// `update` is cheap to call every frame; it only works once per interval.
#[derive(Debug)]
pub struct PollingDecisionLoop {
    config: DialogueConfig,
    interval: Duration,
    state: PollState,
    last_advance: Option<LastAdvance>,
    stats: PollStatsAccumulator,
}

impl PollingDecisionLoop {
    pub fn new(config: DialogueConfig, now: Instant) -> Self {
        let interval = config.poll.interval();
        let stats = PollStatsAccumulator::new(config.poll.stats_log_interval(), now);
        Self {
            config,
            interval,
            state: PollState::Idle,
            last_advance: None,
            stats,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_polling(&self) -> bool {
        self.state.is_polling()
    }

    pub fn totals(&self) -> PollTotals {
        self.stats.totals()
    }

    /// `Idle -> Polling`. Returns `false` if already polling.
    pub fn start(&mut self, now: Instant, advancer: &mut dyn Advancer) -> bool {
        if self.state.is_polling() {
            debug!("poll_start_ignored_already_polling");
            return false;
        }
        if let Err(error) = advancer.prepare() {
            warn!(error = %error, "advance_prepare_failed");
        }
        self.state = PollState::Polling { last_cycle: None };
        self.last_advance = None;
        self.stats.reset_window(now);
        info!(interval_ms = self.interval.as_millis() as u64, "poll_started");
        true
    }

    /// `Polling -> Idle`. Returns `false` if already idle.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_polling() {
            debug!("poll_stop_ignored_already_idle");
            return false;
        }
        self.state = PollState::Idle;
        self.last_advance = None;
        info!("poll_stopped");
        true
    }

    /// Runs one cycle if polling and the interval has elapsed.
    pub fn update(
        &mut self,
        now: Instant,
        graph: &dyn SceneGraph,
        advancer: &mut dyn Advancer,
    ) -> Option<CycleOutcome> {
        let PollState::Polling { last_cycle } = self.state else {
            return None;
        };
        if let Some(last) = last_cycle {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.state = PollState::Polling {
            last_cycle: Some(now),
        };

        let outcome = self.run_cycle(now, graph, advancer);

        if let Some(snapshot) = self.stats.maybe_snapshot(now) {
            info!(
                cycles = snapshot.cycles,
                advances = snapshot.advances,
                debounced = snapshot.debounced,
                advance_failures = snapshot.advance_failures,
                aggregation_failures = snapshot.aggregation_failures,
                avg_scan_ms = snapshot.avg_scan_ms,
                cycles_per_sec = snapshot.cycles_per_sec,
                "poll_stats"
            );
        }
        Some(outcome)
    }

    fn run_cycle(
        &mut self,
        now: Instant,
        graph: &dyn SceneGraph,
        advancer: &mut dyn Advancer,
    ) -> CycleOutcome {
        let result = scan_characters(graph, &self.config.scan);
        self.stats.record_cycle(result.elapsed, result.failures.len());

        let decision = decide(&result);
        let advance = match &decision {
            Decision::Advance { character, reason } => match result.get(character) {
                Some(info) => {
                    debug!(character = %character, reason = %reason, "advance_decided");
                    self.try_advance(now, info, advancer)
                }
                None => AdvanceStatus::NotRequested,
            },
            Decision::WaitForPlayer { character } => {
                debug!(character = %character, "waiting_for_player_choice");
                self.last_advance = None;
                AdvanceStatus::NotRequested
            }
            Decision::Idle => {
                self.last_advance = None;
                AdvanceStatus::NotRequested
            }
        };

        CycleOutcome {
            decision,
            advance,
            characters: result.len(),
            failures: result.failures.len(),
        }
    }

    fn try_advance(
        &mut self,
        now: Instant,
        info: &CharacterInfo,
        advancer: &mut dyn Advancer,
    ) -> AdvanceStatus {
        let fingerprint = StateFingerprint::of(info);
        if self.is_debounced(now, &fingerprint) {
            self.stats.record_debounced();
            return AdvanceStatus::Debounced;
        }

        match advancer.advance() {
            Ok(()) => {
                self.stats.record_advance();
                let text = info
                    .talks
                    .last()
                    .map(|talk| shorten(&talk.text, self.config.scan.log_text_max_chars))
                    .unwrap_or_default();
                info!(character = %info.name, text = %text, "advance_sent");
                self.last_advance = Some(LastAdvance { fingerprint, at: now });
                AdvanceStatus::Sent
            }
            Err(advance_error) => {
                self.stats.record_advance_failure();
                error!(character = %info.name, error = %advance_error, "advance_failed");
                self.last_advance = None;
                AdvanceStatus::Failed
            }
        }
    }

    fn is_debounced(&self, now: Instant, fingerprint: &StateFingerprint) -> bool {
        let Some(last) = &self.last_advance else {
            return false;
        };
        if &last.fingerprint != fingerprint {
            return false;
        }
        match self.config.poll.rearm_after() {
            Some(rearm) => now.saturating_duration_since(last.at) < rearm,
            None => true,
        }
    }

    /// Scans and logs every character without deciding or advancing.
    pub fn scan_now(&self, graph: &dyn SceneGraph) -> ScanResult {
        let result = scan_characters(graph, &self.config.scan);
        log_scan_report(&result, self.config.scan.log_text_max_chars);
        info!(
            scanned = result.scanned,
            characters = result.len(),
            failures = result.failures.len(),
            elapsed_ms = result.elapsed.as_secs_f64() * 1000.0,
            "scan_completed"
        );
        result
    }

    /// Applies a control command and returns reply lines.
    pub fn apply_command(
        &mut self,
        command: ControlCommand,
        now: Instant,
        graph: &dyn SceneGraph,
        advancer: &mut dyn Advancer,
    ) -> Vec<String> {
        match command {
            ControlCommand::Start => {
                if self.start(now, advancer) {
                    vec!["ok: polling started".to_string()]
                } else {
                    vec!["ok: already polling".to_string()]
                }
            }
            ControlCommand::Stop => {
                if self.stop() {
                    vec!["ok: polling stopped".to_string()]
                } else {
                    vec!["ok: already idle".to_string()]
                }
            }
            ControlCommand::Scan => {
                let result = self.scan_now(graph);
                let max_chars = self.config.scan.log_text_max_chars;
                let mut lines = result
                    .iter()
                    .map(|info| describe_character(info, max_chars))
                    .collect::<Vec<_>>();
                lines.push(format!(
                    "scan: {} of {} characters with data, {} failed",
                    result.len(),
                    result.scanned,
                    result.failures.len()
                ));
                lines
            }
            ControlCommand::Status => self.status_lines(),
            ControlCommand::Quit => vec!["ok: quit requested".to_string()],
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        let totals = self.stats.totals();
        vec![
            format!(
                "state: {} interval_ms: {}",
                self.state,
                self.interval.as_millis()
            ),
            format!(
                "cycles: {} advances: {} debounced: {} advance_failures: {} aggregation_failures: {}",
                totals.cycles,
                totals.advances,
                totals.debounced,
                totals.advance_failures,
                totals.aggregation_failures
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollConfig;
    use crate::poll::advance::RecordingAdvancer;
    use crate::poll::decision::AdvanceReason;
    use crate::scene::{FlakyHost, NodeSpec, SceneDocument, SceneTree, TextSpec};

    const TYPING: &str = "Hello<color=#00000000>there</color>";
    const BUBBLE_TEXT: &str = "11_Old_Sam/Character Canvas/TalkWord_black(Clone)/Text";

    fn talking_scene(text: &str) -> SceneTree {
        SceneTree::from_document(SceneDocument {
            roots: vec![NodeSpec::new("11_Old_Sam")
                .on_layer("Character")
                .with_child(NodeSpec::chain(
                    &["Character Canvas", "TalkWord_black(Clone)"],
                    NodeSpec::new("Text").with_text(TextSpec::legacy(text)),
                ))],
        })
    }

    fn choosing_scene() -> SceneTree {
        SceneTree::from_document(SceneDocument {
            roots: vec![NodeSpec::new("11_Old_Sam")
                .on_layer("Character")
                .with_child(NodeSpec::chain(
                    &["Character Canvas", "TalkWord_black(Clone)"],
                    NodeSpec::new("Text").with_text(TextSpec::legacy("Need anything?")),
                ))
                .with_child(NodeSpec::chain(
                    &[
                        "Interaction",
                        "Root Interaction Character Canvas",
                        "Interaction Character Canvas",
                    ],
                    NodeSpec::new("InteractionList(Clone)")
                        .with_child(NodeSpec::new("Item").with_text(TextSpec::legacy("Trade")))
                        .with_child(NodeSpec::new("Item").with_text(TextSpec::legacy("Talk"))),
                ))],
        })
    }

    fn polling_loop(poll: PollConfig, now: Instant) -> (PollingDecisionLoop, RecordingAdvancer) {
        let mut advancer = RecordingAdvancer::default();
        let mut decision_loop = PollingDecisionLoop::new(
            DialogueConfig {
                poll,
                ..DialogueConfig::default()
            },
            now,
        );
        assert!(decision_loop.start(now, &mut advancer));
        (decision_loop, advancer)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn typing_text_is_advanced_once_while_unchanged() {
        let base = Instant::now();
        let scene = talking_scene(TYPING);
        let mut advancer = RecordingAdvancer::default();
        let mut decision_loop = PollingDecisionLoop::new(DialogueConfig::default(), base);
        assert!(decision_loop.start(base, &mut advancer));

        let first = decision_loop
            .update(base, &scene, &mut advancer)
            .expect("first cycle");
        assert_eq!(
            first.decision,
            Decision::Advance {
                character: "11_Old_Sam".to_string(),
                reason: AdvanceReason::Typing,
            }
        );
        assert_eq!(first.advance, AdvanceStatus::Sent);

        for step in 1..=12 {
            let outcome = decision_loop
                .update(base + ms(500 * step), &scene, &mut advancer)
                .expect("cycle");
            assert_eq!(outcome.advance, AdvanceStatus::Debounced);
        }
        assert_eq!(advancer.advances, 1);
    }

    #[test]
    fn changed_text_is_advanced_again() {
        let base = Instant::now();
        let mut scene = talking_scene(TYPING);
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        decision_loop.update(base, &scene, &mut advancer);
        let text = scene.find_path(BUBBLE_TEXT).expect("text node");
        scene.set_text(text, "Hello there").expect("set text");
        let outcome = decision_loop
            .update(base + ms(500), &scene, &mut advancer)
            .expect("cycle");

        assert_eq!(outcome.advance, AdvanceStatus::Sent);
        assert_eq!(advancer.advances, 2);
    }

    #[test]
    fn unchanged_state_rearms_after_configured_window() {
        let base = Instant::now();
        let scene = talking_scene("Hello there");
        let (mut decision_loop, mut advancer) = polling_loop(
            PollConfig {
                rearm_after_ms: 3000,
                ..PollConfig::default()
            },
            base,
        );

        decision_loop.update(base, &scene, &mut advancer);
        decision_loop.update(base + ms(2500), &scene, &mut advancer);
        assert_eq!(advancer.advances, 1);

        decision_loop.update(base + ms(3000), &scene, &mut advancer);
        assert_eq!(advancer.advances, 2);
    }

    #[test]
    fn host_error_on_one_character_keeps_polling() {
        let base = Instant::now();
        let tree = SceneTree::from_document(SceneDocument {
            roots: vec![
                NodeSpec::new("11_Old_Sam")
                    .on_layer("Character")
                    .with_child(NodeSpec::chain(
                        &[
                            "Interaction",
                            "Root Interaction Character Canvas",
                            "Interaction Character Canvas",
                        ],
                        NodeSpec::new("InteractionList(Clone)")
                            .with_child(NodeSpec::new("Item").with_text(TextSpec::legacy("Talk"))),
                    )),
                NodeSpec::new("12_Young_Ann")
                    .on_layer("Character")
                    .with_child(NodeSpec::chain(
                        &["Character Canvas", "TalkWord_black(Clone)"],
                        NodeSpec::new("Text").with_text(TextSpec::legacy(TYPING)),
                    )),
            ],
        });
        let broken = tree
            .find_path("11_Old_Sam/Interaction")
            .expect("interaction root");
        let host = FlakyHost {
            inner: tree,
            broken,
        };
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        let first = decision_loop
            .update(base, &host, &mut advancer)
            .expect("first cycle");
        assert_eq!(first.failures, 1);
        assert_eq!(first.characters, 1);
        assert_eq!(
            first.decision,
            Decision::Advance {
                character: "12_Young_Ann".to_string(),
                reason: AdvanceReason::Typing,
            }
        );
        assert_eq!(first.advance, AdvanceStatus::Sent);

        let second = decision_loop
            .update(base + ms(500), &host, &mut advancer)
            .expect("second cycle");
        assert_eq!(second.failures, 1);
        assert!(decision_loop.is_polling());
        assert_eq!(
            decision_loop.status_lines()[1],
            "cycles: 2 advances: 1 debounced: 1 advance_failures: 0 aggregation_failures: 2"
        );
    }

    #[test]
    fn interaction_options_block_advancing() {
        let base = Instant::now();
        let scene = choosing_scene();
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        let outcome = decision_loop
            .update(base, &scene, &mut advancer)
            .expect("cycle");

        assert_eq!(
            outcome.decision,
            Decision::WaitForPlayer {
                character: "11_Old_Sam".to_string()
            }
        );
        assert_eq!(outcome.advance, AdvanceStatus::NotRequested);
        assert_eq!(advancer.advances, 0);
    }

    #[test]
    fn cycles_only_run_once_per_interval() {
        let base = Instant::now();
        let scene = talking_scene("Hello there");
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        assert!(decision_loop.update(base, &scene, &mut advancer).is_some());
        assert!(decision_loop
            .update(base + ms(100), &scene, &mut advancer)
            .is_none());
        assert!(decision_loop
            .update(base + ms(499), &scene, &mut advancer)
            .is_none());
        assert!(decision_loop
            .update(base + ms(500), &scene, &mut advancer)
            .is_some());
        assert_eq!(decision_loop.totals().cycles, 2);
    }

    #[test]
    fn idle_loop_does_no_work() {
        let base = Instant::now();
        let scene = talking_scene("Hello there");
        let mut advancer = RecordingAdvancer::default();
        let mut decision_loop = PollingDecisionLoop::new(DialogueConfig::default(), base);

        assert!(decision_loop.update(base, &scene, &mut advancer).is_none());
        assert_eq!(decision_loop.totals().cycles, 0);
        assert_eq!(advancer.advances, 0);
    }

    #[test]
    fn start_twice_keeps_single_cadence() {
        let base = Instant::now();
        let scene = talking_scene("Hello there");
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        decision_loop.update(base, &scene, &mut advancer);
        let before = decision_loop.state();
        assert!(!decision_loop.start(base + ms(100), &mut advancer));

        assert_eq!(decision_loop.state(), before);
        assert_eq!(advancer.prepares, 1);
        assert!(decision_loop
            .update(base + ms(200), &scene, &mut advancer)
            .is_none());
    }

    #[test]
    fn stop_twice_is_a_no_op() {
        let base = Instant::now();
        let (mut decision_loop, _advancer) = polling_loop(PollConfig::default(), base);

        assert!(decision_loop.stop());
        assert!(!decision_loop.stop());
        assert_eq!(decision_loop.state(), PollState::Idle);
    }

    #[test]
    fn restart_prepares_input_again() {
        let base = Instant::now();
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);

        decision_loop.stop();
        assert!(decision_loop.start(base + ms(10), &mut advancer));
        assert_eq!(advancer.prepares, 2);
    }

    #[test]
    fn failed_advance_is_retried_next_cycle() {
        let base = Instant::now();
        let scene = talking_scene(TYPING);
        let (mut decision_loop, mut advancer) = polling_loop(PollConfig::default(), base);
        advancer.fail_next = 1;

        let first = decision_loop
            .update(base, &scene, &mut advancer)
            .expect("first cycle");
        let second = decision_loop
            .update(base + ms(500), &scene, &mut advancer)
            .expect("second cycle");

        assert_eq!(first.advance, AdvanceStatus::Failed);
        assert_eq!(second.advance, AdvanceStatus::Sent);
        assert_eq!(advancer.advances, 1);
        assert_eq!(decision_loop.totals().advance_failures, 1);
    }

    #[test]
    fn scan_now_reports_without_advancing_or_starting() {
        let base = Instant::now();
        let scene = talking_scene(TYPING);
        let decision_loop = PollingDecisionLoop::new(DialogueConfig::default(), base);

        let result = decision_loop.scan_now(&scene);

        assert_eq!(result.len(), 1);
        assert!(result.get("11_Old_Sam").expect("sam").is_typing());
        assert_eq!(decision_loop.state(), PollState::Idle);
        assert_eq!(decision_loop.totals().cycles, 0);
    }

    #[test]
    fn commands_report_state_changes() {
        let base = Instant::now();
        let scene = choosing_scene();
        let mut advancer = RecordingAdvancer::default();
        let mut decision_loop = PollingDecisionLoop::new(DialogueConfig::default(), base);

        let mut apply = |command| {
            decision_loop.apply_command(command, base, &scene, &mut advancer)
        };
        assert_eq!(apply(ControlCommand::Start), vec!["ok: polling started"]);
        assert_eq!(apply(ControlCommand::Start), vec!["ok: already polling"]);
        assert_eq!(
            apply(ControlCommand::Status)[0],
            "state: polling interval_ms: 500"
        );
        assert_eq!(apply(ControlCommand::Stop), vec!["ok: polling stopped"]);
        assert_eq!(apply(ControlCommand::Stop), vec!["ok: already idle"]);

        let scan = apply(ControlCommand::Scan);
        assert_eq!(
            scan,
            vec![
                "11_Old_Sam: interactions=[Talk | Trade] talk(shown)=\"Need anything?\"",
                "scan: 1 of 1 characters with data, 0 failed",
            ]
        );
    }
}
