use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use timeslip_engine::world::{EntityId, TimePeriodChanged};
use timeslip_engine::{
    load_levels, run_fixed_loop, AppError, ImageDirAssets, LevelChanged, LoopControl,
    LoopSummary, MetricsHandle, Session, SessionError, SessionState, Simulation,
};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::replay::{ReplayCursor, ReplayScript};

/// Tallies of what happened during a run, fed by session and world signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunReport {
    pub(crate) level_changes: u32,
    pub(crate) period_switches: u32,
    pub(crate) artifacts: u32,
    pub(crate) lives_lost: u32,
}

/// Drives a session from the fixed-step loop, feeding it scripted input.
pub(crate) struct SessionSim {
    session: Session,
    replay: Option<ReplayCursor>,
    linger_ticks: Option<u64>,
    replay_done_at: Option<u64>,
    ticks: u64,
    report: Rc<RefCell<RunReport>>,
    failure: Option<SessionError>,
}

impl SessionSim {
    pub(crate) fn new(
        mut session: Session,
        replay: Option<ReplayScript>,
        linger_ticks: Option<u64>,
    ) -> Self {
        let report = Rc::new(RefCell::new(RunReport::default()));
        connect_report(&mut session, &report);
        Self {
            session,
            replay: replay.map(ReplayCursor::new),
            linger_ticks,
            replay_done_at: None,
            ticks: 0,
            report,
            failure: None,
        }
    }

    pub(crate) fn report(&self) -> RunReport {
        *self.report.borrow()
    }

    pub(crate) fn state(&self) -> SessionState {
        self.session.state()
    }

    pub(crate) fn take_failure(&mut self) -> Option<SessionError> {
        self.failure.take()
    }

    fn replay_lingered_out(&self) -> bool {
        match (self.replay_done_at, self.linger_ticks) {
            (Some(done), Some(linger)) => self.ticks.saturating_sub(done) > linger,
            _ => false,
        }
    }
}

impl Simulation for SessionSim {
    fn tick(&mut self, _fixed_dt: Duration) -> LoopControl {
        if let Some(cursor) = &mut self.replay {
            for event in cursor.events_for(self.ticks) {
                self.session.handle_input(event);
            }
            if cursor.is_finished() && self.replay_done_at.is_none() {
                self.replay_done_at = Some(self.ticks);
            }
        }
        self.ticks += 1;

        match self.session.tick() {
            Ok(SessionState::GameOver | SessionState::CampaignComplete) => LoopControl::Stop,
            Ok(_) if self.replay_lingered_out() => {
                info!(ticks = self.ticks, "replay_finished");
                LoopControl::Stop
            }
            Ok(_) => LoopControl::Continue,
            Err(err) => {
                error!(error = %err, "session_tick_failed");
                self.failure = Some(err);
                LoopControl::Stop
            }
        }
    }
}

fn connect_report(session: &mut Session, report: &Rc<RefCell<RunReport>>) {
    let sink = Rc::clone(report);
    session
        .level_changed
        .connect(move |_: &LevelChanged| sink.borrow_mut().level_changes += 1);

    let signals = &mut session.world_mut().signals;
    let sink = Rc::clone(report);
    signals
        .time_period_changed
        .connect(move |_: &TimePeriodChanged| sink.borrow_mut().period_switches += 1);
    let sink = Rc::clone(report);
    signals
        .artifact_grabbed
        .connect(move |_: &EntityId| sink.borrow_mut().artifacts += 1);
    let sink = Rc::clone(report);
    signals
        .lives_changed
        .connect(move |_: &u32| sink.borrow_mut().lives_lost += 1);
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_session(app) {
        Ok((summary, report, state)) => {
            info!(
                ticks = summary.ticks,
                reason = ?summary.reason,
                state = ?state,
                level_changes = report.level_changes,
                period_switches = report.period_switches,
                artifacts = report.artifacts,
                lives_lost = report.lives_lost,
                "run_summary"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_session(app: AppWiring) -> Result<(LoopSummary, RunReport, SessionState), AppError> {
    let levels = load_levels(&app.paths.levels_dir)?;
    let assets = ImageDirAssets::new(&app.paths.images_dir);
    let session = Session::new(levels, Box::new(assets), app.config.world.clone())?;
    info!(levels = session.level_count(), "session_started");

    let mut sim = SessionSim::new(session, app.replay, app.config.linger_ticks);
    let metrics = MetricsHandle::default();
    let summary = run_fixed_loop(&app.config.loop_config(), &mut sim, &metrics);
    if let Some(failure) = sim.take_failure() {
        return Err(failure.into());
    }
    Ok((summary, sim.report(), sim.state()))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use timeslip_engine::{compile_level, LoopConfig, MemoryAssets, StopReason, WorldConfig};

    use super::*;
    use crate::app::replay::{parse_replay, read_replay};

    const VAULT: &str = r#"<Level name="Vault">
        <TimePeriod name="now">
            <Area key="vault" width="800" height="600" start="40,400">
                <Entity id="floor" rect="0,448,800,40"/>
                <Entity id="relic" kind="artifact" rect="80,410,16,20" gravity="false"/>
            </Area>
        </TimePeriod>
        <TimePeriod name="then">
            <Area key="vault" width="800" height="600">
                <Entity id="ruins" rect="0,448,800,40"/>
            </Area>
        </TimePeriod>
    </Level>"#;

    fn vault_session() -> Session {
        let level = compile_level(Path::new("vault.xml"), VAULT).expect("compile");
        Session::new(
            vec![level],
            Box::new(MemoryAssets::default()),
            WorldConfig::default(),
        )
        .expect("session")
    }

    fn unthrottled(max_ticks: u64) -> LoopConfig {
        LoopConfig {
            max_ticks: Some(max_ticks),
            realtime: false,
            ..LoopConfig::default()
        }
    }

    fn assets_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets")
    }

    #[test]
    fn scripted_run_completes_the_campaign() {
        let script = parse_replay(
            r#"{ "steps": [
                { "tick": 3, "action": { "switch_time_period": 1 }, "state": "pressed" },
                { "tick": 6, "action": { "switch_time_period": 0 }, "state": "pressed" },
                { "tick": 8, "action": "grab", "state": "pressed" }
            ] }"#,
        )
        .expect("replay");
        let mut sim = SessionSim::new(vault_session(), Some(script), None);

        let summary = run_fixed_loop(&unthrottled(500), &mut sim, &MetricsHandle::default());

        assert_eq!(summary.reason, StopReason::Simulation);
        assert!(summary.ticks < 100, "stopped after {} ticks", summary.ticks);
        assert_eq!(sim.state(), SessionState::CampaignComplete);
        assert_eq!(
            sim.report(),
            RunReport {
                level_changes: 0,
                period_switches: 2,
                artifacts: 1,
                lives_lost: 0,
            }
        );
        assert!(sim.take_failure().is_none());
    }

    #[test]
    fn run_stops_after_replay_lingers() {
        let script = parse_replay(
            r#"{ "steps": [ { "tick": 2, "action": "move_right", "state": "pressed" } ] }"#,
        )
        .expect("replay");
        let mut sim = SessionSim::new(vault_session(), Some(script), Some(10));

        let summary = run_fixed_loop(&unthrottled(500), &mut sim, &MetricsHandle::default());

        assert_eq!(summary.reason, StopReason::Simulation);
        assert_eq!(summary.ticks, 13);
    }

    #[test]
    fn shipped_levels_and_demo_replay_run() {
        let assets = assets_dir();
        let levels = load_levels(&assets.join("levels")).expect("levels");
        assert!(!levels.is_empty());
        let session = Session::new(
            levels,
            Box::new(ImageDirAssets::new(assets.join("images"))),
            WorldConfig::default(),
        )
        .expect("session");
        let script = read_replay(&assets.join("replays").join("demo.json")).expect("replay");
        let mut sim = SessionSim::new(session, Some(script), Some(30));

        let summary = run_fixed_loop(&unthrottled(5_000), &mut sim, &MetricsHandle::default());

        assert!(summary.ticks > 0);
        assert!(sim.take_failure().is_none());
        assert!(sim.report().period_switches >= 1);
    }
}
