use std::mem;

use thiserror::Error;
use tracing::info;

use crate::app::{InputAction, InputEvent};
use crate::assets::AssetProvider;
use crate::content::{build_world, BuildError, LevelDef};
use crate::signal::Signal;
use crate::world::{
    Area, LevelOutcome, PeriodSwitch, TimerMode, TimerOwner, TimerQueue, World, WorldConfig,
};

/// Delay between a death or a completed level and the next build.
pub const LEVEL_TRANSITION_MS: u32 = 2000;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no levels to play")]
    NoLevels,
    #[error("level index {index} is out of range ({count} levels)")]
    NoSuchLevel { index: usize, count: usize },
    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChanged {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Paused,
    Restarting,
    Advancing,
    GameOver,
    CampaignComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Restart,
    Advance,
}

/// Plays an ordered list of levels, one world at a time.
///
/// World signal subscriptions and the player's remaining lives are carried from one
/// world to the next.
pub struct Session {
    levels: Vec<LevelDef>,
    assets: Box<dyn AssetProvider>,
    config: WorldConfig,
    world: World,
    current: usize,
    state: SessionState,
    timers: TimerQueue<Transition>,
    pub level_changed: Signal<LevelChanged>,
}

impl Session {
    /// Builds and starts the first level.
    pub fn new(
        levels: Vec<LevelDef>,
        assets: Box<dyn AssetProvider>,
        config: WorldConfig,
    ) -> Result<Self, SessionError> {
        if levels.is_empty() {
            return Err(SessionError::NoLevels);
        }
        let placeholder = World::new("", config.clone());
        let mut session = Self {
            levels,
            assets,
            config,
            world: placeholder,
            current: 0,
            state: SessionState::Running,
            timers: TimerQueue::default(),
            level_changed: Signal::default(),
        };
        session.switch_level(0)?;
        Ok(session)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_level(&self) -> usize {
        self.current
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Rebuilds level `index` from its definition, switches to its first time period and
    /// places the player at the active area's start.
    pub fn switch_level(&mut self, index: usize) -> Result<(), SessionError> {
        self.load_level(index, true)
    }

    /// Rebuilds the current level. After a game over the player starts with full lives.
    pub fn restart_level(&mut self) -> Result<(), SessionError> {
        let carry_lives = self.state != SessionState::GameOver;
        self.load_level(self.current, carry_lives)
    }

    fn load_level(&mut self, index: usize, carry_lives: bool) -> Result<(), SessionError> {
        let Some(def) = self.levels.get(index) else {
            return Err(SessionError::NoSuchLevel {
                index,
                count: self.levels.len(),
            });
        };
        let mut world = build_world(def, self.assets.as_ref(), self.config.clone())?;

        let lives = self
            .world
            .player()
            .and_then(|id| self.world.entity(id))
            .and_then(|entity| entity.player_state())
            .map(|state| state.lives)
            .filter(|_| carry_lives);
        if let Some(lives) = lives {
            world.set_player_lives(lives);
        }
        world.signals = mem::take(&mut self.world.signals);
        self.world = world;
        self.current = index;
        self.state = SessionState::Running;
        self.timers = TimerQueue::default();

        let switched = self.world.switch_time_period(0);
        debug_assert!(matches!(switched, PeriodSwitch::Switched { .. }));
        let start = self.world.active_area().and_then(Area::start_position);
        if let Some(player) = self.world.player() {
            if let Some(start) = start {
                self.world.move_to(player, start.x, start.y, false);
            }
            self.world.fall(player);
        }

        let name = def.name.clone();
        info!(index, name = %name, lives = ?lives, "level_started");
        self.level_changed.emit(&LevelChanged { index, name });
        Ok(())
    }

    /// Handles level-wide actions and forwards the rest to the world while running.
    pub fn handle_input(&mut self, event: InputEvent) {
        match event.action {
            InputAction::Pause => {
                if !event.is_pressed() {
                    return;
                }
                self.state = match self.state {
                    SessionState::Running => SessionState::Paused,
                    SessionState::Paused => SessionState::Running,
                    other => other,
                };
                info!(state = ?self.state, "pause_toggled");
            }
            InputAction::SwitchTimePeriod(index) => {
                if event.is_pressed() && self.state == SessionState::Running {
                    self.world.switch_time_period(index);
                }
            }
            _ => {
                if self.state == SessionState::Running {
                    self.world.handle_input(event);
                }
            }
        }
    }

    /// Advances one fixed step. The world only ticks while running; pending restarts and
    /// level advances count down in frame time meanwhile.
    pub fn tick(&mut self) -> Result<SessionState, SessionError> {
        let frame_ms = self.world.frame_ms();
        for (_, transition) in self.timers.advance(frame_ms) {
            match transition {
                Transition::Restart => self.restart_level()?,
                Transition::Advance => {
                    let next = self.current + 1;
                    if next < self.levels.len() {
                        self.switch_level(next)?;
                    } else {
                        self.state = SessionState::CampaignComplete;
                        info!(levels = self.levels.len(), "campaign_complete");
                    }
                }
            }
        }

        if self.state != SessionState::Running {
            return Ok(self.state);
        }
        self.world.tick();
        match self.world.take_outcome() {
            Some(LevelOutcome::PlayerDied) => self.begin_transition(Transition::Restart),
            Some(LevelOutcome::Completed) => self.begin_transition(Transition::Advance),
            Some(LevelOutcome::GameOver) => self.state = SessionState::GameOver,
            None => {}
        }
        Ok(self.state)
    }

    fn begin_transition(&mut self, transition: Transition) {
        self.state = match transition {
            Transition::Restart => SessionState::Restarting,
            Transition::Advance => SessionState::Advancing,
        };
        self.timers.schedule(
            LEVEL_TRANSITION_MS,
            TimerMode::OneShot,
            TimerOwner::Global,
            transition,
        );
        info!(
            level = self.current,
            transition = ?transition,
            delay_ms = LEVEL_TRANSITION_MS,
            "level_transition_scheduled"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    use super::*;
    use crate::assets::MemoryAssets;
    use crate::content::compile_level;
    use crate::world::EntityId;

    const SPIKE_PIT: &str = r#"<Level name="Pit">
        <TimePeriod name="now">
            <Area key="pit" width="800" height="600" start="40,300">
                <Entity id="spikes" rect="0,500,200,20" lethal="true"/>
            </Area>
        </TimePeriod>
    </Level>"#;

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

    fn level(name: &str, raw: &str) -> LevelDef {
        compile_level(Path::new(name), raw).expect("compile")
    }

    fn session(levels: Vec<LevelDef>, config: WorldConfig) -> Session {
        Session::new(levels, Box::new(MemoryAssets::default()), config).expect("session")
    }

    fn record(session: &mut Session) -> Rc<RefCell<Vec<LevelChanged>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session
            .level_changed
            .connect(move |changed: &LevelChanged| sink.borrow_mut().push(changed.clone()));
        seen
    }

    fn player_lives(session: &Session) -> u32 {
        let world = session.world();
        world
            .player()
            .and_then(|id| world.entity(id))
            .and_then(|entity| entity.player_state())
            .map(|state| state.lives)
            .expect("player state")
    }

    fn tick_until(session: &mut Session, max_ticks: u32, done: impl Fn(&Session) -> bool) -> bool {
        for _ in 0..max_ticks {
            session.tick().expect("tick");
            if done(session) {
                return true;
            }
        }
        false
    }

    #[test]
    fn empty_campaign_is_rejected() {
        let result = Session::new(Vec::new(), Box::new(MemoryAssets::default()), WorldConfig::default());
        assert!(matches!(result, Err(SessionError::NoLevels)));
    }

    #[test]
    fn first_level_starts_with_player_attached_at_start() {
        let session = session(vec![level("vault.xml", VAULT)], WorldConfig::default());
        let world = session.world();
        let player = world.player().expect("player");
        let entity = world.entity(player).expect("entity");

        assert_eq!(session.state(), SessionState::Running);
        assert!(entity.layer().is_some());
        assert_eq!((entity.rect().x, entity.rect().y), (40, 400));
        assert_eq!(world.level().active_time_period().map(|period| period.0), Some(0));
    }

    #[test]
    fn death_restarts_the_level_after_the_transition_delay() {
        let mut session = session(vec![level("pit.xml", SPIKE_PIT)], WorldConfig::default());
        let changes = record(&mut session);

        assert!(tick_until(&mut session, 400, |s| s.state() == SessionState::Restarting));
        assert!(changes.borrow().is_empty());

        // Nothing happens well before the delay has passed.
        for _ in 0..30 {
            assert_eq!(session.tick().expect("tick"), SessionState::Restarting);
        }
        assert!(tick_until(&mut session, 60, |s| s.state() == SessionState::Running));

        assert_eq!(
            *changes.borrow(),
            vec![LevelChanged {
                index: 0,
                name: "Pit".to_string()
            }]
        );
        assert_eq!(player_lives(&session), 2);
    }

    #[test]
    fn losing_the_last_life_stays_on_game_over() {
        let config = WorldConfig {
            max_lives: 1,
            ..WorldConfig::default()
        };
        let mut session = session(vec![level("pit.xml", SPIKE_PIT)], config);

        assert!(tick_until(&mut session, 400, |s| s.state() == SessionState::GameOver));
        for _ in 0..120 {
            assert_eq!(session.tick().expect("tick"), SessionState::GameOver);
        }

        session.restart_level().expect("restart");
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(player_lives(&session), 1);
    }

    #[test]
    fn grabbing_the_artifact_advances_to_the_next_level() {
        let mut session = session(
            vec![level("a.xml", VAULT), level("b.xml", SPIKE_PIT)],
            WorldConfig::default(),
        );
        let changes = record(&mut session);

        session.handle_input(InputEvent::pressed(InputAction::Grab));
        assert_eq!(session.tick().expect("tick"), SessionState::Advancing);
        assert!(session.world().level().is_completed());

        assert!(tick_until(&mut session, 90, |s| s.current_level() == 1));
        assert_eq!(changes.borrow().len(), 1);
        assert_eq!(changes.borrow()[0].name, "Pit");
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn completing_the_last_level_ends_the_campaign() {
        let mut session = session(vec![level("a.xml", VAULT)], WorldConfig::default());

        session.handle_input(InputEvent::pressed(InputAction::Grab));
        assert!(tick_until(&mut session, 90, |s| s.state() == SessionState::CampaignComplete));
        assert_eq!(session.current_level(), 0);
    }

    #[test]
    fn pause_freezes_the_world_and_drops_player_input() {
        let mut session = session(vec![level("vault.xml", VAULT)], WorldConfig::default());
        let ticks = session.world().tick_count();

        session.handle_input(InputEvent::pressed(InputAction::Pause));
        session.handle_input(InputEvent::pressed(InputAction::Grab));
        assert_eq!(session.tick().expect("tick"), SessionState::Paused);
        assert_eq!(session.world().tick_count(), ticks);
        assert!(!session.world().level().is_completed());

        session.handle_input(InputEvent::released(InputAction::Pause));
        assert_eq!(session.state(), SessionState::Paused);
        session.handle_input(InputEvent::pressed(InputAction::Pause));
        assert_eq!(session.tick().expect("tick"), SessionState::Running);
        assert_eq!(session.world().tick_count(), ticks + 1);
    }

    #[test]
    fn time_period_switch_is_routed_to_the_world() {
        let mut session = session(vec![level("vault.xml", VAULT)], WorldConfig::default());

        session.handle_input(InputEvent::pressed(InputAction::SwitchTimePeriod(1)));
        assert_eq!(
            session.world().level().active_time_period().map(|period| period.0),
            Some(1)
        );
    }

    #[test]
    fn world_subscriptions_survive_rebuilds() {
        let mut session = session(vec![level("vault.xml", VAULT)], WorldConfig::default());
        let grabbed = Rc::new(RefCell::new(Vec::<EntityId>::new()));
        let sink = Rc::clone(&grabbed);
        session
            .world_mut()
            .signals
            .artifact_grabbed
            .connect(move |id: &EntityId| sink.borrow_mut().push(*id));

        session.restart_level().expect("restart");
        session.handle_input(InputEvent::pressed(InputAction::Grab));
        assert_eq!(grabbed.borrow().len(), 1);
    }

    #[test]
    fn unknown_level_index_is_an_error() {
        let mut session = session(vec![level("vault.xml", VAULT)], WorldConfig::default());
        assert!(matches!(
            session.switch_level(4),
            Err(SessionError::NoSuchLevel { index: 4, count: 1 })
        ));
        assert_eq!(session.current_level(), 0);
    }
}
