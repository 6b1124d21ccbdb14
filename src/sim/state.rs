//! Session state: phase, stage selection, score and ball count

use serde::{Deserialize, Serialize};

use super::objects::ScoreEvent;

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Menu with stage selection
    Intro,
    /// Active gameplay
    Playing,
    /// Stage cleared
    GameOver,
}

/// Events published for presentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    StageSelected { index: usize },
    /// Stage rebuilt from its definition
    StageReset { index: usize },
    Score(ScoreEvent),
    Launched { ball: u32 },
    /// Ball pool exhausted
    LaunchRefused,
}

/// Result of asking to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTransition {
    /// Not in the menu
    Ignored,
    /// Play the stage as loaded
    Start,
    /// A previous session fired balls; rebuild the stage first
    Reset,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub phase: GamePhase,
    /// Index into the stage list
    pub stage_index: usize,
    pub stage_count: usize,
    pub score: i64,
    /// Balls fired this session
    pub projectiles: u32,
    /// Camera drag in progress
    pub panning: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(stage_count: usize) -> Self {
        Self {
            phase: GamePhase::Intro,
            stage_index: 0,
            stage_count: stage_count.max(1),
            score: 0,
            projectiles: 0,
            panning: false,
            events: Vec::new(),
        }
    }

    fn transition(&mut self, to: GamePhase) {
        let from = self.phase;
        self.phase = to;
        log::info!("Phase {from:?} -> {to:?}");
        self.events.push(GameEvent::PhaseChanged { from, to });
    }

    /// Intro -> Playing
    pub fn play(&mut self) -> PlayTransition {
        if self.phase != GamePhase::Intro {
            return PlayTransition::Ignored;
        }
        let needs_reset = self.projectiles > 0;
        if needs_reset {
            self.reset_session();
        }
        self.transition(GamePhase::Playing);
        if needs_reset {
            PlayTransition::Reset
        } else {
            PlayTransition::Start
        }
    }

    /// Playing -> GameOver; returns false from any other phase
    pub fn complete(&mut self) -> bool {
        if self.phase != GamePhase::Playing {
            return false;
        }
        self.transition(GamePhase::GameOver);
        true
    }

    /// GameOver -> Intro, back on the first stage
    pub fn back_to_menu(&mut self) -> bool {
        if self.phase != GamePhase::GameOver {
            return false;
        }
        self.transition(GamePhase::Intro);
        self.select(0);
        true
    }

    fn select(&mut self, index: usize) {
        if index != self.stage_index {
            self.stage_index = index;
            self.events.push(GameEvent::StageSelected { index });
        }
    }

    /// Cycle forward through stages (menu only)
    pub fn next_stage(&mut self) -> bool {
        if self.phase != GamePhase::Intro {
            return false;
        }
        self.select((self.stage_index + 1) % self.stage_count);
        true
    }

    /// Cycle backward through stages (menu only)
    pub fn previous_stage(&mut self) -> bool {
        if self.phase != GamePhase::Intro {
            return false;
        }
        self.select((self.stage_index + self.stage_count - 1) % self.stage_count);
        true
    }

    /// Apply a score delta while playing
    pub fn add_score(&mut self, event: ScoreEvent) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.score += event.delta;
        self.events.push(GameEvent::Score(event));
    }

    pub fn record_launch(&mut self, ball: u32) {
        self.projectiles += 1;
        self.events.push(GameEvent::Launched { ball });
    }

    pub fn record_refused_launch(&mut self) {
        self.events.push(GameEvent::LaunchRefused);
    }

    pub fn record_reset(&mut self) {
        self.events.push(GameEvent::StageReset {
            index: self.stage_index,
        });
    }

    pub fn set_panning(&mut self, panning: bool) {
        self.panning = panning;
    }

    pub fn reset_session(&mut self) {
        self.score = 0;
        self.projectiles = 0;
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn score(delta: i64) -> ScoreEvent {
        ScoreEvent {
            object_id: 0,
            delta,
            position: Vec3::ZERO,
        }
    }

    #[test]
    fn test_starts_in_intro() {
        let state = GameState::new(4);
        assert_eq!(state.phase, GamePhase::Intro);
        assert_eq!(state.stage_index, 0);
    }

    #[test]
    fn test_play_resets_only_after_launches() {
        let mut state = GameState::new(4);
        assert_eq!(state.play(), PlayTransition::Start);
        assert_eq!(state.play(), PlayTransition::Ignored);
        state.record_launch(0);
        state.add_score(score(100));
        assert!(state.complete());
        assert!(state.back_to_menu());
        assert_eq!(state.play(), PlayTransition::Reset);
        assert_eq!(state.score, 0);
        assert_eq!(state.projectiles, 0);
    }

    #[test]
    fn test_complete_only_from_playing() {
        let mut state = GameState::new(4);
        assert!(!state.complete());
        assert_eq!(state.phase, GamePhase::Intro);
        state.play();
        assert!(state.complete());
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(!state.complete());
        assert_eq!(state.phase, GamePhase::GameOver);
    }

    #[test]
    fn test_stage_selection_wraps_in_menu_only() {
        let mut state = GameState::new(4);
        assert!(state.previous_stage());
        assert_eq!(state.stage_index, 3);
        assert!(state.next_stage());
        assert_eq!(state.stage_index, 0);
        state.next_stage();
        state.play();
        assert!(!state.next_stage());
        assert_eq!(state.stage_index, 1);
    }

    #[test]
    fn test_back_to_menu_returns_to_first_stage() {
        let mut state = GameState::new(4);
        state.next_stage();
        state.next_stage();
        state.play();
        assert!(!state.back_to_menu());
        state.complete();
        assert!(state.back_to_menu());
        assert_eq!(state.phase, GamePhase::Intro);
        assert_eq!(state.stage_index, 0);
    }

    #[test]
    fn test_score_ignored_outside_play() {
        let mut state = GameState::new(1);
        state.add_score(score(100));
        assert_eq!(state.score, 0);
        state.play();
        state.add_score(score(100));
        state.add_score(score(-750));
        assert_eq!(state.score, -650);
        let scores = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::Score(_)))
            .count();
        assert_eq!(scores, 2);
    }
}
