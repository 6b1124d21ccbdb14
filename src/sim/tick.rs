//! Frame driver
//!
//! One frame runs, in order: input (menu actions, pointer events), fixed-step
//! physics substeps each followed by the lifecycle update, then scoring and
//! the clearance check. Everything is single threaded; the aim preview steps
//! its own ground-only world, never the live one.

use glam::Vec3;

use super::aim::{AimController, AimOutcome, PointerEvent};
use super::objects::ObjectLifecycle;
use super::projectile::ProjectilePool;
use super::stage::StageDefinition;
use super::state::{GameEvent, GamePhase, GameState, PlayTransition};
use super::world::{PhysicsBackend, PhysicsWorld};
use crate::error::{GameError, GameResult};
use crate::renderer::{InstanceKind, InstanceMirror};
use crate::settings::Settings;

/// Menu buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Play,
    NextStage,
    PreviousStage,
    BackToMenu,
}

/// Input gathered since the previous frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub menu: Vec<MenuAction>,
    /// Pointer events in the order they happened
    pub pointer: Vec<PointerEvent>,
    /// New camera-drag state, if it changed
    pub panning: Option<bool>,
    /// Window blur, visibility change or lost pointer capture
    pub focus_lost: bool,
}

/// The whole game core
pub struct Game {
    settings: Settings,
    stages: Vec<StageDefinition>,
    state: GameState,
    world: PhysicsWorld,
    preview_world: PhysicsWorld,
    mirror: InstanceMirror,
    objects: ObjectLifecycle,
    balls: ProjectilePool,
    aim: AimController,
    /// Simulation clock (seconds)
    time: f32,
    accumulator: f32,
    events: Vec<GameEvent>,
    redraw: bool,
}

impl Game {
    /// Validate the stage list and load the first stage behind the menu
    pub fn new(settings: Settings, stages: Vec<StageDefinition>) -> GameResult<Self> {
        let Some(first) = stages.first() else {
            return Err(GameError::InvalidStage {
                title: String::new(),
                reason: "no stages".into(),
            });
        };
        for stage in &stages {
            stage.validate()?;
        }
        let world = PhysicsWorld::from_stage(first, &settings.physics)?;
        let preview_world = PhysicsWorld::from_stage(first, &settings.physics)?;
        let mut game = Self {
            objects: ObjectLifecycle::new(settings.objects.clone()),
            balls: ProjectilePool::new(&settings.aim, first.kill_y()),
            aim: AimController::new(settings.aim.clone(), settings.physics.fixed_step),
            state: GameState::new(stages.len()),
            mirror: InstanceMirror::new(),
            world,
            preview_world,
            settings,
            stages,
            time: 0.0,
            accumulator: 0.0,
            events: Vec::new(),
            redraw: true,
        };
        game.load_stage(0)?;
        Ok(game)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn stage(&self) -> &StageDefinition {
        &self.stages[self.state.stage_index]
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn mirror(&self) -> &InstanceMirror {
        &self.mirror
    }

    pub fn objects(&self) -> &ObjectLifecycle {
        &self.objects
    }

    pub fn balls(&self) -> &ProjectilePool {
        &self.balls
    }

    pub fn aim(&self) -> &AimController {
        &self.aim
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Tear down the current stage and build `index` from its definition
    fn load_stage(&mut self, index: usize) -> GameResult<()> {
        // Animations and bodies go before the slots they write to
        self.aim.cancel();
        self.objects.clear(&mut self.world, &mut self.mirror);
        self.balls.clear(&mut self.world, &mut self.mirror);
        self.mirror.reset();

        let stage = &self.stages[index];
        self.world = PhysicsWorld::from_stage(stage, &self.settings.physics)?;
        self.preview_world = PhysicsWorld::from_stage(stage, &self.settings.physics)?;
        for ground in &stage.ground {
            let slot = self.mirror.allocate_slot(InstanceKind::Ground)?;
            self.mirror.write_transform(
                InstanceKind::Ground,
                slot,
                ground.position,
                [0.0; 3],
                ground.size,
            );
        }
        self.balls.set_kill_y(stage.kill_y());
        self.objects
            .load(stage, &mut self.world, &mut self.mirror, self.time)?;
        self.accumulator = 0.0;
        self.redraw = true;
        log::info!("Stage {} ready: {}", index, stage.title);
        Ok(())
    }

    /// Advance one displayed frame by `elapsed` seconds of wall time
    pub fn frame(&mut self, input: &FrameInput, elapsed: f32) -> GameResult<()> {
        self.handle_input(input)?;

        let dt = self.settings.physics.fixed_step;
        let max_substeps = self.settings.physics.max_substeps;
        self.accumulator += elapsed.clamp(0.0, dt * max_substeps as f32);
        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_substeps {
            self.step(dt);
            self.accumulator -= dt;
            substeps += 1;
        }

        for event in self.objects.drain_events() {
            self.state.add_score(event);
        }
        if self.state.phase == GamePhase::Playing && self.objects.is_cleared() {
            self.state.complete();
        }
        self.events.extend(self.state.drain_events());
        self.redraw = self.mirror.take_dirty();
        Ok(())
    }

    fn step(&mut self, dt: f32) {
        let objects = &mut self.objects;
        let balls = &mut self.balls;
        self.world.step(dt, &mut |contact| {
            objects.on_contact(contact);
            balls.on_contact(contact);
        });
        self.time += dt;
        self.objects
            .update(&mut self.world, &mut self.mirror, self.time);
        self.balls.update(&mut self.world, &mut self.mirror);
    }

    fn handle_input(&mut self, input: &FrameInput) -> GameResult<()> {
        if let Some(panning) = input.panning {
            self.state.set_panning(panning);
        }
        if input.focus_lost {
            self.aim.cancel();
        }
        for action in &input.menu {
            self.handle_menu(*action)?;
        }
        for event in &input.pointer {
            if self.state.phase != GamePhase::Playing {
                self.aim.cancel();
                continue;
            }
            let outcome = self
                .aim
                .handle(event, self.state.panning, &mut self.preview_world)?;
            if let AimOutcome::Launch { position, velocity } = outcome {
                self.launch(position, velocity)?;
            }
        }
        Ok(())
    }

    fn handle_menu(&mut self, action: MenuAction) -> GameResult<()> {
        let before = self.state.stage_index;
        match action {
            MenuAction::Play => {
                if self.state.play() == PlayTransition::Reset {
                    self.load_stage(self.state.stage_index)?;
                    self.state.record_reset();
                }
            }
            MenuAction::NextStage => {
                self.state.next_stage();
            }
            MenuAction::PreviousStage => {
                self.state.previous_stage();
            }
            MenuAction::BackToMenu => {
                self.state.back_to_menu();
            }
        }
        if self.state.stage_index != before {
            self.load_stage(self.state.stage_index)?;
        }
        Ok(())
    }

    fn launch(&mut self, position: Vec3, velocity: Vec3) -> GameResult<()> {
        match self
            .balls
            .launch(&mut self.world, &mut self.mirror, position, velocity)?
        {
            Some(ball) => self.state.record_launch(ball),
            None => self.state.record_refused_launch(),
        }
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// True while anything on screen can still change
    pub fn needs_redraw(&self) -> bool {
        self.redraw
            || !self.world.is_settled()
            || self.objects.is_animating()
            || self.aim.is_aiming()
    }
}
