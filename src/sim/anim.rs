//! Time-based animation tasks polled once per frame
//!
//! A task is plain data: start time, duration, easing curve and a payload
//! describing what it animates. Polling yields one frame per live task and
//! drops finished ones. Cancelling removes the task, so nothing is left to
//! write into a slot after its owner goes away.

use std::f32::consts::PI;

use crate::saturate;

/// Easing curve mapping linear progress in [0, 1] to eased progress
pub type Easing = fn(f32) -> f32;

pub fn linear(x: f32) -> f32 {
    x
}

pub fn ease_in_quad(x: f32) -> f32 {
    x * x
}

pub fn ease_out_quad(x: f32) -> f32 {
    1.0 - (1.0 - x) * (1.0 - x)
}

pub fn ease_out_quart(x: f32) -> f32 {
    1.0 - (1.0 - x).powi(4)
}

/// Overshooting spring settle
pub fn ease_out_elastic(x: f32) -> f32 {
    const C4: f32 = (2.0 * PI) / 3.0;
    if x <= 0.0 {
        0.0
    } else if x >= 1.0 {
        1.0
    } else {
        2f32.powf(-10.0 * x) * ((x * 10.0 - 0.75) * C4).sin() + 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(u64);

#[derive(Debug, Clone)]
pub struct AnimationTask<P> {
    pub id: AnimationId,
    /// Whatever the animation belongs to (a stage object id)
    pub owner: u32,
    pub start: f32,
    pub duration: f32,
    pub easing: Easing,
    pub payload: P,
}

impl<P> AnimationTask<P> {
    fn progress(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return if now >= self.start { 1.0 } else { 0.0 };
        }
        saturate((now - self.start) / self.duration)
    }
}

/// One sampled frame of a task
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame<P> {
    pub id: AnimationId,
    pub owner: u32,
    pub payload: P,
    /// Linear progress
    pub progress: f32,
    /// Progress through the easing curve
    pub eased: f32,
    /// Last frame; the task is gone after this
    pub finished: bool,
}

/// The active animation list
#[derive(Debug)]
pub struct Animator<P> {
    tasks: Vec<AnimationTask<P>>,
    next_id: u64,
}

impl<P> Default for Animator<P> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }
}

impl<P: Copy> Animator<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; it samples as progress 0 until `start`
    pub fn start(
        &mut self,
        owner: u32,
        start: f32,
        duration: f32,
        easing: Easing,
        payload: P,
    ) -> AnimationId {
        let id = AnimationId(self.next_id);
        self.next_id += 1;
        self.tasks.push(AnimationTask {
            id,
            owner,
            start,
            duration,
            easing,
            payload,
        });
        id
    }

    /// Cancel every task of an owner, returning how many were removed
    pub fn cancel_owner(&mut self, owner: u32) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.owner != owner);
        before - self.tasks.len()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sample every task at `now` in start order; finished tasks are removed
    pub fn poll(&mut self, now: f32) -> Vec<AnimationFrame<P>> {
        let frames: Vec<AnimationFrame<P>> = self
            .tasks
            .iter()
            .map(|task| {
                let progress = task.progress(now);
                AnimationFrame {
                    id: task.id,
                    owner: task.owner,
                    payload: task.payload,
                    progress,
                    eased: (task.easing)(progress),
                    finished: progress >= 1.0,
                }
            })
            .collect();
        self.tasks.retain(|t| t.progress(now) < 1.0);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        let easings: [Easing; 5] = [
            linear,
            ease_in_quad,
            ease_out_quad,
            ease_out_quart,
            ease_out_elastic,
        ];
        for easing in easings {
            assert!(easing(0.0).abs() < 1e-6);
            assert!((easing(1.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_elastic_overshoots() {
        let peak = (1..100)
            .map(|i| ease_out_elastic(i as f32 / 100.0))
            .fold(0.0f32, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_poll_runs_to_completion_once() {
        let mut animator = Animator::new();
        animator.start(1, 0.0, 1.0, linear, ());

        let frames = animator.poll(0.5);
        assert_eq!(frames.len(), 1);
        assert!((frames[0].eased - 0.5).abs() < 1e-6);
        assert!(!frames[0].finished);

        let frames = animator.poll(2.0);
        assert!(frames[0].finished);
        assert_eq!(frames[0].progress, 1.0);
        assert!(animator.poll(3.0).is_empty());
        assert!(animator.is_idle());
    }

    #[test]
    fn test_delayed_task_holds_at_zero() {
        let mut animator = Animator::new();
        animator.start(7, 1.0, 0.5, ease_out_elastic, ());
        let frames = animator.poll(0.25);
        assert_eq!(frames[0].progress, 0.0);
        assert_eq!(frames[0].eased, 0.0);
    }

    #[test]
    fn test_cancel_owner_stops_frames() {
        let mut animator = Animator::new();
        animator.start(1, 0.0, 1.0, linear, 'a');
        animator.start(1, 0.0, 1.0, linear, 'b');
        let keep = animator.start(2, 0.0, 1.0, linear, 'c');
        assert_eq!(animator.cancel_owner(1), 2);
        assert_eq!(animator.cancel_owner(1), 0);
        assert_eq!(animator.len(), 1);
        let frames = animator.poll(0.5);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, keep);
    }
}
