use glam::DVec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    collision::{
        contact::CollisionDetector,
        culling::{intake, IntakeStats},
    },
    config::{SolverConfig, DEFAULT_GRAVITY, DEFAULT_TIME_STEP},
    core::{
        articulations::Multibody,
        body::{BodyDynamics, BodyEntry},
    },
    dynamics::{
        forward::DynamicsFrame,
        integrator::Integrator,
        kinematics::step_kinematic,
        penalty::apply_contact_force,
        projection::project_accumulators,
        solver::{GaussSeidelSolver, SolverReport},
    },
    error::{Result, SimError},
    utils::{
        allocator::{BodyHandle, BodyTable},
        logging::{ScopedTimer, TraceSink},
    },
};

/// What one world step did.
#[derive(Debug, Clone, Default)]
pub struct WorldStepReport {
    pub intake: IntakeStats,
    pub solver: SolverReport,
}

/// Body table plus the per-step pipeline: controllers, kinematics, contact
/// solve, forward dynamics and integration.
pub struct World {
    bodies: BodyTable<BodyEntry>,
    pub gravity: DVec3,
    time_step: f64,
    current_time: f64,
    solver: GaussSeidelSolver,
    parallel_enabled: bool,
}

impl Default for World {
    fn default() -> Self {
        Self {
            bodies: BodyTable::new(),
            gravity: DVec3::from_array(DEFAULT_GRAVITY),
            time_step: DEFAULT_TIME_STEP,
            current_time: 0.0,
            solver: GaussSeidelSolver::new(SolverConfig::default()),
            parallel_enabled: false,
        }
    }
}

impl World {
    pub fn new(time_step: f64) -> Result<Self> {
        let mut world = Self::default();
        world.set_time_step(time_step)?;
        Ok(world)
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn set_time_step(&mut self, time_step: f64) -> Result<()> {
        if !time_step.is_finite() || time_step <= 0.0 {
            return Err(SimError::InvalidTimeStep(time_step));
        }
        self.time_step = time_step;
        Ok(())
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Rewinds the clock; bodies are left as they are.
    pub fn initialize(&mut self) {
        self.current_time = 0.0;
    }

    pub fn solver(&self) -> &GaussSeidelSolver {
        &self.solver
    }

    pub fn set_solver_config(&mut self, config: SolverConfig) {
        self.solver.set_config(config);
    }

    /// Enables per-body parallel work when the `parallel` feature is built.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled && cfg!(feature = "parallel");
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    /// Registers a body at rest: velocities, accelerations and torques are
    /// zeroed, accumulators cleared and kinematics refreshed.
    pub fn add_body(&mut self, mut body: Multibody, dynamics: BodyDynamics) -> Result<BodyHandle> {
        body.validate()?;
        body.reset_motion();
        body.clear_external_forces();
        body.update_kinematics();

        let handle = self.bodies.next_handle();
        Ok(self.bodies.insert(BodyEntry::new(handle, body, dynamics)))
    }

    /// Drops every body and invalidates their handles.
    pub fn clear_bodies(&mut self) {
        self.bodies.clear();
        self.solver.reset_impacts();
    }

    pub fn bodies(&self) -> &BodyTable<BodyEntry> {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut BodyTable<BodyEntry> {
        &mut self.bodies
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&BodyEntry> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut BodyEntry> {
        self.bodies.get_mut(handle)
    }

    pub fn find_body(&self, name: &str) -> Option<BodyHandle> {
        self.bodies
            .iter()
            .find(|entry| entry.body.name == name)
            .map(|entry| entry.handle)
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn clear_external_forces(&mut self) {
        for entry in self.bodies.iter_mut() {
            entry.body.clear_external_forces();
        }
    }

    fn controller_output(entry: &mut BodyEntry) {
        let BodyEntry { body, dynamics, .. } = entry;
        if let Some(controller) = dynamics.controller() {
            controller.output(body);
        }
    }

    fn controller_advance(entry: &mut BodyEntry) {
        if let Some(controller) = entry.dynamics.controller_mut() {
            controller.control();
        }
    }

    fn refresh_kinematics(entry: &mut BodyEntry, walking: bool) {
        if entry.dynamics.is_kinematic() {
            step_kinematic(&mut entry.body, walking);
        } else {
            entry.body.update_kinematics();
        }
    }

    fn for_each_body<F>(&mut self, f: F)
    where
        F: Fn(&mut BodyEntry) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        if self.parallel_enabled {
            self.bodies.as_mut_slice().par_iter_mut().for_each(f);
            return;
        }
        self.bodies.iter_mut().for_each(f);
    }

    fn build_frames(&self) -> Vec<DynamicsFrame> {
        let gravity = self.gravity;
        let dt = self.time_step;
        #[cfg(feature = "parallel")]
        if self.parallel_enabled {
            return self
                .bodies
                .as_slice()
                .par_iter()
                .map(|entry| DynamicsFrame::build(entry, gravity, dt))
                .collect();
        }
        self.bodies
            .iter()
            .map(|entry| DynamicsFrame::build(entry, gravity, dt))
            .collect()
    }

    /// Kinematics-only step for the given bodies: controllers write joint
    /// targets and forward kinematics runs, anchored at the support foot when
    /// walking is enabled.
    pub fn calc_kinematics(&mut self, active: &[BodyHandle], walking: bool) -> Result<()> {
        if let Some(&stale) = active.iter().find(|&&h| !self.bodies.contains(h)) {
            return Err(SimError::UnregisteredBody(stale));
        }
        for &handle in active {
            if let Some(entry) = self.bodies.get_mut(handle) {
                Self::controller_output(entry);
                step_kinematic(&mut entry.body, walking);
                Self::controller_advance(entry);
            }
        }
        self.current_time += self.time_step;
        Ok(())
    }

    /// Advances every body by one time step.
    ///
    /// Accumulators must have been cleared by the caller; the contact forces
    /// written here stay readable until the next clear.
    pub fn calc_next_state(
        &mut self,
        detector: &mut dyn CollisionDetector,
        walking: bool,
        trace: Option<&mut (dyn TraceSink + '_)>,
    ) -> Result<WorldStepReport> {
        let dt = self.time_step;
        let gravity = self.gravity;

        self.for_each_body(|entry| {
            Self::controller_output(entry);
            Self::refresh_kinematics(entry, walking);
        });

        let candidates = {
            let _timer = ScopedTimer::new("contacts::detect");
            detector.detect(self)
        };
        let (contacts, stats) = intake(candidates, self.solver.config(), &self.bodies)?;

        let mut frames = {
            let _timer = ScopedTimer::new("dynamics::frames");
            self.build_frames()
        };

        let report = {
            let _timer = ScopedTimer::new("solver::gauss_seidel");
            self.solver.solve(&contacts, &self.bodies, &mut frames, dt, trace)
        };

        for (contact, solution) in contacts.iter().zip(&report.contacts) {
            apply_contact_force(&mut self.bodies, contact, solution.force);
        }
        let is_2d = self.solver.config().is_2d_mode();
        if is_2d {
            project_accumulators(&mut self.bodies);
        }

        let integrator = Integrator::new(dt).with_2d_mode(is_2d);
        {
            let _timer = ScopedTimer::new("dynamics::integrate");
            for (index, entry) in self.bodies.iter_mut().enumerate() {
                if matches!(entry.dynamics, BodyDynamics::Kinematic) {
                    continue;
                }
                let frame = &frames[index];
                if frame.has_unknowns() {
                    let accelerations = frame.unknown_accelerations(entry, gravity);
                    Integrator::store_accelerations(entry, &frame.unknown, &accelerations);
                }
                integrator.step(entry, report.corrections[index]);
            }
        }

        self.for_each_body(|entry| {
            if !entry.dynamics.is_kinematic() {
                entry.body.update_kinematics();
            }
            Self::controller_advance(entry);
        });

        self.current_time += dt;
        Ok(WorldStepReport {
            intake: stats,
            solver: report,
        })
    }
}
