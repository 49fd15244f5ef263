//! Simulation session: lifecycle, configuration application, body
//! activation and the per-step entry point.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    collision::{
        contact::{CollisionDetector, NullDetector},
        culling::IntakeStats,
    },
    config::{DynamicsMode, IntegrationMode, SimulatorConfig},
    core::{articulations::Multibody, body::BodyDynamics},
    dynamics::{
        high_gain::{HighGainController, ReferenceMotion},
        solver::ContactSolution,
    },
    error::{Result, SimError},
    utils::{
        allocator::BodyHandle,
        logging::{LogSink, TraceEvent, TraceSink},
    },
    world::World,
};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Stepping,
    Finalized,
}

/// A body to register at initialization.
#[derive(Debug, Clone)]
pub struct BodySpec {
    pub body: Multibody,
    /// Joint trajectory replayed by a high-gain controller.
    pub reference_motion: Option<ReferenceMotion>,
    /// Pins the dynamics mode regardless of the session mode.
    pub mode: Option<DynamicsMode>,
}

impl BodySpec {
    pub fn new(body: Multibody) -> Self {
        Self {
            body,
            reference_motion: None,
            mode: None,
        }
    }

    pub fn with_reference_motion(mut self, motion: ReferenceMotion) -> Self {
        self.reference_motion = Some(motion);
        self
    }

    pub fn with_mode(mut self, mode: DynamicsMode) -> Self {
        self.mode = Some(mode);
        self
    }

    fn resolve_mode(&self, session_mode: DynamicsMode) -> DynamicsMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        if session_mode == DynamicsMode::HighGain || self.reference_motion.is_some() {
            DynamicsMode::HighGain
        } else {
            session_mode
        }
    }
}

/// A controller that could not be started; its body still takes part.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationFailure {
    pub body: BodyHandle,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    /// Handles in the order the specs were given.
    pub handles: Vec<BodyHandle>,
    pub activation_failures: Vec<ActivationFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Simulated time after the step.
    pub time: f64,
    pub intake: IntakeStats,
    pub iterations: u32,
    pub converged: bool,
    pub max_delta: f64,
    pub contacts: Vec<ContactSolution>,
}

/// Owns the world, the collision detector and the trace sink, and applies the
/// configuration when initialized.
pub struct Session {
    config: SimulatorConfig,
    world: World,
    state: SessionState,
    detector: Box<dyn CollisionDetector>,
    trace: Option<Box<dyn TraceSink>>,
    log_sink: LogSink,
}

/// A session shared between threads.
pub type SharedSession = Arc<Mutex<Session>>;

impl Session {
    pub fn new(config: SimulatorConfig, time_step: f64) -> Result<Self> {
        Ok(Self {
            config,
            world: World::new(time_step)?,
            state: SessionState::Uninitialized,
            detector: Box::new(NullDetector),
            trace: None,
            log_sink: LogSink,
        })
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Configuration edits take effect at the next [`Session::initialize`].
    pub fn config_mut(&mut self) -> &mut SimulatorConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: SimulatorConfig) {
        self.config = config;
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Only allowed before [`Session::initialize`] or after
    /// [`Session::finalize`]; controllers are validated against the rate in
    /// force at initialization.
    pub fn set_time_step(&mut self, time_step: f64) -> Result<()> {
        if matches!(self.state, SessionState::Initialized | SessionState::Stepping) {
            return Err(SimError::InvalidState {
                operation: "change the time step",
                state: self.state,
            });
        }
        self.world.set_time_step(time_step)
    }

    pub fn set_collision_detector(&mut self, detector: Box<dyn CollisionDetector>) {
        self.detector = detector;
    }

    /// Routes per-step diagnostics to `sink`; `None` falls back to the `log`
    /// facade when `debug_output` is set.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace = sink;
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.world.set_parallel_enabled(enabled);
    }

    /// Clears the world, applies the configuration and registers `specs`.
    ///
    /// An invalid body aborts initialization and leaves the session
    /// uninitialized. A controller that fails to start only drops that
    /// controller; the failure is listed in the report.
    pub fn initialize(&mut self, specs: Vec<BodySpec>) -> Result<InitReport> {
        self.world.clear_bodies();
        self.world.initialize();
        self.state = SessionState::Uninitialized;

        if self.config.integration_mode() == IntegrationMode::RungeKutta {
            log::warn!("Runge-Kutta integration is not available; stepping with semi-implicit Euler");
        }
        self.world.gravity = self.config.gravity();
        self.world.set_solver_config(self.config.solver().clone());

        let session_mode = self.config.dynamics_mode();
        let time_step = self.world.time_step();
        let mut report = InitReport::default();

        for spec in specs {
            let mode = spec.resolve_mode(session_mode);
            let dynamics = match mode {
                DynamicsMode::ForwardDynamics => BodyDynamics::ForwardDynamics,
                DynamicsMode::HighGain => BodyDynamics::HighGain(None),
                DynamicsMode::Kinematics => BodyDynamics::Kinematic,
            };
            let handle = match self.world.add_body(spec.body, dynamics) {
                Ok(handle) => handle,
                Err(err) => {
                    self.world.clear_bodies();
                    return Err(err);
                }
            };
            report.handles.push(handle);

            let (Some(motion), Some(entry)) = (spec.reference_motion, self.world.body_mut(handle)) else {
                continue;
            };
            match HighGainController::start(motion, &entry.body, time_step) {
                Ok(controller) => {
                    if mode == DynamicsMode::HighGain || mode == DynamicsMode::Kinematics {
                        controller.output(&mut entry.body);
                        entry.body.update_kinematics();
                    }
                    match &mut entry.dynamics {
                        BodyDynamics::HighGain(slot) => *slot = Some(controller),
                        _ => log::warn!(
                            "body `{}` is not in high-gain mode; its reference motion is ignored",
                            entry.body.name
                        ),
                    }
                }
                Err(err) => {
                    log::warn!("controller of `{}` was not started: {err}", entry.body.name);
                    report.activation_failures.push(ActivationFailure {
                        body: handle,
                        name: entry.body.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        self.state = SessionState::Initialized;
        log::info!(
            "session initialized with {} bodies ({:?}, dt = {})",
            report.handles.len(),
            session_mode,
            time_step
        );
        Ok(report)
    }

    /// Advances the simulation by one time step.
    ///
    /// `active` lists the bodies advanced in kinematics mode; in the dynamic
    /// modes every registered body is stepped and `active` is only checked.
    pub fn step(&mut self, active: &[BodyHandle]) -> Result<StepReport> {
        if matches!(self.state, SessionState::Uninitialized | SessionState::Finalized) {
            return Err(SimError::InvalidState {
                operation: "step",
                state: self.state,
            });
        }
        self.state = SessionState::Stepping;

        let Session {
            config,
            world,
            detector,
            trace,
            log_sink,
            ..
        } = self;
        let mut sink: Option<&mut dyn TraceSink> = match trace {
            Some(custom) => Some(custom.as_mut()),
            None if config.debug_output() => Some(log_sink as &mut dyn TraceSink),
            None => None,
        };

        world.clear_external_forces();
        if let Some(sink) = sink.as_mut() {
            sink.record(&TraceEvent::StepBegin {
                time: world.current_time(),
                bodies: world.num_bodies(),
            });
        }

        let walking = config.is_kinematic_walking_enabled();
        let mut report = StepReport {
            converged: true,
            ..StepReport::default()
        };
        if config.dynamics_mode() == DynamicsMode::Kinematics {
            world.calc_kinematics(active, walking)?;
        } else {
            if let Some(&stale) = active.iter().find(|&&h| world.body(h).is_none()) {
                return Err(SimError::UnregisteredBody(stale));
            }
            let reborrowed = sink.as_mut().map(|s| &mut **s as &mut dyn TraceSink);
            let stepped = world.calc_next_state(detector.as_mut(), walking, reborrowed)?;
            report.intake = stepped.intake;
            report.iterations = stepped.solver.iterations;
            report.converged = stepped.solver.converged;
            report.max_delta = stepped.solver.max_delta;
            report.contacts = stepped.solver.contacts;
        }
        report.time = world.current_time();

        if let Some(sink) = sink {
            sink.record(&TraceEvent::StepEnd { time: report.time });
        }
        Ok(report)
    }

    pub fn finalize(&mut self) {
        if self.state != SessionState::Finalized {
            log::info!(
                "session finalized at t = {} with {} bodies",
                self.world.current_time(),
                self.world.num_bodies()
            );
        }
        self.state = SessionState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, RootJoint};
    use glam::DVec3;

    fn arm() -> Multibody {
        let mut body = Multibody::new("arm", RootJoint::Fixed);
        body.add_link(Link::new("base", None, JointType::Fixed));
        body.add_link(Link::new("link", Some(0), JointType::Revolute { axis: DVec3::Y }));
        body
    }

    #[test]
    fn step_requires_initialization() {
        let mut session = Session::new(SimulatorConfig::default(), 0.001).unwrap();
        assert!(matches!(
            session.step(&[]),
            Err(SimError::InvalidState {
                state: SessionState::Uninitialized,
                ..
            })
        ));
        session.initialize(vec![BodySpec::new(arm())]).unwrap();
        session.step(&[]).unwrap();
        assert_eq!(session.state(), SessionState::Stepping);
        session.finalize();
        assert!(session.step(&[]).is_err());
    }

    #[test]
    fn reference_motion_selects_high_gain() {
        let mut session = Session::new(SimulatorConfig::default(), 0.001).unwrap();
        let motion = ReferenceMotion::new(1000.0, vec![vec![0.0], vec![0.1]]);
        let report = session
            .initialize(vec![BodySpec::new(arm()).with_reference_motion(motion), BodySpec::new(arm())])
            .unwrap();
        let world = session.world();
        assert_eq!(world.body(report.handles[0]).unwrap().mode(), DynamicsMode::HighGain);
        assert_eq!(world.body(report.handles[1]).unwrap().mode(), DynamicsMode::ForwardDynamics);
        assert!(report.activation_failures.is_empty());
    }

    #[test]
    fn failed_activation_keeps_the_body() {
        let mut session = Session::new(SimulatorConfig::default(), 0.001).unwrap();
        let motion = ReferenceMotion::new(1000.0, vec![]);
        let report = session
            .initialize(vec![BodySpec::new(arm()).with_reference_motion(motion)])
            .unwrap();
        assert_eq!(report.activation_failures.len(), 1);
        assert_eq!(report.activation_failures[0].message, "Reference motion is empty");
        let entry = session.world().body(report.handles[0]).unwrap();
        assert!(matches!(entry.dynamics, BodyDynamics::HighGain(None)));
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn time_step_is_locked_between_initialize_and_finalize() {
        let mut session = Session::new(SimulatorConfig::default(), 0.001).unwrap();
        session.set_time_step(0.002).unwrap();
        session.initialize(vec![BodySpec::new(arm())]).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                session.set_time_step(0.001),
                Err(SimError::InvalidState { .. })
            ));
            session.step(&[]).unwrap();
        }
        assert_eq!(session.world().time_step(), 0.002);

        session.finalize();
        session.set_time_step(0.001).unwrap();
        assert_eq!(session.world().time_step(), 0.001);
    }
}
