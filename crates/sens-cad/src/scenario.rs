//! Scenario drivers
//!
//! A scenario builds one parametric body, tessellates it, and then for every
//! scalar of its defining vector sets a unit velocity, rebuilds the body with
//! that scalar stepped, maps the base tessellation onto the rebuilt body and
//! pings the two.

use glam::DVec3;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::config::PingConfig;
use crate::error::{SensError, SensResult};
use crate::kernel::{CadKernel, Orientation, Primitive, PrimitiveKind};
use crate::model::{Context, EntityId, TempScope};
use crate::oracle::{PingReport, ping_bodies};
use crate::params::DesignParameters;
use crate::propagate::{
    face_from_loop_dot, make_face_from_loop, make_planar_loop, make_sheet_body, planar_loop_dot,
    solid_primitive_dot,
};

/// Body families covered by the standard suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Box,
    Sphere,
    Cone,
    Cylinder,
    Torus,
    /// Sheet body on a face built from a closed polygon of straight edges
    Face,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Box,
        Family::Sphere,
        Family::Cone,
        Family::Cylinder,
        Family::Torus,
        Family::Face,
    ];

    /// Native primitive behind the family, `None` for constructed faces
    pub fn primitive_kind(self) -> Option<PrimitiveKind> {
        match self {
            Family::Box => Some(PrimitiveKind::Box),
            Family::Sphere => Some(PrimitiveKind::Sphere),
            Family::Cone => Some(PrimitiveKind::Cone),
            Family::Cylinder => Some(PrimitiveKind::Cylinder),
            Family::Torus => Some(PrimitiveKind::Torus),
            Family::Face => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress of a scenario through one orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioState {
    Built,
    Tessellated,
    VelocitySet(usize),
    Perturbed(usize),
    Mapped(usize),
    Verified(usize),
    Done,
}

/// One parametric body family at one nominal design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub family: Family,
    /// Defining vector; polygon vertices flattened to xyz triples for faces
    pub nominal: Vec<f64>,
    #[serde(default = "default_orientations")]
    pub orientations: Vec<Orientation>,
    #[serde(default)]
    pub config: PingConfig,
}

fn default_orientations() -> Vec<Orientation> {
    vec![Orientation::Outward]
}

impl Scenario {
    pub fn new(family: Family, nominal: Vec<f64>) -> Self {
        Self {
            family,
            nominal,
            orientations: default_orientations(),
            config: PingConfig::default(),
        }
    }

    pub fn with_orientations(mut self, orientations: &[Orientation]) -> Self {
        self.orientations = orientations.to_vec();
        self
    }

    pub fn with_config(mut self, config: PingConfig) -> Self {
        self.config = config;
        self
    }

    /// The reference scenario of a family
    pub fn standard(family: Family) -> Self {
        let both = [Orientation::Outward, Orientation::Inward];
        match family {
            Family::Box => Self::new(family, vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]),
            Family::Sphere => {
                Self::new(family, vec![1.0, 0.5, -0.5, 1.5]).with_orientations(&both)
            }
            Family::Cone => Self::new(family, vec![0.5, 0.25, 2.5, 0.5, 0.25, 0.5, 1.0])
                .with_orientations(&both),
            Family::Cylinder => Self::new(family, vec![0.5, 0.25, 0.0, 0.5, 0.25, 2.0, 0.75])
                .with_orientations(&both),
            // axis truncation error at 1e-7 is of the order of the tolerance
            Family::Torus => Self::new(family, vec![0.5, 0.25, 0.0, 0.0, 0.0, 1.0, 2.0, 0.5])
                .with_config(PingConfig::default().with_step(1e-8)),
            Family::Face => Self::new(
                family,
                vec![1.0, 0.0, 0.0, 3.0, 1.0, 0.0, 0.5, 2.0, 0.5],
            ),
        }
    }

    /// Names of the design parameters, one per scalar of `nominal`
    pub fn parameter_names(&self) -> Vec<String> {
        match self.family.primitive_kind() {
            Some(kind) => kind.parameter_names().iter().map(|n| n.to_string()).collect(),
            None => (0..self.nominal.len())
                .map(|i| format!("{}{}", ["x", "y", "z"][i % 3], i / 3))
                .collect(),
        }
    }

    pub fn validate(&self) -> SensResult<()> {
        self.config.validate()?;
        if self.orientations.is_empty() {
            return Err(SensError::InvalidConfig(format!(
                "{} scenario has no orientations",
                self.family
            )));
        }
        let ok = match self.family.primitive_kind() {
            Some(kind) => self.nominal.len() == kind.param_count(),
            None => self.nominal.len() >= 9 && self.nominal.len() % 3 == 0,
        };
        if !ok {
            return Err(SensError::InvalidConfig(format!(
                "{} scenario has {} nominal values",
                self.family,
                self.nominal.len()
            )));
        }
        Ok(())
    }
}

/// Scenarios to run together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub scenarios: Vec<Scenario>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl SuiteConfig {
    /// Every family at its reference design
    pub fn standard() -> Self {
        Self {
            scenarios: Family::ALL.into_iter().map(Scenario::standard).collect(),
        }
    }
}

/// A body under test and what its velocity is set from
enum Built {
    Solid { body: EntityId, primitive: Primitive },
    Sheet { body: EntityId, face: EntityId, lp: EntityId },
}

impl Built {
    fn body(&self) -> EntityId {
        match self {
            Built::Solid { body, .. } | Built::Sheet { body, .. } => *body,
        }
    }
}

/// Polygon vertices from flattened coordinates, reversed for inward faces
fn polygon(values: &[f64], orientation: Orientation) -> Vec<DVec3> {
    let mut points: Vec<DVec3> = values.chunks_exact(3).map(DVec3::from_slice).collect();
    if orientation == Orientation::Inward {
        points.reverse();
    }
    points
}

/// Walks one scenario in one orientation
pub struct ScenarioDriver<'a> {
    kernel: &'a dyn CadKernel,
    scenario: &'a Scenario,
    orientation: Orientation,
    states: Vec<ScenarioState>,
    reports: Vec<PingReport>,
}

impl<'a> ScenarioDriver<'a> {
    pub fn new(kernel: &'a dyn CadKernel, scenario: &'a Scenario, orientation: Orientation) -> Self {
        Self {
            kernel,
            scenario,
            orientation,
            states: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// States visited so far, in order
    pub fn states(&self) -> &[ScenarioState] {
        &self.states
    }

    /// Reports of the directions verified so far, one per design parameter
    pub fn reports(&self) -> &[PingReport] {
        &self.reports
    }

    fn enter(&mut self, state: ScenarioState) {
        tracing::debug!("{} {:?}: {:?}", self.scenario.family, self.orientation, state);
        self.states.push(state);
    }

    fn build(&self, ctx: &mut Context, values: &[f64]) -> SensResult<Built> {
        match self.scenario.family.primitive_kind() {
            Some(kind) => {
                let primitive = Primitive::new(kind, self.orientation, values.to_vec())?;
                let body = self.kernel.make_solid(ctx, &primitive)?;
                Ok(Built::Solid { body, primitive })
            }
            None => {
                let mut scope = TempScope::new(ctx);
                let lp = make_planar_loop(&mut scope, &polygon(values, self.orientation))?;
                scope.push(lp);
                let face = make_face_from_loop(&mut scope, lp)?;
                scope.push(face);
                let body = make_sheet_body(&mut scope, face)?;
                Ok(Built::Sheet { body, face, lp })
            }
        }
    }

    fn set_velocity(&self, ctx: &mut Context, built: &Built, params: &DesignParameters) -> SensResult<()> {
        params.active_direction()?;
        let dots = params.dots();
        match built {
            Built::Solid { body, primitive } => {
                solid_primitive_dot(ctx, self.kernel, *body, primitive, &dots)
            }
            Built::Sheet { face, lp, .. } => {
                planar_loop_dot(ctx, *lp, &polygon(&dots, self.orientation))?;
                face_from_loop_dot(ctx, *face)
            }
        }
    }

    /// Run every direction, keeping a report per verified design parameter
    ///
    /// Reports of directions finished before a structural error stay
    /// available through [`reports`](Self::reports).
    pub fn run(&mut self) -> SensResult<()> {
        let scenario = self.scenario;
        scenario.validate()?;
        let config = &scenario.config;

        let mut params = DesignParameters::new();
        for (name, &value) in scenario.parameter_names().into_iter().zip(&scenario.nominal) {
            params.push(name, value);
        }

        let mut ctx = Context::new();
        let base = self.build(&mut ctx, &params.values())?;
        self.enter(ScenarioState::Built);
        let tess1 = self.kernel.tessellate(&ctx, base.body(), &config.tess_quality)?;
        self.enter(ScenarioState::Tessellated);

        for i in 0..params.len() {
            ctx.clear_all_velocities();
            params.seed(i)?;
            self.set_velocity(&mut ctx, &base, &params)?;
            self.enter(ScenarioState::VelocitySet(i));

            let perturbed = self.build(&mut ctx, &params.perturbed(i, config.step)?)?;
            self.enter(ScenarioState::Perturbed(i));
            let tess2 = self.kernel.map_tessellation(&ctx, &tess1, perturbed.body())?;
            self.enter(ScenarioState::Mapped(i));

            let name = params.get(i).map(|p| p.name.as_str()).unwrap_or_default();
            let label = format!("{} {:?} {}", scenario.family, self.orientation, name);
            let report = ping_bodies(&ctx, &tess1, &tess2, i, &label, config)?;
            self.enter(ScenarioState::Verified(i));

            self.reports.push(report);
            ctx.delete(perturbed.body())?;
        }
        self.enter(ScenarioState::Done);
        Ok(())
    }
}

fn serialize_error<S: Serializer>(error: &Option<SensError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Result of one scenario in one orientation
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub family: Family,
    pub orientation: Orientation,
    /// Error that stopped the scenario early, if any
    #[serde(serialize_with = "serialize_error")]
    pub structural: Option<SensError>,
    pub states: Vec<ScenarioState>,
    pub reports: Vec<PingReport>,
}

impl ScenarioOutcome {
    /// Failing components over every direction
    pub fn finding_count(&self) -> usize {
        self.reports.iter().map(PingReport::failure_count).sum()
    }

    pub fn passed(&self) -> bool {
        self.structural.is_none() && self.finding_count() == 0
    }
}

/// Outcomes of a whole suite
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn finding_count(&self) -> usize {
        self.outcomes.iter().map(ScenarioOutcome::finding_count).sum()
    }

    /// Number of scenario orientations stopped by a structural error
    pub fn structural_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.structural.is_some()).count()
    }

    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(ScenarioOutcome::passed)
    }
}

/// Run one scenario in one orientation, keeping whatever finished
pub fn run_scenario(kernel: &dyn CadKernel, scenario: &Scenario, orientation: Orientation) -> ScenarioOutcome {
    let mut driver = ScenarioDriver::new(kernel, scenario, orientation);
    let structural = match driver.run() {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!("{} {:?} stopped: {}", scenario.family, orientation, e);
            Some(e)
        }
    };
    let outcome = ScenarioOutcome {
        family: scenario.family,
        orientation,
        structural,
        states: driver.states,
        reports: driver.reports,
    };
    tracing::info!(
        "{} {:?}: {} directions, {} findings",
        outcome.family,
        orientation,
        outcome.reports.len(),
        outcome.finding_count()
    );
    outcome
}

/// Run every scenario in every orientation
///
/// A structural error stops only the scenario orientation it occurred in.
pub fn run_suite(kernel: &dyn CadKernel, scenarios: &[Scenario]) -> SuiteReport {
    let outcomes = scenarios
        .iter()
        .flat_map(|scenario| {
            scenario
                .orientations
                .iter()
                .map(move |&orientation| run_scenario(kernel, scenario, orientation))
        })
        .collect();
    SuiteReport { outcomes }
}
