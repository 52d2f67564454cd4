//! The core simulation driver.
//!
//! An embedding time loop calls [`Simulation::setup_solve`] once and then
//! [`Simulation::update_at_end_of_time_step`] every tick. Each step runs,
//! in order: neighbour refresh (on its cadence), force clearing, force
//! modules, spreading, the spectral fluid solve, interpolation, and node
//! advection. Division errors are surfaced to the caller of the divide
//! operations; any error from a step aborts that step.

use std::io;

use glam::DVec2;

use crate::config::SimulationParameters;
use crate::coupling;
use crate::error::{Result, SimulationError};
use crate::fluid::NavierStokesSolver;
use crate::forces::IbForce;
use crate::geometry::torus;
use crate::mesh::Mesh;
use crate::neighbors::BoxCollection;
use crate::population::CellPopulation;

pub struct Simulation {
    mesh: Mesh,
    population: CellPopulation,
    forces: Vec<Box<dyn IbForce>>,
    parameters: SimulationParameters,
    solver: Option<NavierStokesSolver>,
    boxes: Option<BoxCollection>,
    node_pairs: Vec<(usize, usize)>,
}

impl Simulation {
    pub fn new(mesh: Mesh, population: CellPopulation, parameters: SimulationParameters) -> Self {
        Self {
            mesh,
            population,
            forces: Vec::new(),
            parameters,
            solver: None,
            boxes: None,
            node_pairs: Vec::new(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn population(&self) -> &CellPopulation {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut CellPopulation {
        &mut self.population
    }

    pub fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    pub fn node_pairs(&self) -> &[(usize, usize)] {
        &self.node_pairs
    }

    /// Register a force module. Modules contribute in registration order.
    pub fn add_force(&mut self, force: Box<dyn IbForce>) {
        self.forces.push(force);
    }

    /// One-time setup: validate configuration, build the neighbour search
    /// and the spectral solver, then solve the fluid problem once for the
    /// initial boundary configuration.
    pub fn setup_solve(&mut self) -> Result<()> {
        self.parameters.validate()?;
        if let Some(spacing) = self.parameters.element_division_spacing {
            self.mesh.set_element_division_spacing(spacing);
        }

        let fluid = &self.parameters.fluid;
        if fluid.num_grid_pts_x != self.mesh.num_grid_pts_x()
            || fluid.num_grid_pts_y != self.mesh.num_grid_pts_y()
        {
            return Err(SimulationError::Config(format!(
                "parameter grid {}x{} does not match mesh grid {}x{}",
                fluid.num_grid_pts_x,
                fluid.num_grid_pts_y,
                self.mesh.num_grid_pts_x(),
                self.mesh.num_grid_pts_y()
            )));
        }

        self.solver = Some(NavierStokesSolver::new(
            fluid.num_grid_pts_x,
            fluid.num_grid_pts_y,
            fluid.reynolds,
            fluid.fft_threads,
        )?);

        let boxes = BoxCollection::new(self.population.interaction_distance())?;
        let (pairs, _) = boxes.calculate_node_pairs(self.mesh.nodes());
        self.node_pairs = pairs;
        self.boxes = Some(boxes);

        // Solve the fluid problem once for the starting mesh
        let dt = self.parameters.fluid.dt;
        self.update_fluid_velocity_grids(dt)
    }

    /// Advance one step: refresh neighbours on the configured cadence,
    /// recompute and spread forces, advance the fluid, then advect every
    /// node with its interpolated velocity.
    pub fn update_at_end_of_time_step(&mut self, dt: f64, step_index: u64) -> Result<()> {
        if self.solver.is_none() {
            return Err(SimulationError::Config(
                "setup_solve must be called before stepping".into(),
            ));
        }

        if step_index % self.parameters.node_neighbour_update_frequency as u64 == 0 {
            if let Some(boxes) = &self.boxes {
                let (pairs, _) = boxes.calculate_node_pairs(self.mesh.nodes());
                self.node_pairs = pairs;
            }
        }

        self.update_fluid_velocity_grids(dt)?;

        // New node velocities from the updated grid, then advection with
        // wrap-around into [0,1)^2
        let velocities = coupling::interpolate_node_velocities(&self.mesh);
        for (node, velocity) in self.mesh.nodes_mut().iter_mut().zip(velocities) {
            node.location = torus::wrap(node.location + dt * velocity);
        }

        Ok(())
    }

    /// Clear, accumulate and spread forces, then advance the fluid.
    fn update_fluid_velocity_grids(&mut self, dt: f64) -> Result<()> {
        self.mesh.clear_forces();
        self.mesh.balance_fluid_sources();

        for force in &mut self.forces {
            force.add_force_contribution(&mut self.mesh, &self.node_pairs, &self.population)?;
        }

        coupling::spread_forces(&mut self.mesh);

        match &self.solver {
            Some(solver) => solver.step(&mut self.mesh, dt),
            None => Err(SimulationError::Config(
                "setup_solve must be called before stepping".into(),
            )),
        }
    }

    /// Divide an element along the given axis and register the daughter
    /// as a new cell.
    pub fn divide_element_along_axis(
        &mut self,
        elem_idx: usize,
        axis: DVec2,
        place_original_below: bool,
    ) -> Result<usize> {
        let new_elem = self
            .mesh
            .divide_element_along_axis(elem_idx, axis, place_original_below)?;
        self.population.add_cell(new_elem);
        Ok(new_elem)
    }

    /// Divide an element along its short axis and register the daughter
    /// as a new cell.
    pub fn divide_element_along_short_axis(
        &mut self,
        elem_idx: usize,
        place_original_below: bool,
    ) -> Result<usize> {
        let new_elem = self
            .mesh
            .divide_element_along_short_axis(elem_idx, place_original_below)?;
        self.population.add_cell(new_elem);
        Ok(new_elem)
    }

    /// Dump every registered force module's parameters as
    /// `<Name>value</Name>` lines, in registration order.
    pub fn write_force_parameters(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for force in &self.forces {
            force.write_parameters(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationParameters;
    use crate::forces::MembraneElasticityForce;
    use crate::geometry::Superellipse;
    use crate::mesh::{Element, Node};

    fn circle_simulation(num_grid_pts: usize) -> Simulation {
        let num_nodes = 64;
        let gen = Superellipse::new(num_nodes, 1.0, 0.4, 0.4, DVec2::new(0.3, 0.3)).unwrap();
        let nodes: Vec<Node> = gen
            .generate()
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Node::new(i, loc, true))
            .collect();
        let element = Element::new(0, (0..num_nodes).collect());
        let mesh = Mesh::new(nodes, vec![element], num_grid_pts, num_grid_pts, None).unwrap();
        let population = CellPopulation::new(vec![0], 0.05).unwrap();

        let mut parameters = SimulationParameters::default();
        parameters.fluid.num_grid_pts_x = num_grid_pts;
        parameters.fluid.num_grid_pts_y = num_grid_pts;
        parameters.fluid.dt = 0.01;
        Simulation::new(mesh, population, parameters)
    }

    #[test]
    fn test_stepping_requires_setup() {
        let mut sim = circle_simulation(32);
        let err = sim.update_at_end_of_time_step(0.01, 0).unwrap_err();
        assert!(matches!(err, SimulationError::Config(_)));
    }

    #[test]
    fn test_setup_checks_grid_agreement() {
        let mut sim = circle_simulation(32);
        sim.parameters.fluid.num_grid_pts_x = 64;
        sim.parameters.fluid.num_grid_pts_y = 64;
        assert!(matches!(
            sim.setup_solve(),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_force_free_step_leaves_everything_at_rest() {
        let mut sim = circle_simulation(32);
        sim.setup_solve().unwrap();
        let before: Vec<DVec2> = sim.mesh().nodes().iter().map(|n| n.location).collect();
        for step in 0..5 {
            sim.update_at_end_of_time_step(0.01, step).unwrap();
        }
        for (node, old) in sim.mesh().nodes().iter().zip(before) {
            assert!(
                (node.location - old).length() < 1e-14,
                "node drifted without forces"
            );
        }
    }

    #[test]
    fn test_step_with_membrane_force_moves_nodes_and_keeps_domain() {
        let mut sim = circle_simulation(32);
        sim.mesh_mut().element_mut(0).set_membrane_spring_constant(1e6);
        sim.mesh_mut().element_mut(0).set_membrane_rest_length(0.001);
        sim.add_force(Box::new(MembraneElasticityForce::new(1e6, 0.001)));
        sim.setup_solve().unwrap();

        let before: Vec<DVec2> = sim.mesh().nodes().iter().map(|n| n.location).collect();
        for step in 0..3 {
            sim.update_at_end_of_time_step(0.01, step).unwrap();
        }

        let mut moved = 0;
        for (node, old) in sim.mesh().nodes().iter().zip(before) {
            assert!(node.location.x >= 0.0 && node.location.x < 1.0);
            assert!(node.location.y >= 0.0 && node.location.y < 1.0);
            if (node.location - old).length() > 1e-12 {
                moved += 1;
            }
        }
        assert!(moved > 0, "tensioned membrane should advect its nodes");
    }

    #[test]
    fn test_division_through_driver_adds_cell() {
        let mut sim = circle_simulation(32);
        sim.parameters.element_division_spacing = Some(0.02);
        sim.setup_solve().unwrap();
        let new_elem = sim
            .divide_element_along_axis(0, DVec2::new(0.0, 1.0), true)
            .unwrap();
        assert_eq!(sim.population().cells().len(), 2);
        assert_eq!(sim.population().cells()[1].element_index, new_elem);
    }

    #[test]
    fn test_force_parameter_dump_covers_all_modules() {
        let mut sim = circle_simulation(32);
        sim.add_force(Box::new(MembraneElasticityForce::new(1e8, 0.003)));
        sim.add_force(Box::new(crate::forces::CellCellInteractionForce::new(1e3)));
        let mut out = Vec::new();
        sim.write_force_parameters(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<SpringConstant>"));
        assert!(text.contains("<SpringConst>"));
        assert!(text.contains("<Morse>"));
    }
}
