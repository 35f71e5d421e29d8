use super::super::VicsekModel;

impl VicsekModel {
    /// Recompute every particle's neighbor set from the current positions.
    pub(in crate::model) fn step_neighbor_phase(&mut self) {
        self.positions_buffer.clear();
        self.positions_buffer
            .extend(self.particles.iter().map(|p| p.position));
        self.finder.find(
            &self.domain,
            &self.positions_buffer,
            &self.radii,
            &mut self.neighbors,
        );
    }
}
