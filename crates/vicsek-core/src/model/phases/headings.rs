use super::super::VicsekModel;
use crate::alignment::{circular_mean, next_heading, noise_draw};
use crate::geometry::wrap_angle;

impl VicsekModel {
    /// Compute post-step headings from pre-step headings only.
    ///
    /// Noise is drawn for aligning particles in ascending index order;
    /// frozen and turning leaders consume no draws. A particle's own noise
    /// width replaces the model-wide one.
    pub(in crate::model) fn step_heading_phase(&mut self) {
        let directions = &mut self.directions_buffer;
        directions.clear();
        directions.extend(self.particles.iter().map(|p| p.direction()));

        let headings = &mut self.headings_buffer;
        headings.clear();
        let dt = self.config.dt;
        for (i, particle) in self.particles.iter().enumerate() {
            let heading = if !particle.mobile {
                particle.heading
            } else if let Some(omega) = particle.angular_velocity {
                wrap_angle(particle.heading + omega * dt)
            } else {
                let mean = circular_mean(
                    self.neighbors.neighbors(i),
                    directions.as_slice(),
                    &self.weights,
                );
                let xi = noise_draw(&mut self.rng, particle.noise.unwrap_or(self.noise));
                next_heading(particle.heading, mean, xi)
            };
            headings.push(heading);
        }
    }
}
