use super::super::VicsekModel;

impl VicsekModel {
    /// Move mobile particles along their new headings and wrap into the domain.
    pub(in crate::model) fn step_integration_phase(&mut self) {
        let dt = self.config.dt;
        let domain = &self.domain;
        let next = &mut self.next_positions_buffer;
        next.clear();
        for (particle, &heading) in self.particles.iter().zip(&self.headings_buffer) {
            if !particle.mobile {
                next.push(particle.position);
                continue;
            }
            let (sin, cos) = heading.sin_cos();
            let step = particle.speed * dt;
            next.push(domain.wrap([
                particle.position[0] + step * cos,
                particle.position[1] + step * sin,
            ]));
        }
    }

    /// Index of the first particle whose pending state is not finite.
    pub(in crate::model) fn first_non_finite(&self) -> Option<usize> {
        self.headings_buffer
            .iter()
            .zip(&self.next_positions_buffer)
            .position(|(h, p)| !(h.is_finite() && p[0].is_finite() && p[1].is_finite()))
    }

    pub(in crate::model) fn commit_step(&mut self) {
        for ((particle, &heading), &position) in self
            .particles
            .iter_mut()
            .zip(&self.headings_buffer)
            .zip(&self.next_positions_buffer)
        {
            particle.heading = heading;
            particle.position = position;
        }
    }
}
