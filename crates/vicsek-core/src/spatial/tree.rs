use super::NeighborLists;
use crate::geometry::Domain;
use rstar::{RTree, RTreeObject, AABB};

/// Relative padding of query envelopes; candidates are re-checked with the
/// exact periodic distance, so the padding only ever adds candidates.
const ENVELOPE_PAD: f64 = 1e-9;

/// Position-only entry so the tree never holds full particles.
#[derive(Clone, Debug)]
pub struct ParticleLocation {
    pub index: usize,
    pub position: [f64; 2],
}

impl RTreeObject for ParticleLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

pub fn build_index(positions: &[[f64; 2]]) -> RTree<ParticleLocation> {
    let locations: Vec<ParticleLocation> = positions
        .iter()
        .enumerate()
        .map(|(index, &position)| ParticleLocation { index, position })
        .collect();
    RTree::bulk_load(locations)
}

pub(crate) fn find_rtree(
    domain: &Domain,
    positions: &[[f64; 2]],
    radii: &[f64],
    out: &mut NeighborLists,
) {
    out.clear();
    let tree = build_index(positions);
    let length = domain.length();
    let pad = ENVELOPE_PAD * length;
    let mut scratch = Vec::new();

    for (&center, &radius) in positions.iter().zip(radii) {
        let r_sq = radius * radius;
        scratch.clear();

        if radius * 2.0 >= length {
            // Every image window overlaps; a linear scan is both simpler and exact.
            scratch.extend(
                tree.iter()
                    .filter(|loc| domain.distance_sq(center, loc.position) <= r_sq)
                    .map(|loc| loc.index),
            );
        } else {
            let reach = radius + pad;
            let (x_offsets, x_len) = wrap_offsets(center[0], reach, length);
            let (y_offsets, y_len) = wrap_offsets(center[1], reach, length);
            for &xoff in &x_offsets[..x_len] {
                for &yoff in &y_offsets[..y_len] {
                    let translated = [center[0] + xoff, center[1] + yoff];
                    let envelope = AABB::from_corners(
                        [translated[0] - reach, translated[1] - reach],
                        [translated[0] + reach, translated[1] + reach],
                    );
                    for loc in tree.locate_in_envelope(&envelope) {
                        if domain.distance_sq(center, loc.position) <= r_sq {
                            scratch.push(loc.index);
                        }
                    }
                }
            }
            // Padded windows may touch when 2r is within the pad of the length.
            scratch.sort_unstable();
            scratch.dedup();
        }

        for &j in &scratch {
            out.push(j);
        }
        out.close_set();
    }
}

/// Image offsets along one axis whose query window can reach a neighbor.
fn wrap_offsets(coord: f64, radius: f64, length: f64) -> ([f64; 3], usize) {
    let mut offsets = [0.0; 3];
    let mut len = 1usize;
    if coord < radius {
        offsets[len] = length;
        len += 1;
    }
    if coord + radius >= length {
        offsets[len] = -length;
        len += 1;
    }
    (offsets, len)
}
