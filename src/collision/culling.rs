//! Contact intake: separation culling, near-duplicate merging and
//! registration checks.

use crate::collision::contact::ContactCandidate;
use crate::config::SolverConfig;
use crate::core::body::BodyEntry;
use crate::error::{Result, SimError};
use crate::utils::allocator::{BodyHandle, BodyTable};

/// Counts of what intake did with the raw candidates of one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeStats {
    pub received: usize,
    pub culled: usize,
    pub degenerate: usize,
    pub merged: usize,
}

/// Filters candidates by separation and merges those closer than the
/// culling depth on the same link pair. Output keeps first-discovery order.
pub fn cull_contacts(
    candidates: Vec<ContactCandidate>,
    config: &SolverConfig,
) -> (Vec<ContactCandidate>, IntakeStats) {
    let mut stats = IntakeStats {
        received: candidates.len(),
        ..IntakeStats::default()
    };
    let merge_radius_sq = config.contact_culling_depth() * config.contact_culling_depth();
    let mut kept: Vec<ContactCandidate> = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        if !candidate.depth.is_finite() || candidate.separation() > config.contact_culling_distance() {
            stats.culled += 1;
            continue;
        }

        let length = candidate.normal.length();
        if !length.is_finite() || length <= f64::EPSILON || !candidate.position.is_finite() {
            log::warn!(
                "discarding contact between {:?}/{} and {:?}/{} with degenerate normal {:?}",
                candidate.body_a,
                candidate.link_a,
                candidate.body_b,
                candidate.link_b,
                candidate.normal
            );
            stats.degenerate += 1;
            continue;
        }
        candidate.normal /= length;

        let key = candidate.pair_key();
        let duplicate = kept.iter_mut().find(|existing| {
            existing.pair_key() == key
                && existing.position.distance_squared(candidate.position) <= merge_radius_sq
        });
        match duplicate {
            Some(existing) => {
                stats.merged += 1;
                if candidate.depth > existing.depth {
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }

    (kept, stats)
}

fn check_side(bodies: &BodyTable<BodyEntry>, handle: BodyHandle, link: usize) -> Result<()> {
    let entry = bodies.get(handle).ok_or(SimError::UnregisteredBody(handle))?;
    let num_links = entry.body.num_links();
    if link >= num_links {
        return Err(SimError::InvalidLink {
            body: handle,
            link,
            num_links,
        });
    }
    Ok(())
}

/// Verifies every contact against the body table and fills in the relative
/// velocity at the contact point from the current state.
pub fn prepare_contacts(contacts: &mut [ContactCandidate], bodies: &BodyTable<BodyEntry>) -> Result<()> {
    for contact in contacts.iter() {
        check_side(bodies, contact.body_a, contact.link_a)?;
        check_side(bodies, contact.body_b, contact.link_b)?;
    }
    for contact in contacts.iter_mut() {
        let velocity_of = |handle: BodyHandle, link: usize| {
            bodies
                .get(handle)
                .map(|entry| entry.body.point_velocity(link, contact.position))
                .unwrap_or_default()
        };
        contact.relative_velocity =
            velocity_of(contact.body_b, contact.link_b) - velocity_of(contact.body_a, contact.link_a);
    }
    Ok(())
}

/// Full intake pass.
pub fn intake(
    candidates: Vec<ContactCandidate>,
    config: &SolverConfig,
    bodies: &BodyTable<BodyEntry>,
) -> Result<(Vec<ContactCandidate>, IntakeStats)> {
    let (mut contacts, stats) = cull_contacts(candidates, config);
    prepare_contacts(&mut contacts, bodies)?;
    if stats.culled + stats.merged + stats.degenerate > 0 {
        log::trace!(
            "contact intake kept {} of {} candidates ({} culled, {} merged, {} degenerate)",
            contacts.len(),
            stats.received,
            stats.culled,
            stats.merged,
            stats.degenerate
        );
    }
    Ok((contacts, stats))
}
