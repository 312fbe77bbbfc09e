//! Stable choice of instances to remove when a group is over target.

use crate::machine::domain::InstanceId;

/// Picks `count` instances to remove.
///
/// Identifiers are sorted and the lowest `count` are chosen, so repeated
/// ticks over the same membership target the same instances regardless of
/// listing order.
#[must_use]
pub fn select_for_removal(instances: &[InstanceId], count: usize) -> Vec<InstanceId> {
    let mut ordered = instances.to_vec();
    ordered.sort();
    ordered.truncate(count);
    ordered
}
