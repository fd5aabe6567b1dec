//! EventMap and PropertyMap population.
//!
//! Both maps point at the first row of a run of events or properties that share a
//! parent. Members of one type are expected to be contiguous; a parent that appears
//! in two separate runs gets two map rows.

use crate::tables::{EventMapRow, PropertyMapRow};

/// Emit `(parent, first_row)` for every run of equal parents.
///
/// `parents[i]` is the owning type of row `first_row + i`.
#[must_use]
pub fn contiguous_runs(parents: &[u32], first_row: u32) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut last = None;
    for (i, &parent) in parents.iter().enumerate() {
        if last == Some(parent) {
            continue;
        }
        last = Some(parent);
        runs.push((parent, first_row + i as u32));
    }
    runs
}

/// Build EventMap rows from the parents of the Event table.
#[must_use]
pub fn event_map(parents: &[u32], first_row: u32) -> Vec<EventMapRow> {
    contiguous_runs(parents, first_row)
        .into_iter()
        .map(|(parent, event_list)| EventMapRow { parent, event_list })
        .collect()
}

/// Build PropertyMap rows from the parents of the Property table.
#[must_use]
pub fn property_map(parents: &[u32], first_row: u32) -> Vec<PropertyMapRow> {
    contiguous_runs(parents, first_row)
        .into_iter()
        .map(|(parent, property_list)| PropertyMapRow {
            parent,
            property_list,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_row_per_run() {
        const A: u32 = 1;
        const B: u32 = 2;
        let rows = event_map(&[A, A, B, B, B, A], 1);
        assert_eq!(
            rows,
            vec![
                EventMapRow {
                    parent: A,
                    event_list: 1
                },
                EventMapRow {
                    parent: B,
                    event_list: 3
                },
                EventMapRow {
                    parent: A,
                    event_list: 6
                },
            ]
        );
    }

    #[test]
    fn test_grouped_input_gives_one_row_per_type() {
        let rows = property_map(&[1, 1, 2, 3, 3], 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].property_list, 4);
    }

    #[test]
    fn test_first_row_bias() {
        let rows = property_map(&[7], 11);
        assert_eq!(
            rows,
            vec![PropertyMapRow {
                parent: 7,
                property_list: 11
            }]
        );
        assert!(event_map(&[], 1).is_empty());
    }
}
