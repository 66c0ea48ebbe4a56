use crate::hull::ConvexHullModel;

/// Output of a merge pass together with its work counters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeOutcome {
    pub hulls: Vec<ConvexHullModel>,
    /// Pairwise merge tests performed.
    pub attempts: u64,
    /// Tests that produced a merged hull.
    pub merges: u64,
}

/// Consolidates a list of hulls until no two of them merge.
///
/// One scan visits the hulls left to right. Each live hull is tested against every live hull after
/// it; the first successful merge retires both and appends the merged hull at the end of the list,
/// where the same scan visits it again. Scans repeat until one finishes without merging, so the
/// output never holds two hulls that would merge with each other.
///
/// # Parameters
/// * hulls - the accumulated hulls, consumed
/// * epsilon - the merge tolerance
/// * min_points - the neighbourhood requirement of the vertex proximity test
///
/// # Returns
/// * the surviving hulls in scan order plus the number of attempted and successful merges
pub fn merge_pass(hulls: Vec<ConvexHullModel>, epsilon: f64, min_points: usize) -> MergeOutcome {
    let mut outcome = MergeOutcome { hulls, attempts: 0, merges: 0 };
    loop {
        let merges_before = outcome.merges;
        outcome.hulls = scan(std::mem::take(&mut outcome.hulls), epsilon, min_points, &mut outcome);
        if outcome.merges == merges_before {
            return outcome;
        }
    }
}

fn scan(
    hulls: Vec<ConvexHullModel>,
    epsilon: f64,
    min_points: usize,
    counters: &mut MergeOutcome,
) -> Vec<ConvexHullModel> {
    // Retired hulls leave a hole so positions stay stable while the list grows
    let mut working: Vec<Option<ConvexHullModel>> = hulls.into_iter().map(Some).collect();

    let mut idx = 0;
    while idx < working.len() {
        if working[idx].is_none() {
            idx += 1;
            continue;
        }
        let mut merged = None;
        for idx2 in idx + 1..working.len() {
            let (Some(a), Some(b)) = (&working[idx], &working[idx2]) else {
                continue;
            };
            counters.attempts += 1;
            if let Some(joint) = a.merge(b, epsilon, min_points) {
                merged = Some((idx2, joint));
                break;
            }
        }
        if let Some((idx2, joint)) = merged {
            counters.merges += 1;
            working[idx] = None;
            working[idx2] = None;
            working.push(Some(joint));
        }
        idx += 1;
    }

    working.into_iter().flatten().collect()
}
