use std::collections::HashMap;

/// Count each distinct label, ordered by descending count then label.
pub fn count_labels<S: AsRef<str>>(labels: &[S]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_ref()).or_insert(0) += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, n)| (label.to_string(), n))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Flag every position whose label equals `target`.
pub fn membership_mask<S: AsRef<str>>(labels: &[S], target: &str) -> Vec<bool> {
    labels.iter().map(|l| l.as_ref() == target).collect()
}

/// Split values into (flagged, unflagged), keeping order within each side.
pub fn split_by_mask<T: Copy>(values: &[T], mask: &[bool]) -> (Vec<T>, Vec<T>) {
    let mut group = Vec::new();
    let mut rest = Vec::with_capacity(values.len());
    for (&value, &flag) in values.iter().zip(mask) {
        if flag {
            group.push(value);
        } else {
            rest.push(value);
        }
    }
    (group, rest)
}
