//! Partitioning of a resolved host list into rollout batches.

/// An ordered, non-empty slice of the hosts a command runs against.
pub type Batch = Vec<String>;

/// Splits `hosts` into consecutive batches of `serial` hosts.
///
/// A `serial` of 0, or one at least as large as the host list, yields a single
/// batch. Order and duplicates are kept exactly as given.
///
/// # Examples
///
/// ```
/// use fleet_shell_core::batch::plan;
///
/// let hosts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
/// assert_eq!(plan(&hosts, 2), vec![vec!["a", "b"], vec!["c"]]);
/// ```
#[must_use]
pub fn plan(hosts: &[String], serial: usize) -> Vec<Batch> {
    if hosts.is_empty() {
        return Vec::new();
    }

    if serial == 0 || serial >= hosts.len() {
        return vec![hosts.to_vec()];
    }

    hosts.chunks(serial).map(<[String]>::to_vec).collect()
}
