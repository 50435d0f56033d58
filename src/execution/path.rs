//! `PATH` search-list resolution

/// Fallback search list used when `PATH` is unset.
pub const DEFAULT_PATH: &str = ":/bin:/usr/bin";

/// Split a `PATH` value into its search directories, in order.
///
/// An empty component (leading, trailing, or `::`) means the current
/// directory and resolves to `.`, per POSIX. `None` stands for an unset
/// `PATH` and resolves through [`DEFAULT_PATH`].
pub fn effective_path(path: Option<&str>) -> Vec<String> {
    path.unwrap_or(DEFAULT_PATH)
        .split(':')
        .map(|dir| {
            if dir.is_empty() {
                ".".to_string()
            } else {
                dir.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_components_resolve_to_current_dir() {
        let dirs = effective_path(Some(":/bin::/usr/bin:"));
        assert_eq!(dirs, vec![".", "/bin", ".", "/usr/bin", "."]);
    }

    #[test]
    fn unset_path_uses_default() {
        let dirs = effective_path(None);
        assert_eq!(dirs, vec![".", "/bin", "/usr/bin"]);
    }

    #[test]
    fn single_directory_survives_unsplit() {
        assert_eq!(effective_path(Some("/usr/local/bin")), vec!["/usr/local/bin"]);
    }

    #[test]
    fn empty_value_is_current_dir_only() {
        assert_eq!(effective_path(Some("")), vec!["."]);
    }

    #[test]
    fn all_separators_yield_only_dots() {
        assert_eq!(effective_path(Some("::")), vec![".", ".", "."]);
    }

    #[test]
    fn component_count_is_separator_count_plus_one() {
        for value in ["", "/bin", ":/bin", "/bin:", "a:b:c:d", "::::"] {
            let separators = value.matches(':').count();
            assert_eq!(
                effective_path(Some(value)).len(),
                separators + 1,
                "wrong count for {:?}",
                value
            );
        }
    }
}
