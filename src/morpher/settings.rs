//! Engine settings.

use super::trace::TraceSettings;

/// Tunables shared by every compiled rule.
///
/// # Example
///
/// ```
/// use libmorpher::morpher::MorpherSettings;
///
/// let settings = MorpherSettings {
///     deletion_reapplications: 2,
///     ..Default::default()
/// };
/// assert_eq!(settings.max_shape_len, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorpherSettings {
    /// Extra passes a deleting phonological rule gets on its own output
    pub deletion_reapplications: usize,
    /// Candidates kept per stratum during analysis (0 = unbounded)
    pub max_unapplications: usize,
    /// Largest shape a derivation may build before the path is dropped
    pub max_shape_len: usize,
    /// Rules whose applications are recorded on the words they produce
    pub trace: TraceSettings,
}

impl Default for MorpherSettings {
    fn default() -> Self {
        MorpherSettings {
            deletion_reapplications: 0,
            max_unapplications: 0,
            max_shape_len: 256,
            trace: TraceSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MorpherSettings::default();
        assert_eq!(settings.deletion_reapplications, 0);
        assert_eq!(settings.max_unapplications, 0);
        assert_eq!(settings.max_shape_len, 256);
        assert!(!settings.trace.is_active());
    }
}
