//! Panel permission quad

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub view: String,
    pub create: String,
    pub edit: String,
    pub delete: String,
}

impl PermissionSet {
    /// `{base}.view`, `{base}.create`, `{base}.edit`, `{base}.delete`
    pub fn from_base(base: &str) -> Self {
        let base = base.trim().trim_end_matches('.');
        Self {
            view: format!("{base}.view"),
            create: format!("{base}.create"),
            edit: format!("{base}.edit"),
            delete: format!("{base}.delete"),
        }
    }

    /// Fill empty entries from `fallback`.
    pub fn or(mut self, fallback: &PermissionSet) -> Self {
        for (slot, default) in [
            (&mut self.view, &fallback.view),
            (&mut self.create, &fallback.create),
            (&mut self.edit, &fallback.edit),
            (&mut self.delete, &fallback.delete),
        ] {
            if slot.trim().is_empty() {
                slot.clone_from(default);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base() {
        let p = PermissionSet::from_base("admin.pages");
        assert_eq!(p.view, "admin.pages.view");
        assert_eq!(p.create, "admin.pages.create");
        assert_eq!(p.edit, "admin.pages.edit");
        assert_eq!(p.delete, "admin.pages.delete");
    }

    #[test]
    fn test_fallback_fills_gaps() {
        let explicit = PermissionSet {
            view: "cms.read".into(),
            ..Default::default()
        };
        let merged = explicit.or(&PermissionSet::from_base("admin.news"));
        assert_eq!(merged.view, "cms.read");
        assert_eq!(merged.delete, "admin.news.delete");
    }
}
