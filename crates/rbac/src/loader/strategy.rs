use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rbacload_core::DomainError;

/// Which rule scopes a policy load populates.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// Global rules, then project rules.
    #[default]
    Default,
    GlobalOnly,
    ProjectOnly,
}

impl LoadStrategy {
    pub fn loads_global(&self) -> bool {
        matches!(self, LoadStrategy::Default | LoadStrategy::GlobalOnly)
    }

    pub fn loads_project(&self) -> bool {
        matches!(self, LoadStrategy::Default | LoadStrategy::ProjectOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStrategy::Default => "default",
            LoadStrategy::GlobalOnly => "global-only",
            LoadStrategy::ProjectOnly => "project-only",
        }
    }
}

impl core::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(LoadStrategy::Default),
            "global-only" | "global" => Ok(LoadStrategy::GlobalOnly),
            "project-only" | "project" => Ok(LoadStrategy::ProjectOnly),
            other => Err(DomainError::validation(format!("unknown load strategy '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_per_strategy() {
        assert!(LoadStrategy::Default.loads_global() && LoadStrategy::Default.loads_project());
        assert!(LoadStrategy::GlobalOnly.loads_global() && !LoadStrategy::GlobalOnly.loads_project());
        assert!(!LoadStrategy::ProjectOnly.loads_global() && LoadStrategy::ProjectOnly.loads_project());
    }

    #[test]
    fn parses_display_form() {
        for s in [LoadStrategy::Default, LoadStrategy::GlobalOnly, LoadStrategy::ProjectOnly] {
            assert_eq!(s.to_string().parse::<LoadStrategy>().unwrap(), s);
        }
        assert!("everything".parse::<LoadStrategy>().is_err());
    }
}
