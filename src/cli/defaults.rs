//! Defaults subcommand: lists the default registry.

use crate::config::{DefaultRegistry, Profile};
use clap::{Args, ValueEnum};
use std::fmt::Write;

/// Profile filter for the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileFilter {
    Simple,
    Advanced,
    Internal,
}

impl ProfileFilter {
    fn matches(self, profile: Profile) -> bool {
        matches!(
            (self, profile),
            (ProfileFilter::Simple, Profile::Simple)
                | (ProfileFilter::Advanced, Profile::Advanced)
                | (ProfileFilter::Internal, Profile::Internal)
        )
    }
}

/// Arguments for the defaults subcommand
#[derive(Args, Debug, Default)]
pub struct DefaultsArgs {
    /// Only list settings of this profile
    #[arg(long, value_enum)]
    pub profile: Option<ProfileFilter>,

    /// Only list settings that can be set from the environment
    #[arg(long)]
    pub env_only: bool,
}

impl DefaultsArgs {
    /// Render the matching registry rows as an aligned table.
    pub fn render(&self, registry: &DefaultRegistry) -> String {
        let rows: Vec<[String; 4]> = registry
            .entries()
            .iter()
            .filter(|e| self.profile.is_none_or(|p| p.matches(e.profile)))
            .filter(|e| !self.env_only || e.env.is_some())
            .map(|e| {
                [
                    e.path.to_string(),
                    e.env.unwrap_or("-").to_string(),
                    e.profile.to_string(),
                    e.default.to_string(),
                ]
            })
            .collect();

        let header = ["PATH", "ENV", "PROFILE", "DEFAULT"];
        let mut widths = header.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        let mut line = |cells: [&str; 4]| {
            let _ = writeln!(
                out,
                "{:<w0$}  {:<w1$}  {:<w2$}  {}",
                cells[0],
                cells[1],
                cells[2],
                cells[3],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
            );
        };
        line(header);
        for row in &rows {
            line([&row[0], &row[1], &row[2], &row[3]]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_every_entry() {
        let registry = DefaultRegistry::standard();
        let table = DefaultsArgs::default().render(&registry);
        assert_eq!(table.lines().count(), registry.entries().len() + 1);
        assert!(table.starts_with("PATH"));
        assert!(table.contains("XG2G_EPG_DAYS"));
    }

    #[test]
    fn test_profile_and_env_filters() {
        let registry = DefaultRegistry::standard();
        let args = DefaultsArgs {
            profile: Some(ProfileFilter::Simple),
            env_only: true,
        };
        let table = args.render(&registry);
        assert!(table.contains("dataDir"));
        assert!(!table.contains("epg.maxConcurrency"));
        assert!(!table.contains("enigma2.baseUrl"));
    }
}
