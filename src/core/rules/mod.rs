//! The shipped rule implementations. Each submodule groups one family of
//! `base_id` prefixes.

pub mod arch;
pub mod deadcode;
pub mod graph;
pub mod metrics;
pub mod naming;
pub mod packages;

use crate::spi::traits::Rule;

/// The compiled-in rule set registered by `RuleRegistry::standard()`.
pub fn shipped_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(arch::ForbiddenRoleDependencies),
        Box::new(arch::AllowedRoleDependencies),
        Box::new(arch::AllowedPackages),
        Box::new(arch::ForbiddenPackages),
        Box::new(graph::MaxEdgeCount),
        Box::new(metrics::MaxFanIn),
        Box::new(metrics::MaxFanOut),
        Box::new(metrics::MaxMethods),
        Box::new(metrics::MaxFields),
        Box::new(deadcode::Unreachable),
        Box::new(naming::BannedSuffixes),
        Box::new(packages::RolePlacement),
    ]
}
