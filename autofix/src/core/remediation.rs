//! Deterministic remediation table keyed by package manager.

use crate::core::types::{FailureCategory, PackageManager, RemediationCandidate};

/// Look up a rule-based fix for `category` on a host using `package_manager`.
///
/// Only missing commands/libraries and missing toolchains have rules. Any other
/// category, an empty extracted name, or an unsupported package manager yields
/// `None`.
pub fn rule_for(
    category: &FailureCategory,
    package_manager: PackageManager,
) -> Option<RemediationCandidate> {
    let command = match category {
        FailureCategory::MissingCommand { command: name }
        | FailureCategory::MissingLibrary { library: name } => {
            install_package(package_manager, name.as_deref()?)
        }
        FailureCategory::MissingCompiler | FailureCategory::MissingBuildTools => {
            install_toolchain(package_manager)
        }
        _ => None,
    }?;
    Some(RemediationCandidate::rule(command))
}

fn install_package(package_manager: PackageManager, package: &str) -> Option<String> {
    if package.trim().is_empty() {
        return None;
    }
    match package_manager {
        PackageManager::Apt => Some(format!("sudo apt-get install -y {package}")),
        PackageManager::Dnf | PackageManager::Yum => Some(format!("sudo dnf install -y {package}")),
        PackageManager::Pacman => Some(format!("sudo pacman -S --noconfirm {package}")),
        PackageManager::Brew => Some(format!("brew install {package}")),
        PackageManager::None => None,
    }
}

fn install_toolchain(package_manager: PackageManager) -> Option<String> {
    let command = match package_manager {
        PackageManager::Apt => "sudo apt-get install -y build-essential",
        PackageManager::Dnf | PackageManager::Yum => "sudo dnf groupinstall -y 'Development Tools'",
        PackageManager::Pacman => "sudo pacman -S --noconfirm base-devel",
        PackageManager::Brew => "xcode-select --install",
        PackageManager::None => return None,
    };
    Some(command.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CandidateSource, FixKind, RiskLevel};

    fn missing(command: &str) -> FailureCategory {
        FailureCategory::MissingCommand {
            command: Some(command.to_string()),
        }
    }

    #[test]
    fn missing_command_installs_per_package_manager() {
        let cases = [
            (PackageManager::Apt, "sudo apt-get install -y gcc"),
            (PackageManager::Dnf, "sudo dnf install -y gcc"),
            (PackageManager::Yum, "sudo dnf install -y gcc"),
            (PackageManager::Pacman, "sudo pacman -S --noconfirm gcc"),
            (PackageManager::Brew, "brew install gcc"),
        ];
        for (package_manager, expected) in cases {
            let candidate = rule_for(&missing("gcc"), package_manager).expect("rule");
            assert_eq!(candidate.command, expected);
            assert_eq!(candidate.kind, FixKind::Preparation);
            assert_eq!(candidate.source, CandidateSource::Rule);
            assert_eq!(candidate.effective_risk(), RiskLevel::Low);
        }
    }

    #[test]
    fn missing_library_installs_library_name() {
        let category = FailureCategory::MissingLibrary {
            library: Some("ssl".to_string()),
        };
        let candidate = rule_for(&category, PackageManager::Brew).expect("rule");
        assert_eq!(candidate.command, "brew install ssl");
    }

    #[test]
    fn toolchain_rules() {
        let candidate =
            rule_for(&FailureCategory::MissingCompiler, PackageManager::Apt).expect("rule");
        assert_eq!(candidate.command, "sudo apt-get install -y build-essential");

        let candidate =
            rule_for(&FailureCategory::MissingBuildTools, PackageManager::Pacman).expect("rule");
        assert_eq!(candidate.command, "sudo pacman -S --noconfirm base-devel");

        let candidate =
            rule_for(&FailureCategory::MissingCompiler, PackageManager::Brew).expect("rule");
        assert_eq!(candidate.command, "xcode-select --install");
    }

    #[test]
    fn no_rule_without_package_manager() {
        assert!(rule_for(&missing("gcc"), PackageManager::None).is_none());
        assert!(rule_for(&FailureCategory::MissingCompiler, PackageManager::None).is_none());
    }

    #[test]
    fn no_rule_without_extracted_name() {
        let category = FailureCategory::MissingCommand { command: None };
        assert!(rule_for(&category, PackageManager::Apt).is_none());
    }

    #[test]
    fn unmatched_categories_have_no_rule() {
        let category = FailureCategory::PortInUse {
            port: Some("8080".to_string()),
        };
        assert!(rule_for(&category, PackageManager::Apt).is_none());
        assert!(rule_for(&FailureCategory::PermissionDenied, PackageManager::Apt).is_none());
        assert!(rule_for(&FailureCategory::Unknown, PackageManager::Apt).is_none());
    }
}
