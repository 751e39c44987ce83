//! Static allow/block policy for commands.
//!
//! This is a coarse filter, not a sandbox: substring and leading-token checks
//! against fixed tables.

/// Destructive substrings. Any match rejects the command outright.
const BLOCKED: &[&str] = &[
    "rm -rf",
    "rm -r",
    "rm -f /",
    "userdel",
    "usermod",
    "mkfs",
    "format",
    "iptables",
    "ufw",
    "firewall",
    "passwd",
    "chpasswd",
    "shutdown",
    "reboot",
];

/// Leading programs accepted without further checks.
const ALLOWED_PROGRAMS: &[&str] = &[
    "npm", "pip", "pip3", "python", "python3", "node", "docker", "apt-get", "apt", "dnf", "yum",
    "pacman", "brew", "curl", "wget", "git", "make", "gcc", "clang",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Not blocked, but mentions `sudo`; the caller must confirm before running.
    NeedsConfirmation,
    Blocked { pattern: &'static str },
}

/// Apply the block list, then the allowlist, then the sudo check.
///
/// The block list wins over everything else, including an allowlisted leading
/// program.
pub fn validate(command: &str) -> Verdict {
    let lowered = command.to_lowercase();
    if let Some(pattern) = BLOCKED
        .iter()
        .copied()
        .find(|pattern| lowered.contains(pattern))
    {
        return Verdict::Blocked { pattern };
    }
    if is_low_risk(command) {
        return Verdict::Allowed;
    }
    if lowered.contains("sudo") {
        return Verdict::NeedsConfirmation;
    }
    Verdict::Allowed
}

/// True when the leading whitespace token is an allowlisted program.
pub fn is_low_risk(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .is_some_and(|program| ALLOWED_PROGRAMS.contains(&program.as_str()))
}

/// True when the command is run through `sudo`.
pub fn is_sudo(command: &str) -> bool {
    command.trim_start().split_whitespace().next() == Some("sudo")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_destructive_commands() {
        assert_eq!(
            validate("rm -rf /"),
            Verdict::Blocked { pattern: "rm -rf" }
        );
        assert_eq!(
            validate("sudo SHUTDOWN -h now"),
            Verdict::Blocked {
                pattern: "shutdown"
            }
        );
        assert!(matches!(validate("mkfs.ext4 /dev/sda1"), Verdict::Blocked { .. }));
    }

    #[test]
    fn block_list_beats_allowlisted_program() {
        assert!(matches!(
            validate("git clean && rm -rf ~"),
            Verdict::Blocked { .. }
        ));
        assert!(matches!(
            validate("make install; userdel bob"),
            Verdict::Blocked { .. }
        ));
    }

    #[test]
    fn allowlisted_programs_are_allowed() {
        assert_eq!(validate("npm install"), Verdict::Allowed);
        assert_eq!(validate("apt-get install -y jq"), Verdict::Allowed);
    }

    #[test]
    fn sudo_requires_confirmation() {
        assert_eq!(
            validate("sudo apt-get install -y gcc"),
            Verdict::NeedsConfirmation
        );
    }

    #[test]
    fn other_commands_are_allowed() {
        assert_eq!(validate("ls -la"), Verdict::Allowed);
        assert_eq!(validate("echo hello"), Verdict::Allowed);
    }

    #[test]
    fn low_risk_uses_leading_token_only() {
        assert!(is_low_risk("git status"));
        assert!(is_low_risk("  Make all"));
        assert!(is_low_risk("make"));
        assert!(!is_low_risk("sudo git status"));
        assert!(!is_low_risk("gitk"));
        assert!(!is_low_risk(""));
    }

    #[test]
    fn sudo_prefix_detection() {
        assert!(is_sudo("sudo apt-get install -y gcc"));
        assert!(is_sudo("\tsudo\tdnf install -y gcc"));
        assert!(!is_sudo("sudoedit /etc/hosts"));
        assert!(!is_sudo("echo sudo"));
    }
}
