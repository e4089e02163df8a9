//! System utilities for privilege detection

/// Whether the process runs with an effective UID of 0.
#[cfg(unix)]
pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    // No UID concept; elevated Windows shells are not detected
    false
}

/// The user who invoked `sudo`, when the process runs as root through it.
///
/// Returns `None` when not root, or when root was reached some other way
/// (direct login, `su`) and `SUDO_USER` is absent.
pub fn sudo_user() -> Option<String> {
    if !running_as_root() {
        return None;
    }
    std::env::var("SUDO_USER").ok().filter(|u| !u.is_empty())
}

/// One-line notice shown at start-up when running with elevated privileges.
pub fn privilege_notice() -> Option<String> {
    if !running_as_root() {
        return None;
    }
    Some(match sudo_user() {
        Some(user) => format!(
            "Running as root via sudo (invoked by {}). Suggested commands will run with root privileges.",
            user
        ),
        None => "Running as root. Suggested commands will run with root privileges.".to_string(),
    })
}
