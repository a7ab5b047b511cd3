pub mod paths;

/// Whether the current process runs with root privileges.
#[cfg(unix)]
pub fn is_elevated() -> bool {
  nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
  false
}
