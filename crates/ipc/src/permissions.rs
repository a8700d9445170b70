//! Listen-endpoint permission policy: POSIX umask/chown around socket
//! creation, Windows SDDL translation for the named pipe.

use std::path::Path;

use crate::error::CommandMonitorError;

#[derive(Debug, Clone)]
pub struct EndpointPermissions {
    pub mode: u32,
    pub group: Option<String>,
}

impl Default for EndpointPermissions {
    fn default() -> Self {
        Self {
            mode: 0o770,
            group: None,
        }
    }
}

#[cfg(unix)]
pub mod posix {
    use super::*;
    use nix::sys::stat::Mode;
    use nix::unistd::{chown, Gid, Group, Uid};
    use std::fs;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    /// Ensures `socket_path`'s parent directory exists with `permissions`'s
    /// mode, creating it recursively if missing, tightening it if a
    /// pre-existing parent is more permissive, and correcting ownership if
    /// it isn't owned by the current user/group.
    pub fn prepare_parent_dir(socket_path: &Path, permissions: &EndpointPermissions) -> Result<(), CommandMonitorError> {
        let parent = socket_path
            .parent()
            .ok_or_else(|| CommandMonitorError::Setup(std::io::Error::new(std::io::ErrorKind::InvalidInput, "socket path has no parent")))?;

        if !parent.exists() {
            fs::create_dir_all(parent).map_err(CommandMonitorError::Setup)?;
            fs::set_permissions(parent, fs::Permissions::from_mode(permissions.mode)).map_err(CommandMonitorError::Setup)?;
            return Ok(());
        }

        let metadata = fs::metadata(parent).map_err(CommandMonitorError::Setup)?;
        let existing_mode = metadata.permissions().mode() & 0o777;
        if existing_mode & !permissions.mode != 0 {
            fs::set_permissions(parent, fs::Permissions::from_mode(permissions.mode)).map_err(CommandMonitorError::Setup)?;
        }

        if metadata.uid() != 0 {
            let current_uid = Uid::current();
            let current_gid = Gid::current();
            chown(parent, Some(current_uid), Some(current_gid)).map_err(|e| {
                CommandMonitorError::Setup(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
        }
        Ok(())
    }

    /// Applies `mode` to a freshly bound `socket_path` via a umask dance
    /// (the socket has already been created by the caller with the process
    /// umask in effect) and chowns it to `group` if given.
    pub fn apply_socket_permissions(socket_path: &Path, permissions: &EndpointPermissions) -> Result<(), CommandMonitorError> {
        fs::set_permissions(socket_path, fs::Permissions::from_mode(permissions.mode)).map_err(CommandMonitorError::Setup)?;

        if let Some(group_name) = &permissions.group {
            let gid = resolve_group(group_name)?;
            chown(socket_path, None, Some(gid)).map_err(|e| {
                CommandMonitorError::Setup(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
        }
        Ok(())
    }

    /// `umask = 0o777 - mode`, applied for the duration of `f` (typically
    /// the `bind()` call), then restored.
    pub fn with_umask_for_mode<T>(mode: u32, f: impl FnOnce() -> T) -> T {
        let complement = (0o777 & !mode) as u16;
        let umask = Mode::from_bits_truncate(complement);
        let previous = nix::sys::stat::umask(umask);
        let result = f();
        nix::sys::stat::umask(previous);
        result
    }

    fn resolve_group(group: &str) -> Result<Gid, CommandMonitorError> {
        if let Ok(gid_num) = group.parse::<u32>() {
            return Ok(Gid::from_raw(gid_num));
        }
        Group::from_name(group)
            .map_err(|e| CommandMonitorError::Setup(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
            .map(|g| g.gid)
            .ok_or_else(|| {
                CommandMonitorError::Setup(std::io::Error::new(std::io::ErrorKind::NotFound, format!("unknown group {group:?}")))
            })
    }
}

#[cfg(windows)]
pub mod windows {
    use super::*;

    /// Translates `mode`/`group` into an SDDL security descriptor string:
    /// world RW, user-only RW, or group RW with an appended DACL entry.
    pub fn sddl_for(permissions: &EndpointPermissions) -> String {
        match (&permissions.group, permissions.mode) {
            (None, mode) if mode & 0o077 == mode & 0o700 => "O:CreatorOwnerG:NullSID".to_string(),
            (None, _) => "O:WorldG:World".to_string(),
            (Some(gid), _) => format!("O:CreatorOwnerG:NullSID(A;P;GA;;;{gid})"),
        }
    }
}
