/*  osg-configure: site configuration for grid computing resources
 *  Copyright (C) 2019 The osg-configure developers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Replace files atomically
//!
//! Content is written to a temporary file next to the target, synced, given
//! its final permissions and ownership and then renamed over the target.
//! Readers either see the old or the new file, never a partial one.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use log::{debug, trace};
use nix::unistd::chown;
use nix::unistd::Gid;
use nix::unistd::Uid;

use crate::config::Error;

/// Owner of a written file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Keep the owner of the file being replaced, if there is one
    Preserve,

    Set(Uid, Gid),
}

/// Atomically replace `path` with `content`
pub fn write_file(path: &Path, content: &[u8], mode: u32, ownership: Ownership) -> Result<(), Error> {
    let display = path.display().to_string();
    let directory = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|e| Error::io(directory.display().to_string(), e))?;

    let owner = match ownership {
        Ownership::Set(uid, gid) => Some((uid, gid)),
        Ownership::Preserve => fs::metadata(path)
            .ok()
            .map(|m| (Uid::from_raw(m.uid()), Gid::from_raw(m.gid()))),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "osg-configure".to_owned());
    let temporary = directory.join(format!(".{}.{}.tmp", file_name, process::id()));

    let result = write_temporary(&temporary, content, mode, owner)
        .and_then(|_| fs::rename(&temporary, path).map_err(|e| Error::io(display.clone(), e)));
    if result.is_err() {
        let _ = fs::remove_file(&temporary);
        return result;
    }

    if let Ok(dir) = File::open(&directory) {
        let _ = dir.sync_all();
    }
    debug!("Wrote {} ({} bytes, mode {:o})", display, content.len(), mode);
    Ok(())
}

fn write_temporary(
    temporary: &Path,
    content: &[u8],
    mode: u32,
    owner: Option<(Uid, Gid)>,
) -> Result<(), Error> {
    let display = temporary.display().to_string();
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(temporary)
        .map_err(|e| Error::io(display.clone(), e))?;
    file.write_all(content)
        .map_err(|e| Error::io(display.clone(), e))?;
    file.sync_all().map_err(|e| Error::io(display.clone(), e))?;

    // The umask applies on creation
    fs::set_permissions(temporary, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(display.clone(), e))?;

    if let Some((uid, gid)) = owner {
        let metadata = file.metadata().map_err(|e| Error::io(display.clone(), e))?;
        if metadata.uid() != uid.as_raw() || metadata.gid() != gid.as_raw() {
            trace!("Changing owner of {} to {}:{}", display, uid, gid);
            chown(temporary, Some(uid), Some(gid)).map_err(|e| {
                Error::io(display.clone(), std::io::Error::from(e))
            })?;
        }
    }
    Ok(())
}

/// Read a file which may legitimately be missing
pub fn read_optional(path: &Path) -> Result<Option<String>, Error> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_gets_content_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("attributes.conf");

        write_file(&path, b"A=\"1\"\n", 0o644, Ownership::Preserve).unwrap();

        assert_eq!("A=\"1\"\n", fs::read_to_string(&path).unwrap());
        assert_eq!(0o644, fs::metadata(&path).unwrap().permissions().mode() & 0o777);
    }

    #[test]
    fn existing_file_is_replaced_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostkey.pem");
        fs::write(&path, "old").unwrap();

        write_file(&path, b"new", 0o600, Ownership::Preserve).unwrap();

        assert_eq!("new", fs::read_to_string(&path).unwrap());
        assert_eq!(0o600, fs::metadata(&path).unwrap().permissions().mode() & 0o777);
        assert_eq!(1, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn missing_optional_file_is_none() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(None, read_optional(&dir.path().join("missing")).unwrap());
    }
}
