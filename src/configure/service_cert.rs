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

//! Duplicate the host credential for a service account

use std::fs;
use std::path::Path;

use log::{error, info};
use nix::unistd::User;

use crate::config::Error;
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;

pub const HOST_CERT: &str = "/etc/grid-security/hostcert.pem";
pub const HOST_KEY: &str = "/etc/grid-security/hostkey.pem";

/// Make sure a service owned by `user` has a certificate and key
///
/// If neither file exists, the host credential is copied atomically, the
/// certificate with mode `0644` and the key with mode `0600`. If only one of
/// them exists the pair is inconsistent and nothing is done.
pub fn create_service_credentials(
    host_cert: &Path,
    host_key: &Path,
    service_cert: &Path,
    service_key: &Path,
    user: &str,
) -> Result<bool, Error> {
    match (service_cert.exists(), service_key.exists()) {
        (true, true) => return Ok(true),
        (true, false) | (false, true) => {
            error!(
                "Only one of {} and {} exists, refusing to overwrite it with the host credential",
                service_cert.display(),
                service_key.display()
            );
            return Ok(false);
        }
        (false, false) => {}
    }

    if !host_cert.is_file() || !host_key.is_file() {
        error!(
            "Host credential {} / {} missing, cannot create service credential",
            host_cert.display(),
            host_key.display()
        );
        return Ok(false);
    }

    let account = match User::from_name(user) {
        Ok(Some(account)) => account,
        Ok(None) => {
            error!("Service user {} does not exist", user);
            return Ok(false);
        }
        Err(e) => {
            return Err(Error::Application(format!(
                "Could not look up user {user}: {e}"
            )))
        }
    };
    let owner = Ownership::Set(account.uid, account.gid);

    let cert = fs::read(host_cert).map_err(|e| Error::io(host_cert.display().to_string(), e))?;
    let key = fs::read(host_key).map_err(|e| Error::io(host_key.display().to_string(), e))?;
    atomic_file::write_file(service_cert, &cert, 0o644, owner)?;
    atomic_file::write_file(service_key, &key, 0o600, owner)?;

    info!(
        "Copied host credential to {} for user {}",
        service_cert.display(),
        user
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::getuid;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn existing_pair_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = (dir.path().join("cert.pem"), dir.path().join("key.pem"));
        fs::write(&cert, "service cert").unwrap();
        fs::write(&key, "service key").unwrap();

        let result = create_service_credentials(&dir.path().join("h"), &dir.path().join("k"), &cert, &key, "root");

        assert!(result.unwrap());
        assert_eq!("service cert", fs::read_to_string(&cert).unwrap());
    }

    #[test]
    fn half_pair_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (host_cert, host_key) = host_credential(dir.path());
        let (cert, key) = (dir.path().join("cert.pem"), dir.path().join("key.pem"));
        fs::write(&cert, "service cert").unwrap();

        let result = create_service_credentials(&host_cert, &host_key, &cert, &key, "root");

        assert!(!result.unwrap());
        assert!(!key.exists());
    }

    #[test]
    fn host_credential_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let (host_cert, host_key) = host_credential(dir.path());
        let (cert, key) = (dir.path().join("svc/cert.pem"), dir.path().join("svc/key.pem"));
        let user = User::from_uid(getuid()).unwrap().unwrap().name;

        let result = create_service_credentials(&host_cert, &host_key, &cert, &key, &user);

        assert!(result.unwrap());
        assert_eq!("host cert", fs::read_to_string(&cert).unwrap());
        assert_eq!(0o644, fs::metadata(&cert).unwrap().permissions().mode() & 0o777);
        assert_eq!(0o600, fs::metadata(&key).unwrap().permissions().mode() & 0o777);
    }

    #[test]
    fn unknown_user_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (host_cert, host_key) = host_credential(dir.path());
        let (cert, key) = (dir.path().join("cert.pem"), dir.path().join("key.pem"));

        let result = create_service_credentials(&host_cert, &host_key, &cert, &key, "no-such-user-osg");

        assert!(!result.unwrap());
    }

    fn host_credential(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let (cert, key) = (dir.join("hostcert.pem"), dir.join("hostkey.pem"));
        fs::write(&cert, "host cert").unwrap();
        fs::write(&key, "host key").unwrap();
        (cert, key)
    }
}
