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

//! Run helper programs and probe the host

use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use log::{debug, trace, warn};

use crate::config::option::HostRole;
use crate::config::Error;

/// Packages whose presence makes this host a CE
pub const CE_PACKAGES: [&str; 2] = ["htcondor-ce", "osg-ce"];

/// Timeout for helpers contacting remote services
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a helper program ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,

    /// Non-zero exit code, `None` if killed by a signal
    Failed(Option<i32>),

    TimedOut,
}

/// Run a program to completion, optionally bounded by `timeout`
///
/// Output of the program is discarded. A program running longer than the
/// timeout is killed.
pub fn run_command(args: &[&str], timeout: Option<Duration>) -> Result<CommandOutcome, Error> {
    let (program, arguments) = match args.split_first() {
        Some(v) => v,
        None => return Err(Error::Application("Empty command line".to_owned())),
    };
    debug!("Running {}", args.join(" "));

    let mut child = Command::new(program)
        .args(arguments)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::io(*program, e))?;

    let started = Instant::now();
    loop {
        match child.try_wait().map_err(|e| Error::io(*program, e))? {
            Some(status) if status.success() => return Ok(CommandOutcome::Success),
            Some(status) => {
                trace!("{} exited with {}", program, status);
                return Ok(CommandOutcome::Failed(status.code()));
            }
            None => {}
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                warn!("{} did not finish within {:?}, killing it", program, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Ok(CommandOutcome::TimedOut);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// True if the package database knows `package`
pub fn rpm_installed(package: &str) -> bool {
    matches!(
        run_command(&["rpm", "-q", "--quiet", package], None),
        Ok(CommandOutcome::Success)
    )
}

/// Decide once whether this host acts as a CE
pub fn probe_host_role() -> HostRole {
    if CE_PACKAGES.iter().any(|p| rpm_installed(p)) {
        debug!("CE packages found, configuring as CE");
        HostRole::Ce
    } else {
        debug!("No CE packages found");
        HostRole::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command() {
        assert_eq!(CommandOutcome::Success, run_command(&["true"], None).unwrap());
    }

    #[test]
    fn failing_command() {
        assert_eq!(
            CommandOutcome::Failed(Some(3)),
            run_command(&["sh", "-c", "exit 3"], None).unwrap()
        );
    }

    #[test]
    fn slow_command_times_out() {
        let outcome = run_command(&["sleep", "5"], Some(Duration::from_millis(200))).unwrap();

        assert_eq!(CommandOutcome::TimedOut, outcome);
    }

    #[test]
    fn missing_program_gives_error() {
        assert!(run_command(&["/nonexistent/fetch-crl"], None).is_err());
        assert!(run_command(&[], None).is_err());
    }
}
