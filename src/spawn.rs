//! Fire-and-forget process launching.
//!
//! The core only sees the [`Launcher`] trait; children are detached into
//! their own session and never waited on.

use std::process::Command;

/// Starts external programs on behalf of the window manager
pub trait Launcher {
    /// Start `argv[0]` with `argv[1..]` as arguments; failures are logged, not returned
    fn spawn(&mut self, argv: &[String]);
}

/// Launcher backed by `std::process::Command`
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_command(argv: &[String]) -> Option<Command> {
        let (program, args) = argv.split_first()?;

        // Handle shell expansion for paths like ~/bin/foo
        let program = shellexpand::tilde(program);
        let mut cmd = Command::new(&*program);
        cmd.args(args);

        // Detach from rectwm's process group so apps survive if rectwm exits
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        Some(cmd)
    }
}

impl Launcher for ProcessLauncher {
    fn spawn(&mut self, argv: &[String]) {
        let Some(mut cmd) = Self::build_command(argv) else {
            log::warn!("Ignoring launch with empty argv");
            return;
        };

        log::info!("Spawning {:?}", argv);
        if let Err(e) = cmd.spawn() {
            log::error!("Failed to spawn {:?}: {}", argv, e);
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::Launcher;

    /// Launcher that records argv instead of starting processes
    #[derive(Debug, Default)]
    pub struct RecordingLauncher {
        pub launched: Vec<Vec<String>>,
    }

    impl Launcher for RecordingLauncher {
        fn spawn(&mut self, argv: &[String]) {
            self.launched.push(argv.to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_command_splits_program_and_args() {
        let cmd = ProcessLauncher::build_command(&argv(&["xterm", "-e", "top"])).unwrap();
        assert_eq!(cmd.get_program(), "xterm");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-e", "top"]);
    }

    #[test]
    fn test_build_command_rejects_empty_argv() {
        assert!(ProcessLauncher::build_command(&[]).is_none());
    }

    #[test]
    fn test_build_command_expands_tilde() {
        let cmd = ProcessLauncher::build_command(&argv(&["~/bin/tool"])).unwrap();
        let program = cmd.get_program().to_string_lossy().into_owned();
        if std::env::var_os("HOME").is_some() {
            assert!(!program.starts_with('~'));
        }
        assert!(program.ends_with("/bin/tool"));
    }

    #[test]
    fn test_spawn_missing_program_is_not_fatal() {
        let mut launcher = ProcessLauncher::new();
        launcher.spawn(&argv(&["/nonexistent/rectwm-test-binary"]));
    }
}
