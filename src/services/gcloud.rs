//! Google Cloud CLI installer.
//!
//! One-shot installation, no long-running process: import the signing key,
//! register the package repository, and install the (optionally pinned)
//! package. Interactive initialization is deliberately never invoked.

use crate::config::GcloudConfig;
use crate::error::SetupError;
use crate::executor::{CommandRunner, CommandSpec};
use crate::output;

/// Read-only status surface for the installed CLI.
pub struct GcloudService<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GcloudService<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn is_installed(&self) -> bool {
        self.runner.command_exists("gcloud")
    }

    /// First line of `gcloud --version`, e.g. "Google Cloud SDK 444.0.0".
    pub fn version(&self) -> String {
        if !self.is_installed() {
            return "Not installed".to_string();
        }
        let spec = CommandSpec::exec("gcloud", ["--version"]).capture_output();
        match self.runner.run(&spec) {
            Ok(result) if result.success => result
                .stdout
                .lines()
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown".to_string()),
            _ => "Unknown".to_string(),
        }
    }
}

/// Installer for the Google Cloud CLI.
pub struct GcloudInstaller<'a> {
    config: &'a GcloudConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> GcloudInstaller<'a> {
    pub fn new(config: &'a GcloudConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// The key-import pipeline string; one of the few operations that
    /// genuinely needs a shell.
    pub fn key_import_pipeline(&self) -> String {
        format!(
            "curl -fsSL {} | gpg --dearmor -o {} --yes",
            self.config.key_url,
            self.config.keyring_path.display()
        )
    }

    /// The one-line repository definition.
    pub fn repo_line(&self) -> String {
        format!(
            "deb [signed-by={}] {} {} main",
            self.config.keyring_path.display(),
            self.config.repo_url,
            self.config.suite
        )
    }

    /// Package spec, pinned as `<pkg>=<ver>-*` when a version was requested.
    pub fn package_spec(&self) -> String {
        match &self.config.version {
            Some(version) => format!("{}={}-*", self.config.package, version),
            None => self.config.package.clone(),
        }
    }

    pub fn install(&self) -> Result<(), SetupError> {
        if !self.runner.command_exists("apt-get") {
            return Err(SetupError::Environment {
                message: "apt-get not found. Ensure you are inside an Ubuntu/Debian proot-distro."
                    .to_string(),
            });
        }

        output::info("Installing prerequisites...");
        let _ = self.runner.run(&CommandSpec::exec("apt-get", ["update", "-y"]));
        self.runner
            .run_checked(&CommandSpec::exec(
                "apt-get",
                [
                    "install",
                    "-y",
                    "apt-transport-https",
                    "ca-certificates",
                    "gnupg",
                    "curl",
                    "gnupg2",
                    "lsb-release",
                ],
            ))
            .map_err(|_| SetupError::Install {
                message: "Failed to install prerequisites.".to_string(),
            })?;

        output::info("Importing Google Cloud public key...");
        self.runner
            .run_checked(&CommandSpec::pipeline(&self.key_import_pipeline()))
            .map_err(|_| SetupError::Install {
                message: "Failed to import Google Cloud key.".to_string(),
            })?;

        output::info("Adding Google Cloud SDK repository...");
        std::fs::write(&self.config.repo_file, format!("{}\n", self.repo_line())).map_err(
            |e| SetupError::Install {
                message: format!("Failed to write repo file: {e}"),
            },
        )?;

        let package = self.package_spec();
        output::info(&format!("Installing {}...", self.config.package));
        if let Some(version) = &self.config.version {
            output::info(&format!("Targeting version: {}", version));
        }
        let _ = self.runner.run(&CommandSpec::exec("apt-get", ["update", "-y"]));
        self.runner
            .run_checked(&CommandSpec::exec(
                "apt-get",
                ["install", "-y", package.as_str()],
            ))
            .map_err(|_| SetupError::Install {
                message: format!("Failed to install {package}."),
            })?;

        let service = GcloudService::new(self.runner);
        if service.is_installed() {
            output::success("gcloud CLI installed successfully.");
            let _ = self.runner.run(&CommandSpec::exec("gcloud", ["--version"]));
            output::line("");
            output::info("To initialize, run: gcloud init");
            Ok(())
        } else {
            Err(SetupError::Install {
                message: "gcloud command not found after installation.".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSnapshot;

    fn config(version: Option<&str>) -> GcloudConfig {
        let mut config = GcloudConfig::resolve(&EnvSnapshot::default()).unwrap();
        config.version = version.map(str::to_string);
        config
    }

    struct NullRunner;

    impl CommandRunner for NullRunner {
        fn run(
            &self,
            _spec: &CommandSpec,
        ) -> Result<crate::executor::RunOutput, SetupError> {
            Ok(crate::executor::RunOutput::ok())
        }

        fn command_exists(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_key_import_pipeline_string() {
        let config = config(None);
        let installer = GcloudInstaller::new(&config, &NullRunner);
        assert_eq!(
            installer.key_import_pipeline(),
            "curl -fsSL https://packages.cloud.google.com/apt/doc/apt-key.gpg | \
             gpg --dearmor -o /usr/share/keyrings/cloud.google.gpg --yes"
        );
    }

    #[test]
    fn test_repo_line() {
        let config = config(None);
        let installer = GcloudInstaller::new(&config, &NullRunner);
        assert_eq!(
            installer.repo_line(),
            "deb [signed-by=/usr/share/keyrings/cloud.google.gpg] \
             https://packages.cloud.google.com/apt cloud-sdk main"
        );
    }

    #[test]
    fn test_package_spec_pinning() {
        let unpinned = config(None);
        assert_eq!(
            GcloudInstaller::new(&unpinned, &NullRunner).package_spec(),
            "google-cloud-cli"
        );
        let pinned = config(Some("444.0.0"));
        assert_eq!(
            GcloudInstaller::new(&pinned, &NullRunner).package_spec(),
            "google-cloud-cli=444.0.0-*"
        );
    }

    #[test]
    fn test_install_requires_apt_get() {
        let config = config(None);
        let installer = GcloudInstaller::new(&config, &NullRunner);
        let err = installer.install().unwrap_err();
        assert!(matches!(err, SetupError::Environment { .. }));
    }

    #[test]
    fn test_version_when_not_installed() {
        let service = GcloudService::new(&NullRunner);
        assert_eq!(service.version(), "Not installed");
    }
}
