use std::fmt::Write;
use std::path::PathBuf;

/// Specification for a systemd service unit
#[derive(Debug, Clone)]
pub struct UnitSpec {
    /// Unit name without the `.service` suffix
    pub unit_name: String,
    pub description: String,
    pub exec_start: String,
    pub working_dir: Option<PathBuf>,
    pub user: String,
    pub group: String,
    pub environment: Vec<(String, String)>,
    /// Delay before systemd restarts a failed service
    pub restart_sec: u32,
}

impl UnitSpec {
    pub fn new(
        unit_name: impl Into<String>,
        description: impl Into<String>,
        exec_start: impl Into<String>,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            description: description.into(),
            exec_start: exec_start.into(),
            working_dir: None,
            user: "root".to_string(),
            group: "root".to_string(),
            environment: Vec::new(),
            restart_sec: 5,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.user = user.into();
        self.group = group.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    pub fn with_restart_sec(mut self, secs: u32) -> Self {
        self.restart_sec = secs;
        self
    }

    /// File name the unit is installed under.
    pub fn file_name(&self) -> String {
        format!("{}.service", self.unit_name)
    }

    /// Render the unit file.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "[Unit]");
        let _ = writeln!(out, "Description={}", self.description);
        let _ = writeln!(out, "After=network.target");
        let _ = writeln!(out);

        let _ = writeln!(out, "[Service]");
        let _ = writeln!(out, "Type=simple");
        let _ = writeln!(out, "User={}", self.user);
        let _ = writeln!(out, "Group={}", self.group);
        if let Some(dir) = &self.working_dir {
            let _ = writeln!(out, "WorkingDirectory={}", dir.display());
        }
        for (key, value) in &self.environment {
            let _ = writeln!(out, "Environment={}={}", key, value);
        }
        let _ = writeln!(out, "ExecStart={}", self.exec_start);
        let _ = writeln!(out, "Restart=on-failure");
        let _ = writeln!(out, "RestartSec={}", self.restart_sec);
        let _ = writeln!(out);

        let _ = writeln!(out, "[Install]");
        let _ = writeln!(out, "WantedBy=multi-user.target");

        out
    }
}
