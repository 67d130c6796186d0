//! Fullscreen requests to the hypervisor through a virtio serial port.
//!
//! Ports are looked up again on every request, so a port that appears after
//! start-up is still found.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use scheduler::HostSignal;
use viewconfig::HostSection;

const FULLSCREEN_COMMAND: &[u8] = b"FULLSCREEN\n";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("no virtio port named '{port_name}' under {}", sysfs_root.display())]
    PortNotFound {
        port_name: String,
        sysfs_root: PathBuf,
    },
    #[error("failed to write to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct VirtioHost {
    settings: HostSection,
}

impl VirtioHost {
    pub fn new(settings: HostSection) -> Self {
        Self { settings }
    }

    /// Device node of the first port whose sysfs name matches.
    pub fn find_port(&self) -> Result<PathBuf, HostError> {
        for index in 0..self.settings.scan_limit {
            let port = format!("vport{index}p1");
            let name_path = self.settings.sysfs_root.join(&port).join("name");
            let Ok(name) = fs::read_to_string(&name_path) else {
                continue;
            };
            if name.trim().contains(self.settings.port_name.as_str()) {
                return Ok(self.settings.device_root.join(port));
            }
        }
        Err(HostError::PortNotFound {
            port_name: self.settings.port_name.clone(),
            sysfs_root: self.settings.sysfs_root.clone(),
        })
    }

    pub fn request_fullscreen(&self) -> Result<(), HostError> {
        let path = self.find_port()?;
        let write = || -> io::Result<()> {
            let mut port = OpenOptions::new().write(true).open(&path)?;
            port.write_all(FULLSCREEN_COMMAND)?;
            port.flush()
        };
        write().map_err(|source| HostError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(port = %path.display(), "requested fullscreen from host");
        Ok(())
    }
}

impl HostSignal for VirtioHost {
    fn toggle_fullscreen(&mut self) -> anyhow::Result<()> {
        Ok(self.request_fullscreen()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn settings(root: &Path) -> HostSection {
        HostSection {
            port_name: "org.qemu.display".into(),
            sysfs_root: root.join("sys"),
            device_root: root.join("dev"),
            scan_limit: 4,
        }
    }

    fn add_port(root: &Path, index: u32, name: &str) {
        let dir = root.join("sys").join(format!("vport{index}p1"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
    }

    #[test]
    fn finds_the_matching_port() {
        let dir = tempfile::tempdir().unwrap();
        add_port(dir.path(), 0, "org.qemu.guest_agent.0");
        add_port(dir.path(), 2, "org.qemu.display");

        let host = VirtioHost::new(settings(dir.path()));
        assert_eq!(host.find_port().unwrap(), dir.path().join("dev/vport2p1"));
    }

    #[test]
    fn writes_fullscreen_command() {
        let dir = tempfile::tempdir().unwrap();
        add_port(dir.path(), 1, "org.qemu.display");
        fs::create_dir_all(dir.path().join("dev")).unwrap();
        fs::write(dir.path().join("dev/vport1p1"), b"").unwrap();

        let mut host = VirtioHost::new(settings(dir.path()));
        host.toggle_fullscreen().unwrap();
        let written = fs::read(dir.path().join("dev/vport1p1")).unwrap();
        assert_eq!(written, FULLSCREEN_COMMAND);
    }

    #[test]
    fn missing_port_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = VirtioHost::new(settings(dir.path()));
        assert!(matches!(
            host.request_fullscreen(),
            Err(HostError::PortNotFound { .. })
        ));
    }

    #[test]
    fn unwritable_port_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        add_port(dir.path(), 0, "org.qemu.display");

        let host = VirtioHost::new(settings(dir.path()));
        match host.request_fullscreen() {
            Err(HostError::Write { path, .. }) => {
                assert_eq!(path, dir.path().join("dev/vport0p1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
