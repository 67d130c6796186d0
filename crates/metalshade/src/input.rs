//! Non-blocking evdev keyboard source.
//!
//! The device is opened with `O_NONBLOCK`, so `poll` drains whatever the
//! kernel has queued and returns as soon as a read would block. Only key
//! presses count; releases and autorepeat are ignored.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use input_linux::{EvdevHandle, EventKind, InputEvent, Key};
use scheduler::{CommandSource, ViewerCommand};
use tracing::{debug, info, warn};

const EVENT_BATCH: usize = 32;
const KEY_PRESS: i32 = 1;

/// Maps one evdev event to a viewer command.
pub fn translate(event: &InputEvent) -> Option<ViewerCommand> {
    if event.kind != EventKind::Key || event.value != KEY_PRESS {
        return None;
    }
    match Key::from_code(event.code).ok()? {
        Key::Left => Some(ViewerCommand::NavigatePrevious),
        Key::Right => Some(ViewerCommand::NavigateNext),
        Key::F => Some(ViewerCommand::ToggleFullscreen),
        Key::Esc | Key::Q => Some(ViewerCommand::Quit),
        _ => None,
    }
}

pub struct Keyboard {
    path: PathBuf,
    name: String,
    handle: Option<EvdevHandle<File>>,
}

impl Keyboard {
    /// Finds a keyboard: `explicit` first, then `/dev/input/event0..scan_limit`
    /// matched against `filters` (lowercase substrings of the device name).
    pub fn discover(explicit: Option<&Path>, scan_limit: u32, filters: &[String]) -> Option<Self> {
        if let Some(path) = explicit {
            match Self::open(path) {
                Ok(keyboard) => {
                    info!(device = %path.display(), name = %keyboard.name, "using input device");
                    return Some(keyboard);
                }
                Err(err) => {
                    warn!(
                        device = %path.display(),
                        error = %err,
                        "configured input device unavailable; scanning"
                    );
                }
            }
        }

        for index in 0..scan_limit {
            let path = PathBuf::from(format!("/dev/input/event{index}"));
            let Ok(keyboard) = Self::open(&path) else {
                continue;
            };
            debug!(device = %path.display(), name = %keyboard.name, "input device");
            if matches_filters(&keyboard.name, filters) {
                info!(device = %path.display(), name = %keyboard.name, "using input device");
                return Some(keyboard);
            }
        }
        None
    }

    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        let handle = EvdevHandle::new(file);
        let name = handle
            .device_name()
            .map(|raw| device_name_from_bytes(&raw))
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self {
            path: path.to_path_buf(),
            name,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CommandSource for Keyboard {
    fn poll(&mut self) -> Vec<ViewerCommand> {
        let Some(handle) = &self.handle else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        let mut failure = None;
        let mut raw = [*InputEvent::zeroed().as_raw(); EVENT_BATCH];
        loop {
            match handle.read(&mut raw) {
                Ok(0) => break,
                Ok(count) => {
                    commands.extend(
                        raw[..count]
                            .iter()
                            .filter_map(|event| InputEvent::from_raw(event).ok())
                            .filter_map(translate),
                    );
                    if count < EVENT_BATCH {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            warn!(
                device = %self.path.display(),
                error = %err,
                "input device failed; navigation disabled"
            );
            self.handle = None;
        }
        commands
    }
}

fn matches_filters(name: &str, filters: &[String]) -> bool {
    let name = name.to_lowercase();
    filters.iter().any(|filter| name.contains(filter.as_str()))
}

fn device_name_from_bytes(raw: &[u8]) -> String {
    let end = raw.iter().position(|&byte| byte == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(key: Key, value: i32) -> InputEvent {
        let mut event = InputEvent::zeroed();
        event.kind = EventKind::Key;
        event.code = key as u16;
        event.value = value;
        event
    }

    #[test]
    fn arrow_keys_navigate_on_press() {
        assert_eq!(
            translate(&key_event(Key::Left, 1)),
            Some(ViewerCommand::NavigatePrevious)
        );
        assert_eq!(
            translate(&key_event(Key::Right, 1)),
            Some(ViewerCommand::NavigateNext)
        );
        assert_eq!(
            translate(&key_event(Key::F, 1)),
            Some(ViewerCommand::ToggleFullscreen)
        );
        assert_eq!(translate(&key_event(Key::Esc, 1)), Some(ViewerCommand::Quit));
        assert_eq!(translate(&key_event(Key::Q, 1)), Some(ViewerCommand::Quit));
    }

    #[test]
    fn release_and_repeat_are_ignored() {
        assert_eq!(translate(&key_event(Key::Right, 0)), None);
        assert_eq!(translate(&key_event(Key::Right, 2)), None);
    }

    #[test]
    fn unmapped_keys_and_other_kinds_are_ignored() {
        assert_eq!(translate(&key_event(Key::A, 1)), None);

        let mut sync = key_event(Key::Right, 1);
        sync.kind = EventKind::Synchronize;
        assert_eq!(translate(&sync), None);
    }

    #[test]
    fn filters_match_lowercased_names() {
        let filters = vec!["keyboard".to_string(), "input".to_string()];
        assert!(matches_filters("AT Translated Set 2 Keyboard", &filters));
        assert!(matches_filters("QEMU Virtio Input", &filters));
        assert!(!matches_filters("Power Button", &filters));
    }

    #[test]
    fn device_names_stop_at_nul() {
        assert_eq!(device_name_from_bytes(b"virtio kbd\0\0\0"), "virtio kbd");
        assert_eq!(device_name_from_bytes(b"plain"), "plain");
    }

    #[test]
    fn missing_explicit_device_without_scan_gives_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("event99");
        assert!(Keyboard::discover(Some(&missing), 0, &[]).is_none());
    }
}
