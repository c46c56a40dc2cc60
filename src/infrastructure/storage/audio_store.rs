//! Filesystem store for synthesized replies.
//!
//! Files are written to a temporary name and renamed into place, so a reader
//! never sees a half-written MP3. With per-request naming every reply gets
//! its own `{uuid}.mp3`; fixed naming reproduces the single shared
//! `response_audio.mp3` and its overwrite race.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    application::services::AudioStore,
    domain::{AudioArtifact, DomainError},
};

pub const FIXED_AUDIO_NAME: &str = "response_audio.mp3";
const AUDIO_EXTENSION: &str = "mp3";
const MAX_FILE_NAME_LEN: usize = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioNaming {
    #[default]
    PerRequest,
    Fixed,
}

pub struct FileAudioStore {
    dir: PathBuf,
    naming: AudioNaming,
    retain: usize,
    write_lock: Mutex<()>,
}

impl FileAudioStore {
    pub fn open(
        dir: impl AsRef<Path>,
        naming: AudioNaming,
        retain: usize,
    ) -> Result<Self, DomainError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| {
            DomainError::storage(format!("failed to create audio directory {:?}: {err}", dir))
        })?;

        Ok(Self {
            dir,
            naming,
            retain: retain.max(1),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_name(&self) -> String {
        match self.naming {
            AudioNaming::PerRequest => format!("{}.{AUDIO_EXTENSION}", Uuid::new_v4().simple()),
            AudioNaming::Fixed => FIXED_AUDIO_NAME.to_string(),
        }
    }

    /// Drop the oldest artifacts beyond the retention limit. `keep` is the
    /// artifact just published and always survives, whatever its mtime.
    fn prune(&self, keep: &Path) -> Result<(), DomainError> {
        let mut artifacts: Vec<(SystemTime, PathBuf)> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.as_path() != keep
                    && path.extension().and_then(|ext| ext.to_str()) == Some(AUDIO_EXTENSION)
            })
            .filter_map(|path| {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((modified, path))
            })
            .collect();

        let others = self.retain - 1;
        if artifacts.len() <= others {
            return Ok(());
        }

        artifacts.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        for (_, path) in artifacts.into_iter().skip(others) {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %err, "failed to prune audio artifact");
            }
        }
        Ok(())
    }
}

/// Accept a single plain file name and nothing that could walk out of the
/// audio directory.
pub fn validate_file_name(name: &str) -> Result<&str, DomainError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_FILE_NAME_LEN
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(name)
    } else {
        Err(DomainError::invalid_file_name(format!(
            "invalid audio file name `{}`",
            name.escape_default()
        )))
    }
}

impl AudioStore for FileAudioStore {
    fn save(&self, audio: &[u8]) -> Result<AudioArtifact, DomainError> {
        let file_name = self.next_name();
        let path = self.dir.join(&file_name);
        let staging = self.dir.join(format!(".{}.part", Uuid::new_v4().simple()));

        {
            let mut file = fs::File::create(&staging)
                .map_err(|err| DomainError::storage(format!("failed to create audio file: {err}")))?;
            file.write_all(audio)
                .and_then(|_| file.sync_all())
                .map_err(|err| DomainError::storage(format!("failed to write audio file: {err}")))?;
        }

        let _guard = self.write_lock.lock();
        if let Err(err) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(DomainError::storage(format!(
                "failed to publish audio file: {err}"
            )));
        }
        debug!(file = %file_name, bytes = audio.len(), "audio artifact written");

        if self.naming == AudioNaming::PerRequest {
            if let Err(err) = self.prune(&path) {
                warn!(dir = %self.dir.display(), error = %err, "failed to prune audio artifacts");
            }
        }

        Ok(AudioArtifact { file_name, path })
    }

    fn load(&self, file_name: &str) -> Result<Vec<u8>, DomainError> {
        let name = validate_file_name(file_name)?;
        let path = self.dir.join(name);

        fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                DomainError::not_found(format!("audio file `{name}` does not exist"))
            }
            _ => DomainError::storage(format!("failed to read audio file `{name}`: {err}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_request_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::PerRequest, 16).unwrap();

        let first = store.save(b"first").unwrap();
        let second = store.save(b"second").unwrap();

        assert_ne!(first.file_name, second.file_name);
        assert_eq!(store.load(&first.file_name).unwrap(), b"first");
        assert_eq!(store.load(&second.file_name).unwrap(), b"second");
    }

    #[test]
    fn fixed_naming_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::Fixed, 16).unwrap();

        store.save(b"first").unwrap();
        let artifact = store.save(b"second").unwrap();

        assert_eq!(artifact.file_name, FIXED_AUDIO_NAME);
        assert_eq!(store.load(FIXED_AUDIO_NAME).unwrap(), b"second");
    }

    #[test]
    fn retention_prunes_old_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::PerRequest, 2).unwrap();

        for i in 0..5u8 {
            store.save(&[i]).unwrap();
        }

        let remaining = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("mp3"))
            .count();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn fresh_artifact_survives_newer_looking_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::PerRequest, 1).unwrap();

        let skewed = dir.path().join("older.mp3");
        fs::write(&skewed, b"older").unwrap();
        fs::File::options()
            .write(true)
            .open(&skewed)
            .unwrap()
            .set_modified(SystemTime::now() + std::time::Duration::from_secs(3600))
            .unwrap();

        let artifact = store.save(b"fresh").unwrap();

        assert_eq!(store.load(&artifact.file_name).unwrap(), b"fresh");
        assert!(!skewed.exists());
    }

    #[test]
    fn pruning_failures_do_not_fail_the_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::PerRequest, 1).unwrap();

        // A directory with an .mp3 name cannot be removed by `remove_file`.
        fs::create_dir(dir.path().join("stuck.mp3")).unwrap();

        let artifact = store.save(b"fresh").unwrap();
        assert_eq!(store.load(&artifact.file_name).unwrap(), b"fresh");
        assert!(dir.path().join("stuck.mp3").is_dir());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAudioStore::open(dir.path(), AudioNaming::PerRequest, 16).unwrap();
        assert!(matches!(
            store.load("nonexistent.mp3"),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_names_are_rejected() {
        for name in ["../secret", "..", ".env", "a/b.mp3", "a\\b.mp3", "", "x%2F.mp3"] {
            assert!(
                matches!(validate_file_name(name), Err(DomainError::InvalidFileName(_))),
                "{name} should be rejected"
            );
        }
        assert!(validate_file_name("3f2a-reply_1.mp3").is_ok());
    }
}
