//! Save files on disk, one per chunk.
//!
//! Files live at `<save_root>/<world_name>/<x>,<y>,<z>.bin`. Differential
//! saves merge with whatever the file already holds, keyed by position, so
//! re-saving never loses earlier edits. A save that would not change the
//! file leaves it alone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lattice_voxel::{BlockRegistry, BlockStore, ChunkCoord, Voxel};

use crate::codec::{SaveMode, SaveRecord, decode, encode_differential, encode_full};
use crate::error::PersistError;

/// Result of [`SaveStore::save`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was edited; no file was touched.
    Skipped,
    /// The encoded file equals what is already on disk.
    Unchanged,
    /// The file was (re)written.
    Written {
        /// Bytes written.
        bytes: usize,
    },
}

/// Result of [`SaveStore::load`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No save file exists for this chunk.
    NotFound,
    /// Records were applied.
    Applied {
        /// Number of voxel records applied.
        records: usize,
    },
}

/// Reads and writes chunk save files for one world.
#[derive(Clone, Debug)]
pub struct SaveStore {
    dir: PathBuf,
    mode: SaveMode,
}

impl SaveStore {
    /// Save store for `world_name` under `save_root`. Nothing is created on
    /// disk until the first save.
    pub fn new(save_root: &Path, world_name: &str, mode: SaveMode) -> Self {
        Self {
            dir: save_root.join(world_name),
            mode,
        }
    }

    /// Directory holding this world's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Mode used for new files.
    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// File path for a chunk.
    pub fn path_for(&self, coord: ChunkCoord) -> PathBuf {
        self.dir.join(format!("{},{},{}.bin", coord.x, coord.y, coord.z))
    }

    /// Persists the edits recorded in `store`.
    ///
    /// Does nothing when the store has no edits. Differential saves merge
    /// with the existing file; when the existing file is a full snapshot the
    /// chunk was loaded from it, so a fresh full snapshot is written instead.
    /// An unreadable existing file is replaced with a warning.
    pub fn save(&self, coord: ChunkCoord, store: &BlockStore) -> Result<SaveOutcome, PersistError> {
        if store.modified_count() == 0 {
            return Ok(SaveOutcome::Skipped);
        }
        let path = self.path_for(coord);
        let existing = read_optional(&path)?;
        let previous = existing.as_deref().and_then(|bytes| {
            decode(bytes, store.volume())
                .map_err(|e| tracing::warn!("{}: replacing unreadable save: {}", path.display(), e))
                .ok()
                .map(|(_, record)| record)
        });

        let bytes = match (self.mode, previous) {
            (SaveMode::Full, _) | (SaveMode::Differential, Some(SaveRecord::Full(_))) => {
                encode_full(&store.interior_records())
            }
            (SaveMode::Differential, previous) => {
                let mut merged: BTreeMap<u32, Voxel> = match previous {
                    Some(SaveRecord::Differential(entries)) => entries.into_iter().collect(),
                    _ => BTreeMap::new(),
                };
                for index in store.modified_indices() {
                    merged.insert(index, store.get(store.interior_local(index)));
                }
                let entries: Vec<(u32, Voxel)> = merged.into_iter().collect();
                encode_differential(store.volume(), &entries)
            }
        };

        if existing.as_deref() == Some(bytes.as_slice()) {
            return Ok(SaveOutcome::Unchanged);
        }
        self.write_atomic(&path, &bytes)?;
        tracing::debug!("saved chunk {} ({} bytes)", coord, bytes.len());
        Ok(SaveOutcome::Written { bytes: bytes.len() })
    }

    /// Applies the chunk's save file onto `store`, which must already hold
    /// freshly generated terrain.
    ///
    /// The file is decoded completely before anything is applied, so on
    /// failure `store` is untouched. Solid bits are re-derived from
    /// `registry`. Modified flags are cleared afterwards.
    pub fn load(
        &self,
        coord: ChunkCoord,
        store: &mut BlockStore,
        registry: &BlockRegistry,
    ) -> Result<LoadOutcome, PersistError> {
        let path = self.path_for(coord);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(LoadOutcome::NotFound);
        };
        let (_, record) = decode(&bytes, store.volume())?;
        let normalize = |v: Voxel| registry.voxel(v.id());

        let records = match record {
            SaveRecord::Full(voxels) => {
                let voxels: Vec<Voxel> = voxels.into_iter().map(normalize).collect();
                if !store.load_interior(&voxels) {
                    return Err(PersistError::CountMismatch {
                        what: "voxel count",
                        expected: store.volume() as i64,
                        found: voxels.len() as i64,
                    });
                }
                voxels.len()
            }
            SaveRecord::Differential(entries) => {
                for &(index, voxel) in &entries {
                    store.set(store.interior_local(index), normalize(voxel), false);
                }
                entries.len()
            }
        };
        store.clear_modified();
        Ok(LoadOutcome::Applied { records })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes).map_err(|source| PersistError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PersistError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
