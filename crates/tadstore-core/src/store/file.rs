use crate::core::pack::{ModelAssignment, PackedBlock};
use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::directory::{Directory, Extent, GroupAttrs, RegionEntry, ResolutionGroup};
use super::error::StoreError;
use super::layout::{SUPERBLOCK_LEN, Superblock, row_bytes};

/// A token referring to one resolution group of an open store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    resolution: u32,
}

impl GroupHandle {
    /// The resolution this handle refers to, in base pairs per bead.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}

/// Everything recorded for one region when its append is committed.
#[derive(Debug, Clone)]
pub struct RegionMetadata {
    /// The region's uuid; the key of all three metadata tables.
    pub region_id: String,
    /// First coordinate row of the region, as returned by the append.
    pub start_row: u64,
    /// One past the last coordinate row, as returned by the append.
    pub end_row: u64,
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    /// Per-model reference ids and cluster ids, in row order.
    pub models: Vec<ModelAssignment>,
    /// Raw cluster membership lists, preserved for provenance.
    pub clusters: Vec<Vec<u64>>,
    /// Centroid blob as verbatim JSON text.
    pub centroids: String,
}

#[derive(Debug, Clone, Copy)]
struct StagedAppend {
    resolution: u32,
    offset: u64,
    start_row: u64,
    rows: u64,
    byte_len: u64,
}

/// An open model store file.
///
/// One file holds every resolution group of a dataset. The handle tracks the
/// committed directory in memory; coordinate appends are staged and only
/// become visible when [`ModelStore::write_region_metadata`] commits the
/// region, so a failed or abandoned region never changes the store.
#[derive(Debug)]
pub struct ModelStore {
    file: File,
    path: PathBuf,
    directory: Directory,
    /// Where the committed directory lives; the next append starts right
    /// after it, leaving the committed bytes untouched until the commit
    /// relocates the directory behind the new rows.
    directory_offset: u64,
    directory_len: u64,
    staged: Option<StagedAppend>,
}

impl ModelStore {
    /// Opens a store for writing, creating a fresh one if the file is absent
    /// or empty.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but is not a valid store (bad magic,
    /// unsupported version, truncated or checksum-corrupt directory), or on
    /// any underlying I/O failure.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            let mut store = Self {
                file,
                path,
                directory: Directory::default(),
                directory_offset: SUPERBLOCK_LEN,
                directory_len: 0,
                staged: None,
            };
            let directory = store.directory.clone();
            store.commit(directory, SUPERBLOCK_LEN)?;
            return Ok(store);
        }

        let (directory, directory_offset, directory_len) = Self::load(&mut file)?;
        Ok(Self {
            file,
            path,
            directory,
            directory_offset,
            directory_len,
            staged: None,
        })
    }

    /// Opens an existing store read-only.
    ///
    /// The returned handle serves the lookup and row-reading API; mutating
    /// operations will fail with an I/O error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).open(&path)?;
        let (directory, directory_offset, directory_len) = Self::load(&mut file)?;
        Ok(Self {
            file,
            path,
            directory,
            directory_offset,
            directory_len,
            staged: None,
        })
    }

    fn load(file: &mut File) -> Result<(Directory, u64, u64), StoreError> {
        let file_len = file.metadata()?.len();
        if file_len < SUPERBLOCK_LEN {
            return Err(StoreError::Corrupt(format!(
                "file is {file_len} bytes, shorter than the superblock"
            )));
        }

        let mut superblock_bytes = [0u8; SUPERBLOCK_LEN as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut superblock_bytes)?;
        let superblock = Superblock::decode(&superblock_bytes)?;

        superblock
            .directory_offset
            .checked_add(superblock.directory_len)
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "directory at {}+{} runs past the {} byte file",
                    superblock.directory_offset, superblock.directory_len, file_len
                ))
            })?;

        let mut directory_bytes = vec![0u8; superblock.directory_len as usize];
        file.seek(SeekFrom::Start(superblock.directory_offset))?;
        file.read_exact(&mut directory_bytes)?;

        let mut hasher = Hasher::new();
        hasher.update(&directory_bytes);
        let actual = hasher.finalize();
        if actual != superblock.directory_crc {
            return Err(StoreError::ChecksumMismatch {
                expected: superblock.directory_crc,
                actual,
            });
        }

        let directory = Directory::decode(&directory_bytes)?;
        Ok((
            directory,
            superblock.directory_offset,
            superblock.directory_len,
        ))
    }

    /// Writes `directory` at `offset`, then flips the superblock pointer.
    ///
    /// Ordering is the store's crash-consistency rule: row data is already on
    /// disk before this runs, the new directory bytes land after the data
    /// without touching the committed one, and the superblock update is the
    /// last write. Until it completes, readers see the previous committed
    /// state; a crash at any point leaves at worst orphaned trailing bytes.
    fn commit(&mut self, directory: Directory, offset: u64) -> Result<(), StoreError> {
        let directory_bytes = directory.encode()?;
        let mut hasher = Hasher::new();
        hasher.update(&directory_bytes);
        let superblock = Superblock {
            directory_offset: offset,
            directory_len: directory_bytes.len() as u64,
            directory_crc: hasher.finalize(),
        };

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&directory_bytes)?;
        self.file.sync_data()?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&superblock.encode())?;
        self.file.sync_data()?;

        self.directory = directory;
        self.directory_offset = offset;
        self.directory_len = superblock.directory_len;
        Ok(())
    }

    /// The path this store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The resolutions with a committed group in this store.
    pub fn resolutions(&self) -> impl Iterator<Item = u32> + '_ {
        self.directory.groups.keys().copied()
    }

    /// The committed state of one resolution group.
    pub fn group(&self, resolution: u32) -> Option<&ResolutionGroup> {
        self.directory.groups.get(&resolution)
    }

    /// A handle to an existing group, for read access.
    pub fn group_handle(&self, resolution: u32) -> Option<GroupHandle> {
        self.directory
            .groups
            .contains_key(&resolution)
            .then_some(GroupHandle { resolution })
    }

    /// The slot width of a group, when the group exists.
    pub fn slot_width(&self, resolution: u32) -> Option<u32> {
        self.group(resolution).map(|group| group.slot_width)
    }

    /// Whether a region id is already indexed in a group.
    pub fn contains_region(&self, resolution: u32, region_id: &str) -> bool {
        self.group(resolution)
            .is_some_and(|group| group.model_params.contains_key(region_id))
    }

    /// The model-parameters entry of one region.
    pub fn region(&self, resolution: u32, region_id: &str) -> Option<&RegionEntry> {
        self.group(resolution)
            .and_then(|group| group.model_params.get(region_id))
    }

    /// Returns the group for `resolution`, creating it when absent.
    ///
    /// An existing group is returned unchanged: its attributes and slot width
    /// were fixed by the first document seen at this resolution, and
    /// `attrs`/`slot_width` are ignored. A newly created group becomes
    /// durable with the first region committed into it.
    pub fn open_or_create_group(
        &mut self,
        resolution: u32,
        attrs: GroupAttrs,
        slot_width: u32,
    ) -> Result<GroupHandle, StoreError> {
        self.directory
            .groups
            .entry(resolution)
            .or_insert_with(|| ResolutionGroup::new(attrs, slot_width));
        Ok(GroupHandle { resolution })
    }

    /// Appends a packed block's rows after the group's committed rows.
    ///
    /// The rows are written and flushed immediately, but stay invisible (and
    /// reclaimable) until [`Self::write_region_metadata`] commits them. An
    /// uncommitted block staged by a previous failed region is discarded and
    /// its bytes overwritten.
    ///
    /// # Return
    ///
    /// The half-open row range the block will occupy once committed.
    pub fn append(
        &mut self,
        group: GroupHandle,
        block: &PackedBlock,
    ) -> Result<(u64, u64), StoreError> {
        let resolution = group.resolution;
        let entry = self
            .directory
            .groups
            .get(&resolution)
            .ok_or(StoreError::UnknownGroup(resolution))?;
        if block.slot_width() as u32 != entry.slot_width {
            return Err(StoreError::MismatchedBlockWidth {
                resolution,
                expected: entry.slot_width,
                found: block.slot_width() as u32,
            });
        }

        let bytes = block.to_le_bytes();
        let offset = self.directory_offset + self.directory_len;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.file.sync_data()?;

        let start_row = entry.total_rows;
        let rows = block.model_count() as u64;
        self.staged = Some(StagedAppend {
            resolution,
            offset,
            start_row,
            rows,
            byte_len: bytes.len() as u64,
        });
        Ok((start_row, start_row + rows))
    }

    /// Commits the staged append and records the region in all three
    /// metadata tables.
    ///
    /// This is the transaction point of a region: on success the rows, the
    /// model-parameters entry, the cluster lists and the centroid blob are
    /// durable together. On any failure the staged rows are discarded and
    /// the store keeps its previous committed state.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::DuplicateRegion`] when the region id is
    /// already indexed in the group (re-ingesting a file is an error, not a
    /// no-op, because it would duplicate rows), with
    /// [`StoreError::NothingStaged`]/[`StoreError::MismatchedRows`] when the
    /// call does not match the preceding append, or with an I/O error from
    /// the commit itself.
    pub fn write_region_metadata(
        &mut self,
        group: GroupHandle,
        region: RegionMetadata,
    ) -> Result<(), StoreError> {
        let resolution = group.resolution;
        if !self.directory.groups.contains_key(&resolution) {
            self.staged = None;
            return Err(StoreError::UnknownGroup(resolution));
        }
        if self.contains_region(resolution, &region.region_id) {
            self.staged = None;
            return Err(StoreError::DuplicateRegion {
                resolution,
                region_id: region.region_id,
            });
        }

        let staged = match self.staged.take() {
            Some(staged) if staged.resolution == resolution => staged,
            _ => return Err(StoreError::NothingStaged(resolution)),
        };
        if staged.start_row != region.start_row || staged.start_row + staged.rows != region.end_row
        {
            return Err(StoreError::MismatchedRows {
                staged_start: staged.start_row,
                staged_end: staged.start_row + staged.rows,
                given_start: region.start_row,
                given_end: region.end_row,
            });
        }

        let mut directory = self.directory.clone();
        let entry = directory
            .groups
            .get_mut(&resolution)
            .ok_or(StoreError::UnknownGroup(resolution))?;
        entry.total_rows += staged.rows;
        if staged.rows > 0 {
            entry.extents.push(Extent {
                offset: staged.offset,
                start_row: staged.start_row,
                rows: staged.rows,
            });
        }
        entry.model_params.insert(
            region.region_id.clone(),
            RegionEntry {
                start_row: region.start_row,
                end_row: region.end_row,
                chromosome: region.chromosome,
                start: region.start,
                end: region.end,
                models: region.models,
            },
        );
        entry
            .clusters
            .insert(region.region_id.clone(), region.clusters);
        entry.centroids.insert(region.region_id, region.centroids);

        self.commit(directory, staged.offset + staged.byte_len)
    }

    /// Reads a range of committed coordinate rows from a group.
    pub fn read_rows(
        &mut self,
        group: GroupHandle,
        start_row: u64,
        end_row: u64,
    ) -> Result<PackedBlock, StoreError> {
        let resolution = group.resolution;
        let entry = self
            .directory
            .groups
            .get(&resolution)
            .ok_or(StoreError::UnknownGroup(resolution))?;
        if start_row > end_row || end_row > entry.total_rows {
            return Err(StoreError::RowsOutOfBounds {
                resolution,
                start: start_row,
                end: end_row,
                total_rows: entry.total_rows,
            });
        }

        let slot_width = entry.slot_width;
        let row_len = row_bytes(slot_width);
        let mut bytes = vec![0u8; ((end_row - start_row) * row_len) as usize];
        let mut filled = 0usize;
        let mut row = start_row;
        while row < end_row {
            let extent = *entry.extent_containing(row).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "row {row} of resolution group {resolution} is not covered by any extent"
                ))
            })?;
            let take = extent.end_row().min(end_row) - row;
            let offset = extent.offset + (row - extent.start_row) * row_len;
            let len = (take * row_len) as usize;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut bytes[filled..filled + len])?;
            filled += len;
            row += take;
        }

        PackedBlock::from_le_bytes(slot_width as usize, &bytes).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "rows {start_row}..{end_row} of resolution group {resolution} decode to a ragged block"
            ))
        })
    }

    /// Reads exactly the coordinate rows belonging to one region.
    pub fn region_coordinates(
        &mut self,
        group: GroupHandle,
        region_id: &str,
    ) -> Result<PackedBlock, StoreError> {
        let rows = self
            .region(group.resolution, region_id)
            .map(|entry| (entry.start_row, entry.end_row))
            .ok_or_else(|| StoreError::UnknownRegion {
                resolution: group.resolution,
                region_id: region_id.to_string(),
            })?;
        self.read_rows(group, rows.0, rows.1)
    }
}
