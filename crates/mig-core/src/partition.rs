//! Partition inspection and filtering
//!
//! Partitions scheduled to be formatted cannot be imported from once the
//! installer commits the partition table, so they are pruned from the
//! partitions question before the worker walks them.
//!
//! The inspector exposes the partition server's view of the disks:
//! positional partition listings and a one-line state record per partition
//! (`<root>/<disk>/<partition id>/view`).

use crate::error::PartitionError;
use crate::logging::LOG_TARGET;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Record values meaning the partition will be (re)formatted
pub const FORMATTING_FLAGS: [&str; 3] = ["F", "f", "swap"];

/// Number of fields in a state record
pub const STATE_RECORD_FIELDS: usize = 9;

/// Position of the partition id in a partition listing
const ID_FIELD: usize = 1;
/// Position of the device path in a partition listing
const PATH_FIELD: usize = 5;
/// Record fields holding the format flags
const FORMAT_FIELDS: [usize; 2] = [4, 5];

/// One partition from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Partition id, names the state record directory
    pub id: String,
    /// Device path, e.g. `/dev/hda1`
    pub device_path: String,
}

impl PartitionEntry {
    /// Create an entry
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, device_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_path: device_path.into(),
        }
    }

    /// Read an entry from a positional listing
    ///
    /// # Errors
    /// `PartitionError::MalformedEntry` if the id or path field is missing
    pub fn from_fields(fields: &[String]) -> Result<Self, PartitionError> {
        match (fields.get(ID_FIELD), fields.get(PATH_FIELD)) {
            (Some(id), Some(path)) => Ok(Self::new(id.clone(), path.clone())),
            _ => Err(PartitionError::MalformedEntry(fields.to_vec())),
        }
    }
}

/// Whitespace-separated partition state record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    fields: Vec<String>,
}

impl StateRecord {
    /// Parse the first line of a state file
    ///
    /// At most [`STATE_RECORD_FIELDS`] fields are produced; the last one
    /// keeps the rest of the line. Short records are padded with empty
    /// strings.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut fields = Vec::with_capacity(STATE_RECORD_FIELDS);
        let mut rest = line.trim_end_matches('\n');

        while fields.len() < STATE_RECORD_FIELDS - 1 {
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                rest = trimmed;
                break;
            }
            match trimmed.find(char::is_whitespace) {
                Some(end) => {
                    fields.push(trimmed[..end].to_string());
                    rest = &trimmed[end..];
                }
                None => {
                    fields.push(trimmed.to_string());
                    rest = "";
                }
            }
        }

        let tail = rest.trim_start();
        if !tail.is_empty() {
            fields.push(tail.to_string());
        }
        fields.resize(STATE_RECORD_FIELDS, String::new());
        Self { fields }
    }

    /// Field at `index`, empty when out of range
    #[inline]
    #[must_use]
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", String::as_str)
    }

    /// Whether the partition will be formatted
    #[must_use]
    pub fn is_scheduled_for_format(&self) -> bool {
        FORMAT_FIELDS
            .iter()
            .any(|&i| FORMATTING_FLAGS.contains(&self.field(i)))
    }
}

/// Read-only view of the partition server
pub trait PartitionInspector {
    /// Disk identifiers
    fn list_disks(&mut self) -> Result<Vec<String>, PartitionError>;

    /// Make `disk` the target of [`list_partitions`](Self::list_partitions)
    fn select_disk(&mut self, disk: &str) -> Result<(), PartitionError>;

    /// Partitions of the selected disk
    fn list_partitions(&mut self) -> Result<Vec<PartitionEntry>, PartitionError>;

    /// First line of the partition's state record
    fn state_line(&mut self, disk: &str, partition_id: &str) -> Result<String, PartitionError>;
}

/// Read the state line of a partition under a device directory
///
/// # Errors
/// `PartitionError::Io` if the view file cannot be read
pub fn read_view_line(root: &Path, disk: &str, partition_id: &str) -> Result<String, PartitionError> {
    let path = root.join(disk).join(partition_id).join("view");
    let text = std::fs::read_to_string(&path).map_err(|source| PartitionError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(text.lines().next().unwrap_or_default().to_string())
}

/// Inspector over a fixed partition layout
///
/// Partition listings are positional, the way the partition server reports
/// them. State lines come from `states` (keyed `disk/partition id`) or,
/// failing that, from view files under `view_root`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticInspector {
    #[serde(default)]
    disks: IndexMap<String, Vec<Vec<String>>>,
    #[serde(default)]
    states: BTreeMap<String, String>,
    #[serde(default)]
    view_root: Option<PathBuf>,
    #[serde(skip)]
    selected: Option<String>,
}

impl StaticInspector {
    /// Create an empty inspector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a partition on `disk`; `state` is its record line
    #[must_use]
    pub fn with_partition(
        mut self,
        disk: impl Into<String>,
        id: impl Into<String>,
        device_path: impl Into<String>,
        state: Option<&str>,
    ) -> Self {
        let disk = disk.into();
        let id = id.into();
        if let Some(state) = state {
            self.states.insert(format!("{disk}/{id}"), state.to_string());
        }
        let fields = vec![
            String::new(),
            id,
            String::new(),
            String::new(),
            String::new(),
            device_path.into(),
        ];
        self.disks.entry(disk).or_default().push(fields);
        self
    }

    /// With a device directory for state lines not held in memory
    #[inline]
    #[must_use]
    pub fn with_view_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.view_root = Some(root.into());
        self
    }
}

impl PartitionInspector for StaticInspector {
    fn list_disks(&mut self) -> Result<Vec<String>, PartitionError> {
        Ok(self.disks.keys().cloned().collect())
    }

    fn select_disk(&mut self, disk: &str) -> Result<(), PartitionError> {
        if !self.disks.contains_key(disk) {
            return Err(PartitionError::UnknownDisk(disk.to_string()));
        }
        self.selected = Some(disk.to_string());
        Ok(())
    }

    fn list_partitions(&mut self) -> Result<Vec<PartitionEntry>, PartitionError> {
        let disk = self.selected.as_ref().ok_or(PartitionError::NoDiskSelected)?;
        self.disks
            .get(disk)
            .ok_or_else(|| PartitionError::UnknownDisk(disk.clone()))?
            .iter()
            .map(|fields| PartitionEntry::from_fields(fields))
            .collect()
    }

    fn state_line(&mut self, disk: &str, partition_id: &str) -> Result<String, PartitionError> {
        if let Some(line) = self.states.get(&format!("{disk}/{partition_id}")) {
            return Ok(line.clone());
        }
        match &self.view_root {
            Some(root) => read_view_line(root, disk, partition_id),
            None => Err(PartitionError::MissingState {
                disk: disk.to_string(),
                partition: partition_id.to_string(),
            }),
        }
    }
}

/// Device path named by a partitions-list choice
///
/// `Windows XP (/dev/hda1)` names `/dev/hda1`.
#[must_use]
pub fn device_of_choice(choice: &str) -> Option<&str> {
    let open = choice.rfind('(')?;
    let close = choice.rfind(')')?;
    (close > open).then(|| &choice[open + 1..close])
}

/// Prunes partitions that are about to be formatted
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionFilter;

impl PartitionFilter {
    /// Create a filter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Device paths whose contents survive partitioning
    ///
    /// A partition whose state line cannot be read is left out.
    ///
    /// # Errors
    /// Returns error if disks or partitions cannot be enumerated
    pub fn surviving_devices<I>(&self, inspector: &mut I) -> Result<HashSet<String>, PartitionError>
    where
        I: PartitionInspector + ?Sized,
    {
        let mut devices = HashSet::new();
        for disk in inspector.list_disks()? {
            inspector.select_disk(&disk)?;
            for partition in inspector.list_partitions()? {
                let line = match inspector.state_line(&disk, &partition.id) {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!(
                            target: LOG_TARGET,
                            "Skipping {} on {}: {}",
                            partition.device_path,
                            disk,
                            err
                        );
                        continue;
                    }
                };
                if StateRecord::parse(&line).is_scheduled_for_format() {
                    tracing::debug!(
                        target: LOG_TARGET,
                        "{} is scheduled for formatting",
                        partition.device_path
                    );
                } else {
                    devices.insert(partition.device_path);
                }
            }
        }
        Ok(devices)
    }

    /// Choices whose device survives partitioning, in their original order
    ///
    /// # Errors
    /// Returns error if disks or partitions cannot be enumerated
    pub fn filter<I>(&self, inspector: &mut I, choices: &[String]) -> Result<Vec<String>, PartitionError>
    where
        I: PartitionInspector + ?Sized,
    {
        let devices = self.surviving_devices(inspector)?;
        Ok(choices
            .iter()
            .filter(|choice| device_of_choice(choice).is_some_and(|d| devices.contains(d)))
            .cloned()
            .collect())
    }
}
