use std::{collections::HashMap, path::PathBuf};

use anyhow::{Result, anyhow};
use polars::frame::DataFrame;

use crate::common::{ensure_dir_exists, list_subdirs, write_csv};

/// The set of wards known to a district, and somewhere to put per-ward tables.
/// On disk a ward is a subdirectory named after it.
pub trait WardInventory {
    /// Ward names, in a stable order.
    fn ward_names(&self) -> Result<Vec<String>>;

    /// Store `table` as `file_name` for `ward`.
    fn put_table(&mut self, ward: &str, file_name: &str, table: &mut DataFrame) -> Result<()>;
}

/// Ward directories under a district directory.
#[derive(Debug, Clone)]
pub struct DiskWards {
    root: PathBuf,
}

impl DiskWards {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    #[inline] pub fn root(&self) -> &PathBuf { &self.root }

    #[inline] pub fn ward_dir(&self, ward: &str) -> PathBuf { self.root.join(ward) }
}

impl WardInventory for DiskWards {
    fn ward_names(&self) -> Result<Vec<String>> {
        Ok(list_subdirs(&self.root)?.iter()
            .filter_map(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn put_table(&mut self, ward: &str, file_name: &str, table: &mut DataFrame) -> Result<()> {
        let dir = self.ward_dir(ward);
        ensure_dir_exists(&dir)?;
        write_csv(table, &dir.join(file_name))
    }
}

/// In-memory wards, keyed by (ward, file name).
#[derive(Debug, Default, Clone)]
pub struct MemWards {
    wards: Vec<String>,
    pub(crate) tables: HashMap<(String, String), DataFrame>,
}

impl MemWards {
    pub fn new<S: AsRef<str>>(wards: &[S]) -> Self {
        Self { wards: wards.iter().map(|w| w.as_ref().to_string()).collect(), tables: HashMap::new() }
    }

    pub fn get(&self, ward: &str, file_name: &str) -> Result<&DataFrame> {
        self.tables.get(&(ward.to_string(), file_name.to_string()))
            .ok_or_else(|| anyhow!("missing ward table: {ward}/{file_name}"))
    }

    #[inline] pub fn table_count(&self) -> usize { self.tables.len() }
}

impl WardInventory for MemWards {
    fn ward_names(&self) -> Result<Vec<String>> { Ok(self.wards.clone()) }

    fn put_table(&mut self, ward: &str, file_name: &str, table: &mut DataFrame) -> Result<()> {
        if !self.wards.iter().any(|w| w == ward) {
            return Err(anyhow!("unknown ward: {ward}"));
        }
        self.tables.insert((ward.to_string(), file_name.to_string()), table.clone());
        Ok(())
    }
}
