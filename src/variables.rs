//! Per-face named variable storage.
//!
//! Values are held column-wise: one `Vec<f64>` per variable, indexed by face.
//! Columns that were declared but never written hold `NaN`.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    len: usize,
    columns: FxHashMap<String, Vec<f64>>,
}

impl VariableStore {
    /// Empty store sized for `len` faces.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: FxHashMap::default(),
        }
    }

    /// Declare each variable in `names`, keeping any existing values.
    pub fn init<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let len = self.len;
            self.columns
                .entry(name.into())
                .or_insert_with(|| vec![f64::NAN; len]);
        }
    }

    /// Number of faces each column holds.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Declared variable names, sorted.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.columns.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, face: usize, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(|c| c.get(face).copied())
    }

    /// Write one value, declaring the variable on first use.
    ///
    /// Out-of-range faces are ignored and reported as `false`.
    pub fn set(&mut self, face: usize, name: &str, value: f64) -> bool {
        if face >= self.len {
            return false;
        }
        self.column_mut(name)[face] = value;
        true
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Mutable column for `name`, declaring it if absent.
    pub fn column_mut(&mut self, name: &str) -> &mut [f64] {
        let len = self.len;
        self.columns
            .entry(name.to_owned())
            .or_insert_with(|| vec![f64::NAN; len])
    }
}
