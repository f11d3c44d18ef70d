//! In-memory tabular project model.
//!
//! A [`Project`] holds an ordered list of [`Column`]s and an ordered list of
//! [`Row`]s. Every row carries exactly one optional cell per column, addressed
//! by column position. The structural primitives below keep that invariant
//! before they return, so a project handed from one process to the next is
//! always rectangular.
//!
//! No operation-specific logic lives here.

use serde::{Deserialize, Serialize};

use crate::error::{ProjectError, ProjectResult};

/// A cell value. `None` is an absent/empty cell.
pub type Cell = Option<String>;

// =============================================================================
// Columns
// =============================================================================

/// Type hint attached to a column by the importer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Boolean,
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub type_hint: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: ColumnType::Text,
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// A row of cells, one per column position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Monotonically assigned id, never reused within a project.
    pub id: u64,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Get a cell value as a string slice, treating absent cells as `None`.
    pub fn value(&self, column: usize) -> Option<&str> {
        self.cells.get(column).and_then(|c| c.as_deref())
    }

    /// Whether the cell is absent or whitespace only.
    pub fn is_blank(&self, column: usize) -> bool {
        self.value(column).map_or(true, |v| v.trim().is_empty())
    }
}

// =============================================================================
// Project
// =============================================================================

/// The grid that operations mutate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    columns: Vec<Column>,
    rows: Vec<Row>,
    next_row_id: u64,
}

impl Project {
    /// Create an empty project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a project with the given column names and no rows.
    pub fn with_columns<I, S>(names: I) -> ProjectResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut project = Self::new();
        for name in names {
            let position = project.column_count();
            project.add_column(position, Column::new(name))?;
        }
        Ok(project)
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names in position order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of the column with the given name, or `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> ProjectResult<usize> {
        self.column_index(name)
            .ok_or_else(|| ProjectError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, index: usize) -> ProjectResult<&Column> {
        let len = self.columns.len();
        self.columns
            .get(index)
            .ok_or_else(|| ProjectError::column(index, len))
    }

    pub fn row(&self, index: usize) -> ProjectResult<&Row> {
        let len = self.rows.len();
        self.rows.get(index).ok_or_else(|| ProjectError::row(index, len))
    }

    /// Read a single cell.
    pub fn cell(&self, row: usize, column: usize) -> ProjectResult<Option<&str>> {
        self.check_column(column)?;
        Ok(self.row(row)?.value(column))
    }

    // -------------------------------------------------------------------------
    // Column primitives
    // -------------------------------------------------------------------------

    /// Insert a column at `position`, adding an empty cell to every row.
    pub fn add_column(&mut self, position: usize, column: Column) -> ProjectResult<()> {
        if position > self.columns.len() {
            return Err(ProjectError::column(position, self.columns.len()));
        }
        if self.column_index(&column.name).is_some() {
            return Err(ProjectError::DuplicateColumn(column.name));
        }

        self.columns.insert(position, column);
        for row in &mut self.rows {
            row.cells.insert(position, None);
        }
        Ok(())
    }

    /// Insert a column whose cells are computed from each existing row.
    pub fn add_column_with<F>(
        &mut self,
        position: usize,
        column: Column,
        mut value: F,
    ) -> ProjectResult<()>
    where
        F: FnMut(&Row) -> Cell,
    {
        if position > self.columns.len() {
            return Err(ProjectError::column(position, self.columns.len()));
        }
        if self.column_index(&column.name).is_some() {
            return Err(ProjectError::DuplicateColumn(column.name));
        }

        let values: Vec<Cell> = self.rows.iter().map(&mut value).collect();
        self.columns.insert(position, column);
        for (row, cell) in self.rows.iter_mut().zip(values) {
            row.cells.insert(position, cell);
        }
        Ok(())
    }

    /// Remove the column at `index` together with its cell in every row.
    pub fn remove_column(&mut self, index: usize) -> ProjectResult<Column> {
        self.check_column(index)?;
        for row in &mut self.rows {
            row.cells.remove(index);
        }
        Ok(self.columns.remove(index))
    }

    /// Rename the column at `index`.
    pub fn rename_column(&mut self, index: usize, name: impl Into<String>) -> ProjectResult<()> {
        self.check_column(index)?;
        let name = name.into();
        if let Some(existing) = self.column_index(&name) {
            if existing != index {
                return Err(ProjectError::DuplicateColumn(name));
            }
        }
        self.columns[index].name = name;
        Ok(())
    }

    /// Move the column at `from` so that it ends up at position `to`.
    pub fn move_column(&mut self, from: usize, to: usize) -> ProjectResult<()> {
        self.check_column(from)?;
        self.check_column(to)?;
        if from == to {
            return Ok(());
        }

        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        for row in &mut self.rows {
            let cell = row.cells.remove(from);
            row.cells.insert(to, cell);
        }
        Ok(())
    }

    /// Set the type hint of a column.
    pub fn set_column_type(&mut self, index: usize, type_hint: ColumnType) -> ProjectResult<()> {
        self.check_column(index)?;
        self.columns[index].type_hint = type_hint;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Row primitives
    // -------------------------------------------------------------------------

    /// Append a row. Returns the assigned row id.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> ProjectResult<u64> {
        let position = self.rows.len();
        self.insert_row(position, cells)
    }

    /// Insert a row at `position`. Returns the assigned row id.
    pub fn insert_row(&mut self, position: usize, cells: Vec<Cell>) -> ProjectResult<u64> {
        if position > self.rows.len() {
            return Err(ProjectError::row(position, self.rows.len()));
        }
        if cells.len() != self.columns.len() {
            return Err(ProjectError::RowWidth {
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(position, Row { id, cells });
        Ok(id)
    }

    /// Overwrite a single cell. Returns the previous value.
    pub fn update_cell(&mut self, row: usize, column: usize, value: Cell) -> ProjectResult<Cell> {
        self.check_column(column)?;
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(row)
            .ok_or_else(|| ProjectError::row(row, len))?;
        Ok(std::mem::replace(&mut row.cells[column], value))
    }

    /// Delete the row at `index`.
    pub fn delete_row(&mut self, index: usize) -> ProjectResult<Row> {
        if index >= self.rows.len() {
            return Err(ProjectError::row(index, self.rows.len()));
        }
        Ok(self.rows.remove(index))
    }

    /// Keep only the rows matching `keep`. Returns the number removed.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    /// Mutable iteration over one column's cells, top to bottom.
    pub fn column_cells_mut(&mut self, column: usize) -> ProjectResult<impl Iterator<Item = &mut Cell>> {
        self.check_column(column)?;
        Ok(self.rows.iter_mut().map(move |row| &mut row.cells[column]))
    }

    // -------------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------------

    /// Post-load normalisation: pad ragged rows to the column count and make
    /// sure freshly assigned ids stay above every existing one.
    pub fn update(&mut self) {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.cells.resize(width, None);
        }
        let max_id = self.rows.iter().map(|r| r.id + 1).max().unwrap_or(0);
        self.next_row_id = self.next_row_id.max(max_id);
    }

    /// Verify that every row has one cell per column.
    pub fn check_consistency(&self) -> ProjectResult<()> {
        let expected = self.columns.len();
        match self.rows.iter().find(|r| r.cells.len() != expected) {
            Some(row) => Err(ProjectError::RowWidth {
                expected,
                actual: row.cells.len(),
            }),
            None => Ok(()),
        }
    }

    fn check_column(&self, index: usize) -> ProjectResult<()> {
        if index < self.columns.len() {
            Ok(())
        } else {
            Err(ProjectError::column(index, self.columns.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn people() -> Project {
        let mut project = Project::with_columns(["name", "age"]).unwrap();
        project.push_row(cells(&["Alice", "30"])).unwrap();
        project.push_row(cells(&["Bob", "25"])).unwrap();
        project
    }

    #[test]
    fn test_add_column_pads_rows() {
        let mut project = people();
        project.add_column(1, Column::new("city")).unwrap();

        assert_eq!(project.column_names(), vec!["name", "city", "age"]);
        assert_eq!(project.cell(0, 1).unwrap(), None);
        assert_eq!(project.cell(0, 2).unwrap(), Some("30"));
        assert!(project.check_consistency().is_ok());
    }

    #[test]
    fn test_add_column_with_values() {
        let mut project = people();
        project
            .add_column_with(2, Column::new("greeting"), |row| {
                row.value(0).map(|n| format!("hi {}", n))
            })
            .unwrap();

        assert_eq!(project.cell(1, 2).unwrap(), Some("hi Bob"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut project = people();
        let err = project.add_column(0, Column::new("age")).unwrap_err();
        assert_eq!(err, ProjectError::DuplicateColumn("age".into()));

        let err = project.rename_column(0, "age").unwrap_err();
        assert_eq!(err, ProjectError::DuplicateColumn("age".into()));
    }

    #[test]
    fn test_remove_column_drops_cells() {
        let mut project = people();
        let removed = project.remove_column(0).unwrap();

        assert_eq!(removed.name, "name");
        assert_eq!(project.column_names(), vec!["age"]);
        assert_eq!(project.row(1).unwrap().cells, cells(&["25"]));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut project = people();

        assert!(matches!(
            project.remove_column(2),
            Err(ProjectError::OutOfBounds { kind: "Column", index: 2, len: 2 })
        ));
        assert!(matches!(
            project.cell(5, 0),
            Err(ProjectError::OutOfBounds { kind: "Row", .. })
        ));
        assert!(project.update_cell(0, 9, None).is_err());
        assert!(project.delete_row(2).is_err());
        assert!(project.move_column(0, 2).is_err());
    }

    #[test]
    fn test_move_column() {
        let mut project = people();
        project.add_column(2, Column::new("city")).unwrap();
        project.update_cell(0, 2, Some("Rome".into())).unwrap();

        project.move_column(2, 0).unwrap();

        assert_eq!(project.column_names(), vec!["city", "name", "age"]);
        assert_eq!(project.row(0).unwrap().cells, vec![Some("Rome".into()), Some("Alice".into()), Some("30".into())]);
    }

    #[test]
    fn test_row_width_enforced() {
        let mut project = people();
        let err = project.push_row(cells(&["Carol"])).unwrap_err();
        assert_eq!(err, ProjectError::RowWidth { expected: 2, actual: 1 });
    }

    #[test]
    fn test_row_ids_never_reused() {
        let mut project = people();
        project.delete_row(1).unwrap();
        let id = project.push_row(cells(&["Carol", "41"])).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn test_retain_rows() {
        let mut project = people();
        let removed = project.retain_rows(|row| row.value(0) != Some("Bob"));
        assert_eq!(removed, 1);
        assert_eq!(project.row_count(), 1);
    }

    #[test]
    fn test_update_pads_ragged_rows() {
        let mut project = Project::with_columns(["a", "b", "c"]).unwrap();
        project.rows.push(Row { id: 7, cells: cells(&["1"]) });

        project.update();

        assert!(project.check_consistency().is_ok());
        assert_eq!(project.push_row(vec![None, None, None]).unwrap(), 8);
    }
}
