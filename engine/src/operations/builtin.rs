//! Builtin operation catalog.
//!
//! Column and row operations registered at startup. Every kind is registered
//! under a short tag and under the tag OpenRefine writes in exported recipes,
//! and accepts OpenRefine's parameter names as aliases, so a recipe copied out
//! of the OpenRefine history panel replays as-is for the kinds listed here.
//!
//! | tag | OpenRefine tag |
//! |-----|----------------|
//! | `rename-column` | `core/column-rename` |
//! | `remove-column` | `core/column-removal` |
//! | `add-column` | `core/column-addition` |
//! | `move-column` | `core/column-move` |
//! | `reorder-columns` | `core/column-reorder` |
//! | `split-column` | `core/column-split` |
//! | `text-transform` | `core/text-transform` |
//! | `mass-edit` | `core/mass-edit` |
//! | `fill-down` | `core/fill-down` |
//! | `blank-down` | `core/blank-down` |
//! | `remove-rows` | `core/row-removal` |

use regex::Regex;
use serde::Deserialize;

use super::registry::OperationRegistry;
use super::values::{ValueOp, ValuePipeline};
use super::{Operation, Process, ProcessOptions};
use crate::error::{OperationError, OperationResult, ProjectResult};
use crate::project::{Cell, Column, Project};

/// Register every builtin kind.
pub fn register_all(registry: &mut OperationRegistry) {
    registry.register_params::<RenameColumn>("rename-column");
    registry.register_params::<RenameColumn>("core/column-rename");

    registry.register_params::<RemoveColumn>("remove-column");
    registry.register_params::<RemoveColumn>("core/column-removal");

    registry.register_params::<AddColumn>("add-column");
    registry.register_params::<AddColumn>("core/column-addition");

    registry.register_params::<MoveColumn>("move-column");
    registry.register_params::<MoveColumn>("core/column-move");

    registry.register_params::<ReorderColumns>("reorder-columns");
    registry.register_params::<ReorderColumns>("core/column-reorder");

    registry.register_params::<SplitColumn>("split-column");
    registry.register_params::<SplitColumn>("core/column-split");

    registry.register_params::<TextTransform>("text-transform");
    registry.register_params::<TextTransform>("core/text-transform");

    registry.register_params::<MassEdit>("mass-edit");
    registry.register_params::<MassEdit>("core/mass-edit");

    registry.register_params::<FillDown>("fill-down");
    registry.register_params::<FillDown>("core/fill-down");

    registry.register_params::<BlankDown>("blank-down");
    registry.register_params::<BlankDown>("core/blank-down");

    registry.register_params::<RemoveRows>("remove-rows");
    registry.register_params::<RemoveRows>("core/row-removal");
}

fn find_column(project: &Project, name: &str) -> OperationResult<usize> {
    project
        .column_index(name)
        .ok_or_else(|| OperationError::MissingColumn(name.to_string()))
}

fn non_empty(value: String) -> Cell {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Column operations
// =============================================================================

/// Rename a column.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameColumn {
    #[serde(alias = "oldColumnName")]
    pub from: String,
    #[serde(alias = "newColumnName")]
    pub to: String,
}

struct RenameProcess {
    index: usize,
    from: String,
    to: String,
}

impl Operation for RenameColumn {
    fn kind(&self) -> &str {
        "rename-column"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.from)?;
        if self.to.is_empty() {
            return Err(OperationError::invalid("to", "new column name is empty"));
        }
        if project.column_index(&self.to).is_some_and(|existing| existing != index) {
            return Err(OperationError::invalid("to", format!("column '{}' already exists", self.to)));
        }

        Ok(Box::new(RenameProcess {
            index,
            from: self.from.clone(),
            to: self.to.clone(),
        }))
    }
}

impl Process for RenameProcess {
    fn describe(&self) -> String {
        format!("Rename column {} to {}", self.from, self.to)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        project.rename_column(self.index, self.to)
    }
}

/// Remove a column.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveColumn {
    #[serde(alias = "columnName")]
    pub column: String,
}

struct RemoveColumnProcess {
    index: usize,
    name: String,
}

impl Operation for RemoveColumn {
    fn kind(&self) -> &str {
        "remove-column"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.column)?;
        Ok(Box::new(RemoveColumnProcess {
            index,
            name: self.column.clone(),
        }))
    }
}

impl Process for RemoveColumnProcess {
    fn describe(&self) -> String {
        format!("Remove column {}", self.name)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        project.remove_column(self.index).map(|_| ())
    }
}

/// Add a column computed from a base column or a constant.
///
/// With a base column, each new cell starts from the base value (falling back
/// to `value` when blank); without one, every cell starts from `value`. The
/// result then goes through `operations` or a GREL-style `expression`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddColumn {
    #[serde(alias = "newColumnName")]
    pub name: String,
    #[serde(default, alias = "baseColumnName")]
    pub base: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, alias = "columnInsertIndex")]
    pub position: Option<usize>,
    #[serde(default)]
    pub operations: Vec<ValueOp>,
    #[serde(default)]
    pub expression: Option<String>,
}

struct AddColumnProcess {
    name: String,
    position: usize,
    base: Option<usize>,
    value: Option<String>,
    pipeline: ValuePipeline,
}

impl Operation for AddColumn {
    fn kind(&self) -> &str {
        "add-column"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        if self.name.is_empty() {
            return Err(OperationError::invalid("name", "column name is empty"));
        }
        if project.column_index(&self.name).is_some() {
            return Err(OperationError::invalid("name", format!("column '{}' already exists", self.name)));
        }

        let base = self
            .base
            .as_deref()
            .map(|name| find_column(project, name))
            .transpose()?;

        let position = self
            .position
            .or(base.map(|b| b + 1))
            .unwrap_or(project.column_count());
        if position > project.column_count() {
            return Err(OperationError::invalid(
                "position",
                format!("{} is past the last column ({})", position, project.column_count()),
            ));
        }

        let pipeline = match &self.expression {
            Some(expr) => ValuePipeline::from_expression(expr)?,
            None => ValuePipeline::new(&self.operations)?,
        };

        Ok(Box::new(AddColumnProcess {
            name: self.name.clone(),
            position,
            base,
            value: self.value.clone(),
            pipeline,
        }))
    }
}

impl Process for AddColumnProcess {
    fn describe(&self) -> String {
        format!("Create column {} at index {}", self.name, self.position)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        let AddColumnProcess { name, position, base, value, pipeline } = *self;
        project.add_column_with(position, Column::new(name), |row| {
            let start = base
                .and_then(|b| row.value(b))
                .filter(|v| !v.trim().is_empty())
                .or(value.as_deref())?;
            non_empty(pipeline.apply(start))
        })
    }
}

/// Move a column to a new position.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveColumn {
    #[serde(alias = "columnName")]
    pub column: String,
    pub index: usize,
}

struct MoveColumnProcess {
    name: String,
    from: usize,
    to: usize,
}

impl Operation for MoveColumn {
    fn kind(&self) -> &str {
        "move-column"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let from = find_column(project, &self.column)?;
        if self.index >= project.column_count() {
            return Err(OperationError::invalid(
                "index",
                format!("{} is out of range for {} columns", self.index, project.column_count()),
            ));
        }

        Ok(Box::new(MoveColumnProcess {
            name: self.column.clone(),
            from,
            to: self.index,
        }))
    }
}

impl Process for MoveColumnProcess {
    fn describe(&self) -> String {
        format!("Move column {} to position {}", self.name, self.to)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        project.move_column(self.from, self.to)
    }
}

/// Reorder columns; columns not listed are removed.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderColumns {
    #[serde(alias = "columnNames")]
    pub columns: Vec<String>,
}

struct ReorderProcess {
    columns: Vec<String>,
}

impl Operation for ReorderColumns {
    fn kind(&self) -> &str {
        "reorder-columns"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        for (i, name) in self.columns.iter().enumerate() {
            find_column(project, name)?;
            if self.columns[..i].contains(name) {
                return Err(OperationError::invalid("columns", format!("column '{}' listed twice", name)));
            }
        }

        Ok(Box::new(ReorderProcess {
            columns: self.columns.clone(),
        }))
    }
}

impl Process for ReorderProcess {
    fn describe(&self) -> String {
        format!("Reorder columns: {}", self.columns.join(", "))
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        // Resolve every name before touching the grid
        for name in &self.columns {
            project.require_column(name)?;
        }

        let dropped: Vec<usize> = (0..project.column_count())
            .rev()
            .filter(|&i| {
                project
                    .column(i)
                    .map_or(false, |c| !self.columns.contains(&c.name))
            })
            .collect();
        for index in dropped {
            project.remove_column(index)?;
        }

        for (target, name) in self.columns.iter().enumerate() {
            let current = project.require_column(name)?;
            project.move_column(current, target)?;
        }
        Ok(())
    }
}

/// Split a column into several columns on a separator.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitColumn {
    #[serde(alias = "columnName")]
    pub column: String,
    pub separator: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default = "default_true", alias = "removeOriginalColumn")]
    pub remove_original: bool,
    #[serde(default, alias = "maxColumns")]
    pub max_columns: Option<usize>,
}

#[derive(Debug, Clone)]
enum Splitter {
    Plain(String),
    Pattern(Regex),
}

impl Splitter {
    fn split(&self, value: &str, max: Option<usize>) -> Vec<String> {
        match (self, max) {
            (Splitter::Plain(sep), Some(n)) => value.splitn(n, sep.as_str()).map(str::to_string).collect(),
            (Splitter::Plain(sep), None) => value.split(sep.as_str()).map(str::to_string).collect(),
            (Splitter::Pattern(re), Some(n)) => re.splitn(value, n).map(str::to_string).collect(),
            (Splitter::Pattern(re), None) => re.split(value).map(str::to_string).collect(),
        }
    }
}

struct SplitProcess {
    name: String,
    index: usize,
    new_names: Vec<String>,
    splitter: Splitter,
    max: Option<usize>,
    remove_original: bool,
}

impl Operation for SplitColumn {
    fn kind(&self) -> &str {
        "split-column"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.column)?;
        if self.separator.is_empty() {
            return Err(OperationError::invalid("separator", "separator is empty"));
        }

        let splitter = if self.regex {
            Splitter::Pattern(
                Regex::new(&self.separator).map_err(|e| OperationError::invalid("separator", e.to_string()))?,
            )
        } else {
            Splitter::Plain(self.separator.clone())
        };
        let max = self.max_columns.filter(|&n| n > 0);

        let width = project
            .rows()
            .iter()
            .filter_map(|row| row.value(index))
            .map(|v| splitter.split(v, max).len())
            .max()
            .unwrap_or(0);

        let new_names: Vec<String> = (1..=width).map(|i| format!("{} {}", self.column, i)).collect();
        if let Some(taken) = new_names.iter().find(|n| project.column_index(n).is_some()) {
            return Err(OperationError::invalid("column", format!("column '{}' already exists", taken)));
        }

        Ok(Box::new(SplitProcess {
            name: self.column.clone(),
            index,
            new_names,
            splitter,
            max,
            remove_original: self.remove_original,
        }))
    }
}

impl Process for SplitProcess {
    fn describe(&self) -> String {
        format!("Split column {} into {} columns", self.name, self.new_names.len())
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        let source = self.index;
        for (i, name) in self.new_names.iter().enumerate() {
            let splitter = &self.splitter;
            let max = self.max;
            project.add_column_with(source + 1 + i, Column::new(name.clone()), |row| {
                row.value(source)
                    .and_then(|v| splitter.split(v, max).into_iter().nth(i))
                    .and_then(non_empty)
            })?;
        }

        if self.remove_original {
            project.remove_column(source)?;
        }
        Ok(())
    }
}

// =============================================================================
// Cell operations
// =============================================================================

/// Rewrite every non-blank cell of a column through value operations.
#[derive(Debug, Clone, Deserialize)]
pub struct TextTransform {
    #[serde(alias = "columnName")]
    pub column: String,
    #[serde(default)]
    pub operations: Vec<ValueOp>,
    #[serde(default)]
    pub expression: Option<String>,
}

struct TextTransformProcess {
    name: String,
    index: usize,
    pipeline: ValuePipeline,
}

impl Operation for TextTransform {
    fn kind(&self) -> &str {
        "text-transform"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.column)?;
        let pipeline = match &self.expression {
            Some(expr) => ValuePipeline::from_expression(expr)?,
            None if self.operations.is_empty() => {
                return Err(OperationError::invalid("operations", "either operations or expression is required"))
            }
            None => ValuePipeline::new(&self.operations)?,
        };

        Ok(Box::new(TextTransformProcess {
            name: self.column.clone(),
            index,
            pipeline,
        }))
    }
}

impl Process for TextTransformProcess {
    fn describe(&self) -> String {
        format!("Text transform on cells in column {}", self.name)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        for cell in project.column_cells_mut(self.index)? {
            if let Some(value) = cell.take() {
                *cell = non_empty(self.pipeline.apply(&value));
            }
        }
        Ok(())
    }
}

/// Replace listed values of a column.
#[derive(Debug, Clone, Deserialize)]
pub struct MassEdit {
    #[serde(alias = "columnName")]
    pub column: String,
    pub edits: Vec<Edit>,
}

/// One mass-edit rule: cells equal to any of `from` (or blank, with
/// `from_blank`) become `to`.
#[derive(Debug, Clone, Deserialize)]
pub struct Edit {
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default, alias = "fromBlank")]
    pub from_blank: bool,
    pub to: String,
}

struct MassEditProcess {
    name: String,
    index: usize,
    edits: Vec<Edit>,
}

impl Operation for MassEdit {
    fn kind(&self) -> &str {
        "mass-edit"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.column)?;
        if self.edits.is_empty() {
            return Err(OperationError::invalid("edits", "no edits given"));
        }

        Ok(Box::new(MassEditProcess {
            name: self.column.clone(),
            index,
            edits: self.edits.clone(),
        }))
    }
}

impl Process for MassEditProcess {
    fn describe(&self) -> String {
        format!("Mass edit cells in column {}", self.name)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        for cell in project.column_cells_mut(self.index)? {
            let value = cell.as_deref();
            let blank = value.map_or(true, |v| v.trim().is_empty());
            let edit = self.edits.iter().find(|edit| {
                if blank {
                    edit.from_blank
                } else {
                    value.is_some_and(|v| edit.from.iter().any(|f| f == v))
                }
            });
            if let Some(edit) = edit {
                *cell = non_empty(edit.to.clone());
            }
        }
        Ok(())
    }
}

/// Fill blank cells with the value above.
#[derive(Debug, Clone, Deserialize)]
pub struct FillDown {
    #[serde(alias = "columnName")]
    pub column: String,
}

struct FillDownProcess {
    name: String,
    index: usize,
}

impl Operation for FillDown {
    fn kind(&self) -> &str {
        "fill-down"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        Ok(Box::new(FillDownProcess {
            name: self.column.clone(),
            index: find_column(project, &self.column)?,
        }))
    }
}

impl Process for FillDownProcess {
    fn describe(&self) -> String {
        format!("Fill down cells in column {}", self.name)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        let mut previous: Cell = None;
        for cell in project.column_cells_mut(self.index)? {
            let blank = cell.as_deref().map_or(true, |v| v.trim().is_empty());
            if blank {
                *cell = previous.clone();
            } else {
                previous = cell.clone();
            }
        }
        Ok(())
    }
}

/// Blank out cells equal to the value above.
#[derive(Debug, Clone, Deserialize)]
pub struct BlankDown {
    #[serde(alias = "columnName")]
    pub column: String,
}

struct BlankDownProcess {
    name: String,
    index: usize,
}

impl Operation for BlankDown {
    fn kind(&self) -> &str {
        "blank-down"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        Ok(Box::new(BlankDownProcess {
            name: self.column.clone(),
            index: find_column(project, &self.column)?,
        }))
    }
}

impl Process for BlankDownProcess {
    fn describe(&self) -> String {
        format!("Blank down cells in column {}", self.name)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        let mut previous: Cell = None;
        for cell in project.column_cells_mut(self.index)? {
            if cell.is_some() && *cell == previous {
                *cell = None;
            } else {
                previous = cell.clone();
            }
        }
        Ok(())
    }
}

// =============================================================================
// Row operations
// =============================================================================

/// Remove rows whose cell in `column` matches a criterion.
///
/// Exactly one of `blank`, `equals` or `pattern` must be given. `invert`
/// keeps the matching rows instead.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRows {
    #[serde(alias = "columnName")]
    pub column: String,
    #[serde(default)]
    pub blank: bool,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub invert: bool,
}

#[derive(Debug)]
enum RowMatch {
    Blank,
    Equals(String),
    Pattern(Regex),
}

struct RemoveRowsProcess {
    name: String,
    index: usize,
    criterion: RowMatch,
    invert: bool,
}

impl Operation for RemoveRows {
    fn kind(&self) -> &str {
        "remove-rows"
    }

    fn create_process(&self, project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
        let index = find_column(project, &self.column)?;

        let criterion = match (self.blank, &self.equals, &self.pattern) {
            (true, None, None) => RowMatch::Blank,
            (false, Some(value), None) => RowMatch::Equals(value.clone()),
            (false, None, Some(pattern)) => RowMatch::Pattern(
                Regex::new(pattern).map_err(|e| OperationError::invalid("pattern", e.to_string()))?,
            ),
            _ => {
                return Err(OperationError::invalid(
                    "criterion",
                    "exactly one of blank, equals or pattern is required",
                ))
            }
        };

        Ok(Box::new(RemoveRowsProcess {
            name: self.column.clone(),
            index,
            criterion,
            invert: self.invert,
        }))
    }
}

impl Process for RemoveRowsProcess {
    fn describe(&self) -> String {
        let what = match &self.criterion {
            RowMatch::Blank => "blank".to_string(),
            RowMatch::Equals(v) => format!("equal to '{}'", v),
            RowMatch::Pattern(re) => format!("matching /{}/", re.as_str()),
        };
        let verb = if self.invert { "Keep only" } else { "Remove" };
        format!("{} rows where {} is {}", verb, self.name, what)
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
        project.column(self.index)?;
        let index = self.index;
        project.retain_rows(|row| {
            let matched = match &self.criterion {
                RowMatch::Blank => row.is_blank(index),
                RowMatch::Equals(v) => row.value(index) == Some(v.as_str()),
                RowMatch::Pattern(re) => row.value(index).is_some_and(|v| re.is_match(v)),
            };
            matched == self.invert
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Descriptor;
    use crate::parser::{import_bytes, ImportOptions};
    use serde_json::json;

    fn project(csv: &str) -> Project {
        import_bytes(csv.as_bytes(), &ImportOptions::default())
            .unwrap()
            .project
    }

    fn apply(project: &mut Project, descriptor: serde_json::Value) -> OperationResult<()> {
        let registry = OperationRegistry::with_builtins();
        let descriptor = Descriptor::from_value(&descriptor)?;
        let op = registry
            .reconstruct(project, &descriptor)?
            .expect("builtin kind");
        let process = op.create_process(project, &ProcessOptions::new())?;
        process.run(project)?;
        Ok(())
    }

    fn column(project: &Project, name: &str) -> Vec<Option<String>> {
        let index = project.column_index(name).unwrap();
        project.rows().iter().map(|r| r.cells[index].clone()).collect()
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_rename_column() {
        let mut p = project("name,age\nAlice,30\n");
        apply(&mut p, json!({"type": "rename-column", "from": "age", "to": "years"})).unwrap();
        assert_eq!(p.column_names(), vec!["name", "years"]);
    }

    #[test]
    fn test_rename_openrefine_format() {
        let mut p = project("name,age\nAlice,30\n");
        apply(
            &mut p,
            json!({"op": "core/column-rename", "oldColumnName": "name", "newColumnName": "who"}),
        )
        .unwrap();
        assert_eq!(p.column_names(), vec!["who", "age"]);
    }

    #[test]
    fn test_rename_missing_column() {
        let mut p = project("name,age\nAlice,30\n");
        let err = apply(&mut p, json!({"type": "rename-column", "from": "zip", "to": "z"})).unwrap_err();
        assert!(matches!(err, OperationError::MissingColumn(c) if c == "zip"));
    }

    #[test]
    fn test_rename_to_existing_rejected() {
        let mut p = project("name,age\nAlice,30\n");
        let err = apply(&mut p, json!({"type": "rename-column", "from": "age", "to": "name"})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
        assert_eq!(p.column_names(), vec!["name", "age"]);
    }

    #[test]
    fn test_remove_column() {
        let mut p = project("name,age\nAlice,30\n");
        apply(&mut p, json!({"op": "core/column-removal", "columnName": "name"})).unwrap();
        assert_eq!(p.column_names(), vec!["age"]);
        assert_eq!(column(&p, "age"), vec![s("30")]);
    }

    #[test]
    fn test_add_column_from_base() {
        let mut p = project("name,age\n alice ,30\nbob,\n");
        apply(
            &mut p,
            json!({
                "type": "add-column",
                "name": "NAME",
                "base": "name",
                "operations": [{"type": "trim"}, {"type": "uppercase"}]
            }),
        )
        .unwrap();

        assert_eq!(p.column_names(), vec!["name", "NAME", "age"]);
        assert_eq!(column(&p, "NAME"), vec![s("ALICE"), s("BOB")]);
    }

    #[test]
    fn test_add_column_constant_and_fallback() {
        let mut p = project("name,age\nAlice,30\nBob,\n");
        apply(&mut p, json!({"type": "add-column", "name": "country", "value": "IT"})).unwrap();
        apply(&mut p, json!({"type": "add-column", "name": "age2", "base": "age", "value": "unknown"})).unwrap();

        assert_eq!(p.column_names(), vec!["name", "age", "age2", "country"]);
        assert_eq!(column(&p, "country"), vec![s("IT"), s("IT")]);
        assert_eq!(column(&p, "age2"), vec![s("30"), s("unknown")]);
    }

    #[test]
    fn test_add_column_openrefine_expression() {
        let mut p = project("name\n alice \n");
        apply(
            &mut p,
            json!({
                "op": "core/column-addition",
                "baseColumnName": "name",
                "expression": "grel:value.trim().toTitlecase()",
                "newColumnName": "clean",
                "columnInsertIndex": 0
            }),
        )
        .unwrap();

        assert_eq!(p.column_names(), vec!["clean", "name"]);
        assert_eq!(column(&p, "clean"), vec![s("Alice")]);
    }

    #[test]
    fn test_add_column_bad_position() {
        let mut p = project("a\n1\n");
        let err = apply(&mut p, json!({"type": "add-column", "name": "b", "position": 5})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_move_column() {
        let mut p = project("a,b,c\n1,2,3\n");
        apply(&mut p, json!({"type": "move-column", "column": "c", "index": 0})).unwrap();
        assert_eq!(p.column_names(), vec!["c", "a", "b"]);
        assert_eq!(p.row(0).unwrap().cells, vec![s("3"), s("1"), s("2")]);

        let err = apply(&mut p, json!({"type": "move-column", "column": "c", "index": 3})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_reorder_columns_drops_unlisted() {
        let mut p = project("a,b,c,d\n1,2,3,4\n");
        apply(&mut p, json!({"op": "core/column-reorder", "columnNames": ["d", "b"]})).unwrap();
        assert_eq!(p.column_names(), vec!["d", "b"]);
        assert_eq!(p.row(0).unwrap().cells, vec![s("4"), s("2")]);
    }

    #[test]
    fn test_split_column() {
        let mut p = project("id,tags\n1,a|b|c\n2,d\n3,\n");
        apply(&mut p, json!({"type": "split-column", "column": "tags", "separator": "|"})).unwrap();

        assert_eq!(p.column_names(), vec!["id", "tags 1", "tags 2", "tags 3"]);
        assert_eq!(column(&p, "tags 1"), vec![s("a"), s("d"), None]);
        assert_eq!(column(&p, "tags 3"), vec![s("c"), None, None]);
    }

    #[test]
    fn test_split_column_keep_original_with_limit() {
        let mut p = project("full\nAda Lovelace King\n");
        apply(
            &mut p,
            json!({
                "op": "core/column-split",
                "columnName": "full",
                "separator": "\\s+",
                "regex": true,
                "removeOriginalColumn": false,
                "maxColumns": 2
            }),
        )
        .unwrap();

        assert_eq!(p.column_names(), vec!["full", "full 1", "full 2"]);
        assert_eq!(p.row(0).unwrap().cells, vec![s("Ada Lovelace King"), s("Ada"), s("Lovelace King")]);
    }

    #[test]
    fn test_text_transform() {
        let mut p = project("code\n t-123 \n\n x\n");
        apply(
            &mut p,
            json!({
                "type": "text-transform",
                "column": "code",
                "operations": [{"type": "trim"}, {"type": "uppercase"}, {"type": "replace", "pattern": "X", "value": ""}]
            }),
        )
        .unwrap();

        assert_eq!(column(&p, "code"), vec![s("T-123"), None]);
    }

    #[test]
    fn test_text_transform_requires_something_to_do() {
        let mut p = project("code\n1\n");
        let err = apply(&mut p, json!({"type": "text-transform", "column": "code"})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));

        let err = apply(&mut p, json!({"type": "text-transform", "column": "code", "expression": "value.length()"}))
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_mass_edit() {
        let mut p = project("country,n\nItaly,1\nITA,2\n,3\nFrance,4\n");
        apply(
            &mut p,
            json!({
                "op": "core/mass-edit",
                "columnName": "country",
                "expression": "value",
                "edits": [
                    {"from": ["Italy", "ITA"], "fromBlank": false, "to": "IT"},
                    {"from": [], "fromBlank": true, "to": "??"}
                ]
            }),
        )
        .unwrap();

        assert_eq!(column(&p, "country"), vec![s("IT"), s("IT"), s("??"), s("France")]);
    }

    #[test]
    fn test_fill_down_and_blank_down() {
        let mut p = project("group,v\nA,1\n,2\nB,3\n,4\n");
        apply(&mut p, json!({"type": "fill-down", "column": "group"})).unwrap();
        assert_eq!(column(&p, "group"), vec![s("A"), s("A"), s("B"), s("B")]);

        apply(&mut p, json!({"op": "core/blank-down", "columnName": "group"})).unwrap();
        assert_eq!(column(&p, "group"), vec![s("A"), None, s("B"), None]);
    }

    #[test]
    fn test_remove_rows() {
        let mut p = project("name,email\nAlice,a@x.org\nBob,\nCarol,carol@y.com\n");
        apply(&mut p, json!({"type": "remove-rows", "column": "email", "blank": true})).unwrap();
        assert_eq!(column(&p, "name"), vec![s("Alice"), s("Carol")]);

        apply(&mut p, json!({"type": "remove-rows", "column": "email", "pattern": "\\.org$", "invert": true})).unwrap();
        assert_eq!(column(&p, "name"), vec![s("Alice")]);

        apply(&mut p, json!({"type": "remove-rows", "column": "name", "equals": "Alice"})).unwrap();
        assert_eq!(p.row_count(), 0);
    }

    #[test]
    fn test_remove_rows_needs_one_criterion() {
        let mut p = project("a\n1\n");
        let err = apply(&mut p, json!({"type": "remove-rows", "column": "a"})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));

        let err = apply(&mut p, json!({"type": "remove-rows", "column": "a", "blank": true, "equals": "1"})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_malformed_payload() {
        let mut p = project("a\n1\n");
        let err = apply(&mut p, json!({"type": "rename-column", "from": "a"})).unwrap_err();
        assert!(matches!(err, OperationError::MalformedDescriptor { .. }));
    }
}
