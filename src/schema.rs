//! Schema registry: the single source of truth for the current target shape
//!
//! Pure and side-effect-free. Every migration step must converge the physical
//! schema toward exactly these definitions; the equality is enforced by the
//! consistency verifier, not by construction.

/// Schema version the step catalogue converges to.
pub const TARGET_SCHEMA_VERSION: i64 = 9;

/// Identity of the reserved fallback category. The row can never be
/// hard-deleted; records whose category is removed are reassigned to it.
pub const RESERVED_CATEGORY_ID: &str = "uncategorized";

/// Canonical display name of the reserved category. Historical installs
/// carried legacy names ("Misc", "General"); migration steps repair them.
pub const RESERVED_CATEGORY_NAME: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
    pub primary_key: bool,
    /// SQL literal, e.g. `"'[]'"` or `"0"`
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            not_null: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_sql(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

fn column_sql(col: &ColumnDef) -> String {
    let mut sql = format!("{} {}", col.name, col.ty.sql());
    if col.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if col.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    sql
}

fn create_sql(def: &TableDef, name: &str, if_not_exists: bool) -> String {
    let columns: Vec<String> = def.columns.iter().map(column_sql).collect();
    format!(
        "CREATE TABLE {}{} (\n  {}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        name,
        columns.join(",\n  ")
    )
}

/// DDL for one table (guarded, idempotent).
pub fn create_table_sql(def: &TableDef) -> String {
    create_sql(def, def.name, true)
}

/// DDL for one table under a different physical name (shadow-table rebuilds).
/// Not guarded: a leftover shadow must be dropped explicitly first.
pub fn create_table_sql_as(def: &TableDef, name: &str) -> String {
    create_sql(def, name, false)
}

/// DDL for one index (guarded, idempotent).
pub fn index_sql(idx: &IndexDef) -> String {
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
        if idx.unique { "UNIQUE " } else { "" },
        idx.name,
        idx.table,
        idx.columns.join(", ")
    )
}

/// DDL for the full current schema: tables first, then the indexes that
/// reference them. Every statement is guarded, so re-applying is a no-op.
pub fn full_schema_sql() -> String {
    let mut sql = String::new();
    for table in registry_tables() {
        sql.push_str(&create_table_sql(&table));
        sql.push_str(";\n");
    }
    for idx in registry_indexes() {
        sql.push_str(&index_sql(&idx));
        sql.push_str(";\n");
    }
    sql
}

/// Current shape of the primary content table.
pub fn transactions_table() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "transactions",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("amount", Text).not_null(),
            ColumnDef::new("occurred_at", Integer).not_null(),
            ColumnDef::new("category_id", Text).not_null(),
            ColumnDef::new("category_name", Text).not_null(),
            ColumnDef::new("created_at", Integer).not_null(),
            ColumnDef::new("note", Text),
            ColumnDef::new("splits", Text).not_null().default_sql("'[]'"),
        ],
    }
}

/// Current shape of the category reference table.
pub fn categories_table() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "categories",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("name", Text).not_null(),
            ColumnDef::new("icon", Text),
            ColumnDef::new("color", Text),
            ColumnDef::new("is_reserved", Integer).not_null().default_sql("0"),
            ColumnDef::new("created_at", Integer).not_null(),
            ColumnDef::new("sort_order", Integer).not_null().default_sql("0"),
        ],
    }
}

/// Current shape of the budget table.
pub fn budgets_table() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "budgets",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("category_id", Text).not_null(),
            ColumnDef::new("month", Text).not_null(),
            ColumnDef::new("amount", Text).not_null(),
            ColumnDef::new("created_at", Integer).not_null(),
        ],
    }
}

/// All current tables, in creation order.
pub fn registry_tables() -> Vec<TableDef> {
    vec![transactions_table(), categories_table(), budgets_table()]
}

/// All current indexes. Emitted after the tables they reference.
pub fn registry_indexes() -> Vec<IndexDef> {
    vec![
        IndexDef {
            name: "idx_transactions_occurred",
            table: "transactions",
            columns: &["occurred_at"],
            unique: false,
        },
        IndexDef {
            name: "idx_transactions_category",
            table: "transactions",
            columns: &["category_id"],
            unique: false,
        },
        IndexDef {
            name: "idx_categories_sort",
            table: "categories",
            columns: &["sort_order"],
            unique: false,
        },
        IndexDef {
            name: "ux_budgets_category_month",
            table: "budgets",
            columns: &["category_id", "month"],
            unique: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_shape() {
        let sql = create_table_sql(&transactions_table());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS transactions"));
        assert!(sql.contains("id TEXT PRIMARY KEY"));
        assert!(sql.contains("splits TEXT NOT NULL DEFAULT '[]'"));
    }

    #[test]
    fn test_shadow_sql_is_unguarded() {
        let sql = create_table_sql_as(&categories_table(), "categories_new");
        assert!(sql.starts_with("CREATE TABLE categories_new"));
        assert!(!sql.contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_unique_index_sql() {
        let indexes = registry_indexes();
        let ux = indexes
            .iter()
            .find(|i| i.name == "ux_budgets_category_month")
            .unwrap();
        assert!(index_sql(ux).starts_with("CREATE UNIQUE INDEX IF NOT EXISTS"));
    }

    #[test]
    fn test_full_schema_orders_tables_before_indexes() {
        let sql = full_schema_sql();
        let last_table = sql.rfind("CREATE TABLE").unwrap();
        let first_index = sql.find("INDEX IF NOT EXISTS").unwrap();
        assert!(last_table < first_index);
    }

    #[test]
    fn test_every_index_references_a_registry_table() {
        let tables: Vec<&str> = registry_tables().iter().map(|t| t.name).collect();
        for idx in registry_indexes() {
            assert!(tables.contains(&idx.table), "index {} is orphaned", idx.name);
        }
    }
}
