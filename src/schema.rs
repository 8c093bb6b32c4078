//! Schema utilities: DDL generation and validation
//!
//! DDL cannot carry bound parameters, so column definitions are built as
//! expressions and rendered through the standalone inliner.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::datatype::SqlType;
use crate::expr::{quote_identifier, Collation, Expressible, Expression};
use crate::value::{Type, Value};

/// Regex for detecting SQL function calls like datetime('now'), strftime('%s', 'now')
static SQL_FUNCTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\s*\(").expect("function call pattern is valid")
});

/// Regex for detecting SQL expressions (starts with parenthesis)
static SQL_EXPRESSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(").expect("parenthesis pattern is valid"));

/// Known SQL keywords that should not be quoted in DEFAULT clauses
const SQL_KEYWORDS: [&str; 6] = [
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "NULL",
    "TRUE",
    "FALSE",
];

/// What kind of SQL expression a DEFAULT value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Parenthesized,
    FunctionCall,
    Keyword,
}

/// Classify a value as an SQL expression that must not be quoted
pub fn check_sql_expression(value: &str) -> Option<ExpressionKind> {
    let trimmed = value.trim();

    if SQL_EXPRESSION_REGEX.is_match(trimmed) {
        return Some(ExpressionKind::Parenthesized);
    }

    if SQL_FUNCTION_REGEX.is_match(trimmed) {
        return Some(ExpressionKind::FunctionCall);
    }

    let upper = trimmed.to_uppercase();
    if SQL_KEYWORDS.iter().any(|keyword| upper == *keyword) {
        return Some(ExpressionKind::Keyword);
    }

    None
}

/// Check if a value is an SQL expression that should not be quoted
///
/// # Examples
/// ```rust
/// use sqlite_typed::schema::is_sql_expression;
///
/// assert!(is_sql_expression("datetime('now')"));
/// assert!(is_sql_expression("CURRENT_TIMESTAMP"));
/// assert!(is_sql_expression("(strftime('%s', 'now'))"));
/// assert!(!is_sql_expression("hello world"));
/// ```
pub fn is_sql_expression(value: &str) -> bool {
    check_sql_expression(value).is_some()
}

/// One column of a CREATE TABLE statement.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    name: String,
    declared_type: Type,
    primary_key: bool,
    autoincrement: bool,
    not_null: bool,
    unique: bool,
    default: Option<Expression>,
    default_is_expression: bool,
    check: Option<Expression>,
    collation: Option<Collation>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, declared_type: Type) -> Self {
        ColumnDefinition {
            name: name.into(),
            declared_type,
            primary_key: false,
            autoincrement: false,
            not_null: false,
            unique: false,
            default: None,
            default_is_expression: false,
            check: None,
            collation: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Type {
        self.declared_type
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// A literal default, inlined with quoting.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value: Value = value.into();
        self.default = Some(Expression::from_parts("?".to_string(), vec![value]));
        self.default_is_expression = false;
        self
    }

    /// A default computed by SQL, e.g. `CURRENT_TIMESTAMP` or
    /// `datetime('now')`. Function calls are parenthesized as SQLite requires.
    pub fn default_expression(mut self, sql: &str) -> Self {
        let sql = sql.trim();
        let expr = match check_sql_expression(sql) {
            Some(ExpressionKind::FunctionCall) => format!("({sql})"),
            _ => sql.to_string(),
        };
        self.default = Some(Expression::literal(expr));
        self.default_is_expression = true;
        self
    }

    pub fn check<T: SqlType<Base = bool>>(mut self, condition: Expression<T>) -> Self {
        self.check = Some(condition.untyped());
        self
    }

    pub fn collate(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }
}

impl Expressible for ColumnDefinition {
    fn expression(&self) -> Expression {
        let mut parts: Vec<Expression> = vec![
            Expression::column(&self.name),
            Expression::literal(self.declared_type.as_str()),
        ];
        if self.primary_key {
            parts.push(Expression::literal("PRIMARY KEY"));
        }
        if self.autoincrement {
            parts.push(Expression::literal("AUTOINCREMENT"));
        }
        if self.not_null {
            parts.push(Expression::literal("NOT NULL"));
        }
        if self.unique {
            parts.push(Expression::literal("UNIQUE"));
        }
        if let Some(default) = &self.default {
            parts.push(Expression::literal("DEFAULT"));
            parts.push(default.clone());
        }
        if let Some(check) = &self.check {
            let (template, bindings) = check.clone().into_parts();
            parts.push(Expression::from_parts(format!("CHECK ({template})"), bindings));
        }
        if let Some(collation) = &self.collation {
            parts.push(Expression::literal(format!("COLLATE {}", collation.name())));
        }
        crate::expr::join(" ", parts)
    }
}

/// Render a CREATE TABLE statement.
pub fn create_table(name: &str, columns: &[ColumnDefinition], if_not_exists: bool) -> String {
    let columns: Expression =
        crate::expr::join(", ", columns.iter().map(ColumnDefinition::expression));
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let ddl: Expression = Expression::from_parts(
        format!("CREATE TABLE {guard}{} ({})", quote_identifier(name), columns.template()),
        columns.bindings().to_vec(),
    );
    ddl.compile_standalone()
}

/// Validation outcome for a column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValidation {
    /// Whether the column definition is valid
    pub valid: bool,
    /// List of warnings or errors
    pub issues: Vec<String>,
}

/// Validate a column definition
pub fn validate_column_definition(column: &ColumnDefinition) -> ColumnValidation {
    let mut issues = Vec::new();

    if column.name.is_empty() {
        issues.push("Column name cannot be empty".to_string());
    }

    if column.name.contains(' ') {
        issues.push("Column name should not contain spaces".to_string());
    }

    if column.declared_type == Type::Null {
        issues.push("NULL is not a valid declared column type".to_string());
    }

    // AUTOINCREMENT only works with INTEGER PRIMARY KEY
    if column.autoincrement && !column.primary_key {
        issues.push("AUTOINCREMENT can only be used on PRIMARY KEY columns".to_string());
    }
    if column.autoincrement && column.declared_type != Type::Integer {
        issues.push(format!(
            "AUTOINCREMENT only works with INTEGER type, not {}",
            column.declared_type
        ));
    }

    if column.default_is_expression && column.declared_type != Type::Text {
        if let Some(default) = &column.default {
            issues.push(format!(
                "Expression default for {} type column: {}",
                column.declared_type,
                default.template()
            ));
        }
    }

    if column.not_null {
        if let Some(default) = &column.default {
            if matches!(default.bindings(), [Value::Null]) {
                issues.push("NOT NULL column has a NULL default".to_string());
            }
        }
    }

    ColumnValidation {
        valid: issues.is_empty(),
        issues,
    }
}

/// Schema validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidation {
    /// Whether the schema is valid
    pub valid: bool,
    /// List of issues found
    pub issues: Vec<String>,
    /// List of warnings
    pub warnings: Vec<String>,
}

/// Validate a CREATE TABLE SQL statement
pub fn validate_create_table(sql: &str) -> SchemaValidation {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let sql_lower = sql.to_lowercase();

    let Some(pos) = sql_lower.find("create table") else {
        issues.push("SQL does not appear to be a CREATE TABLE statement".to_string());
        return SchemaValidation {
            valid: false,
            issues,
            warnings,
        };
    };

    if sql_lower[pos + "create table".len()..].trim().is_empty() {
        issues.push("Missing table name".to_string());
    }

    if !sql_lower.contains("primary key") {
        warnings.push("Table has no PRIMARY KEY defined".to_string());
    }

    let has_foreign_key = sql_lower.contains("foreign key") || sql_lower.contains("references");
    if has_foreign_key && !sql_lower.contains("on delete") {
        warnings.push("FOREIGN KEY defined without ON DELETE clause".to_string());
    }

    if sql_lower.contains("autoincrement") && !sql_lower.contains("integer") {
        issues.push("AUTOINCREMENT used but column type is not INTEGER".to_string());
    }

    SchemaValidation {
        valid: issues.is_empty(),
        issues,
        warnings,
    }
}
