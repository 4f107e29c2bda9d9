//! SQL dialect: statement AST and parser.
//!
//! The engine understands a restricted, case-insensitive dialect:
//!
//! ```text
//! CREATE TABLE <name> ( <col_def> , ... ) [ FROM FILE "<path>" ] [ USING INDEX <type> ]
//! col_def  := <name> <type>[\[<n>\]] [ KEY | PRIMARY KEY ] [ INDEX <idx_type> ]
//! type     := INT | FLOAT | VARCHAR | DATE | ARRAY
//! idx_type := hash | btree | avl | isam | rtree | seq
//!
//! INSERT INTO <name> [( <col> , ... )] VALUES ( <v> , ... ) [, ( <v> , ... )]
//! DELETE FROM <name> [ WHERE <cond> ]
//! SELECT (* | <col> , ...) FROM <name> [ WHERE <cond> ]
//!
//! <cond> := <col> = <v>
//!         | <col> BETWEEN <v> AND <v>
//!         | <col> IN ( ARRAY[<f>,<f>] , <radius> )
//! ```
//!
//! Literals: integers, floats (with `.`), `"strings"` or `'strings'`, and
//! `ARRAY[x, y]` points. Parsing never mutates engine state; a malformed
//! statement surfaces as a structured [`SqlError`].

#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{Column, DataType, Value};

// ------------------------------------------------------------------------------------------------
// Index kinds
// ------------------------------------------------------------------------------------------------

/// The index families a column can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Disk-resident AVL file.
    Avl,
    /// B+ tree (clustered for primary keys, unclustered otherwise).
    BTree,
    /// Extendible hash.
    Hash,
    /// Two-level ISAM.
    Isam,
    /// Spatial R-tree.
    RTree,
    /// No structure — sequential heap scan.
    Seq,
}

impl IndexKind {
    fn parse(text: &str) -> Option<IndexKind> {
        match text.to_ascii_lowercase().as_str() {
            "avl" => Some(IndexKind::Avl),
            "btree" => Some(IndexKind::BTree),
            "hash" => Some(IndexKind::Hash),
            "isam" => Some(IndexKind::Isam),
            "rtree" => Some(IndexKind::RTree),
            "seq" => Some(IndexKind::Seq),
            _ => None,
        }
    }

    /// Lowercase name as it appears in catalog documents and plans.
    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Avl => "avl",
            IndexKind::BTree => "btree",
            IndexKind::Hash => "hash",
            IndexKind::Isam => "isam",
            IndexKind::RTree => "rtree",
            IndexKind::Seq => "seq",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ------------------------------------------------------------------------------------------------
// AST
// ------------------------------------------------------------------------------------------------

/// `CREATE TABLE`.
#[derive(Debug, Clone)]
pub struct CreateTableStatement {
    /// Table name.
    pub table_name: String,
    /// Parsed column definitions, in declaration order.
    pub columns: Vec<Column>,
    /// The primary key column's name.
    pub primary_key: String,
    /// Index backing the primary key.
    pub primary_index_type: IndexKind,
    /// `FROM FILE "<path>"` — bulk-load source, if any.
    pub from_file: Option<String>,
    /// `USING INDEX <type>` — fallback primary index when the key column
    /// declares none.
    pub using_index: Option<IndexKind>,
}

/// `INSERT INTO`.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    /// Target table.
    pub table_name: String,
    /// Named column list, when present.
    pub columns: Option<Vec<String>>,
    /// One literal list per row.
    pub values: Vec<Vec<Value>>,
}

/// `DELETE FROM`.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    /// Target table.
    pub table_name: String,
    /// The WHERE clause, if any.
    pub condition: Option<Condition>,
}

/// `SELECT`.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    /// Projected columns; `["*"]` selects everything.
    pub columns: Vec<String>,
    /// Source table.
    pub table_name: String,
    /// The WHERE clause, if any.
    pub condition: Option<Condition>,
}

/// A WHERE predicate.
#[derive(Debug, Clone)]
pub enum Condition {
    /// `<col> = <v>`.
    Equal {
        /// Predicate column.
        column: String,
        /// Comparison literal.
        value: Value,
    },
    /// `<col> BETWEEN <lo> AND <hi>` (inclusive).
    Between {
        /// Predicate column.
        column: String,
        /// Lower bound.
        low: Value,
        /// Upper bound.
        high: Value,
    },
    /// `<col> IN ( ARRAY[x,y] , radius )` — Euclidean radius search.
    Spatial {
        /// Predicate column.
        column: String,
        /// Query point.
        point: (f32, f32),
        /// Search radius.
        radius: f32,
    },
}

impl Condition {
    /// The column the predicate applies to.
    pub fn column(&self) -> &str {
        match self {
            Condition::Equal { column, .. }
            | Condition::Between { column, .. }
            | Condition::Spatial { column, .. } => column,
        }
    }
}

/// A parsed statement.
#[derive(Debug, Clone)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable(CreateTableStatement),
    /// `INSERT INTO`.
    Insert(InsertStatement),
    /// `DELETE FROM`.
    Delete(DeleteStatement),
    /// `SELECT`.
    Select(SelectStatement),
}

impl Statement {
    /// The table this statement targets.
    pub fn table_name(&self) -> &str {
        match self {
            Statement::CreateTable(s) => &s.table_name,
            Statement::Insert(s) => &s.table_name,
            Statement::Delete(s) => &s.table_name,
            Statement::Select(s) => &s.table_name,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Parse errors. The statement is rejected; no engine state changes.
#[derive(Debug, Error)]
pub enum SqlError {
    /// The statement kind is not part of the dialect.
    #[error("unsupported statement: {0}")]
    Unsupported(String),

    /// The token stream ended early.
    #[error("unexpected end of statement (expected {0})")]
    UnexpectedEnd(String),

    /// A token did not match the grammar.
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken {
        /// What the grammar wanted.
        expected: String,
        /// What the tokenizer produced.
        found: String,
    },

    /// A literal could not be interpreted.
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// A column definition violates the grammar or a schema rule.
    #[error("invalid column definition: {0}")]
    InvalidColumnDef(String),

    /// A character the tokenizer does not understand.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
}

// ------------------------------------------------------------------------------------------------
// Tokenizer
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Star,
    Eq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s}"),
            Token::Number(s) => write!(f, "{s}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
            Token::Star => f.write_str("*"),
            Token::Eq => f.write_str("="),
        }
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, SqlError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(SqlError::UnexpectedEnd("closing quote".into()));
                }
                tokens.push(Token::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            '-' | '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text == "-" || text == "." {
                    return Err(SqlError::UnexpectedChar(c));
                }
                tokens.push(Token::Number(text));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(SqlError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

// ------------------------------------------------------------------------------------------------
// Parser
// ------------------------------------------------------------------------------------------------

/// Parse one SQL statement.
pub fn parse(sql: &str) -> Result<Statement, SqlError> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.parse_statement()?;
    if let Some(extra) = parser.peek() {
        return Err(SqlError::UnexpectedToken {
            expected: "end of statement".into(),
            found: extra.to_string(),
        });
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self, expected: &str) -> Result<Token, SqlError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| SqlError::UnexpectedEnd(expected.into()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, token: &Token) -> Result<(), SqlError> {
        let found = self.next(&token.to_string())?;
        if &found == token {
            Ok(())
        } else {
            Err(SqlError::UnexpectedToken {
                expected: token.to_string(),
                found: found.to_string(),
            })
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SqlError> {
        match self.next(keyword)? {
            Token::Ident(word) if word.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(SqlError::UnexpectedToken {
                expected: keyword.into(),
                found: other.to_string(),
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, SqlError> {
        match self.next(what)? {
            Token::Ident(name) => Ok(name),
            other => Err(SqlError::UnexpectedToken {
                expected: what.into(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, SqlError> {
        match self.peek() {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("create") => {
                self.parse_create().map(Statement::CreateTable)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("insert") => {
                self.parse_insert().map(Statement::Insert)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("delete") => {
                self.parse_delete().map(Statement::Delete)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("select") => {
                self.parse_select().map(Statement::Select)
            }
            Some(other) => Err(SqlError::Unsupported(other.to_string())),
            None => Err(SqlError::UnexpectedEnd("statement".into())),
        }
    }

    // -- CREATE TABLE ----------------------------------------------------

    fn parse_create(&mut self) -> Result<CreateTableStatement, SqlError> {
        self.expect_keyword("create")?;
        self.expect_keyword("table")?;
        let table_name = self.ident("table name")?;
        self.expect(&Token::LParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            match self.next(") or ,")? {
                Token::Comma => continue,
                Token::RParen => break,
                other => {
                    return Err(SqlError::UnexpectedToken {
                        expected: ") or ,".into(),
                        found: other.to_string(),
                    });
                }
            }
        }

        let mut from_file = None;
        if self.take_keyword("from") {
            self.expect_keyword("file")?;
            match self.next("file path")? {
                Token::Str(path) => from_file = Some(path),
                other => {
                    return Err(SqlError::UnexpectedToken {
                        expected: "quoted file path".into(),
                        found: other.to_string(),
                    });
                }
            }
        }

        let mut using_index = None;
        if self.take_keyword("using") {
            self.expect_keyword("index")?;
            let kind = self.ident("index type")?;
            using_index = Some(IndexKind::parse(&kind).ok_or_else(|| {
                SqlError::InvalidColumnDef(format!("unknown index type '{kind}'"))
            })?);
        }

        let primary: Vec<&Column> = columns.iter().filter(|c| c.is_primary_key).collect();
        let primary_key = match primary.as_slice() {
            [] => {
                return Err(SqlError::InvalidColumnDef(
                    "a PRIMARY KEY column is required".into(),
                ));
            }
            [one] => one.name.clone(),
            _ => {
                return Err(SqlError::InvalidColumnDef(
                    "only one PRIMARY KEY column is allowed".into(),
                ));
            }
        };
        let primary_index_type = primary[0]
            .index_type
            .or(using_index)
            .unwrap_or(IndexKind::BTree);

        Ok(CreateTableStatement {
            table_name,
            columns,
            primary_key,
            primary_index_type,
            from_file,
            using_index,
        })
    }

    fn parse_column_def(&mut self) -> Result<Column, SqlError> {
        let name = self.ident("column name")?;
        let type_word = self.ident("column type")?;

        let data_type = match type_word.to_ascii_uppercase().as_str() {
            "INT" => DataType::Int,
            "FLOAT" => DataType::Float,
            "VARCHAR" => DataType::Varchar,
            "DATE" => DataType::Date,
            "ARRAY" => DataType::ArrayFloat,
            other => {
                return Err(SqlError::InvalidColumnDef(format!(
                    "unknown type '{other}' for column '{name}'"
                )));
            }
        };

        let mut size = None;
        if matches!(self.peek(), Some(Token::LBracket)) {
            self.expect(&Token::LBracket)?;
            match self.next("size")? {
                Token::Number(text) => {
                    size = Some(text.parse::<usize>().map_err(|_| {
                        SqlError::InvalidColumnDef(format!("bad size '{text}' for '{name}'"))
                    })?);
                }
                other => {
                    return Err(SqlError::UnexpectedToken {
                        expected: "size".into(),
                        found: other.to_string(),
                    });
                }
            }
            self.expect(&Token::RBracket)?;
        }
        if data_type == DataType::Varchar && size.is_none() {
            return Err(SqlError::InvalidColumnDef(format!(
                "VARCHAR column '{name}' requires a size"
            )));
        }

        let mut is_primary_key = false;
        if self.take_keyword("primary") {
            self.expect_keyword("key")?;
            is_primary_key = true;
        } else if self.take_keyword("key") {
            is_primary_key = true;
        }

        let mut index_type = None;
        if self.take_keyword("index") {
            let kind = self.ident("index type")?;
            index_type = Some(IndexKind::parse(&kind).ok_or_else(|| {
                SqlError::InvalidColumnDef(format!("unknown index type '{kind}'"))
            })?);
        }

        let column = Column {
            name,
            data_type,
            size,
            is_primary_key,
            has_index: index_type.is_some() || is_primary_key,
            index_type,
        };
        column
            .validate()
            .map_err(|e| SqlError::InvalidColumnDef(e.to_string()))?;
        Ok(column)
    }

    // -- INSERT ----------------------------------------------------------

    fn parse_insert(&mut self) -> Result<InsertStatement, SqlError> {
        self.expect_keyword("insert")?;
        self.expect_keyword("into")?;
        let table_name = self.ident("table name")?;

        let mut columns = None;
        if matches!(self.peek(), Some(Token::LParen)) {
            // Look ahead: a VALUES keyword inside parens never happens, so
            // a paren here is the named-column form.
            self.expect(&Token::LParen)?;
            let mut names = Vec::new();
            loop {
                names.push(self.ident("column name")?);
                match self.next(") or ,")? {
                    Token::Comma => continue,
                    Token::RParen => break,
                    other => {
                        return Err(SqlError::UnexpectedToken {
                            expected: ") or ,".into(),
                            found: other.to_string(),
                        });
                    }
                }
            }
            columns = Some(names);
        }

        self.expect_keyword("values")?;
        let mut values = Vec::new();
        loop {
            self.expect(&Token::LParen)?;
            let mut row = Vec::new();
            loop {
                row.push(self.parse_literal()?);
                match self.next(") or ,")? {
                    Token::Comma => continue,
                    Token::RParen => break,
                    other => {
                        return Err(SqlError::UnexpectedToken {
                            expected: ") or ,".into(),
                            found: other.to_string(),
                        });
                    }
                }
            }
            values.push(row);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                continue;
            }
            break;
        }

        Ok(InsertStatement {
            table_name,
            columns,
            values,
        })
    }

    // -- DELETE / SELECT -------------------------------------------------

    fn parse_delete(&mut self) -> Result<DeleteStatement, SqlError> {
        self.expect_keyword("delete")?;
        self.expect_keyword("from")?;
        let table_name = self.ident("table name")?;
        let condition = self.parse_optional_where()?;
        Ok(DeleteStatement {
            table_name,
            condition,
        })
    }

    fn parse_select(&mut self) -> Result<SelectStatement, SqlError> {
        self.expect_keyword("select")?;

        let mut columns = Vec::new();
        if matches!(self.peek(), Some(Token::Star)) {
            self.pos += 1;
            columns.push("*".to_string());
        } else {
            loop {
                columns.push(self.ident("column name")?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }

        self.expect_keyword("from")?;
        let table_name = self.ident("table name")?;
        let condition = self.parse_optional_where()?;
        Ok(SelectStatement {
            columns,
            table_name,
            condition,
        })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Condition>, SqlError> {
        if !self.take_keyword("where") {
            return Ok(None);
        }
        let column = self.ident("condition column")?;

        if matches!(self.peek(), Some(Token::Eq)) {
            self.pos += 1;
            let value = self.parse_literal()?;
            return Ok(Some(Condition::Equal { column, value }));
        }
        if self.take_keyword("between") {
            let low = self.parse_literal()?;
            self.expect_keyword("and")?;
            let high = self.parse_literal()?;
            return Ok(Some(Condition::Between { column, low, high }));
        }
        if self.take_keyword("in") {
            self.expect(&Token::LParen)?;
            let point = match self.parse_literal()? {
                Value::Point(x, y) => (x, y),
                other => {
                    return Err(SqlError::InvalidLiteral(format!(
                        "spatial condition needs an ARRAY[x,y] point, got '{other}'"
                    )));
                }
            };
            self.expect(&Token::Comma)?;
            let radius = match self.parse_literal()? {
                Value::Float(r) => r,
                Value::Int(r) => r as f32,
                other => {
                    return Err(SqlError::InvalidLiteral(format!(
                        "spatial condition needs a numeric radius, got '{other}'"
                    )));
                }
            };
            self.expect(&Token::RParen)?;
            return Ok(Some(Condition::Spatial {
                column,
                point,
                radius,
            }));
        }

        Err(SqlError::Unsupported(format!(
            "WHERE operator on column '{column}'"
        )))
    }

    // -- Literals --------------------------------------------------------

    fn parse_literal(&mut self) -> Result<Value, SqlError> {
        match self.next("literal")? {
            Token::Number(text) => parse_number(&text),
            Token::Str(text) => Ok(Value::Str(text)),
            Token::Ident(word) if word.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Token::Ident(word) if word.eq_ignore_ascii_case("array") => {
                self.expect(&Token::LBracket)?;
                let x = match self.next("number")? {
                    Token::Number(text) => parse_f32(&text)?,
                    other => {
                        return Err(SqlError::InvalidLiteral(other.to_string()));
                    }
                };
                self.expect(&Token::Comma)?;
                let y = match self.next("number")? {
                    Token::Number(text) => parse_f32(&text)?,
                    other => {
                        return Err(SqlError::InvalidLiteral(other.to_string()));
                    }
                };
                self.expect(&Token::RBracket)?;
                Ok(Value::Point(x, y))
            }
            other => Err(SqlError::InvalidLiteral(other.to_string())),
        }
    }
}

fn parse_number(text: &str) -> Result<Value, SqlError> {
    if text.contains('.') {
        parse_f32(text).map(Value::Float)
    } else {
        text.parse::<i32>()
            .map(Value::Int)
            .map_err(|_| SqlError::InvalidLiteral(text.to_string()))
    }
}

fn parse_f32(text: &str) -> Result<f32, SqlError> {
    text.parse::<f32>()
        .map_err(|_| SqlError::InvalidLiteral(text.to_string()))
}
