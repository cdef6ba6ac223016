//! MySQL statements built from a record's column manifest
//!
//! Column types come from each leaf's `TYPE` attribute and primary keys from
//! `PK:"yes"`. Nothing here touches a database; the statements are text for
//! a loader to run against the rows the encoder writes.

use crate::error::Result;
use crate::flatten::{flatten, Expander};
use crate::record::Record;
use crate::types::{FlattenConfig, Manifest};

/// Column type used when a leaf carries no `TYPE` attribute
pub const DEFAULT_COLUMN_TYPE: &str = "TEXT";

/// Statement generator for one table
#[derive(Debug, Clone)]
pub struct SqlCmd {
    pub tag_key: String,
    pub expand_paths: Vec<String>,
    pub db: String,
    pub engine: String,
    pub table: String,
}

impl SqlCmd {
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        SqlCmd {
            tag_key: FlattenConfig::default().tag_key,
            expand_paths: vec![],
            db: db.into(),
            engine: String::from("InnoDB"),
            table: table.into(),
        }
    }

    pub fn full_table_name(&self) -> String {
        if self.db.is_empty() {
            return self.table.clone();
        }
        format!("{}.{}", self.db, self.table)
    }

    pub fn create_db(&self) -> String {
        format!(
            "CREATE DATABASE IF NOT EXISTS {} DEFAULT CHARACTER SET utf8;\n",
            self.db
        )
    }

    pub fn create_table<R: Record + ?Sized>(&self, record: &R) -> Result<String> {
        let manifest = self.fields(record)?;
        Ok(create_table_statement(
            &self.full_table_name(),
            &self.engine,
            &manifest,
        ))
    }

    pub fn load_data<R: Record + ?Sized>(&self, record: &R) -> Result<String> {
        let manifest = self.fields(record)?;
        Ok(load_data_statement(&self.full_table_name(), &manifest))
    }

    /// Columns of `record` under this command's tag key and expansion paths
    pub fn fields<R: Record + ?Sized>(&self, record: &R) -> Result<Manifest> {
        let config = FlattenConfig::default()
            .with_tag_key(self.tag_key.as_str())
            .with_expand_paths(self.expand_paths.iter().map(String::as_str));

        if config.expand_paths.is_empty() {
            return Ok(flatten(record, &config).manifest());
        }
        Expander::new(&config)?.expand(record, |_| Ok(()))
    }
}

pub fn create_table_statement(table: &str, engine: &str, manifest: &Manifest) -> String {
    let mut lines: Vec<String> = manifest
        .primary_key_ordered()
        .into_iter()
        .map(|column| {
            let sql_type = match column.tag.sql_type() {
                "" => DEFAULT_COLUMN_TYPE,
                t => t,
            };
            format!("\t{} {}", column.name, sql_type)
        })
        .collect();

    let primary_keys = manifest.primary_keys();
    if !primary_keys.is_empty() {
        lines.push(format!("\tPRIMARY KEY ({})", primary_keys.join(",")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE={} DEFAULT CHARSET=UTF8;\n",
        table,
        lines.join(",\n"),
        engine
    )
}

pub fn load_data_statement(table: &str, manifest: &Manifest) -> String {
    format!(
        "LOAD DATA LOCAL INFILE 'Reader::{0}' REPLACE INTO TABLE {0} CHARACTER SET UTF8 ({1});\n",
        table,
        manifest.names().join(", ")
    )
}
