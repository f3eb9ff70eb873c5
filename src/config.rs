//! 配置模块，负责加载JSON格式的表与spec定义
//!
//! ```json
//! {
//!   "tables": [
//!     { "table": "User", "fields": [{ "name": "Id", "type": "number" }, { "name": "Type" }] },
//!     { "table": "Account", "id": "Id",
//!       "fields": [{ "name": "Id", "type": "number" }, { "name": "OwnerId", "type": "number" }],
//!       "parents": [{ "name": "Owner", "table": "User" }] }
//!   ],
//!   "specs": [{ "name": "isManager", "table": "User", "spec": "User.Type = 'Manager'" }]
//! }
//! ```
//!
//! 省略时的默认值：表的 `id` 为 `Id`，字段 `type` 为 `string`，
//! 父关系的 `table` 为其名称，`id` 为 `<name>Id`。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{Field, FieldType, Parent, Schema, Table};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub specs: Vec<SpecConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(rename = "table")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub parents: Vec<ParentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecConfig {
    pub name: String,
    pub table: String,
    pub spec: String,
}

impl SchemaConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            tables = config.tables.len(),
            specs = config.specs.len(),
            "loaded schema config"
        );
        Ok(config)
    }

    /// 构建并校验schema，同时解析所有spec
    pub fn into_schema(self) -> crate::Result<Schema> {
        let tables = self
            .tables
            .into_iter()
            .map(TableConfig::into_table)
            .collect::<Result<Vec<_>, _>>()?;

        let mut schema = Schema::new(tables)?;
        for spec in self.specs {
            schema.add_spec(spec.name, spec.table, spec.spec)?;
        }
        debug!(
            tables = schema.tables().len(),
            specs = schema.specs().len(),
            "schema built"
        );
        Ok(schema)
    }
}

impl TableConfig {
    fn into_table(self) -> Result<Table, crate::schema::SchemaError> {
        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                let field_type = f
                    .field_type
                    .as_deref()
                    .map_or(FieldType::String, FieldType::from_name);
                Field::new(f.name, field_type)
            })
            .collect();

        let parents = self
            .parents
            .into_iter()
            .map(|p| {
                let table = p.table.unwrap_or_else(|| p.name.clone());
                let id = p.id.unwrap_or_else(|| format!("{}Id", p.name));
                Parent::new(p.name, table, id)
            })
            .collect();

        Table::new(
            self.name,
            self.id.unwrap_or_else(|| "Id".to_string()),
            fields,
            parents,
        )
    }
}
