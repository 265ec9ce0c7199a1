//! SQL for the profile relation, per engine.
//!
//! The relation layout is shared by both engines and stays compatible with
//! existing `SimpleTags` tables: `uuid` is the only lookup/merge key and the
//! other three columns are nullable.

use crate::config::Engine;

pub const TABLE: &str = "SimpleTags";

/// Schema bootstrap; every statement is idempotent.
pub const PROFILE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS SimpleTags (
    uuid VARCHAR(255) NOT NULL PRIMARY KEY,
    name VARCHAR(255),
    tag VARCHAR(255),
    tagPrefix VARCHAR(255)
);
"#;

/// Statement text for every record operation on one engine.
#[derive(Debug)]
pub struct ProfileSql {
    pub select_one: &'static str,
    pub select_all: &'static str,
    /// Params: uuid, name. Touches `name` only.
    pub upsert_name: &'static str,
    /// Params: uuid, tag, tagPrefix. Touches `tag` and `tagPrefix` only.
    pub upsert_tag: &'static str,
    pub delete_one: &'static str,
    pub delete_all: &'static str,
}

const SELECT_ONE: &str = "SELECT uuid, name, tag, tagPrefix FROM SimpleTags WHERE uuid = ?";
const SELECT_ALL: &str = "SELECT uuid, name, tag, tagPrefix FROM SimpleTags";
const DELETE_ONE: &str = "DELETE FROM SimpleTags WHERE uuid = ?";
const DELETE_ALL: &str = "DELETE FROM SimpleTags";

pub static SQLITE_SQL: ProfileSql = ProfileSql {
    select_one: SELECT_ONE,
    select_all: SELECT_ALL,
    upsert_name: r#"
        INSERT INTO SimpleTags (uuid, name)
        VALUES (?, ?)
        ON CONFLICT(uuid) DO UPDATE SET
            name = excluded.name
    "#,
    upsert_tag: r#"
        INSERT INTO SimpleTags (uuid, tag, tagPrefix)
        VALUES (?, ?, ?)
        ON CONFLICT(uuid) DO UPDATE SET
            tag = excluded.tag,
            tagPrefix = excluded.tagPrefix
    "#,
    delete_one: DELETE_ONE,
    delete_all: DELETE_ALL,
};

pub static MYSQL_SQL: ProfileSql = ProfileSql {
    select_one: SELECT_ONE,
    select_all: SELECT_ALL,
    upsert_name: r#"
        INSERT INTO SimpleTags (uuid, name)
        VALUES (?, ?)
        ON DUPLICATE KEY UPDATE
            name = VALUES(name)
    "#,
    upsert_tag: r#"
        INSERT INTO SimpleTags (uuid, tag, tagPrefix)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE
            tag = VALUES(tag),
            tagPrefix = VALUES(tagPrefix)
    "#,
    delete_one: DELETE_ONE,
    delete_all: DELETE_ALL,
};

impl ProfileSql {
    pub fn for_engine(engine: Engine) -> &'static ProfileSql {
        match engine {
            Engine::Sqlite => &SQLITE_SQL,
            Engine::MySql => &MYSQL_SQL,
        }
    }
}

/// Splits [`PROFILE_INIT`] into individual statements.
pub(crate) fn init_statements() -> impl Iterator<Item = &'static str> {
    PROFILE_INIT
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
