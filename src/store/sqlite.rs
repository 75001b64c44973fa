use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, RillError};
use crate::domain::{Group, Item, Source, SourceRule};
use crate::service::ServiceConfig;
use crate::store::{DateBoundary, LocalFlags, SettingsStore, Store};

const SOURCE_COLUMNS: &str = "id, url, name, service_ref, group_id, rules, created_at";
const ITEM_COLUMNS: &str = "id, source_id, title, link, date, fetched_at, content, snippet, author, \
     thumbnail, is_read, is_starred, is_hidden, notify, service_ref";
const SERVICE_CONFIG_KEY: &str = "service";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| RillError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            RillError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Fixed-width UTC timestamps so text comparison orders them correctly.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Ok(row
            .get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_else(Utc::now))
    }

    fn row_to_source(row: &Row) -> rusqlite::Result<Source> {
        let rules: String = row.get(5)?;
        let rules: Vec<SourceRule> = serde_json::from_str(&rules)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(Source {
            id: row.get(0)?,
            url: row.get(1)?,
            name: row.get(2)?,
            service_ref: row.get(3)?,
            group_id: row.get(4)?,
            rules,
            created_at: Self::row_datetime(row, 6)?,
        })
    }

    fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            source_id: row.get(1)?,
            title: row.get(2)?,
            link: row.get(3)?,
            date: Self::row_datetime(row, 4)?,
            fetched_at: Self::row_datetime(row, 5)?,
            content: row.get(6)?,
            snippet: row.get(7)?,
            author: row.get(8)?,
            thumbnail: row.get(9)?,
            is_read: row.get(10)?,
            is_starred: row.get(11)?,
            is_hidden: row.get(12)?,
            notify: row.get(13)?,
            service_ref: row.get(14)?,
        })
    }

    /// `WHERE` clause selecting unread items of `source_ids` inside `boundary`.
    fn unread_scope(source_ids: &[i64], boundary: Option<&DateBoundary>) -> (String, Vec<Value>) {
        let placeholders = vec!["?"; source_ids.len()].join(", ");
        let mut clause = format!("is_read = 0 AND source_id IN ({})", placeholders);
        let mut values: Vec<Value> = source_ids.iter().map(|id| Value::Integer(*id)).collect();

        if let Some(boundary) = boundary {
            clause.push_str(if boundary.before {
                " AND date <= ?"
            } else {
                " AND date >= ?"
            });
            values.push(Value::Text(Self::format_datetime(&boundary.date)));
        }

        (clause, values)
    }

    fn query_items(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map(params_from_iter(values), Self::row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

impl Store for SqliteStore {
    fn add_source(&self, source: &Source) -> Result<i64> {
        let conn = self.conn()?;
        let rules = serde_json::to_string(&source.rules)?;

        conn.execute(
            "INSERT INTO sources (url, name, service_ref, group_id, rules, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.url,
                source.name,
                source.service_ref,
                source.group_id,
                rules,
                Self::format_datetime(&source.created_at)
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS),
                params![id],
                Self::row_to_source,
            )
            .optional()?;

        Ok(result)
    }

    fn get_source_by_service_ref(&self, service_ref: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE service_ref = ?1", SOURCE_COLUMNS),
                params![service_ref],
                Self::row_to_source,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY name, url",
            SOURCE_COLUMNS
        ))?;

        let sources = stmt
            .query_map([], Self::row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources)
    }

    fn set_source_rules(&self, source_id: i64, rules: &[SourceRule]) -> Result<()> {
        let conn = self.conn()?;
        let rules = serde_json::to_string(rules)?;
        let updated = conn.execute(
            "UPDATE sources SET rules = ?1 WHERE id = ?2",
            params![rules, source_id],
        )?;
        if updated == 0 {
            return Err(RillError::SourceNotFound(source_id.to_string()));
        }
        Ok(())
    }

    fn add_group(&self, group: &Group) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO source_groups (title, created_at) VALUES (?1, ?2)",
            params![group.title, Self::format_datetime(&group.created_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_all_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, title, created_at FROM source_groups ORDER BY id")?;

        let groups = stmt
            .query_map([], |row| {
                Ok(Group {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: Self::row_datetime(row, 2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    fn add_items(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let mut count = 0;

        for item in items {
            // Items already stored under the same service ref are skipped.
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO items (source_id, title, link, date, fetched_at, content, snippet,
                     author, thumbnail, is_read, is_starred, is_hidden, notify, service_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    item.source_id,
                    item.title,
                    item.link,
                    Self::format_datetime(&item.date),
                    Self::format_datetime(&item.fetched_at),
                    item.content,
                    item.snippet,
                    item.author,
                    item.thumbnail,
                    item.is_read,
                    item.is_starred,
                    item.is_hidden,
                    item.notify,
                    item.service_ref
                ],
            )?;
            count += inserted;
        }

        tx.commit()?;
        Ok(count)
    }

    fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                Self::row_to_item,
            )
            .optional()?;

        Ok(result)
    }

    fn get_item_by_service_ref(&self, service_ref: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE service_ref = ?1", ITEM_COLUMNS),
                params![service_ref],
                Self::row_to_item,
            )
            .optional()?;

        Ok(result)
    }

    fn get_items_by_source(&self, source_id: i64) -> Result<Vec<Item>> {
        self.query_items(
            &format!(
                "SELECT {} FROM items WHERE source_id = ?1 ORDER BY date DESC, id DESC",
                ITEM_COLUMNS
            ),
            vec![Value::Integer(source_id)],
        )
    }

    fn get_all_items(&self) -> Result<Vec<Item>> {
        self.query_items(
            &format!("SELECT {} FROM items ORDER BY date DESC, id DESC", ITEM_COLUMNS),
            Vec::new(),
        )
    }

    fn set_read(&self, item_id: i64, is_read: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE items SET is_read = ?1 WHERE id = ?2",
            params![is_read, item_id],
        )?;
        if updated == 0 {
            return Err(RillError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    fn set_starred(&self, item_id: i64, is_starred: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE items SET is_starred = ?1 WHERE id = ?2",
            params![is_starred, item_id],
        )?;
        if updated == 0 {
            return Err(RillError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    fn get_unread_count(&self, source_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE source_id = ?1 AND is_read = 0",
            params![source_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn mark_sources_read(&self, source_ids: &[i64], boundary: Option<&DateBoundary>) -> Result<usize> {
        if source_ids.is_empty() {
            return Ok(0);
        }
        let (clause, values) = Self::unread_scope(source_ids, boundary);
        let conn = self.conn()?;
        let updated = conn.execute(
            &format!("UPDATE items SET is_read = 1 WHERE {}", clause),
            params_from_iter(values),
        )?;
        Ok(updated)
    }

    fn unread_service_refs(&self, source_ids: &[i64], boundary: Option<&DateBoundary>) -> Result<Vec<String>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, values) = Self::unread_scope(source_ids, boundary);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT service_ref FROM items WHERE service_ref IS NOT NULL AND {} ORDER BY id",
            clause
        ))?;

        let refs = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(refs)
    }

    fn synced_flags(&self) -> Result<Vec<LocalFlags>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, service_ref, is_read, is_starred FROM items
             WHERE service_ref IS NOT NULL ORDER BY id",
        )?;

        let flags = stmt
            .query_map([], |row| {
                Ok(LocalFlags {
                    item_id: row.get(0)?,
                    service_ref: row.get(1)?,
                    is_read: row.get(2)?,
                    is_starred: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flags)
    }
}

impl SettingsStore for SqliteStore {
    fn load_service_config(&self) -> Result<Option<ServiceConfig>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![SERVICE_CONFIG_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_service_config(&self, config: &ServiceConfig) -> Result<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(config)?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![SERVICE_CONFIG_KEY, json],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RuleActions, RuleFilter};
    use crate::service::AuthMode;
    use chrono::TimeZone;

    fn linked_source(store: &SqliteStore, service_ref: &str) -> i64 {
        let mut source = Source::new(
            format!("https://{}.example/rss", service_ref),
            format!("Feed {}", service_ref),
        );
        source.service_ref = Some(service_ref.into());
        store.add_source(&source).unwrap()
    }

    fn item_at(source_id: i64, service_ref: &str, hour: u32) -> Item {
        let mut item = Item::new(source_id);
        item.title = format!("Item {}", service_ref);
        item.service_ref = Some(service_ref.into());
        item.date = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        item
    }

    #[test]
    fn test_add_and_get_source() {
        let store = SqliteStore::in_memory().unwrap();
        let mut source = Source::new("https://example.com/feed.xml".into(), "Example".into());
        source.service_ref = Some("12".into());
        source.rules = vec![SourceRule::new(
            RuleFilter {
                search: "ad".into(),
                ..Default::default()
            },
            RuleActions {
                read: Some(true),
                ..Default::default()
            },
        )];
        let id = store.add_source(&source).unwrap();

        let retrieved = store.get_source(id).unwrap().unwrap();
        assert_eq!(retrieved.url, "https://example.com/feed.xml");
        assert_eq!(retrieved.rules, source.rules);

        let by_ref = store.get_source_by_service_ref("12").unwrap().unwrap();
        assert_eq!(by_ref.id, id);
    }

    #[test]
    fn test_duplicate_service_ref_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        linked_source(&store, "5");
        let mut dup = Source::new("https://other.example/rss".into(), "Other".into());
        dup.service_ref = Some("5".into());
        assert!(store.add_source(&dup).is_err());
    }

    #[test]
    fn test_groups_and_assignment() {
        let store = SqliteStore::in_memory().unwrap();
        let group_id = store.add_group(&Group::new("Tech".into())).unwrap();

        let mut source = Source::new("https://a.example/rss".into(), "A".into());
        source.group_id = Some(group_id);
        let source_id = store.add_source(&source).unwrap();

        assert_eq!(store.get_source(source_id).unwrap().unwrap().group_id, Some(group_id));
        assert_eq!(store.get_all_groups().unwrap()[0].title, "Tech");
    }

    #[test]
    fn test_items_by_source_only_returns_that_source() {
        let store = SqliteStore::in_memory().unwrap();
        let a = linked_source(&store, "1");
        let b = linked_source(&store, "2");
        store
            .add_items(&[item_at(a, "10", 1), item_at(b, "20", 2), item_at(a, "11", 3)])
            .unwrap();

        let refs: Vec<String> = store
            .get_items_by_source(a)
            .unwrap()
            .into_iter()
            .filter_map(|i| i.service_ref)
            .collect();
        assert_eq!(refs, vec!["11", "10"]);
        assert!(store.get_items_by_source(999).unwrap().is_empty());
    }

    #[test]
    fn test_add_items_skips_known_service_refs() {
        let store = SqliteStore::in_memory().unwrap();
        let source_id = linked_source(&store, "1");

        let items = vec![item_at(source_id, "10", 1), item_at(source_id, "11", 2)];
        assert_eq!(store.add_items(&items).unwrap(), 2);
        assert_eq!(store.add_items(&items).unwrap(), 0);

        let retrieved = store.get_item_by_service_ref("11").unwrap().unwrap();
        assert_eq!(retrieved.title, "Item 11");
        assert_eq!(retrieved.date, items[1].date);
    }

    #[test]
    fn test_set_read_and_starred() {
        let store = SqliteStore::in_memory().unwrap();
        let source_id = linked_source(&store, "1");
        store.add_items(&[item_at(source_id, "10", 1)]).unwrap();
        let item = store.get_item_by_service_ref("10").unwrap().unwrap();

        store.set_read(item.id, true).unwrap();
        store.set_starred(item.id, true).unwrap();
        let item = store.get_item(item.id).unwrap().unwrap();
        assert!(item.is_read);
        assert!(item.is_starred);

        assert!(matches!(store.set_read(999, true), Err(RillError::ItemNotFound(_))));
    }

    #[test]
    fn test_unread_count() {
        let store = SqliteStore::in_memory().unwrap();
        let source_id = linked_source(&store, "1");

        let items: Vec<Item> = (0..5).map(|i| item_at(source_id, &i.to_string(), i)).collect();
        store.add_items(&items).unwrap();
        assert_eq!(store.get_unread_count(source_id).unwrap(), 5);

        let stored = store.get_items_by_source(source_id).unwrap();
        store.set_read(stored[0].id, true).unwrap();
        store.set_read(stored[1].id, true).unwrap();

        assert_eq!(store.get_unread_count(source_id).unwrap(), 3);
    }

    #[test]
    fn test_unread_service_refs_with_boundary() {
        let store = SqliteStore::in_memory().unwrap();
        let a = linked_source(&store, "1");
        let b = linked_source(&store, "2");

        let mut local_only = item_at(a, "x", 1);
        local_only.service_ref = None;
        let mut read = item_at(a, "12", 2);
        read.is_read = true;
        store
            .add_items(&[
                local_only,
                item_at(a, "11", 1),
                read,
                item_at(a, "13", 3),
                item_at(a, "14", 4),
                item_at(b, "21", 1),
            ])
            .unwrap();

        let boundary = DateBoundary::new(Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap(), true);
        assert_eq!(store.unread_service_refs(&[a], Some(&boundary)).unwrap(), vec!["11", "13"]);

        let boundary = DateBoundary::new(boundary.date, false);
        assert_eq!(store.unread_service_refs(&[a], Some(&boundary)).unwrap(), vec!["13", "14"]);

        assert_eq!(store.unread_service_refs(&[a, b], None).unwrap().len(), 4);
        assert!(store.unread_service_refs(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_mark_sources_read() {
        let store = SqliteStore::in_memory().unwrap();
        let a = linked_source(&store, "1");
        let b = linked_source(&store, "2");
        store
            .add_items(&[item_at(a, "11", 1), item_at(a, "12", 5), item_at(b, "21", 1)])
            .unwrap();

        let boundary = DateBoundary::new(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap(), true);
        assert_eq!(store.mark_sources_read(&[a], Some(&boundary)).unwrap(), 1);
        assert_eq!(store.get_unread_count(a).unwrap(), 1);
        assert_eq!(store.mark_sources_read(&[a, b], None).unwrap(), 2);
        assert_eq!(store.get_unread_count(b).unwrap(), 0);
    }

    #[test]
    fn test_synced_flags_only_linked_items() {
        let store = SqliteStore::in_memory().unwrap();
        let a = linked_source(&store, "1");
        let mut local_only = item_at(a, "x", 1);
        local_only.service_ref = None;
        let mut starred = item_at(a, "11", 2);
        starred.is_starred = true;
        store.add_items(&[local_only, starred]).unwrap();

        let flags = store.synced_flags().unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].service_ref, "11");
        assert!(flags[0].is_starred);
        assert!(!flags[0].is_read);
    }

    #[test]
    fn test_service_config_persists() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_service_config().unwrap().is_none());

        let mut config = ServiceConfig::new("https://flux.example", AuthMode::default());
        config.last_id = Some(10);
        store.save_service_config(&config).unwrap();
        config.last_id = Some(20);
        store.save_service_config(&config).unwrap();

        assert_eq!(store.load_service_config().unwrap(), Some(config));
    }

    #[test]
    fn test_file_backed_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rill.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            linked_source(&store, "1");
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get_all_sources().unwrap().len(), 1);
    }
}
