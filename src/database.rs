//! 本地持久化：SQLite 上的键值命名空间
//!
//! 每个 store 占用一个命名空间（如 `quiz_mistakes_v3`），值为字符串：
//! 布尔集合写入 `"true"`，列表写入 JSON。命名空间内的枚举顺序即写入顺序（rowid）。

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// 创建新的数据库连接并初始化表结构
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建数据库目录失败: {:?}", parent))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("打开数据库连接失败: {:?}", db_path))?;

        let db = Database {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        db.initialize_schema()?;
        debug!("[Database] 已打开 {:?}", db_path);
        Ok(db)
    }

    /// 内存数据库（测试与临时会话）
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("打开内存数据库失败")?;
        let db = Database {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("数据库连接锁已损坏"))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS kv_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            COMMIT;",
        )
        .context("初始化数据库表结构失败")?;
        Ok(())
    }

    pub fn kv_get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// 写入（已存在时覆盖值，保留原有顺序）
    pub fn kv_put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![namespace, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn kv_contains(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 删除单个键，返回是否真的删除了
    pub fn kv_remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(affected > 0)
    }

    /// 在一个事务中批量删除，返回实际删除的数量
    pub fn kv_remove_many(&self, namespace: &str, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt =
                tx.prepare("DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2")?;
            for key in keys {
                removed += stmt.execute(params![namespace, key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// 按写入顺序列出命名空间中的键
    pub fn kv_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key FROM kv_entries WHERE namespace = ?1 ORDER BY rowid")?;
        let keys = stmt
            .query_map(params![namespace], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    pub fn kv_count(&self, namespace: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// 绑定到某个命名空间的句柄
#[derive(Clone)]
pub struct KvNamespace {
    db: Arc<Database>,
    name: &'static str,
}

impl KvNamespace {
    pub fn new(db: Arc<Database>, name: &'static str) -> Self {
        Self { db, name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.db.kv_get(self.name, key)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.db.kv_put(self.name, key, value)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.db.kv_contains(self.name, key)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.db.kv_remove(self.name, key)
    }

    pub fn remove_many(&self, keys: &[String]) -> Result<usize> {
        self.db.kv_remove_many(self.name, keys)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.db.kv_keys(self.name)
    }

    pub fn count(&self) -> Result<usize> {
        self.db.kv_count(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_isolated() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let a = KvNamespace::new(db.clone(), "a");
        let b = KvNamespace::new(db, "b");

        a.put("q1", "true").unwrap();
        assert!(a.contains("q1").unwrap());
        assert!(!b.contains("q1").unwrap());
        assert_eq!(b.count().unwrap(), 0);
    }

    #[test]
    fn test_overwrite_keeps_insertion_order() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ns = KvNamespace::new(db, "order");
        ns.put("first", "1").unwrap();
        ns.put("second", "2").unwrap();
        ns.put("first", "3").unwrap();

        assert_eq!(ns.keys().unwrap(), vec!["first", "second"]);
        assert_eq!(ns.get("first").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_remove_many_counts_only_present_keys() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ns = KvNamespace::new(db, "rm");
        ns.put("x", "true").unwrap();
        ns.put("y", "true").unwrap();

        let removed = ns
            .remove_many(&["x".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(ns.keys().unwrap(), vec!["y"]);
        assert_eq!(ns.remove_many(&[]).unwrap(), 0);
        assert!(!ns.remove("x").unwrap());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz.db");
        {
            let db = Arc::new(Database::new(&path).unwrap());
            KvNamespace::new(db, "p").put("k", "v").unwrap();
        }
        let db = Arc::new(Database::new(&path).unwrap());
        assert_eq!(db.db_path(), path.as_path());
        assert_eq!(
            KvNamespace::new(db, "p").get("k").unwrap().as_deref(),
            Some("v")
        );
    }
}
