//! Relational persistence for threads and comments.
//!
//! WAL mode, a `metadata(key, value)` version row, and
//! `apply_schema_v{N}`/`migrate_vN_to_vN+1` functions gated on the current
//! version. Connections are pooled with `r2d2`/`r2d2_sqlite`; the monitor's
//! own task structure already serializes writes per cluster/thread, so a
//! plain pool (rather than a dedicated writer task) is enough here.

use anyhow::{Context, Result};
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::model::{Comment, Thread};

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub struct StorageEngine {
    pool: Pool<SqliteConnectionManager>,
}

impl StorageEngine {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .context("building sqlite connection pool")?;

        {
            let conn = pool.get().context("getting connection for schema init")?;
            init_schema(&conn).context("applying schema")?;
        }

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("checking out pooled connection")
    }

    /// Upsert by id. On conflict every scalar field is overwritten except
    /// `last_activity_utc`, which takes `max(existing, t.last_activity_utc)`;
    /// if the comment count grew, it is additionally bumped to `now`.
    /// New rows take `last_activity_utc = created_utc` unless the caller
    /// already supplied a larger value.
    pub fn save_thread(&self, t: &Thread) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        save_thread_tx(&tx, t)?;
        tx.commit()?;
        Ok(())
    }

    /// Single transaction; empty input is a no-op that completes successfully.
    pub fn save_threads_batch(&self, threads: &[Thread]) -> Result<()> {
        if threads.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for t in threads {
            save_thread_tx(&tx, t)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_thread(&self, id: &str) -> Result<Option<Thread>> {
        let conn = self.conn()?;
        fetch_thread(&conn, id)
    }

    /// All threads, most recently active first.
    pub fn get_all_threads(&self) -> Result<Vec<Thread>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM threads ORDER BY last_activity_utc DESC",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        ids.into_iter()
            .filter_map(|id| fetch_thread(&conn, &id).transpose())
            .collect()
    }

    pub fn get_recent_threads(&self, n: usize) -> Result<Vec<Thread>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM threads ORDER BY last_activity_utc DESC LIMIT ?1",
        )?;
        let ids: Vec<String> = stmt
            .query_map(params![n as i64], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        ids.into_iter()
            .filter_map(|id| fetch_thread(&conn, &id).transpose())
            .collect()
    }

    /// Upsert a comment; also bumps the owning thread's `last_activity_utc`
    /// to `now` if a new row (rather than a re-save of an identical one)
    /// was written.
    pub fn save_comment(&self, c: &Comment) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existed: bool = tx
            .query_row(
                "SELECT 1 FROM comments WHERE id = ?1",
                params![c.id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        tx.execute(
            "INSERT INTO comments
                (id, thread_id, parent_id, author, body, score, created_utc, fetched_at, last_updated_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                author = excluded.author,
                body = excluded.body,
                score = excluded.score,
                fetched_at = excluded.fetched_at,
                last_updated_utc = excluded.last_updated_utc",
            params![
                c.id,
                c.thread_id,
                c.parent_id,
                c.author,
                c.body,
                c.score,
                c.created_utc,
                c.fetched_at,
                c.last_updated_utc,
            ],
        )?;

        tx.execute(
            "DELETE FROM comment_images WHERE comment_id = ?1",
            params![c.id],
        )?;
        for url in &c.image_urls {
            tx.execute(
                "INSERT INTO comment_images (comment_id, url) VALUES (?1, ?2)",
                params![c.id, url],
            )?;
        }

        if !existed {
            tx.execute(
                "UPDATE threads SET last_activity_utc = ?1 WHERE id = ?2",
                params![Utc::now().timestamp(), c.thread_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Up to `limit` comments for a thread, newest first by `created_utc`.
    pub fn get_comments_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<Comment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, parent_id, author, body, score, created_utc, fetched_at, last_updated_utc
             FROM comments WHERE thread_id = ?1 ORDER BY created_utc DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![thread_id, limit as i64], |row| {
            Ok(Comment {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                parent_id: row.get(2)?,
                author: row.get(3)?,
                body: row.get(4)?,
                score: row.get(5)?,
                created_utc: row.get(6)?,
                fetched_at: row.get(7)?,
                last_updated_utc: row.get(8)?,
                image_urls: Vec::new(),
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            let mut comment = row?;
            comment.image_urls = fetch_comment_images(&conn, &comment.id)?;
            comments.push(comment);
        }
        Ok(comments)
    }

    /// Deletes every thread whose `last_activity_utc < now - ttl_seconds`,
    /// cascading to its full comment subtree. Returns the number of
    /// threads deleted.
    pub fn cleanup_old_threads(&self, ttl_seconds: i64) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let cutoff = Utc::now().timestamp() - ttl_seconds;

        let mut stmt = tx.prepare("SELECT id FROM threads WHERE last_activity_utc < ?1")?;
        let stale_ids: Vec<String> = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        for thread_id in &stale_ids {
            let comment_ids = collect_comment_subtree(&tx, thread_id)?;
            for comment_id in &comment_ids {
                tx.execute(
                    "DELETE FROM comment_images WHERE comment_id = ?1",
                    params![comment_id],
                )?;
            }
            if !comment_ids.is_empty() {
                let placeholders = comment_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!("DELETE FROM comments WHERE id IN ({placeholders})");
                let values: Vec<&dyn rusqlite::ToSql> =
                    comment_ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
                tx.execute(&sql, values.as_slice())?;
            }
            tx.execute(
                "DELETE FROM thread_images WHERE thread_id = ?1",
                params![thread_id],
            )?;
            tx.execute("DELETE FROM threads WHERE id = ?1", params![thread_id])?;
        }

        tx.commit()?;
        Ok(stale_ids.len())
    }
}

/// Least fixed point over `parent_id`, rooted at `parent_id = thread_id`.
/// Implemented as an iterative worklist rather than a `WITH RECURSIVE` CTE:
/// straightforward Rust over SQL cleverness.
fn collect_comment_subtree(
    tx: &rusqlite::Transaction<'_>,
    thread_id: &str,
) -> Result<Vec<String>> {
    let mut collected = Vec::new();
    let mut frontier = vec![thread_id.to_string()];

    while !frontier.is_empty() {
        let placeholders = frontier.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT id FROM comments WHERE parent_id IN ({placeholders})");
        let mut stmt = tx.prepare(&sql)?;
        let values: Vec<&dyn rusqlite::ToSql> =
            frontier.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let next: Vec<String> = stmt
            .query_map(values.as_slice(), |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        collected.extend(next.iter().cloned());
        frontier = next;
    }

    Ok(collected)
}

fn save_thread_tx(tx: &rusqlite::Transaction<'_>, t: &Thread) -> Result<()> {
    let existing: Option<(i64, i64)> = tx
        .query_row(
            "SELECT last_activity_utc, comment_count FROM threads WHERE id = ?1",
            params![t.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let last_activity_utc = match existing {
        Some((existing_activity, existing_comment_count)) => {
            let mut activity = existing_activity.max(t.last_activity_utc);
            if t.comment_count > existing_comment_count {
                activity = activity.max(Utc::now().timestamp());
            }
            activity
        }
        None => {
            if t.last_activity_utc > 0 {
                t.last_activity_utc
            } else {
                t.created_utc
            }
        }
    };

    tx.execute(
        "INSERT INTO threads
            (id, board, title, author, text, created_utc, permalink, score,
             upvote_ratio, comment_count, last_activity_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            board = excluded.board,
            title = excluded.title,
            author = excluded.author,
            text = excluded.text,
            permalink = excluded.permalink,
            score = excluded.score,
            upvote_ratio = excluded.upvote_ratio,
            comment_count = excluded.comment_count,
            last_activity_utc = excluded.last_activity_utc",
        params![
            t.id,
            t.board,
            t.title,
            t.author,
            t.text,
            t.created_utc,
            t.permalink,
            t.score,
            t.upvote_ratio,
            t.comment_count,
            last_activity_utc,
        ],
    )?;

    tx.execute(
        "DELETE FROM thread_images WHERE thread_id = ?1",
        params![t.id],
    )?;
    if let Some(url) = &t.image_url {
        tx.execute(
            "INSERT INTO thread_images (thread_id, url) VALUES (?1, ?2)",
            params![t.id, url],
        )?;
    }

    Ok(())
}

fn fetch_thread(conn: &Connection, id: &str) -> Result<Option<Thread>> {
    let row = conn
        .query_row(
            "SELECT id, board, title, author, text, created_utc, permalink, score,
                    upvote_ratio, comment_count, last_activity_utc
             FROM threads WHERE id = ?1",
            params![id],
            |row| {
                Ok(Thread {
                    id: row.get(0)?,
                    board: row.get(1)?,
                    title: row.get(2)?,
                    author: row.get(3)?,
                    text: row.get(4)?,
                    created_utc: row.get(5)?,
                    permalink: row.get(6)?,
                    score: row.get(7)?,
                    upvote_ratio: row.get(8)?,
                    comment_count: row.get(9)?,
                    last_activity_utc: row.get(10)?,
                    image_url: None,
                })
            },
        )
        .optional()?;

    let Some(mut thread) = row else {
        return Ok(None);
    };

    thread.image_url = conn
        .query_row(
            "SELECT url FROM thread_images WHERE thread_id = ?1 LIMIT 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(Some(thread))
}

fn fetch_comment_images(conn: &Connection, comment_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM comment_images WHERE comment_id = ?1")?;
    let urls = stmt
        .query_map(params![comment_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    Ok(urls)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA busy_timeout=5000;
        "#,
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(
                (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
                0
            )",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }

    debug_assert!(CURRENT_SCHEMA_VERSION >= 1);
    Ok(())
}

fn apply_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS threads (
            id TEXT PRIMARY KEY,
            board TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            text TEXT,
            created_utc INTEGER NOT NULL,
            permalink TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            upvote_ratio REAL NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0,
            last_activity_utc INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_threads_board ON threads(board);
        CREATE INDEX IF NOT EXISTS idx_threads_created ON threads(created_utc);
        CREATE INDEX IF NOT EXISTS idx_threads_last_activity ON threads(last_activity_utc);

        CREATE TABLE IF NOT EXISTS thread_images (
            thread_id TEXT NOT NULL REFERENCES threads(id),
            url TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_thread_images_thread ON thread_images(thread_id);

        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            thread_id TEXT NOT NULL REFERENCES threads(id),
            parent_id TEXT NOT NULL,
            author TEXT NOT NULL,
            body TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            created_utc INTEGER NOT NULL,
            fetched_at INTEGER NOT NULL,
            last_updated_utc INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_thread ON comments(thread_id);
        CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);

        CREATE TABLE IF NOT EXISTS comment_images (
            comment_id TEXT NOT NULL REFERENCES comments(id),
            url TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comment_images_comment ON comment_images(comment_id);

        INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> (TempDir, StorageEngine) {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(&dir.path().join("sentinel.db")).unwrap();
        (dir, engine)
    }

    fn thread(id: &str, comment_count: i64, last_activity: i64) -> Thread {
        Thread {
            id: id.to_string(),
            board: "wallstreetbetsGER".to_string(),
            title: "title".to_string(),
            author: "author".to_string(),
            text: Some("body".to_string()),
            created_utc: 1_000,
            permalink: "/r/board/abc".to_string(),
            score: 10,
            upvote_ratio: 0.9,
            comment_count,
            last_activity_utc: last_activity,
            image_url: None,
        }
    }

    #[test]
    fn schema_applied_twice_is_idempotent() {
        let (dir, _engine) = engine();
        let path = dir.path().join("sentinel.db");
        StorageEngine::open(&path).unwrap();
    }

    #[test]
    fn save_then_get_round_trips_scalar_fields() {
        let (_dir, engine) = engine();
        let t = thread("t1", 5, 2_000);
        engine.save_thread(&t).unwrap();
        let got = engine.get_thread("t1").unwrap().unwrap();
        assert_eq!(got.title, t.title);
        assert_eq!(got.comment_count, 5);
    }

    #[test]
    fn upsert_keeps_max_last_activity() {
        let (_dir, engine) = engine();
        engine.save_thread(&thread("t1", 5, 5_000)).unwrap();
        engine.save_thread(&thread("t1", 5, 1_000)).unwrap();
        let got = engine.get_thread("t1").unwrap().unwrap();
        assert_eq!(got.last_activity_utc, 5_000);
    }

    #[test]
    fn upsert_bumps_activity_when_comment_count_grows() {
        let (_dir, engine) = engine();
        engine.save_thread(&thread("t1", 5, 1_000)).unwrap();
        engine.save_thread(&thread("t1", 7, 1_000)).unwrap();
        let got = engine.get_thread("t1").unwrap().unwrap();
        assert_eq!(got.comment_count, 7);
        assert!(got.last_activity_utc >= Utc::now().timestamp() - 5);
    }

    #[test]
    fn batch_of_one_matches_single_save() {
        let (_dir, engine) = engine();
        engine.save_threads_batch(&[thread("t1", 5, 1_000)]).unwrap();
        assert!(engine.get_thread("t1").unwrap().is_some());
    }

    #[test]
    fn batch_empty_is_noop() {
        let (_dir, engine) = engine();
        engine.save_threads_batch(&[]).unwrap();
        assert!(engine.get_all_threads().unwrap().is_empty());
    }

    #[test]
    fn cascade_cleanup_removes_thread_and_its_entire_subtree() {
        let (_dir, engine) = engine();
        let old_activity = Utc::now().timestamp() - 10_000;
        engine.save_thread(&thread("t1", 0, old_activity)).unwrap();

        // Force the thread's activity back down after save_comment bumps it.
        let bump_back = |engine: &StorageEngine| {
            let conn = engine.pool.get().unwrap();
            conn.execute(
                "UPDATE threads SET last_activity_utc = ?1 WHERE id = 't1'",
                params![old_activity],
            )
            .unwrap();
        };

        engine
            .save_comment(&Comment::new("c1", "t1", "t1", "a", "root1", 1, 0, 0, 0, None))
            .unwrap();
        bump_back(&engine);
        engine
            .save_comment(&Comment::new("c2", "t1", "t1", "a", "root2", 1, 0, 0, 0, None))
            .unwrap();
        bump_back(&engine);
        engine
            .save_comment(&Comment::new("c3", "t1", "c1", "a", "reply1", 1, 0, 0, 0, None))
            .unwrap();
        bump_back(&engine);
        engine
            .save_comment(&Comment::new("c4", "t1", "c3", "a", "reply2", 1, 0, 0, 0, None))
            .unwrap();
        bump_back(&engine);
        engine
            .save_comment(&Comment::new("c5", "t1", "c2", "a", "reply3", 1, 0, 0, 0, None))
            .unwrap();
        bump_back(&engine);

        let deleted = engine.cleanup_old_threads(3600).unwrap();
        assert_eq!(deleted, 1);
        assert!(engine.get_thread("t1").unwrap().is_none());
        assert!(engine.get_comments_for_thread("t1", 100).unwrap().is_empty());
    }

    #[test]
    fn get_comments_for_thread_respects_limit_and_order() {
        let (_dir, engine) = engine();
        engine.save_thread(&thread("t1", 0, 1_000)).unwrap();
        engine
            .save_comment(&Comment::new("c1", "t1", "t1", "a", "older", 1, 100, 0, 0, None))
            .unwrap();
        engine
            .save_comment(&Comment::new("c2", "t1", "t1", "a", "newer", 1, 200, 0, 0, None))
            .unwrap();

        let comments = engine.get_comments_for_thread("t1", 1).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "c2");
    }
}
